// SPDX-License-Identifier: Apache-2.0
//! Recording transport.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use portway_proto::wire::{decode_broadcast, decode_reply};
use portway_proto::ReplyEnvelope;
use portway_router::{PeerId, Transport, TransportError};
use serde_json::Value;

/// One frame handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Addressed peer; `None` for fan-out.
    pub peer: Option<PeerId>,
    /// Channel name.
    pub channel: String,
    /// Encoded envelope.
    pub bytes: Vec<u8>,
}

impl Sent {
    /// Decode as a correlated reply.
    pub fn reply(&self) -> Option<ReplyEnvelope> {
        decode_reply(&self.bytes).ok()
    }

    /// Decode as a broadcast and return its payload.
    pub fn broadcast(&self) -> Option<Value> {
        decode_broadcast(&self.bytes).ok().map(|env| env.msg)
    }
}

#[derive(Default)]
struct State {
    sent: Vec<Sent>,
    unreachable: HashSet<PeerId>,
}

/// [`Transport`] that records every send instead of delivering it.
///
/// Peers marked with [`RecordingTransport::set_unreachable`] fail with
/// [`TransportError::UnknownPeer`] and are not recorded.
#[derive(Default)]
pub struct RecordingTransport {
    state: Mutex<State>,
}

impl RecordingTransport {
    /// Transport with every peer reachable.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make sends to `peer` fail.
    pub fn set_unreachable(&self, peer: PeerId) {
        self.lock().unreachable.insert(peer);
    }

    /// Every recorded frame, oldest first.
    pub fn sent(&self) -> Vec<Sent> {
        self.lock().sent.clone()
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.lock().sent.len()
    }

    /// Whether nothing has been sent.
    pub fn is_empty(&self) -> bool {
        self.lock().sent.is_empty()
    }

    /// Replies addressed to `peer`, oldest first.
    pub fn replies_to(&self, peer: PeerId) -> Vec<ReplyEnvelope> {
        self.lock()
            .sent
            .iter()
            .filter(|s| s.peer == Some(peer))
            .filter_map(Sent::reply)
            .collect()
    }

    /// Payloads of every fan-out frame, oldest first.
    pub fn broadcasts(&self) -> Vec<Value> {
        self.lock()
            .sent
            .iter()
            .filter(|s| s.peer.is_none())
            .filter_map(Sent::broadcast)
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.lock().sent.clear();
    }
}

impl Transport for RecordingTransport {
    fn send_to(&self, peer: PeerId, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut state = self.lock();
        if state.unreachable.contains(&peer) {
            return Err(TransportError::UnknownPeer(peer));
        }
        state.sent.push(Sent {
            peer: Some(peer),
            channel: channel.to_owned(),
            bytes,
        });
        Ok(())
    }

    fn send_to_all(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        self.lock().sent.push(Sent {
            peer: None,
            channel: channel.to_owned(),
            bytes,
        });
        Ok(())
    }
}
