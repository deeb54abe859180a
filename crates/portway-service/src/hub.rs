// SPDX-License-Identifier: Apache-2.0
//! Connection table: the router's transport and tab directory.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use portway_proto::frame::encode_frame;
use portway_proto::TabId;
use portway_router::{PeerId, TabDirectory, Transport, TransportError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Connected peers and their outboxes.
///
/// Every connection is its own window, identified by its peer id. Sends
/// never block: a full outbox is reported as backpressure and the packet is
/// dropped.
pub(crate) struct Hub {
    next_peer: AtomicU64,
    outbox_depth: usize,
    conns: Mutex<HashMap<PeerId, mpsc::Sender<Vec<u8>>>>,
}

impl Hub {
    pub(crate) fn new(outbox_depth: usize) -> Self {
        Self {
            next_peer: AtomicU64::new(1),
            outbox_depth,
            conns: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PeerId, mpsc::Sender<Vec<u8>>>> {
        self.conns.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a new connection and hand back its outbox.
    pub(crate) fn attach(&self) -> (PeerId, mpsc::Receiver<Vec<u8>>) {
        let peer = self.next_peer.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.outbox_depth);
        self.lock().insert(peer, tx);
        (peer, rx)
    }

    pub(crate) fn detach(&self, peer: PeerId) {
        self.lock().remove(&peer);
    }

    /// Connected peers, oldest first.
    pub(crate) fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.lock().keys().copied().collect();
        peers.sort_unstable();
        peers
    }
}

fn frame(channel: &str, bytes: &[u8]) -> Result<Vec<u8>, TransportError> {
    encode_frame(channel, bytes).map_err(|err| TransportError::Other(err.to_string()))
}

impl Transport for Hub {
    fn send_to(&self, peer: PeerId, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let packet = frame(channel, &bytes)?;
        let conns = self.lock();
        let tx = conns.get(&peer).ok_or(TransportError::UnknownPeer(peer))?;
        tx.try_send(packet).map_err(|err| match err {
            TrySendError::Full(_) => {
                // The packet is lost; a reply dropped here is never retried.
                warn!(peer, channel, depth = self.outbox_depth, "outbox full; dropping packet");
                TransportError::Backpressure(peer)
            }
            TrySendError::Closed(_) => {
                debug!(peer, channel, "outbox closed; dropping packet");
                TransportError::UnknownPeer(peer)
            }
        })
    }

    fn send_to_all(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
        let packet = frame(channel, &bytes)?;
        let conns = self.lock();
        debug!(channel, peers = conns.len(), "fan-out");
        for (peer, tx) in conns.iter() {
            if let Err(err) = tx.try_send(packet.clone()) {
                warn!(peer, ?err, "dropping broadcast for peer");
            }
        }
        Ok(())
    }
}

impl TabDirectory for Hub {
    fn resolve_tab_id(&self, peer: PeerId) -> Option<TabId> {
        self.lock()
            .contains_key(&peer)
            .then(|| TabId(peer.to_string()))
    }

    fn current_windows(&self) -> Vec<PeerId> {
        self.peers()
    }
}
