// SPDX-License-Identifier: Apache-2.0
//! Pending reply slot.
//!
//! One slot exists per dispatched envelope. Every [`Reply`] handed to a
//! handler points at that slot; the slot delivers at most one response and,
//! when the last handle goes away without anyone answering, delivers an empty
//! (`null`) one so the requesting peer never waits forever.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use portway_proto::{wire::encode_reply, ChannelId, ReplyEnvelope, RequestId};
use serde_json::Value;
use tracing::{debug, warn};

use crate::transport::{PeerId, Transport};

struct ReplyTarget {
    peer: PeerId,
    channel_id: ChannelId,
    request_id: RequestId,
    port_name: Option<String>,
}

struct ReplySlot {
    // `None` for fire-and-forget envelopes.
    target: Option<ReplyTarget>,
    transport: Arc<dyn Transport>,
    sent: AtomicBool,
}

impl ReplySlot {
    fn discharge(&self, msg: Value) -> bool {
        let Some(target) = &self.target else {
            return false;
        };
        if self.sent.swap(true, Ordering::AcqRel) {
            debug!(
                request_id = %target.request_id,
                channel = %target.channel_id,
                "reply already sent; ignoring second response"
            );
            return false;
        }
        let envelope = ReplyEnvelope {
            request_id: target.request_id.clone(),
            port_name: target.port_name.clone(),
            msg,
        };
        let bytes = match encode_reply(&envelope) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(?err, request_id = %target.request_id, "failed to encode reply");
                return false;
            }
        };
        if let Err(err) = self
            .transport
            .send_to(target.peer, target.channel_id.as_str(), bytes)
        {
            warn!(
                ?err,
                peer = target.peer,
                channel = %target.channel_id,
                "reply delivery failed"
            );
            return false;
        }
        true
    }
}

impl Drop for ReplySlot {
    fn drop(&mut self) {
        if self.target.is_some() && !self.sent.load(Ordering::Acquire) {
            debug!("discharging unanswered request with an empty reply");
            self.discharge(Value::Null);
        }
    }
}

/// Handle to the reply obligation of one inbound envelope.
///
/// Calling [`Reply::send`] more than once across all handles for the same
/// envelope delivers only the first response. A handle can be moved into a
/// task and answered later; the envelope is answered with `null` once every
/// handle is dropped unanswered.
pub struct Reply {
    slot: Arc<ReplySlot>,
}

impl Reply {
    pub(crate) fn new(
        peer: PeerId,
        channel_id: ChannelId,
        request_id: Option<RequestId>,
        port_name: Option<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let target = request_id.map(|request_id| ReplyTarget {
            peer,
            channel_id,
            request_id,
            port_name,
        });
        Self {
            slot: Arc::new(ReplySlot {
                target,
                transport,
                sent: AtomicBool::new(false),
            }),
        }
    }

    // Another handle on the same slot, for the next dispatch stage.
    pub(crate) fn share(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Whether the sender is waiting for an answer.
    pub fn expects_reply(&self) -> bool {
        self.slot.target.is_some()
    }

    /// Whether a response has already gone out.
    pub fn is_sent(&self) -> bool {
        self.slot.sent.load(Ordering::Acquire)
    }

    /// Answer the request. Returns `true` if this call delivered the response.
    ///
    /// A no-op for fire-and-forget envelopes and for requests already answered.
    pub fn send(self, response: Value) -> bool {
        self.slot.discharge(response)
    }

    /// Answer the request with `null`.
    pub fn send_empty(self) -> bool {
        self.slot.discharge(Value::Null)
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("expects_reply", &self.expects_reply())
            .field("sent", &self.is_sent())
            .finish()
    }
}
