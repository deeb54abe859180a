// SPDX-License-Identifier: Apache-2.0
//! Fire-and-forget fan-out to every connected peer.

use std::sync::Arc;

use portway_proto::wire::encode_broadcast;
use serde_json::Value;
use tracing::{debug, warn};

use crate::transport::Transport;

/// Sends `{"broadcast": true, "msg": ..}` to all peers on the broadcast channel.
///
/// Best effort: encoding or delivery failures are logged, never returned.
/// Cheap to clone, so handlers can hold their own emitter.
#[derive(Clone)]
pub struct BroadcastEmitter {
    transport: Arc<dyn Transport>,
    channel: String,
}

impl BroadcastEmitter {
    /// Emitter writing to `channel` through `transport`.
    pub fn new(transport: Arc<dyn Transport>, channel: impl Into<String>) -> Self {
        Self {
            transport,
            channel: channel.into(),
        }
    }

    /// Channel broadcasts travel on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Broadcast `payload` to every known peer.
    pub fn broadcast(&self, payload: &Value) {
        let bytes = match encode_broadcast(payload) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(?err, "failed to encode broadcast");
                return;
            }
        };
        match self.transport.send_to_all(&self.channel, bytes) {
            Ok(()) => debug!(channel = %self.channel, "broadcast sent"),
            Err(err) => warn!(?err, channel = %self.channel, "broadcast delivery failed"),
        }
    }
}

impl std::fmt::Debug for BroadcastEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastEmitter")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::{PeerId, TransportError};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Fanout {
        all: Mutex<Vec<(String, Vec<u8>)>>,
        fail: bool,
    }

    impl Transport for Fanout {
        fn send_to(&self, peer: PeerId, _: &str, _: Vec<u8>) -> Result<(), TransportError> {
            Err(TransportError::UnknownPeer(peer))
        }

        fn send_to_all(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Closed);
            }
            self.all.lock().unwrap().push((channel.to_owned(), bytes));
            Ok(())
        }
    }

    #[test]
    fn broadcast_wraps_payload() {
        let transport = Arc::new(Fanout::default());
        let emitter = BroadcastEmitter::new(transport.clone(), "portway:broadcast");
        emitter.broadcast(&json!({"tick": 1}));
        let all = transport.all.lock().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "portway:broadcast");
        assert_eq!(all[0].1, br#"{"broadcast":true,"msg":{"tick":1}}"#.to_vec());
    }

    #[test]
    fn delivery_failure_is_swallowed() {
        let transport = Arc::new(Fanout {
            fail: true,
            ..Fanout::default()
        });
        let emitter = BroadcastEmitter::new(transport.clone(), "b");
        emitter.broadcast(&json!(null));
        assert!(transport.all.lock().unwrap().is_empty());
    }
}
