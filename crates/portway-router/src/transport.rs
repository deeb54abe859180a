// SPDX-License-Identifier: Apache-2.0
//! Ports the router consumes: the transport adapter and the tab directory.

use portway_proto::TabId;
use thiserror::Error;

/// Transport-level identity of one connected peer context.
pub type PeerId = u64;

/// One raw message as delivered by the transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    /// Peer the bytes came from.
    pub peer: PeerId,
    /// Undecoded envelope bytes.
    pub data: Vec<u8>,
}

/// Delivery failure reported by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The addressed peer is not (or no longer) connected.
    #[error("unknown peer {0}")]
    UnknownPeer(PeerId),
    /// The peer's outbox is full.
    #[error("outbox full for peer {0}")]
    Backpressure(PeerId),
    /// The transport has shut down.
    #[error("transport closed")]
    Closed,
    /// Adapter-specific failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Outbound half of the transport adapter.
///
/// Implementations must not block: the router calls these from its dispatch
/// loop and from deferred reply handles.
pub trait Transport: Send + Sync {
    /// Send `bytes` to `peer` on the named channel.
    fn send_to(&self, peer: PeerId, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError>;

    /// Send `bytes` to every connected peer on the named channel.
    fn send_to_all(&self, channel: &str, bytes: Vec<u8>) -> Result<(), TransportError>;
}

/// Window/tab collaborator used to build sender metadata.
pub trait TabDirectory: Send + Sync {
    /// Tab identity of the context behind `peer`, if it can be resolved.
    fn resolve_tab_id(&self, peer: PeerId) -> Option<TabId>;

    /// Currently open top-level windows, in host order.
    fn current_windows(&self) -> Vec<PeerId>;
}
