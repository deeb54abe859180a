// SPDX-License-Identifier: Apache-2.0
//! Cross-context message router.
//!
//! A coordinator owns one [`Router`]. Transport adapters feed it every inbound
//! message through [`Router::handle_inbound`]; the router decodes the envelope,
//! dispatches it to the handler registered for its logical port (falling back
//! to a default handler), and delivers exactly one reply to every request that
//! carried a request id.
//!
//! # Guarantees
//!
//! - **Exactly one reply per request**: the [`Reply`] slot sends at most once
//!   and, if nobody answered, discharges an empty reply when the last handle
//!   is dropped.
//! - **No reply without a request id**: fire-and-forget envelopes never produce
//!   outbound traffic.
//! - **First match wins**: the default handler only sees envelopes the port
//!   handler declined.

mod broadcast;
mod handler;
mod registry;
mod reply;
mod router;
mod transport;

pub use broadcast::BroadcastEmitter;
pub use handler::{handler_fn, FnHandler, Handler, HandlerError, Outcome, SenderContext, SenderTab};
pub use registry::PortRegistry;
pub use reply::Reply;
pub use router::{Dispatch, Router};
pub use transport::{Inbound, PeerId, TabDirectory, Transport, TransportError};

pub use portway_proto::{AppInfo, ChannelId, RequestId, TabId};
