// SPDX-License-Identifier: Apache-2.0
//! Handler contract and per-envelope sender metadata.

use portway_proto::TabId;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::reply::Reply;
use crate::transport::PeerId;

/// What a handler did with an envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Claimed; the router sends this value as the reply.
    Respond(Value),
    /// Claimed; the handler answered (or will answer) through its [`Reply`].
    Handled,
    /// Not mine; the next dispatch stage gets a chance.
    Unhandled,
}

impl Outcome {
    /// Whether the handler claimed the envelope.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Outcome::Unhandled)
    }
}

/// A handler failed while processing an envelope.
///
/// The router logs it and treats the envelope as unhandled.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    /// Build an error from any message.
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

/// Tab half of [`SenderContext`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderTab {
    /// Resolved tab identity, if the directory knows the peer.
    pub id: Option<TabId>,
}

/// Read-only metadata about the peer that sent an envelope.
///
/// Built fresh for every inbound envelope. Serializes as `{"tab": {"id": ..}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderContext {
    /// Transport identity of the sender.
    #[serde(skip)]
    pub peer: PeerId,
    /// Tab the sender lives in.
    pub tab: SenderTab,
}

/// A port handler.
///
/// Handlers run on the router's dispatch loop and must not block. To answer
/// asynchronously, keep the [`Reply`] and return [`Outcome::Handled`].
pub trait Handler: Send + Sync {
    /// Process one envelope addressed to this handler.
    fn handle(
        &self,
        payload: &Value,
        sender: &SenderContext,
        reply: Reply,
    ) -> Result<Outcome, HandlerError>;
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Value, &SenderContext, Reply) -> Result<Outcome, HandlerError> + Send + Sync,
{
    fn handle(
        &self,
        payload: &Value,
        sender: &SenderContext,
        reply: Reply,
    ) -> Result<Outcome, HandlerError> {
        (self.0)(payload, sender, reply)
    }
}

/// Wrap a closure as a handler.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Value, &SenderContext, Reply) -> Result<Outcome, HandlerError> + Send + Sync,
{
    FnHandler(f)
}
