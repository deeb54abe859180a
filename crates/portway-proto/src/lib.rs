// SPDX-License-Identifier: Apache-2.0
//! Wire schema for the Portway router.
//!
//! Peers talk to the coordinator with JSON envelopes carried inside framed
//! packets (see [`frame`]). A peer request looks like
//! `{"requestId": "r1", "portName": "<channelId>|<logicalPort>", "msg": ...}`;
//! the coordinator answers on the peer's channel with
//! `{"requestId": "r1", "portName": "<logicalPort>", "msg": ...}` and fans out
//! `{"broadcast": true, "msg": ...}` on the broadcast channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::hash::{Hash, Hasher};
use std::{fmt, path::PathBuf};

pub mod frame;
pub mod wire;


/// Separator between the physical channel id and the logical port inside a
/// wire `portName`.
pub const PORT_SEPARATOR: char = '|';

/// Default Unix socket path for the coordinator.
///
/// Prefers a per-user runtime dir (XDG_RUNTIME_DIR) and falls back to `/tmp`
/// when unavailable.
pub fn default_socket_path() -> PathBuf {
    let base = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join("portway.sock")
}

/// Identity of the application hosting the router.
///
/// The clean name prefixes the two well-known transport channels. It may be
/// chosen at runtime (for example from a command-line flag).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// Display name.
    pub name: &'static str,
    /// Lowercase identifier used in channel names.
    pub clean_name: Cow<'static, str>,
    /// Application version string.
    pub version: &'static str,
}

impl AppInfo {
    /// Channel peers post requests on (`"<clean_name>:background"`).
    pub fn background_channel(&self) -> String {
        format!("{}:background", self.clean_name)
    }

    /// Channel broadcasts are delivered on (`"<clean_name>:broadcast"`).
    pub fn broadcast_channel(&self) -> String {
        format!("{}:broadcast", self.clean_name)
    }
}

/// Identity used by the bundled service and client.
pub const PORTWAY_APP: AppInfo = AppInfo {
    name: "Portway",
    clean_name: Cow::Borrowed("portway"),
    version: env!("CARGO_PKG_VERSION"),
};

/// Physical reply destination of one peer endpoint (frame, tab, tool).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Borrow the raw channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Opaque correlation token chosen by the requesting peer.
///
/// Any JSON value is accepted, `null` included; the token is echoed back in
/// the same shape it arrived in. Strings and unsigned integers get their own
/// variants because the bundled client allocates those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Integer token.
    Number(u64),
    /// Text token.
    Text(String),
    /// Any other token (negative or fractional numbers, `null`, objects).
    Other(Value),
}

impl Hash for RequestId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            RequestId::Number(n) => (0_u8, n).hash(state),
            RequestId::Text(s) => (1_u8, s).hash(state),
            // Float tokens compare `-0.0 == 0.0`, so only the variant is hashed.
            RequestId::Other(_) => 2_u8.hash(state),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Text(s) => f.write_str(s),
            RequestId::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::Text(value.to_owned())
    }
}

impl From<u64> for RequestId {
    fn from(value: u64) -> Self {
        RequestId::Number(value)
    }
}

impl From<Value> for RequestId {
    /// Normalizes to the narrowest variant, matching what decoding yields.
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => RequestId::Text(s),
            Value::Number(n) => match n.as_u64() {
                Some(n) => RequestId::Number(n),
                None => RequestId::Other(Value::Number(n)),
            },
            other => RequestId::Other(other),
        }
    }
}

impl From<&RequestId> for Value {
    fn from(id: &RequestId) -> Self {
        match id {
            RequestId::Number(n) => Value::from(*n),
            RequestId::Text(s) => Value::from(s.as_str()),
            RequestId::Other(v) => v.clone(),
        }
    }
}

/// Externally visible identity of a top-level browsing context (a tab).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    const LINKED_PANEL_PREFIX: &'static str = "panel-";

    /// Derive a tab id from a host linked-panel name (`"panel-42"` → `"42"`).
    ///
    /// Returns `None` when the name does not carry the panel prefix or the
    /// remainder is empty.
    pub fn from_linked_panel(panel: &str) -> Option<Self> {
        panel
            .strip_prefix(Self::LINKED_PANEL_PREFIX)
            .filter(|id| !id.is_empty())
            .map(|id| Self(id.to_owned()))
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A wire `portName` split into its physical and logical halves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAddress {
    /// Reply destination.
    pub channel_id: ChannelId,
    /// Dispatch key; `None` when the wire name carried no separator.
    pub logical_port: Option<String>,
}

impl PortAddress {
    /// Split `"<channelId>|<logicalPort>"`.
    ///
    /// Only the first two segments are significant: `"a|b|c"` addresses
    /// logical port `b` on channel `a`.
    pub fn parse(wire: &str) -> Self {
        let mut parts = wire.split(PORT_SEPARATOR);
        let channel_id = ChannelId(parts.next().unwrap_or_default().to_owned());
        let logical_port = parts.next().map(str::to_owned);
        Self {
            channel_id,
            logical_port,
        }
    }
}

impl fmt::Display for PortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.logical_port {
            Some(port) => write!(f, "{}{}{}", self.channel_id, PORT_SEPARATOR, port),
            None => write!(f, "{}", self.channel_id),
        }
    }
}

/// Peer → coordinator envelope, after the `portName` split.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    /// Where replies go.
    pub address: PortAddress,
    /// Present when the sender expects exactly one reply.
    pub request_id: Option<RequestId>,
    /// Application body; `Null` when the wire carried none.
    pub payload: Value,
}

impl InboundEnvelope {
    /// Whether the sender waits for a reply.
    pub fn expects_reply(&self) -> bool {
        self.request_id.is_some()
    }
}

/// Coordinator → peer reply for one correlated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyEnvelope {
    /// Token copied from the request.
    pub request_id: RequestId,
    /// Logical port the request addressed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_name: Option<String>,
    /// Response body (`null` when the handler answered nothing).
    #[serde(default)]
    pub msg: Value,
}

/// Fire-and-forget fan-out frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// Always `true`; lets peers tell broadcasts from replies.
    pub broadcast: bool,
    /// Broadcast body.
    #[serde(default)]
    pub msg: Value,
}

impl BroadcastEnvelope {
    /// Wrap a payload for broadcast.
    pub fn new(msg: Value) -> Self {
        Self {
            broadcast: true,
            msg,
        }
    }
}
