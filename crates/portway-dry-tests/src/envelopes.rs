// SPDX-License-Identifier: Apache-2.0
//! Wire envelope builders for router input.
//!
//! These write the raw JSON shape directly instead of going through the
//! codec, so tests exercise the decoder the same way a real peer would.

use portway_proto::RequestId;
use portway_router::{Inbound, PeerId};
use serde_json::{Map, Value};

/// Raw `{"requestId"?, "portName", "msg"}` bytes.
pub fn request_bytes(port_name: &str, request_id: Option<RequestId>, msg: Value) -> Vec<u8> {
    let mut obj = Map::new();
    obj.insert("portName".into(), Value::from(port_name));
    if let Some(id) = &request_id {
        obj.insert("requestId".into(), Value::from(id));
    }
    obj.insert("msg".into(), msg);
    serde_json::to_vec(&Value::Object(obj)).unwrap_or_default()
}

/// An [`Inbound`] from `peer` carrying [`request_bytes`].
pub fn inbound(
    peer: PeerId,
    port_name: &str,
    request_id: Option<RequestId>,
    msg: Value,
) -> Inbound {
    Inbound {
        peer,
        data: request_bytes(port_name, request_id, msg),
    }
}
