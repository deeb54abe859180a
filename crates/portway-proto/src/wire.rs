// SPDX-License-Identifier: Apache-2.0
//! JSON envelope codec.
//!
//! Inbound envelopes use the raw wire shape
//! `{"requestId"?: any, "portName": string, "msg"?: any}`. A missing `msg`
//! decodes to an explicit `Null` payload rather than an error. A `requestId`
//! key that is present counts as a request even when its value is `null`.
//! Decoding never panics; malformed bytes surface as [`DecodeError`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{BroadcastEnvelope, InboundEnvelope, PortAddress, ReplyEnvelope, RequestId};

/// Failure to turn wire bytes into an envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bytes were not a JSON object of the expected shape.
    #[error("malformed envelope: {0}")]
    Json(#[from] serde_json::Error),
    /// `portName` was present but empty.
    #[error("envelope has an empty portName")]
    EmptyPortName,
    /// A broadcast frame without `broadcast: true`.
    #[error("broadcast flag missing or false")]
    NotBroadcast,
}

/// Failure to serialize an envelope.
#[derive(Debug, Error)]
#[error("failed to encode envelope: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEnvelope {
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    request_id: Option<RequestId>,
    port_name: String,
    #[serde(default)]
    msg: Value,
}

// Only called when the key exists, so `null` stays distinct from absent.
fn present<'de, D>(deserializer: D) -> Result<Option<RequestId>, D::Error>
where
    D: Deserializer<'de>,
{
    RequestId::deserialize(deserializer).map(Some)
}

/// Decode a peer request.
pub fn decode_envelope(bytes: &[u8]) -> Result<InboundEnvelope, DecodeError> {
    let raw: RawEnvelope = serde_json::from_slice(bytes)?;
    if raw.port_name.is_empty() {
        return Err(DecodeError::EmptyPortName);
    }
    Ok(InboundEnvelope {
        address: PortAddress::parse(&raw.port_name),
        request_id: raw.request_id,
        payload: raw.msg,
    })
}

/// Encode a peer request (the peer side of [`decode_envelope`]).
pub fn encode_envelope(envelope: &InboundEnvelope) -> Result<Vec<u8>, EncodeError> {
    let raw = RawEnvelope {
        request_id: envelope.request_id.clone(),
        port_name: envelope.address.to_string(),
        msg: envelope.payload.clone(),
    };
    Ok(serde_json::to_vec(&raw)?)
}

/// Encode a correlated reply.
pub fn encode_reply(reply: &ReplyEnvelope) -> Result<Vec<u8>, EncodeError> {
    Ok(serde_json::to_vec(reply)?)
}

/// Decode a correlated reply (peer side).
pub fn decode_reply(bytes: &[u8]) -> Result<ReplyEnvelope, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Encode `{"broadcast": true, "msg": payload}`.
pub fn encode_broadcast(payload: &Value) -> Result<Vec<u8>, EncodeError> {
    #[derive(Serialize)]
    struct Borrowed<'a> {
        broadcast: bool,
        msg: &'a Value,
    }
    Ok(serde_json::to_vec(&Borrowed {
        broadcast: true,
        msg: payload,
    })?)
}

/// Decode a broadcast frame (peer side).
pub fn decode_broadcast(bytes: &[u8]) -> Result<BroadcastEnvelope, DecodeError> {
    let env: BroadcastEnvelope = serde_json::from_slice(bytes)?;
    if !env.broadcast {
        return Err(DecodeError::NotBroadcast);
    }
    Ok(env)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ChannelId;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn decodes_request_with_split_port() {
        let env =
            decode_envelope(br#"{"requestId":"r1","portName":"peerA|echo","msg":"hi"}"#).unwrap();
        assert_eq!(env.address.channel_id, ChannelId::from("peerA"));
        assert_eq!(env.address.logical_port.as_deref(), Some("echo"));
        assert_eq!(env.request_id, Some(RequestId::from("r1")));
        assert_eq!(env.payload, json!("hi"));
        assert!(env.expects_reply());
    }

    #[test]
    fn missing_msg_is_null_payload() {
        let env = decode_envelope(br#"{"portName":"peerB|fire"}"#).unwrap();
        assert_eq!(env.payload, Value::Null);
        assert!(!env.expects_reply());
    }

    #[test]
    fn numeric_request_ids_survive() {
        let env = decode_envelope(br#"{"requestId":7,"portName":"c|p","msg":null}"#).unwrap();
        assert_eq!(env.request_id, Some(RequestId::Number(7)));
        let reply = ReplyEnvelope {
            request_id: env.request_id.unwrap(),
            port_name: Some("p".into()),
            msg: Value::Null,
        };
        assert_eq!(
            encode_reply(&reply).unwrap(),
            br#"{"requestId":7,"portName":"p","msg":null}"#.to_vec()
        );
    }

    #[test]
    fn any_json_request_id_is_a_request() {
        for (raw, expected) in [
            ("-1", json!(-1)),
            ("1.5", json!(1.5)),
            ("null", Value::Null),
            ("true", json!(true)),
            (r#"{"k":[1]}"#, json!({"k": [1]})),
        ] {
            let bytes = format!(r#"{{"requestId":{raw},"portName":"c|p"}}"#);
            let env = decode_envelope(bytes.as_bytes()).unwrap();
            assert!(env.expects_reply(), "{raw}");
            assert_eq!(env.request_id, Some(RequestId::Other(expected)));

            let reply = ReplyEnvelope {
                request_id: env.request_id.unwrap(),
                port_name: Some("p".into()),
                msg: Value::Null,
            };
            assert_eq!(
                String::from_utf8(encode_reply(&reply).unwrap()).unwrap(),
                format!(r#"{{"requestId":{raw},"portName":"p","msg":null}}"#)
            );
        }
    }

    #[test]
    fn null_reply_id_decodes() {
        let reply = decode_reply(br#"{"requestId":null,"msg":1}"#).unwrap();
        assert_eq!(reply.request_id, RequestId::Other(Value::Null));
    }

    #[test]
    fn malformed_bytes_are_decode_errors() {
        assert!(matches!(
            decode_envelope(b"{not json"),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_envelope(br#"{"msg":1}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            decode_envelope(br#"{"portName":""}"#),
            Err(DecodeError::EmptyPortName)
        ));
        assert!(decode_envelope(b"").is_err());
    }

    #[test]
    fn reply_wire_shape_matches_field_order() {
        let reply = ReplyEnvelope {
            request_id: RequestId::from("r1"),
            port_name: Some("echo".into()),
            msg: json!("hi-back"),
        };
        assert_eq!(
            String::from_utf8(encode_reply(&reply).unwrap()).unwrap(),
            r#"{"requestId":"r1","portName":"echo","msg":"hi-back"}"#
        );
    }

    #[test]
    fn reply_without_port_omits_port_name() {
        let reply = ReplyEnvelope {
            request_id: RequestId::from("r9"),
            port_name: None,
            msg: Value::Null,
        };
        assert_eq!(
            String::from_utf8(encode_reply(&reply).unwrap()).unwrap(),
            r#"{"requestId":"r9","msg":null}"#
        );
    }

    #[test]
    fn broadcast_wire_shape() {
        let bytes = encode_broadcast(&json!({"tick": 1})).unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            r#"{"broadcast":true,"msg":{"tick":1}}"#
        );
        let env = decode_broadcast(&bytes).unwrap();
        assert_eq!(env, BroadcastEnvelope::new(json!({"tick": 1})));
        assert!(matches!(
            decode_broadcast(br#"{"broadcast":false,"msg":1}"#),
            Err(DecodeError::NotBroadcast)
        ));
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<u64>().prop_map(|n| json!(n)),
            any::<f64>()
                .prop_filter("finite", |f| f.is_finite())
                .prop_map(|f| json!(f)),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    fn arb_request_id() -> impl Strategy<Value = Option<RequestId>> {
        prop_oneof![
            Just(None),
            any::<u64>().prop_map(|n| Some(RequestId::Number(n))),
            "[a-z][a-z0-9-]{0,8}".prop_map(|s| Some(RequestId::Text(s))),
            Just(Some(RequestId::Other(Value::Null))),
            (i64::MIN..0).prop_map(|n| Some(RequestId::Other(json!(n)))),
        ]
    }

    proptest! {
        #[test]
        fn envelopes_round_trip(
            channel in "[a-zA-Z0-9:_-]{1,12}",
            port in "[a-zA-Z0-9._-]{1,12}",
            request_id in arb_request_id(),
            payload in arb_json(),
        ) {
            let env = InboundEnvelope {
                address: PortAddress {
                    channel_id: ChannelId(channel),
                    logical_port: Some(port),
                },
                request_id,
                payload,
            };
            let bytes = encode_envelope(&env).unwrap();
            let decoded = decode_envelope(&bytes).unwrap();
            prop_assert_eq!(&decoded, &env);
            prop_assert_eq!(encode_envelope(&decoded).unwrap(), bytes);
        }

        #[test]
        fn float_payloads_keep_every_bit(
            f in any::<f64>().prop_filter("finite", |f| f.is_finite()),
        ) {
            let env = InboundEnvelope {
                address: PortAddress::parse("c|p"),
                request_id: None,
                payload: json!(f),
            };
            let decoded = decode_envelope(&encode_envelope(&env).unwrap()).unwrap();
            prop_assert_eq!(decoded.payload.as_f64().map(f64::to_bits), Some(f.to_bits()));
        }
    }
}
