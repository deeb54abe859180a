// SPDX-License-Identifier: Apache-2.0
//! Packet framing for stream transports.
//!
//! Packet layout:
//!
//! ``MAGIC(4) || VERSION(2) || FLAGS(2) || LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * PAYLOAD is `CHANNEL_LEN(2) || CHANNEL || BODY`, so one stream can carry
//!   several named channels (background requests, broadcasts, per-peer
//!   replies).
//! * CHECKSUM = blake3-256 over HEADER (first 12 bytes) || PAYLOAD

use blake3::Hasher;
use thiserror::Error;

/// Protocol magic constant "PWAY".
pub const MAGIC: [u8; 4] = *b"PWAY";
/// Wire protocol version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Reserved flags (set to zero for v1).
pub const FLAGS: u16 = 0x0000;
/// Header length in bytes.
pub const HEADER_BYTES: usize = 12;
/// Trailing checksum length in bytes.
pub const CHECKSUM_BYTES: usize = 32;
/// Fixed per-packet overhead.
pub const OVERHEAD_BYTES: usize = HEADER_BYTES + CHECKSUM_BYTES;
/// Default cap readers place on a single payload (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1 << 20;

/// Framing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than the header or declared length require.
    #[error("incomplete packet")]
    Incomplete,
    /// Magic did not match [`MAGIC`].
    #[error("bad magic")]
    BadMagic,
    /// Unknown protocol version.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// Checksum over header and payload did not verify.
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// Channel name does not fit the u16 length prefix.
    #[error("channel name too long ({0} bytes)")]
    ChannelTooLong(usize),
    /// Channel name is not UTF-8 or overruns the payload.
    #[error("malformed channel name")]
    BadChannel,
    /// Payload exceeds the u32 length field.
    #[error("payload too large ({0} bytes)")]
    PayloadTooLarge(usize),
}

/// A decoded packet: channel name plus opaque body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Named channel the body travels on.
    pub channel: String,
    /// Envelope bytes.
    pub body: Vec<u8>,
}

/// Encode `body` on `channel` into a full packet.
pub fn encode_frame(channel: &str, body: &[u8]) -> Result<Vec<u8>, FrameError> {
    let channel_len =
        u16::try_from(channel.len()).map_err(|_| FrameError::ChannelTooLong(channel.len()))?;
    let payload_len = 2 + channel.len() + body.len();
    let len = u32::try_from(payload_len).map_err(|_| FrameError::PayloadTooLarge(payload_len))?;

    let mut out = Vec::with_capacity(OVERHEAD_BYTES + payload_len);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&VERSION.to_be_bytes());
    out.extend_from_slice(&FLAGS.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&channel_len.to_be_bytes());
    out.extend_from_slice(channel.as_bytes());
    out.extend_from_slice(body);

    let mut hasher = Hasher::new();
    hasher.update(&out);
    out.extend_from_slice(hasher.finalize().as_bytes());
    Ok(out)
}

/// Payload length announced by a buffered header (without overhead).
pub fn payload_len(header: &[u8; HEADER_BYTES]) -> usize {
    u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize
}

/// Decode one packet from the front of `bytes`, returning it and the bytes consumed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), FrameError> {
    if bytes.len() < OVERHEAD_BYTES {
        return Err(FrameError::Incomplete);
    }
    if bytes[0..4] != MAGIC {
        return Err(FrameError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    let len = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let total = OVERHEAD_BYTES
        .checked_add(len)
        .ok_or(FrameError::Incomplete)?;
    if bytes.len() < total {
        return Err(FrameError::Incomplete);
    }
    let signed = &bytes[..HEADER_BYTES + len];
    let checksum = &bytes[HEADER_BYTES + len..total];

    let mut hasher = Hasher::new();
    hasher.update(signed);
    if hasher.finalize().as_bytes() != checksum {
        return Err(FrameError::ChecksumMismatch);
    }

    let payload = &signed[HEADER_BYTES..];
    if payload.len() < 2 {
        return Err(FrameError::BadChannel);
    }
    let channel_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let rest = &payload[2..];
    if rest.len() < channel_len {
        return Err(FrameError::BadChannel);
    }
    let channel = std::str::from_utf8(&rest[..channel_len])
        .map_err(|_| FrameError::BadChannel)?
        .to_owned();
    let body = rest[channel_len..].to_vec();
    Ok((Frame { channel, body }, total))
}
