// SPDX-License-Identifier: Apache-2.0
//! Async frame reader shared by both ends of a stream.

use anyhow::{bail, Context, Result};
use portway_proto::frame::{decode_frame, payload_len, Frame, HEADER_BYTES, OVERHEAD_BYTES};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read one packet from `reader`.
///
/// Returns `Ok(None)` when the stream closes cleanly between packets. Reads
/// until a full header is buffered so short reads cannot desynchronize
/// framing. Payloads larger than `max_payload` are refused before the body is
/// read.
pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_BYTES];
    let mut read = 0usize;
    while read < HEADER_BYTES {
        let n = reader.read(&mut header[read..]).await?;
        if n == 0 {
            if read == 0 {
                return Ok(None);
            }
            bail!("truncated frame header: read {read} of {HEADER_BYTES} bytes");
        }
        read += n;
    }

    let len = payload_len(&header);
    if len > max_payload {
        bail!("frame payload of {len} bytes exceeds limit of {max_payload}");
    }
    let mut packet = vec![0u8; OVERHEAD_BYTES + len];
    packet[..HEADER_BYTES].copy_from_slice(&header);
    reader
        .read_exact(&mut packet[HEADER_BYTES..])
        .await
        .context("truncated frame body")?;
    let (frame, _) = decode_frame(&packet)?;
    Ok(Some(frame))
}
