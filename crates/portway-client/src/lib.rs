// SPDX-License-Identifier: Apache-2.0
//! Peer-side client for the Portway coordinator.
//!
//! A [`PeerClient`] owns one framed stream to the coordinator. It posts
//! envelopes on the application's background channel, receives replies on
//! its own channel, and surfaces broadcasts separately:
//!
//! - [`PeerClient::request`] allocates a request id and resolves with the
//!   matching reply;
//! - [`PeerClient::post`] is fire-and-forget;
//! - [`PeerClient::next_broadcast`] yields fan-out payloads in arrival order.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use portway_proto::frame::{encode_frame, Frame, DEFAULT_MAX_PAYLOAD_BYTES};
use portway_proto::wire::{decode_broadcast, decode_reply, encode_envelope};
use portway_proto::{AppInfo, ChannelId, InboundEnvelope, PortAddress, RequestId};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

mod io;
mod pending;

pub use io::read_frame;

use pending::Pending;

const OUTBOX_DEPTH: usize = 64;
const BROADCAST_DEPTH: usize = 256;

/// Connection to the coordinator from one peer context.
pub struct PeerClient {
    channel: ChannelId,
    background: String,
    outbox: mpsc::Sender<Vec<u8>>,
    pending: Arc<Pending>,
    broadcasts: mpsc::Receiver<Value>,
    reader: JoinHandle<()>,
}

impl PeerClient {
    /// Connect to the coordinator socket at `path`.
    ///
    /// `channel` names this peer's reply channel and must not contain `|`.
    pub async fn connect(path: &str, app: &AppInfo, channel: &str) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("connect to {path}"))?;
        Self::from_stream(stream, app, channel)
    }

    /// Drive the protocol over an already-open stream.
    ///
    /// Spawns the reader and writer tasks, so it must run inside a Tokio
    /// runtime.
    pub fn from_stream<S>(stream: S, app: &AppInfo, channel: &str) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        if channel.is_empty() || channel.contains(portway_proto::PORT_SEPARATOR) {
            return Err(anyhow!("invalid reply channel {channel:?}"));
        }
        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let (outbox, mut outbox_rx) = mpsc::channel::<Vec<u8>>(OUTBOX_DEPTH);
        let (broadcast_tx, broadcasts) = mpsc::channel(BROADCAST_DEPTH);
        let pending = Arc::new(Pending::default());

        tokio::spawn(async move {
            while let Some(packet) = outbox_rx.recv().await {
                if let Err(err) = write_half.write_all(&packet).await {
                    warn!(?err, "coordinator write failed");
                    return;
                }
            }
            let _ = write_half.shutdown().await;
        });

        let inbox = Inbox {
            channel: channel.to_owned(),
            broadcast: app.broadcast_channel(),
            pending: Arc::clone(&pending),
            broadcasts: broadcast_tx,
        };
        let reader = tokio::spawn(async move {
            loop {
                match read_frame(&mut read_half, DEFAULT_MAX_PAYLOAD_BYTES).await {
                    Ok(Some(frame)) => inbox.deliver(frame),
                    Ok(None) => {
                        debug!("coordinator closed the connection");
                        break;
                    }
                    Err(err) => {
                        warn!(?err, "coordinator stream failed");
                        break;
                    }
                }
            }
            inbox.pending.fail_all();
        });

        Ok(Self {
            channel: ChannelId(channel.to_owned()),
            background: app.background_channel(),
            outbox,
            pending,
            broadcasts,
            reader,
        })
    }

    /// This peer's reply channel.
    pub fn channel(&self) -> &ChannelId {
        &self.channel
    }

    /// Requests still waiting for a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Send `msg` to `port` and wait for the coordinator's reply.
    ///
    /// Unknown ports answer `null`. Fails if the connection drops first.
    pub async fn request(&self, port: &str, msg: Value) -> Result<Value> {
        let (id, reply) = self.pending.register();
        if let Err(err) = self.send(port, Some(id.clone()), msg).await {
            self.pending.cancel(&id);
            return Err(err);
        }
        reply
            .await
            .map_err(|_| anyhow!("connection closed before reply to request {id}"))
    }

    /// Send `msg` to `port` without expecting a reply.
    pub async fn post(&self, port: &str, msg: Value) -> Result<()> {
        self.send(port, None, msg).await
    }

    /// Next broadcast payload; `None` once the connection is gone.
    pub async fn next_broadcast(&mut self) -> Option<Value> {
        self.broadcasts.recv().await
    }

    async fn send(&self, port: &str, request_id: Option<RequestId>, payload: Value) -> Result<()> {
        let envelope = InboundEnvelope {
            address: PortAddress {
                channel_id: self.channel.clone(),
                logical_port: Some(port.to_owned()),
            },
            request_id,
            payload,
        };
        let body = encode_envelope(&envelope)?;
        let packet = encode_frame(&self.background, &body)?;
        self.outbox
            .send(packet)
            .await
            .map_err(|_| anyhow!("connection to coordinator closed"))
    }
}

impl Drop for PeerClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for PeerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerClient")
            .field("channel", &self.channel)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

// Reader-side routing of incoming frames.
struct Inbox {
    channel: String,
    broadcast: String,
    pending: Arc<Pending>,
    broadcasts: mpsc::Sender<Value>,
}

impl Inbox {
    fn deliver(&self, frame: Frame) {
        if frame.channel == self.channel {
            match decode_reply(&frame.body) {
                Ok(reply) => {
                    let id = reply.request_id.clone();
                    if !self.pending.resolve(reply) {
                        debug!(request_id = %id, "reply for unknown or abandoned request");
                    }
                }
                Err(err) => warn!(?err, "undecodable reply"),
            }
        } else if frame.channel == self.broadcast {
            match decode_broadcast(&frame.body) {
                Ok(env) => {
                    if self.broadcasts.try_send(env.msg).is_err() {
                        debug!("broadcast dropped; receiver full or gone");
                    }
                }
                Err(err) => warn!(?err, "undecodable broadcast"),
            }
        } else {
            debug!(channel = %frame.channel, "ignoring frame on foreign channel");
        }
    }
}
