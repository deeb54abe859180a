// SPDX-License-Identifier: Apache-2.0
//! Portway coordinator.
//!
//! Listens on a Unix socket, reads framed envelopes from every connection,
//! and feeds those on the application's background channel to a single
//! router task. Replies and broadcasts flow back through per-connection
//! outboxes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use portway_app_core::config::ConfigService;
use portway_app_core::prefs::{HostPrefs, HOST_PREFS_KEY};
use portway_client::read_frame;
use portway_config_fs::FsConfigStore;
use portway_proto::{default_socket_path, AppInfo, PORTWAY_APP};
use portway_router::{Inbound, Router};
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

mod hub;
mod ports;

use hub::Hub;

// Packets queued per connection. Sends past this are dropped, not awaited, so
// a peer that stops reading can miss replies and keep waiting on them.
const OUTBOX_DEPTH: usize = 256;
const INBOX_DEPTH: usize = 1024;

#[derive(Parser, Debug)]
#[command(author, version, about = "Portway coordinator")]
struct Args {
    /// Unix socket to listen on (overrides saved preferences)
    #[arg(long)]
    socket: Option<PathBuf>,
    /// Lowercase application name used for channel names
    #[arg(long)]
    app_name: Option<String>,
    /// Maximum frame payload in bytes
    #[arg(long)]
    max_frame_bytes: Option<usize>,
    /// Ignore saved preferences and do not write any
    #[arg(long)]
    no_config: bool,
}

#[derive(Debug)]
struct Settings {
    socket_path: PathBuf,
    app: AppInfo,
    max_frame_bytes: usize,
}

impl Settings {
    fn resolve(args: Args, prefs: HostPrefs) -> Self {
        let socket_path = args
            .socket
            .or(prefs.socket_path)
            .unwrap_or_else(default_socket_path);
        let name = args.app_name.unwrap_or(prefs.app_name);
        Self {
            socket_path,
            app: app_info(name),
            max_frame_bytes: args.max_frame_bytes.unwrap_or(prefs.max_frame_bytes),
        }
    }
}

fn app_info(clean_name: String) -> AppInfo {
    AppInfo {
        clean_name: clean_name.into(),
        version: env!("CARGO_PKG_VERSION"),
        ..PORTWAY_APP
    }
}

// Saved preferences, written once with defaults when absent. Failures are
// logged and fall back to defaults.
fn load_prefs() -> HostPrefs {
    let service = match FsConfigStore::new() {
        Ok(store) => ConfigService::new(store),
        Err(err) => {
            warn!(%err, "config store unavailable; using defaults");
            return HostPrefs::default();
        }
    };
    service
        .load_or_init::<HostPrefs>(HOST_PREFS_KEY)
        .unwrap_or_else(|err| {
            warn!(%err, "could not load host prefs; using defaults");
            HostPrefs::default()
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let prefs = if args.no_config {
        HostPrefs::default()
    } else {
        load_prefs()
    };
    let settings = Settings::resolve(args, prefs);

    // Remove stale socket if present
    let _ = std::fs::remove_file(&settings.socket_path);
    let listener = UnixListener::bind(&settings.socket_path)
        .with_context(|| format!("bind {}", settings.socket_path.display()))?;
    info!(
        socket = %settings.socket_path.display(),
        app = %settings.app.clean_name,
        "coordinator listening"
    );

    let result = tokio::select! {
        res = serve(listener, settings.app, settings.max_frame_bytes) => res,
        res = tokio::signal::ctrl_c() => {
            info!("shutting down");
            res.context("install ctrl-c handler")
        }
    };
    let _ = std::fs::remove_file(&settings.socket_path);
    result
}

/// Accept connections forever, dispatching through one router task.
async fn serve(listener: UnixListener, app: AppInfo, max_frame_bytes: usize) -> Result<()> {
    let hub = Arc::new(Hub::new(OUTBOX_DEPTH));
    let (inbox, mut inbox_rx) = mpsc::channel::<Inbound>(INBOX_DEPTH);
    let background = app.background_channel();

    let mut router = Router::new(app, hub.clone(), hub.clone());
    ports::install(&mut router, hub.clone());
    router.setup(None);

    tokio::spawn(async move {
        while let Some(inbound) = inbox_rx.recv().await {
            let dispatch = router.handle_inbound(&inbound);
            debug!(peer = inbound.peer, ?dispatch, "dispatched");
        }
        router.unload();
    });

    loop {
        let (stream, _) = listener.accept().await?;
        let hub = hub.clone();
        let inbox = inbox.clone();
        let background = background.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, &hub, inbox, &background, max_frame_bytes).await
            {
                warn!(?err, "client handler error");
            }
        });
    }
}

async fn handle_client(
    stream: UnixStream,
    hub: &Hub,
    inbox: mpsc::Sender<Inbound>,
    background: &str,
    max_frame_bytes: usize,
) -> Result<()> {
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (peer, mut outbox) = hub.attach();
    debug!(peer, "peer connected");

    tokio::spawn(async move {
        while let Some(packet) = outbox.recv().await {
            if writer.write_all(&packet).await.is_err() {
                break;
            }
        }
    });

    let result: Result<()> = async {
        while let Some(frame) = read_frame(&mut reader, max_frame_bytes).await? {
            if frame.channel != background {
                debug!(peer, channel = %frame.channel, "ignoring frame on foreign channel");
                continue;
            }
            inbox
                .send(Inbound {
                    peer,
                    data: frame.body,
                })
                .await
                .context("router task stopped")?;
        }
        Ok(())
    }
    .await;

    hub.detach(peer);
    debug!(peer, "peer disconnected");
    result
}
