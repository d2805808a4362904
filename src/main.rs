//! vandalnet - anti-vandalism network coordination client.
//!
//! Connects to the coordination network, joins one channel per configured
//! site, and relays edit judgements between this client and its peers.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use vandalnet::config::Config;
use vandalnet::display;
use vandalnet::edits::MemoryEditStore;
use vandalnet::engine::{Directive, Engine};
use vandalnet::transport::irc::{IrcConfig, IrcTransport};
use vandalnet::transport::{self, TransportEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.network.server,
        nick = %config.network.nick,
        sites = config.sites.len(),
        "Starting vandalnet"
    );

    let (event_tx, mut event_rx) = transport::event_channel();
    let transport = Arc::new(IrcTransport::spawn(
        IrcConfig {
            server: config.network.server.clone(),
            nick: config.network.nick.clone(),
            ident: config.network.ident.clone(),
            realname: config.network.realname.clone(),
        },
        event_tx,
    ));

    let store = MemoryEditStore::new();
    let (display_tx, mut display_rx) = display::channel();
    let mut engine = Engine::new(&config, store, transport, display_tx);

    // Display consumer: the visible log, rendered to the tracing output.
    tokio::spawn(async move {
        while let Some(line) = display_rx.recv().await {
            info!(kind = ?line.kind, at = %line.at.format("%H:%M:%S"), "{}", line.text);
        }
    });

    engine.connect()?;

    // One task drives all engine state; the rejoin timer is a one-shot
    // deadline armed by engine directives.
    let mut rejoin_at: Option<Instant> = None;
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else {
                    info!("transport task ended, shutting down");
                    return Ok(());
                };
                let reconnect = matches!(
                    event,
                    TransportEvent::Disconnected | TransportEvent::ConnectFailed { .. }
                );
                for directive in engine.handle(event) {
                    match directive {
                        Directive::ArmRejoin(delay) => {
                            rejoin_at = Some(Instant::now() + delay);
                        }
                    }
                }
                if reconnect {
                    rejoin_at = None;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    engine.connect()?;
                }
            }
            _ = async move {
                match rejoin_at {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                rejoin_at = None;
                engine.rejoin_timer_fired();
            }
        }
    }
}
