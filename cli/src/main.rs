//! pumprelay: subscribes to pump.fun program logs on a Solana node and
//! relays create/buy/sell events to WebSocket clients by topic.
//!
//! # Usage
//! ```text
//! HELIUS_KEY=... pumprelay --port 8080 [--config relay.yaml] [--log-json]
//! ```
//! Clients connect to `/ws` and send a topic (a JSON string such as
//! `"gRYvsxhc5D6uDWAivNFZGan56P1tpump"`).

use anyhow::{Context, Result};
use clap::Parser;
use pumprelay_hub::{Broadcaster, ConnectionHandler, SubscriptionRegistry};
use pumprelay_observability::init_tracing;
use pumprelay_stream::{UpstreamSubscriber, WsConnector};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

mod config;
mod server;

use config::{upstream_url, validate_key, RelayConfig};
use server::{router, AppState};

const DEFAULT_UPSTREAM_URL: &str = "wss://mainnet.helius-rpc.com/";

#[derive(Parser, Debug)]
#[command(
    name = "pumprelay",
    about = "Relay pump.fun create/buy/sell events from a Solana node to WebSocket subscribers",
    version
)]
struct Args {
    /// Port for the downstream WebSocket listener
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Interface to bind
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Node API key, sent as the `api-key` query parameter
    #[arg(long, env = "HELIUS_KEY", hide_env_values = true)]
    helius_key: Option<String>,

    /// Upstream WebSocket endpoint (without credentials)
    #[arg(long, default_value = DEFAULT_UPSTREAM_URL)]
    upstream_url: String,

    /// YAML file with upstream/hub/log tunables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter directives, overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; real environment variables still apply
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = RelayConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    config.log.json |= args.log_json;
    init_tracing(&config.log).context("installing tracing subscriber")?;

    let key = validate_key(args.helius_key.as_deref())?;
    let url = upstream_url(&args.upstream_url, key)?;

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let (events_tx, events_rx) = mpsc::channel(config.upstream.event_queue_capacity.max(1));

    let registry = SubscriptionRegistry::new(config.hub.topic.clone());
    let connector = WsConnector::new(
        url,
        config.upstream.connect_timeout(),
        config.upstream.pong_timeout(),
    );
    let subscriber = Arc::new(UpstreamSubscriber::new(connector, config.upstream.clone()));
    let broadcaster = Arc::new(Broadcaster::new(registry.clone(), config.hub.clone()));
    let handler = ConnectionHandler::new(registry.clone(), config.hub.clone());

    let upstream_task = {
        let subscriber = Arc::clone(&subscriber);
        let stop = stop_rx.clone();
        tokio::spawn(async move { subscriber.run(events_tx, stop).await })
    };
    let broadcast_task = {
        let broadcaster = Arc::clone(&broadcaster);
        let stop = stop_rx.clone();
        tokio::spawn(async move { broadcaster.run(events_rx, stop).await })
    };

    let state = AppState {
        handler,
        upstream: subscriber.state(),
    };

    info!(
        addr = %addr,
        mentions = ?config.upstream.subscription.mentions,
        fanout = ?config.hub.fanout,
        format = ?config.hub.format,
        "pumprelay listening"
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal(stop_tx.clone(), registry.clone()))
        .await
        .context("server error")?;

    stop_tx.send_replace(true);
    let (upstream, fanout) = tokio::join!(upstream_task, broadcast_task);
    if let Err(e) = upstream {
        warn!(error = %e, "upstream task failed");
    }
    if let Err(e) = fanout {
        warn!(error = %e, "broadcaster task failed");
    }

    let up = subscriber.metrics();
    let down = broadcaster.metrics();
    info!(
        frames = up.frames_received,
        classified = up.events_classified,
        reconnections = up.reconnections,
        deliveries = down.deliveries,
        evictions = down.evictions,
        "pumprelay stopped"
    );
    Ok(())
}

/// Resolves on ctrl-c after telling every task and connection to stop.
async fn shutdown_signal(stop: watch::Sender<bool>, registry: SubscriptionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c, running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    stop.send_replace(true);
    let closed = registry.close_all();
    info!(connections = closed, "downstream connections closed");
}
