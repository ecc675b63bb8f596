use std::path::PathBuf;
use std::sync::Arc;

use axum::{routing::get, Router};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chain_gateway::{ChainReader, EvmGateway};
use common_types::Notifier;
use evm_token_watcher::{
    commands::run_command_loop,
    service::{run_chain_listener, ScanEngine},
    ScanBus, SeenSet, SharedScanBus, SubscriptionRegistry, WatcherConfig,
};
use explorer_verify::{PatternSet, SourceVerifier, Verifier};
use tg_publisher::{TgPublisher, TgUpdates};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "token-watcher.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    let cfg = WatcherConfig::from_file(&args.config)?;

    let mut gateway = EvmGateway::new();
    for (chain, endpoints) in &cfg.chains {
        gateway.add_chain(*chain, &endpoints.rpc_url, &endpoints.ws_url)?;
    }
    if gateway.configured_chains().is_empty() {
        warn!("no chains configured, nothing will be scanned");
    }
    let gateway = Arc::new(gateway);

    let patterns = Arc::new(match PatternSet::from_file(&cfg.patterns_file) {
        Ok(p) => {
            info!(count = p.len(), "risk patterns loaded");
            p
        }
        Err(e) => {
            warn!(?e, "pattern file unavailable, source scans disabled");
            PatternSet::empty()
        }
    });
    let verifier: Arc<dyn Verifier> = Arc::new(SourceVerifier::new(cfg.explorer_api_keys()));
    let publisher = Arc::new(TgPublisher::new(cfg.telegram.clone())?);
    let notifier: Arc<dyn Notifier> = publisher.clone();
    let registry = Arc::new(SubscriptionRegistry::new());
    let seen = Arc::new(SeenSet::new());
    let bus: SharedScanBus = Arc::new(ScanBus::new(1024));

    let reader: Arc<dyn ChainReader> = gateway.clone();
    let engine = ScanEngine::new(
        reader,
        notifier.clone(),
        verifier,
        patterns,
        registry.clone(),
        seen,
    );

    for chain in gateway.configured_chains() {
        tokio::spawn(run_chain_listener(gateway.clone(), chain, bus.clone()));
    }
    tokio::spawn(engine.run(bus.clone()));

    let updates = TgUpdates::new(cfg.telegram.clone())?;
    tokio::spawn(run_command_loop(updates, registry, notifier));

    serve_health(&cfg.health_addr).await?;

    futures::future::pending::<()>().await;
    Ok(())
}

async fn serve_health(addr: &str) -> anyhow::Result<()> {
    let app = Router::new().route("/healthz", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "health endpoint up");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(?e, "health server failed");
        }
    });
    Ok(())
}
