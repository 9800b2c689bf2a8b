#![forbid(unsafe_code)]

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use skuld_gateway_lib::limit::{
    CounterStore, MemoryCounterStore, MemoryStrategyStore, RedisCounterStore, RedisStrategyStore,
    StrategyStore,
};
use skuld_gateway_lib::telemetry::{encode_metrics, init_metrics, init_tracing};
use skuld_gateway_lib::{load_from_path, DecisionEngine, EventChannel, GatewayEvent};

#[derive(Parser, Debug)]
#[command(author, version, about = "Skuld gateway traffic-shaping engine")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "demos/config/basic.toml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing(&cfg.logging.level, cfg.logging.show_target) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    let (metrics, registry) = match init_metrics() {
        Ok(pair) => pair,
        Err(err) => {
            error!(%err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let (store, strategies): (Arc<dyn CounterStore>, Arc<dyn StrategyStore>) =
        match &cfg.limiter {
            Some(limiter) => {
                let store = match RedisCounterStore::connect(&limiter.store_url).await {
                    Ok(store) => store,
                    Err(err) => {
                        error!(%err, url = %limiter.store_url, "failed to connect counter store");
                        std::process::exit(1);
                    }
                };
                let strategies = match RedisStrategyStore::connect(
                    &limiter.store_url,
                    limiter.prefix.clone(),
                    Duration::from_secs(limiter.strategy_cache_secs),
                )
                .await
                {
                    Ok(strategies) => strategies,
                    Err(err) => {
                        error!(%err, "failed to connect strategy store");
                        std::process::exit(1);
                    }
                };
                (Arc::new(store), Arc::new(strategies))
            }
            None => {
                warn!("no shared store configured; using in-process counters");
                (
                    Arc::new(MemoryCounterStore::new()),
                    Arc::new(MemoryStrategyStore::new()),
                )
            }
        };

    let events = EventChannel::new(cfg.events.capacity);
    spawn_audit_logger(&events);

    let engine = match DecisionEngine::from_config(&cfg, store, strategies, events, Some(metrics))
    {
        Ok(engine) => engine,
        Err(err) => {
            error!(%err, "failed to construct decision engine");
            std::process::exit(1);
        }
    };

    info!(routes = cfg.routes.len(), "decision engine ready");
    let _engine = engine;

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(%err, "failed to listen for shutdown signal");
        std::process::exit(1);
    }

    match encode_metrics(&registry) {
        Ok(snapshot) => info!("final metrics snapshot:\n{snapshot}"),
        Err(err) => warn!(%err, "failed to encode final metrics snapshot"),
    }
    info!("shutting down");
}

/// Log audit-relevant events; denials and store failures are the ones
/// operators page on.
fn spawn_audit_logger(events: &EventChannel) {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(GatewayEvent::QuotaExceeded { route, key, path }) => {
                    warn!(route, key, path, "quota exceeded");
                }
                Ok(GatewayEvent::StoreFailure { route, kind }) => {
                    warn!(route, kind = kind.as_str(), "limiter store failure (failed open)");
                }
                Ok(GatewayEvent::SelectionFailed { route }) => {
                    warn!(route, "no reachable instance");
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "audit logger lagged behind event channel");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
