// =============================================================================
// Entry Point
// =============================================================================
//
// Boots the Engine: loads configuration, wires `AppState`, spawns the
// background cycle ticker, and serves the REST surface. Mirrors the
// teacher's `main.rs` shape — dotenv + tracing init, config load with a
// fallback to defaults, `Arc<AppState>`, `tokio::spawn` for background loops,
// `axum::serve` for the API, `ctrl_c` for graceful shutdown.

mod api;
mod app_state;
mod audit;
mod clock;
mod config;
mod detectors;
mod dispatcher;
mod errors;
mod gating;
mod ledger;
mod money;
mod notifier;
mod rate_limiter;
mod recommendations;
mod render;
mod reports;
mod scorer;
mod ticker;
mod trends;
mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::config::EngineConfig;
use crate::notifier::{Notifier, WebhookNotifier};
use crate::ticker::{IntervalTicker, Ticker};

const CONFIG_PATH: &str = "engine_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("ledger engine starting");

    // ── 1. Load configuration ────────────────────────────────────────────
    let config = EngineConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load engine config, using defaults");
        EngineConfig::default()
    });
    info!(timezone = %config.timezone, currency = %config.currency_code, "engine config ready");

    // ── 2. Build shared state ────────────────────────────────────────────
    let webhook_endpoint = std::env::var("NOTIFIER_WEBHOOK_URL").unwrap_or_else(|_| "http://localhost:9000/notify".into());
    let notifier: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(webhook_endpoint, Duration::from_secs(config.notifier_timeout_secs)));
    let state = Arc::new(AppState::in_memory(config, notifier));

    // ── 3. Background cycle loop ─────────────────────────────────────────
    // Runs detection + gating, then sweeps any still-pending deliveries, on
    // a fixed cadence (spec §4.6 / §4.7 are both driven from the same tick).
    let cycle_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = IntervalTicker::new(Duration::from_secs(60));
        loop {
            ticker.tick().await;

            let result = cycle_state.orchestrator.run().await;
            if result.created > 0 || result.gated > 0 {
                info!(detected = result.detected, gated = result.gated, created = result.created, partial = result.partial, "engine cycle complete");
            }
            cycle_state.bump_state_version();

            let batch = cycle_state.dispatcher.deliver_pending(60).await;
            if batch.attempted > 0 {
                info!(attempted = batch.attempted, delivered = batch.delivered, failed = batch.failed, "pending delivery sweep complete");
                cycle_state.bump_state_version();
            }
        }
    });

    info!("background cycle loop launched");

    // ── 4. Start the API server ──────────────────────────────────────────
    let api_state = state.clone();
    let bind_addr = std::env::var("ENGINE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let bind_addr_clone = bind_addr.clone();

    tokio::spawn(async move {
        let app = api::rest::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr_clone).await.expect("failed to bind API server");
        info!(addr = %bind_addr_clone, "API server listening");
        axum::serve(listener, app).await.expect("API server failed");
    });

    info!("all subsystems running; press Ctrl+C to stop");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");

    if let Err(e) = state.config.read().save(CONFIG_PATH) {
        error!(error = %e, "failed to save engine config on shutdown");
    }

    info!("ledger engine shut down complete");
    Ok(())
}
