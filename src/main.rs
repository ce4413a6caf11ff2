mod accounts;
mod admin;
mod api;
mod app;
mod betting;
mod config;
mod db;
mod error;
mod fetcher;
mod fixture_sync;
mod rewards;
mod settlement;
mod state;
mod types;

#[cfg(test)]
mod testkit;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::app::Services;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{ApiFootballClient, FixtureProvider};
use crate::fixture_sync::FixtureSynchronizer;
use crate::settlement::SettlementSweeper;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg).await?;
    let services = Services::new(pool, &cfg)?;

    if let Some(amount) = cfg.daily_reward_amount {
        if services.policies.seed(amount).await? {
            info!("Reward policy seeded: {amount} per day");
        } else {
            info!("Reward policy already set, DAILY_REWARD_AMOUNT ignored");
        }
    } else if services.policies.get().await?.is_none() {
        warn!("No reward policy configured: daily claims are refused until one is set");
    }
    if cfg.admin_secret.is_empty() {
        warn!("ADMIN_SECRET not set: admin routes are disabled");
    }

    let health = Arc::new(HealthState::new());
    let latency = Arc::new(LatencyStats::new());

    // --- Background tasks ---
    let provider: Arc<dyn FixtureProvider> =
        Arc::new(ApiFootballClient::new(&cfg, Arc::clone(&latency))?);
    let synchronizer = Arc::new(FixtureSynchronizer::new(
        cfg.clone(),
        services.fixtures.clone(),
        provider,
        services.engine.clone(),
        Arc::clone(&health),
    ));

    // Discovery runs once now, then daily
    tokio::spawn(Arc::clone(&synchronizer).run_discovery_loop());
    tokio::spawn(synchronizer.run_result_loop());

    let sweeper = SettlementSweeper::new(
        services.engine.clone(),
        Arc::clone(&health),
        cfg.sweep_interval_secs,
    );
    tokio::spawn(async move { sweeper.run().await });

    // --- HTTP API server ---
    let api_state = ApiState {
        services,
        health,
        latency,
        admin_secret: Arc::from(cfg.admin_secret.as_str()),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
