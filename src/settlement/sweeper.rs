use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::api::health::HealthState;
use crate::error::Result;
use crate::settlement::engine::{SettlementEngine, SweepReport};

/// Background task that re-runs settlement for every terminal fixture with
/// unsettled wagers. Catches anything the result pass missed or failed to commit.
pub struct SettlementSweeper {
    engine: SettlementEngine,
    health: Arc<HealthState>,
    interval_secs: u64,
}

impl SettlementSweeper {
    pub fn new(engine: SettlementEngine, health: Arc<HealthState>, interval_secs: u64) -> Self {
        Self { engine, health, interval_secs }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("Settlement sweep error: {e}");
            }
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport> {
        let report = self.engine.settle_all().await?;
        self.health.mark_sweep();
        self.health.add_wagers_settled(report.wagers_settled as u64);

        info!(
            fixtures = report.fixtures_settled,
            wagers = report.wagers_settled,
            failed = report.failed,
            left_pending = report.left_pending,
            "Settlement sweep complete: {} wagers on {} fixtures",
            report.wagers_settled,
            report.fixtures_settled,
        );
        Ok(report)
    }
}
