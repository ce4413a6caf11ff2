use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::db::{FixtureStore, WagerLedger};
use crate::error::{AppError, Result};
use crate::settlement::resolver;
use crate::state::FixtureLocks;
use crate::types::{FixtureState, Outcome};

/// What one `settle` call did. `settled` counts only rows this call flipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementReport {
    pub fixture_id: i64,
    /// None when the fixture has no final score yet.
    pub outcome: Option<Outcome>,
    pub settled: usize,
    pub won: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub fixtures_settled: usize,
    pub wagers_settled: usize,
    pub failed: usize,
    /// Cancelled or postponed fixtures whose wagers stay pending.
    pub left_pending: usize,
}

/// Settles wagers against finished fixtures. Every trigger (result pass, admin
/// update, sweep) calls `settle`, which runs under the per-fixture lock and commits
/// through the ledger's compare-and-swap, so a wager is flipped by exactly one caller.
#[derive(Clone)]
pub struct SettlementEngine {
    fixtures: FixtureStore,
    wagers: WagerLedger,
    locks: Arc<FixtureLocks>,
}

impl SettlementEngine {
    pub fn new(fixtures: FixtureStore, wagers: WagerLedger, locks: Arc<FixtureLocks>) -> Self {
        Self { fixtures, wagers, locks }
    }

    pub async fn settle(&self, fixture_id: i64) -> Result<SettlementReport> {
        let _guard = self.locks.acquire(fixture_id).await;

        let fixture = self
            .fixtures
            .get(fixture_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fixture {fixture_id}")))?;

        let Some(score) = fixture.final_score() else {
            debug!(fixture_id, state = %fixture.state, "No final score, nothing to settle");
            return Ok(SettlementReport { fixture_id, outcome: None, settled: 0, won: 0 });
        };

        let outcome = resolver::outcome(score);
        let pending = self.wagers.unsettled_for_fixture(fixture_id).await?;
        let decisions = resolver::resolve(score, &pending);
        let applied = self.wagers.commit_settlements(&decisions).await?;
        let won = applied.iter().filter(|s| s.won).count();

        if !applied.is_empty() {
            info!(
                fixture_id,
                outcome = %outcome,
                settled = applied.len(),
                won,
                "Settled fixture {fixture_id} ({} {}-{} {}): {outcome}",
                fixture.home_team,
                score.home,
                score.away,
                fixture.away_team,
            );
        }

        Ok(SettlementReport {
            fixture_id,
            outcome: Some(outcome),
            settled: applied.len(),
            won,
        })
    }

    /// Settle every terminal fixture that still has unsettled wagers. A failing
    /// fixture is logged and picked up again by the next sweep.
    pub async fn settle_all(&self) -> Result<SweepReport> {
        let candidates = self.wagers.fixtures_awaiting_settlement().await?;
        let mut report = SweepReport::default();

        for (fixture_id, state) in candidates {
            if state != FixtureState::Finished {
                report.left_pending += 1;
                warn!(fixture_id, state = %state, "Fixture is {state} with unsettled wagers, leaving them pending");
                continue;
            }
            match self.settle(fixture_id).await {
                Ok(r) => {
                    if r.settled > 0 {
                        report.fixtures_settled += 1;
                        report.wagers_settled += r.settled;
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!(fixture_id, "Settlement failed, will retry on next sweep: {e}");
                }
            }
        }

        Ok(report)
    }
}
