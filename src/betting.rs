use std::sync::Arc;

use tracing::info;

use crate::accounts::UserDirectory;
use crate::db::{FixtureStore, WagerLedger};
use crate::error::{AppError, Result};
use crate::types::{FixtureState, NewWager, Outcome, Wager};

/// Validates and records new wagers. Balance movements belong to the ledger
/// service; this only checks timing and shape, then records the intent.
#[derive(Clone)]
pub struct BetPlacementGuard {
    fixtures: FixtureStore,
    wagers: WagerLedger,
    users: Arc<dyn UserDirectory>,
}

impl BetPlacementGuard {
    pub fn new(fixtures: FixtureStore, wagers: WagerLedger, users: Arc<dyn UserDirectory>) -> Self {
        Self { fixtures, wagers, users }
    }

    pub async fn place(
        &self,
        user_id: i64,
        fixture_id: i64,
        prediction: &str,
        amount: f64,
    ) -> Result<Wager> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::Validation("amount must be a positive number".to_string()));
        }
        let prediction: Outcome = prediction.parse()?;

        if !self.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        let fixture = self
            .fixtures
            .get(fixture_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("fixture {fixture_id}")))?;
        if fixture.state != FixtureState::Scheduled {
            return Err(closed_fixture());
        }

        // The fixture may have moved on since the read above; storage re-checks.
        let Some(wager) = self
            .wagers
            .insert(&NewWager { user_id, fixture_id, prediction, amount })
            .await?
        else {
            return Err(match self.fixtures.get(fixture_id).await? {
                Some(_) => closed_fixture(),
                None => AppError::NotFound(format!("fixture {fixture_id}")),
            });
        };
        info!(
            wager_id = wager.id,
            user_id,
            fixture_id,
            prediction = %prediction,
            amount,
            "Wager placed",
        );
        Ok(wager)
    }

    /// Newest first.
    pub async fn list_wagers(&self, user_id: i64) -> Result<Vec<Wager>> {
        if !self.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        self.wagers.list_for_user(user_id).await
    }
}

fn closed_fixture() -> AppError {
    AppError::InvalidState("only scheduled fixtures accept wagers".to_string())
}
