use tracing::info;

use crate::db::FixtureStore;
use crate::error::{AppError, Result};
use crate::settlement::SettlementEngine;
use crate::types::{Fixture, FixtureState, FixtureUpdate};

/// Manual result entry for fixtures the provider got wrong or never reported.
#[derive(Clone)]
pub struct FixtureAdmin {
    fixtures: FixtureStore,
    engine: SettlementEngine,
}

impl FixtureAdmin {
    pub fn new(fixtures: FixtureStore, engine: SettlementEngine) -> Self {
        Self { fixtures, engine }
    }

    /// Persist the given state and score, then settle synchronously when the
    /// fixture is now `FINISHED`. Wagers already settled are not revisited.
    pub async fn update_result(
        &self,
        fixture_id: i64,
        home_score: Option<i64>,
        away_score: Option<i64>,
        status: &str,
    ) -> Result<Fixture> {
        let state: FixtureState = status.parse()?;
        if home_score.is_some_and(|s| s < 0) || away_score.is_some_and(|s| s < 0) {
            return Err(AppError::Validation("scores must be non-negative".to_string()));
        }

        let update = FixtureUpdate::new(state, home_score, away_score);
        if state == FixtureState::Finished && !update.has_final_score() {
            return Err(AppError::InvalidState(
                "a FINISHED fixture needs both scores".to_string(),
            ));
        }

        let fixture = self.fixtures.apply_admin_result(fixture_id, &update).await?;
        info!(
            fixture_id,
            state = %fixture.state,
            home_score = ?fixture.home_score,
            away_score = ?fixture.away_score,
            "Admin result applied",
        );

        if fixture.state == FixtureState::Finished {
            self.engine.settle(fixture_id).await?;
        }
        Ok(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::db::WagerLedger;
    use crate::state::FixtureLocks;
    use crate::testkit::{discovered, insert_test_user, test_pool};
    use crate::types::{NewWager, Outcome};

    async fn setup() -> (FixtureAdmin, WagerLedger, i64, i64) {
        let pool = test_pool().await;
        let user_id = insert_test_user(&pool, "admin-test@example.com").await;
        let fixtures = FixtureStore::new(pool.clone());
        let wagers = WagerLedger::new(pool);
        let fixture_id = fixtures
            .upsert_discovered(&discovered(9001, "Arsenal", "Chelsea"))
            .await
            .unwrap()
            .fixture()
            .id;
        let engine = SettlementEngine::new(fixtures.clone(), wagers.clone(), Arc::new(FixtureLocks::new()));
        (FixtureAdmin::new(fixtures, engine), wagers, user_id, fixture_id)
    }

    #[tokio::test]
    async fn finishing_settles_synchronously() {
        let (admin, wagers, user_id, fixture_id) = setup().await;
        let wager = wagers
            .insert(&NewWager { user_id, fixture_id, prediction: Outcome::Draw, amount: 1.0 })
            .await
            .unwrap()
            .expect("fixture is open");

        let fixture = admin.update_result(fixture_id, Some(1), Some(1), "finished").await.unwrap();
        assert_eq!(fixture.state, FixtureState::Finished);

        let wager = wagers.get(wager.id).await.unwrap().unwrap();
        assert!(wager.settled && wager.won);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let (admin, _, _, fixture_id) = setup().await;

        assert!(matches!(
            admin.update_result(fixture_id, Some(1), Some(0), "OVER").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            admin.update_result(fixture_id, Some(-1), Some(0), "FINISHED").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            admin.update_result(fixture_id, Some(1), None, "FINISHED").await,
            Err(AppError::InvalidState(_))
        ));
        assert!(matches!(
            admin.update_result(fixture_id + 1, Some(1), Some(0), "FINISHED").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn non_final_states_drop_scores() {
        let (admin, _, _, fixture_id) = setup().await;
        let fixture = admin.update_result(fixture_id, Some(3), Some(3), "POSTPONED").await.unwrap();
        assert_eq!(fixture.state, FixtureState::Postponed);
        assert_eq!((fixture.home_score, fixture.away_score), (None, None));
    }
}
