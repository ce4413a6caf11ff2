use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{convert_all, WagerRow};
use crate::error::Result;
use crate::types::{FixtureState, NewWager, Wager, WagerSettlement};

/// Persisted wagers. A row flips `settled = 0 → 1` exactly once; the update is a
/// compare-and-swap on that flag and a trigger rejects any later rewrite.
#[derive(Clone)]
pub struct WagerLedger {
    pool: SqlitePool,
}

impl WagerLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a wager only while its fixture is still SCHEDULED. The state check and
    /// the insert are one statement, so a concurrent transition cannot slip between
    /// them. `None` when the fixture is unknown or no longer open.
    pub async fn insert(&self, wager: &NewWager) -> Result<Option<Wager>> {
        let row = sqlx::query_as::<_, WagerRow>(
            r#"
            INSERT INTO wagers (user_id, fixture_id, prediction, amount, placed_at, settled, won)
            SELECT ?, id, ?, ?, ?, 0, 0 FROM fixtures WHERE id = ? AND state = ?
            RETURNING *
            "#,
        )
        .bind(wager.user_id)
        .bind(wager.prediction.as_str())
        .bind(wager.amount)
        .bind(Utc::now())
        .bind(wager.fixture_id)
        .bind(FixtureState::Scheduled.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Wager::try_from).transpose()
    }

    pub async fn get(&self, id: i64) -> Result<Option<Wager>> {
        sqlx::query_as::<_, WagerRow>("SELECT * FROM wagers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Wager::try_from)
            .transpose()
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<Wager>> {
        let rows = sqlx::query_as::<_, WagerRow>(
            "SELECT * FROM wagers WHERE user_id = ? ORDER BY placed_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    pub async fn list_for_fixture(&self, fixture_id: i64) -> Result<Vec<Wager>> {
        let rows = sqlx::query_as::<_, WagerRow>(
            "SELECT * FROM wagers WHERE fixture_id = ? ORDER BY id",
        )
        .bind(fixture_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    pub async fn unsettled_for_fixture(&self, fixture_id: i64) -> Result<Vec<Wager>> {
        let rows = sqlx::query_as::<_, WagerRow>(
            "SELECT * FROM wagers WHERE fixture_id = ? AND settled = 0 ORDER BY id",
        )
        .bind(fixture_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    /// Commit settlement decisions in one transaction. Rows already settled by another
    /// caller are left alone; the returned decisions are exactly the rows this call flipped.
    pub async fn commit_settlements(
        &self,
        settlements: &[WagerSettlement],
    ) -> Result<Vec<WagerSettlement>> {
        if settlements.is_empty() {
            return Ok(Vec::new());
        }

        let settled_at = Utc::now();
        let mut applied = Vec::with_capacity(settlements.len());
        let mut tx = self.pool.begin().await?;

        for settlement in settlements {
            let done = sqlx::query(
                r#"
                UPDATE wagers
                SET settled = 1, won = ?, result = ?, settled_at = ?
                WHERE id = ? AND settled = 0
                "#,
            )
            .bind(settlement.won)
            .bind(settlement.result.as_str())
            .bind(settled_at)
            .bind(settlement.wager_id)
            .execute(&mut *tx)
            .await?;

            if done.rows_affected() == 1 {
                applied.push(*settlement);
            }
        }

        tx.commit().await?;
        Ok(applied)
    }

    /// Fixtures in a terminal state that still have unsettled wagers, with that state.
    pub async fn fixtures_awaiting_settlement(&self) -> Result<Vec<(i64, FixtureState)>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT DISTINCT w.fixture_id, f.state
            FROM wagers w
            JOIN fixtures f ON f.id = w.fixture_id
            WHERE w.settled = 0
              AND f.state IN ('FINISHED', 'CANCELLED', 'POSTPONED')
            ORDER BY w.fixture_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(fixture_id, state)| Ok((fixture_id, state.parse::<FixtureState>()?)))
            .collect()
    }
}
