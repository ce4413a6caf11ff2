use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

use crate::db::models::ClaimRow;
use crate::error::{AppError, Result};
use crate::types::{DailyRewardClaim, RewardPolicy};

/// Daily reward claims, unique per `(user_id, claim_date)` in storage.
#[derive(Clone)]
pub struct ClaimStore {
    pool: SqlitePool,
}

impl ClaimStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, user_id: i64, date: NaiveDate) -> Result<Option<DailyRewardClaim>> {
        let row = sqlx::query_as::<_, ClaimRow>(
            "SELECT * FROM daily_reward_claims WHERE user_id = ? AND claim_date = ?",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(DailyRewardClaim::from))
    }

    /// Insert a claim. A uniqueness violation means a concurrent request won the race.
    pub async fn insert(&self, user_id: i64, date: NaiveDate, amount: f64) -> Result<DailyRewardClaim> {
        let inserted = sqlx::query_as::<_, ClaimRow>(
            r#"
            INSERT INTO daily_reward_claims (user_id, claim_date, amount, claimed_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(date)
        .bind(amount)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(AppError::AlreadyClaimed { user_id, date })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Newest first.
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<DailyRewardClaim>> {
        let rows = sqlx::query_as::<_, ClaimRow>(
            "SELECT * FROM daily_reward_claims WHERE user_id = ? ORDER BY claim_date DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(DailyRewardClaim::from).collect())
    }
}

/// The single-row reward policy record.
#[derive(Clone)]
pub struct RewardPolicyStore {
    pool: SqlitePool,
}

impl RewardPolicyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<Option<RewardPolicy>> {
        let amount: Option<f64> =
            sqlx::query_scalar("SELECT daily_amount FROM reward_policy WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(amount.map(|daily_amount| RewardPolicy { daily_amount }))
    }

    pub async fn set(&self, daily_amount: f64) -> Result<RewardPolicy> {
        if !daily_amount.is_finite() || daily_amount < 0.0 {
            return Err(AppError::Validation(
                "daily_amount must be a non-negative number".to_string(),
            ));
        }
        sqlx::query(
            r#"
            INSERT INTO reward_policy (id, daily_amount, updated_at) VALUES (1, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                daily_amount = excluded.daily_amount,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(daily_amount)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(RewardPolicy { daily_amount })
    }

    /// Write the policy only if none exists. Returns true if this call created it.
    pub async fn seed(&self, daily_amount: f64) -> Result<bool> {
        let done = sqlx::query(
            "INSERT OR IGNORE INTO reward_policy (id, daily_amount, updated_at) VALUES (1, ?, ?)",
        )
        .bind(daily_amount)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }
}
