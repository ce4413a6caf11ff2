use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::{convert_all, FixtureRow};
use crate::error::{AppError, Result};
use crate::types::{Fixture, FixtureState, FixtureUpdate, ProviderFixture};

/// Result of upserting a discovered fixture by external id.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Inserted(Fixture),
    Updated(Fixture),
    /// Already `FINISHED`; discovery never reopens a finished fixture.
    Unchanged(Fixture),
}

impl UpsertOutcome {
    pub fn fixture(&self) -> &Fixture {
        match self {
            UpsertOutcome::Inserted(f) | UpsertOutcome::Updated(f) | UpsertOutcome::Unchanged(f) => f,
        }
    }
}

/// Persisted fixtures keyed by the provider's external id. Data access only.
#[derive(Clone)]
pub struct FixtureStore {
    pool: SqlitePool,
}

impl FixtureStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Fixture>> {
        sqlx::query_as::<_, FixtureRow>("SELECT * FROM fixtures WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Fixture::try_from)
            .transpose()
    }

    pub async fn get_by_external_id(&self, external_id: i64) -> Result<Option<Fixture>> {
        sqlx::query_as::<_, FixtureRow>("SELECT * FROM fixtures WHERE external_id = ?")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Fixture::try_from)
            .transpose()
    }

    pub async fn list(&self) -> Result<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>("SELECT * FROM fixtures ORDER BY kickoff, id")
            .fetch_all(&self.pool)
            .await?;
        convert_all(rows)
    }

    /// Fixtures the result pass still has to poll: `SCHEDULED` and `LIVE`.
    pub async fn pending_results(&self) -> Result<Vec<Fixture>> {
        let rows = sqlx::query_as::<_, FixtureRow>(
            "SELECT * FROM fixtures WHERE state IN ('SCHEDULED', 'LIVE') ORDER BY kickoff, id",
        )
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    /// Insert a newly discovered fixture as `SCHEDULED`, or refresh a known one in place.
    pub async fn upsert_discovered(&self, discovered: &ProviderFixture) -> Result<UpsertOutcome> {
        let existing = self.get_by_external_id(discovered.external_id).await?;
        if let Some(fixture) = existing.as_ref() {
            if fixture.state == FixtureState::Finished {
                return Ok(UpsertOutcome::Unchanged(fixture.clone()));
            }
        }

        let now = Utc::now();
        let row = sqlx::query_as::<_, FixtureRow>(
            r#"
            INSERT INTO fixtures (
                external_id, league, home_team, away_team, kickoff,
                state, home_score, away_score, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 'SCHEDULED', NULL, NULL, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                league = excluded.league,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                kickoff = excluded.kickoff,
                state = 'SCHEDULED',
                home_score = NULL,
                away_score = NULL,
                updated_at = excluded.updated_at
            WHERE fixtures.state <> 'FINISHED'
            RETURNING *
            "#,
        )
        .bind(discovered.external_id)
        .bind(&discovered.league)
        .bind(&discovered.home_team)
        .bind(&discovered.away_team)
        .bind(discovered.kickoff)
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        match (row, existing) {
            (Some(row), None) => Ok(UpsertOutcome::Inserted(row.try_into()?)),
            (Some(row), Some(_)) => Ok(UpsertOutcome::Updated(row.try_into()?)),
            // Finished between the read and the write.
            (None, _) => {
                let fixture = self
                    .get_by_external_id(discovered.external_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!("fixture external id {}", discovered.external_id))
                    })?;
                Ok(UpsertOutcome::Unchanged(fixture))
            }
        }
    }

    /// Write a provider-reported state and score, but only while the fixture is still
    /// `SCHEDULED` or `LIVE`. Returns None if it was moved to a terminal state meanwhile.
    pub async fn apply_provider_result(
        &self,
        id: i64,
        update: &FixtureUpdate,
    ) -> Result<Option<Fixture>> {
        sqlx::query_as::<_, FixtureRow>(
            r#"
            UPDATE fixtures
            SET state = ?, home_score = ?, away_score = ?, updated_at = ?
            WHERE id = ? AND state IN ('SCHEDULED', 'LIVE')
            RETURNING *
            "#,
        )
        .bind(update.state.as_str())
        .bind(update.home_score)
        .bind(update.away_score)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Fixture::try_from)
        .transpose()
    }

    /// Administrative override: unconditional state and score write.
    pub async fn apply_admin_result(&self, id: i64, update: &FixtureUpdate) -> Result<Fixture> {
        let row = sqlx::query_as::<_, FixtureRow>(
            r#"
            UPDATE fixtures
            SET state = ?, home_score = ?, away_score = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(update.state.as_str())
        .bind(update.home_score)
        .bind(update.away_score)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("fixture {id}")))?;
        row.try_into()
    }
}
