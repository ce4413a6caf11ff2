//! Database row types matching `migrations/0001_init.sql`.
//! Labels are stored as text and parsed into closed enums on the way out.

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::AppError;
use crate::types::{DailyRewardClaim, Fixture, FixtureState, Outcome, Wager, WagerResult};

#[derive(Debug, sqlx::FromRow)]
pub struct FixtureRow {
    pub id: i64,
    pub external_id: i64,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub state: String,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FixtureRow> for Fixture {
    type Error = AppError;

    fn try_from(row: FixtureRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<FixtureState>()
            .map_err(|_| AppError::CorruptRow(format!("fixture {} state '{}'", row.id, row.state)))?;
        Ok(Fixture {
            id: row.id,
            external_id: row.external_id,
            league: row.league,
            home_team: row.home_team,
            away_team: row.away_team,
            kickoff: row.kickoff,
            state,
            home_score: row.home_score,
            away_score: row.away_score,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct WagerRow {
    pub id: i64,
    pub user_id: i64,
    pub fixture_id: i64,
    pub prediction: String,
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
    pub settled: bool,
    pub won: bool,
    pub result: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl TryFrom<WagerRow> for Wager {
    type Error = AppError;

    fn try_from(row: WagerRow) -> Result<Self, Self::Error> {
        let prediction = row.prediction.parse::<Outcome>().map_err(|_| {
            AppError::CorruptRow(format!("wager {} prediction '{}'", row.id, row.prediction))
        })?;
        let result = row
            .result
            .as_deref()
            .map(|s| s.parse::<WagerResult>())
            .transpose()
            .map_err(|_| AppError::CorruptRow(format!("wager {} result {:?}", row.id, row.result)))?;
        Ok(Wager {
            id: row.id,
            user_id: row.user_id,
            fixture_id: row.fixture_id,
            prediction,
            amount: row.amount,
            placed_at: row.placed_at,
            settled: row.settled,
            won: row.won,
            result,
            settled_at: row.settled_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct ClaimRow {
    pub id: i64,
    pub user_id: i64,
    pub claim_date: NaiveDate,
    pub amount: f64,
    pub claimed_at: DateTime<Utc>,
}

impl From<ClaimRow> for DailyRewardClaim {
    fn from(row: ClaimRow) -> Self {
        DailyRewardClaim {
            id: row.id,
            user_id: row.user_id,
            claim_date: row.claim_date,
            amount: row.amount,
            claimed_at: row.claimed_at,
        }
    }
}

/// Collect rows into domain values, failing on the first corrupt row.
pub fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}
