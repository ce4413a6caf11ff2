use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fixture {
    pub id: i64,
    pub external_id: i64,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub state: FixtureState,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fixture {
    /// The final score, present only once the fixture is `FINISHED` with both scores.
    pub fn final_score(&self) -> Option<FinalScore> {
        if self.state != FixtureState::Finished {
            return None;
        }
        Some(FinalScore {
            home: self.home_score?,
            away: self.away_score?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixtureState {
    Scheduled,
    Live,
    Finished,
    Postponed,
    Cancelled,
}

impl FixtureState {
    /// No further score updates are expected from a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FixtureState::Finished | FixtureState::Postponed | FixtureState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FixtureState::Scheduled => "SCHEDULED",
            FixtureState::Live => "LIVE",
            FixtureState::Finished => "FINISHED",
            FixtureState::Postponed => "POSTPONED",
            FixtureState::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for FixtureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FixtureState {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(FixtureState::Scheduled),
            "LIVE" => Ok(FixtureState::Live),
            "FINISHED" => Ok(FixtureState::Finished),
            "POSTPONED" => Ok(FixtureState::Postponed),
            "CANCELLED" => Ok(FixtureState::Cancelled),
            other => Err(AppError::Validation(format!("unknown fixture status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalScore {
    pub home: i64,
    pub away: i64,
}

/// State and score written to a fixture in one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixtureUpdate {
    pub state: FixtureState,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

impl FixtureUpdate {
    /// Scores are kept only for `FINISHED`; every other state stores nulls.
    pub fn new(state: FixtureState, home_score: Option<i64>, away_score: Option<i64>) -> Self {
        match state {
            FixtureState::Finished => Self { state, home_score, away_score },
            _ => Self { state, home_score: None, away_score: None },
        }
    }

    pub fn has_final_score(&self) -> bool {
        self.state == FixtureState::Finished
            && self.home_score.is_some()
            && self.away_score.is_some()
    }
}

// ---------------------------------------------------------------------------
// Outcome: both the wager's prediction and the fixture's result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Home,
    Away,
    Draw,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Home => "HOME",
            Outcome::Away => "AWAY",
            Outcome::Draw => "DRAW",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Outcome {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HOME" => Ok(Outcome::Home),
            "AWAY" => Ok(Outcome::Away),
            "DRAW" => Ok(Outcome::Draw),
            other => Err(AppError::Validation(format!(
                "prediction must be HOME, AWAY or DRAW, got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Wager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wager {
    pub id: i64,
    pub user_id: i64,
    pub fixture_id: i64,
    pub prediction: Outcome,
    pub amount: f64,
    pub placed_at: DateTime<Utc>,
    pub settled: bool,
    pub won: bool,
    pub result: Option<WagerResult>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Outcome label written alongside `won` when a wager settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WagerResult {
    Won,
    Lost,
}

impl WagerResult {
    pub fn as_str(self) -> &'static str {
        match self {
            WagerResult::Won => "WON",
            WagerResult::Lost => "LOST",
        }
    }
}

impl std::fmt::Display for WagerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WagerResult {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WON" => Ok(WagerResult::Won),
            "LOST" => Ok(WagerResult::Lost),
            other => Err(AppError::Validation(format!("unknown wager result '{other}'"))),
        }
    }
}

/// Decision for one pending wager, produced by the resolver and committed by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagerSettlement {
    pub wager_id: i64,
    pub won: bool,
    pub result: WagerResult,
}

#[derive(Debug, Clone)]
pub struct NewWager {
    pub user_id: i64,
    pub fixture_id: i64,
    pub prediction: Outcome,
    pub amount: f64,
}

// ---------------------------------------------------------------------------
// Daily rewards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyRewardClaim {
    pub id: i64,
    pub user_id: i64,
    pub claim_date: NaiveDate,
    pub amount: f64,
    pub claimed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardPolicy {
    pub daily_amount: f64,
}

// ---------------------------------------------------------------------------
// Provider payloads
// ---------------------------------------------------------------------------

/// A fixture as reported by the external data provider, already mapped onto
/// internal states. Scores are only meaningful for `FINISHED`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderFixture {
    pub external_id: i64,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<Utc>,
    pub state: FixtureState,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}
