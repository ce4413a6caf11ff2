use std::ops::RangeInclusive;

use crate::error::{AppError, Result};

pub const PROVIDER_API_URL: &str = "https://v3.football.api-sports.io";

/// Header carrying the provider API key.
pub const PROVIDER_KEY_HEADER: &str = "x-apisports-key";

/// Header carrying the admin secret on `/admin/*` routes.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Discovery pass interval (seconds). The provider publishes fixtures a day ahead.
pub const DISCOVERY_INTERVAL_SECS: u64 = 86_400;

/// Result pass interval (seconds).
pub const RESULT_INTERVAL_SECS: u64 = 600;

/// Settlement sweep interval (seconds).
pub const SWEEP_INTERVAL_SECS: u64 = 300;

/// Per-call provider timeout (seconds). A stuck fixture is retried next tick.
pub const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Allowed DISCOVERY_DAYS_AHEAD values. Negative re-fetches past dates.
pub const DISCOVERY_DAYS_AHEAD_RANGE: RangeInclusive<i64> = -7..=30;

/// Allowed DISCOVERY_WINDOW_DAYS values.
pub const DISCOVERY_WINDOW_DAYS_RANGE: RangeInclusive<i64> = 1..=14;

/// Pool acquire and SQLite busy timeout (seconds).
pub const DB_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub provider_api_url: String,
    /// Empty means unauthenticated requests; the provider will reject them.
    pub provider_api_key: String,
    pub provider_timeout_secs: u64,
    pub db_timeout_secs: u64,
    pub discovery_interval_secs: u64,
    /// First date fetched by discovery, as an offset from today (DISCOVERY_DAYS_AHEAD)
    pub discovery_days_ahead: i64,
    /// Number of consecutive dates fetched by discovery (DISCOVERY_WINDOW_DAYS)
    pub discovery_window_days: i64,
    pub result_interval_secs: u64,
    pub sweep_interval_secs: u64,
    /// Admin routes are refused outright while this is empty (ADMIN_SECRET)
    pub admin_secret: String,
    /// Fixed offset used to decide "today" for reward claims (REWARD_UTC_OFFSET_MINUTES)
    pub reward_utc_offset_minutes: i32,
    /// Seeds the reward policy row when none exists yet (DAILY_REWARD_AMOUNT)
    pub daily_reward_amount: Option<f64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let reward_utc_offset_minutes = std::env::var("REWARD_UTC_OFFSET_MINUTES")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i32>()
            .map_err(|_| {
                AppError::Config("REWARD_UTC_OFFSET_MINUTES must be an integer".to_string())
            })?;
        if reward_utc_offset_minutes.abs() >= 24 * 60 {
            return Err(AppError::Config(
                "REWARD_UTC_OFFSET_MINUTES must be within +/- 1439".to_string(),
            ));
        }

        let daily_reward_amount = match std::env::var("DAILY_REWARD_AMOUNT") {
            Ok(raw) => {
                let amount = raw.parse::<f64>().map_err(|_| {
                    AppError::Config("DAILY_REWARD_AMOUNT must be a number".to_string())
                })?;
                if !amount.is_finite() || amount < 0.0 {
                    return Err(AppError::Config(
                        "DAILY_REWARD_AMOUNT must be a non-negative number".to_string(),
                    ));
                }
                Some(amount)
            }
            Err(_) => None,
        };

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "settler.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            provider_api_url: std::env::var("PROVIDER_API_URL")
                .unwrap_or_else(|_| PROVIDER_API_URL.to_string()),
            provider_api_key: std::env::var("PROVIDER_API_KEY").unwrap_or_default(),
            provider_timeout_secs: env_u64("PROVIDER_TIMEOUT_SECS", PROVIDER_TIMEOUT_SECS),
            db_timeout_secs: env_u64("DB_TIMEOUT_SECS", DB_TIMEOUT_SECS),
            discovery_interval_secs: env_u64("DISCOVERY_INTERVAL_SECS", DISCOVERY_INTERVAL_SECS),
            discovery_days_ahead: bounded_i64(
                "DISCOVERY_DAYS_AHEAD",
                std::env::var("DISCOVERY_DAYS_AHEAD").ok(),
                1,
                DISCOVERY_DAYS_AHEAD_RANGE,
            )?,
            discovery_window_days: bounded_i64(
                "DISCOVERY_WINDOW_DAYS",
                std::env::var("DISCOVERY_WINDOW_DAYS").ok(),
                1,
                DISCOVERY_WINDOW_DAYS_RANGE,
            )?,
            result_interval_secs: env_u64("RESULT_INTERVAL_SECS", RESULT_INTERVAL_SECS),
            sweep_interval_secs: env_u64("SWEEP_INTERVAL_SECS", SWEEP_INTERVAL_SECS),
            admin_secret: std::env::var("ADMIN_SECRET").unwrap_or_default(),
            reward_utc_offset_minutes,
            daily_reward_amount,
        })
    }
}

/// Unset falls back to `default`; anything unparseable or outside `range` is an error.
fn bounded_i64(key: &str, raw: Option<String>, default: i64, range: RangeInclusive<i64>) -> Result<i64> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value = raw
        .trim()
        .parse::<i64>()
        .map_err(|_| AppError::Config(format!("{key} must be an integer")))?;
    if !range.contains(&value) {
        return Err(AppError::Config(format!(
            "{key} must be within {}..={}, got {value}",
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

/// Zero is not a usable interval or timeout; fall back to the default.
fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            provider_api_url: PROVIDER_API_URL.to_string(),
            provider_api_key: String::new(),
            provider_timeout_secs: 1,
            db_timeout_secs: DB_TIMEOUT_SECS,
            discovery_interval_secs: DISCOVERY_INTERVAL_SECS,
            discovery_days_ahead: 1,
            discovery_window_days: 1,
            result_interval_secs: RESULT_INTERVAL_SECS,
            sweep_interval_secs: SWEEP_INTERVAL_SECS,
            admin_secret: "test-secret".to_string(),
            reward_utc_offset_minutes: 0,
            daily_reward_amount: Some(5.0),
        }
    }
}
