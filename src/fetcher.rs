use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, warn};

use crate::api::latency::LatencyStats;
use crate::config::{Config, PROVIDER_KEY_HEADER};
use crate::error::{AppError, Result};
use crate::types::{FixtureState, ProviderFixture};

/// One date's fixture listing. `skipped` counts items that failed to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DateListing {
    pub fixtures: Vec<ProviderFixture>,
    pub skipped: usize,
}

/// Read-only view of the external fixture provider. Treated as untrusted and
/// occasionally unavailable; callers skip a failed item and retry next tick.
#[async_trait]
pub trait FixtureProvider: Send + Sync {
    /// All fixtures kicking off on `date`. Items that fail to parse are left out
    /// and counted.
    async fn fixtures_by_date(&self, date: NaiveDate) -> Result<DateListing>;

    /// Current state of one fixture. `Ok(None)` when the provider does not know it.
    async fn fixture_by_external_id(&self, external_id: i64) -> Result<Option<ProviderFixture>>;
}

/// API-Football v3 REST client.
pub struct ApiFootballClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
    latency: Arc<LatencyStats>,
}

impl ApiFootballClient {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        let timeout = Duration::from_secs(cfg.provider_timeout_secs);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        if cfg.provider_api_key.is_empty() {
            warn!("PROVIDER_API_KEY not set, provider requests will be unauthenticated");
        }
        Ok(Self {
            client,
            base_url: cfg.provider_api_url.trim_end_matches('/').to_string(),
            api_key: cfg.provider_api_key.clone(),
            timeout,
            latency,
        })
    }

    /// GET `{base}/fixtures?{query}` and return the `response` array.
    async fn get_fixtures(&self, query: &str) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/fixtures?{}", self.base_url, query);
        let started = Instant::now();

        let request = async {
            let resp = self
                .client
                .get(&url)
                .header(PROVIDER_KEY_HEADER, &self.api_key)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(AppError::UpstreamUnavailable(format!("{url} returned {status}")));
            }
            let body: serde_json::Value = resp.json().await?;
            Ok::<_, AppError>(body)
        };
        // The client timeout covers each phase; this bounds the whole exchange.
        let body = tokio::time::timeout(self.timeout, request).await??;
        self.latency.record(started.elapsed());

        extract_response_items(&body)
    }
}

#[async_trait]
impl FixtureProvider for ApiFootballClient {
    async fn fixtures_by_date(&self, date: NaiveDate) -> Result<DateListing> {
        let items = self.get_fixtures(&format!("date={}", date.format("%Y-%m-%d"))).await?;

        let mut listing = DateListing { fixtures: Vec::with_capacity(items.len()), skipped: 0 };
        for item in &items {
            match parse_fixture(item) {
                Ok(fixture) => listing.fixtures.push(fixture),
                Err(e) => {
                    listing.skipped += 1;
                    warn!(date = %date, "Skipping provider fixture: {e}");
                }
            }
        }
        debug!(
            date = %date,
            total = items.len(),
            parsed = listing.fixtures.len(),
            skipped = listing.skipped,
            "Fetched fixtures by date",
        );
        Ok(listing)
    }

    async fn fixture_by_external_id(&self, external_id: i64) -> Result<Option<ProviderFixture>> {
        let items = self.get_fixtures(&format!("id={external_id}")).await?;
        match items.first() {
            Some(item) => parse_fixture(item).map(Some),
            None => Ok(None),
        }
    }
}

/// The provider wraps results as `{"errors": ..., "response": [...]}`. A non-empty
/// `errors` field (rate limit, bad key) is an upstream failure, not an empty result.
fn extract_response_items(body: &serde_json::Value) -> Result<Vec<serde_json::Value>> {
    let has_errors = match body.get("errors") {
        Some(serde_json::Value::Array(a)) => !a.is_empty(),
        Some(serde_json::Value::Object(o)) => !o.is_empty(),
        _ => false,
    };
    if has_errors {
        return Err(AppError::UpstreamUnavailable(format!(
            "provider reported errors: {}",
            body["errors"]
        )));
    }

    body.get("response")
        .and_then(|r| r.as_array())
        .cloned()
        .ok_or_else(|| AppError::MalformedPayload("'response' is not an array".to_string()))
}

/// Parse one provider fixture object into a `ProviderFixture`.
pub fn parse_fixture(v: &serde_json::Value) -> Result<ProviderFixture> {
    let fixture = v
        .get("fixture")
        .ok_or_else(|| malformed("missing 'fixture'"))?;

    let external_id = fixture
        .get("id")
        .and_then(|id| id.as_i64().or_else(|| id.as_str().and_then(|s| s.parse().ok())))
        .ok_or_else(|| malformed("missing fixture.id"))?;

    let kickoff = fixture
        .get("date")
        .and_then(|d| d.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| malformed(format!("fixture {external_id}: missing or invalid date")))?;

    let status_code = fixture
        .get("status")
        .and_then(|s| s.get("short"))
        .and_then(|s| s.as_str())
        .ok_or_else(|| malformed(format!("fixture {external_id}: missing status.short")))?;
    let state = map_status_code(status_code).ok_or_else(|| {
        malformed(format!("fixture {external_id}: unknown status code '{status_code}'"))
    })?;

    let team_name = |side: &str| {
        v.get("teams")
            .and_then(|t| t.get(side))
            .and_then(|t| t.get("name"))
            .and_then(|n| n.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| malformed(format!("fixture {external_id}: missing teams.{side}.name")))
    };
    let home_team = team_name("home")?;
    let away_team = team_name("away")?;

    let league = v
        .get("league")
        .and_then(|l| l.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or("")
        .to_string();

    let goals = v.get("goals");
    let home_score = goals.and_then(|g| g.get("home")).and_then(|s| s.as_i64());
    let away_score = goals.and_then(|g| g.get("away")).and_then(|s| s.as_i64());

    Ok(ProviderFixture {
        external_id,
        league,
        home_team,
        away_team,
        kickoff,
        state,
        home_score,
        away_score,
    })
}

/// Map a provider short status code onto the internal lifecycle.
pub fn map_status_code(code: &str) -> Option<FixtureState> {
    let state = match code.trim().to_ascii_uppercase().as_str() {
        "TBD" | "NS" => FixtureState::Scheduled,
        "1H" | "HT" | "2H" | "ET" | "BT" | "P" | "SUSP" | "INT" | "LIVE" => FixtureState::Live,
        "FT" | "AET" | "PEN" => FixtureState::Finished,
        "PST" => FixtureState::Postponed,
        "CANC" | "ABD" | "AWD" | "WO" => FixtureState::Cancelled,
        _ => return None,
    };
    Some(state)
}

fn malformed(msg: impl Into<String>) -> AppError {
    AppError::MalformedPayload(msg.into())
}
