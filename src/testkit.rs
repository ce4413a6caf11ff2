//! Shared test utilities for the inline `#[cfg(test)]` modules.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tempfile::TempDir;

use crate::error::{AppError, Result};
use crate::fetcher::{DateListing, FixtureProvider};
use crate::types::{FixtureState, ProviderFixture};

/// Single-connection in-memory database. The connection is never recycled, since
/// the schema would disappear with it.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("valid sqlite url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    pool
}

/// File-backed WAL database with several connections, configured like production,
/// so concurrent tests race on separate SQLite connections. Keep the `TempDir` alive
/// for as long as the pool.
pub async fn file_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("settler.db"))
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("file sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations apply");
    (pool, dir)
}

/// Stand-in for the registration service, which owns the users table.
pub async fn insert_test_user(pool: &SqlitePool, email: &str) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO users (email, created_at) VALUES (?, ?) RETURNING id")
        .bind(email)
        .bind(Utc::now())
        .fetch_one(pool)
        .await
        .expect("insert user")
}

pub fn discovered(external_id: i64, home: &str, away: &str) -> ProviderFixture {
    ProviderFixture {
        external_id,
        league: "Premier League".to_string(),
        home_team: home.to_string(),
        away_team: away.to_string(),
        kickoff: Utc.with_ymd_and_hms(2026, 10, 20, 19, 45, 0).unwrap(),
        state: FixtureState::Scheduled,
        home_score: None,
        away_score: None,
    }
}

pub fn finished(external_id: i64, home: i64, away: i64) -> ProviderFixture {
    ProviderFixture {
        state: FixtureState::Finished,
        home_score: Some(home),
        away_score: Some(away),
        ..discovered(external_id, "Home", "Away")
    }
}

/// Serve `app` on an ephemeral local port and return its base URL.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve") });
    format!("http://{addr}")
}

/// One fixture object shaped like the provider's API-Football payload.
pub fn provider_item(external_id: i64, status: &str, home: Option<i64>, away: Option<i64>) -> serde_json::Value {
    serde_json::json!({
        "fixture": {
            "id": external_id,
            "date": "2026-10-20T19:45:00+00:00",
            "status": { "long": "", "short": status }
        },
        "league": { "id": 39, "name": "Premier League" },
        "teams": {
            "home": { "id": 1, "name": format!("Home {external_id}") },
            "away": { "id": 2, "name": format!("Away {external_id}") }
        },
        "goals": { "home": home, "away": away }
    })
}

/// Scripted provider. Unknown external ids are reported as absent; ids listed in
/// `failing` return an upstream error.
#[derive(Default)]
pub struct FakeProvider {
    pub by_date: Mutex<HashMap<NaiveDate, Vec<ProviderFixture>>>,
    pub by_id: Mutex<HashMap<i64, ProviderFixture>>,
    pub failing: Mutex<Vec<i64>>,
    pub failing_dates: Mutex<Vec<NaiveDate>>,
    pub calls: AtomicUsize,
}

impl FakeProvider {
    pub fn with_date(self, date: NaiveDate, fixtures: Vec<ProviderFixture>) -> Self {
        self.by_date.lock().unwrap().insert(date, fixtures);
        self
    }

    pub fn set_fixture(&self, fixture: ProviderFixture) {
        self.by_id.lock().unwrap().insert(fixture.external_id, fixture);
    }

    pub fn fail_on(&self, external_id: i64) {
        self.failing.lock().unwrap().push(external_id);
    }

    pub fn fail_date(&self, date: NaiveDate) {
        self.failing_dates.lock().unwrap().push(date);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl FixtureProvider for FakeProvider {
    async fn fixtures_by_date(&self, date: NaiveDate) -> Result<DateListing> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing_dates.lock().unwrap().contains(&date) {
            return Err(AppError::UpstreamUnavailable(format!("no data for {date}")));
        }
        let fixtures = self.by_date.lock().unwrap().get(&date).cloned().unwrap_or_default();
        Ok(DateListing { fixtures, skipped: 0 })
    }

    async fn fixture_by_external_id(&self, external_id: i64) -> Result<Option<ProviderFixture>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.failing.lock().unwrap().contains(&external_id) {
            return Err(AppError::UpstreamUnavailable(format!("fixture {external_id}")));
        }
        Ok(self.by_id.lock().unwrap().get(&external_id).cloned())
    }
}
