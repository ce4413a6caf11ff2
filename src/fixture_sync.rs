use std::sync::Arc;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::api::health::HealthState;
use crate::config::Config;
use crate::db::{FixtureStore, UpsertOutcome};
use crate::error::{AppError, Result};
use crate::fetcher::FixtureProvider;
use crate::settlement::SettlementEngine;
use crate::types::{Fixture, FixtureState, FixtureUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
    pub dates: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed_dates: usize,
    /// Provider items that did not parse.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResultPassReport {
    pub polled: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub settled_fixtures: usize,
    pub wagers_settled: usize,
}

/// Result of polling one fixture.
enum Poll {
    Unchanged,
    Updated,
    Settled { wagers: usize },
}

/// Pulls fixture lists and results from the provider into the fixture store.
/// Discovery and the result pass run on independent timers; each item is
/// handled on its own, so one bad fixture never aborts a pass.
pub struct FixtureSynchronizer {
    cfg: Config,
    fixtures: FixtureStore,
    provider: Arc<dyn FixtureProvider>,
    engine: SettlementEngine,
    health: Arc<HealthState>,
}

impl FixtureSynchronizer {
    pub fn new(
        cfg: Config,
        fixtures: FixtureStore,
        provider: Arc<dyn FixtureProvider>,
        engine: SettlementEngine,
        health: Arc<HealthState>,
    ) -> Self {
        Self { cfg, fixtures, provider, engine, health }
    }

    /// Runs discovery immediately, then every `discovery_interval_secs`.
    pub async fn run_discovery_loop(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.cfg.discovery_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.discovery_pass(Utc::now().date_naive()).await;
        }
    }

    pub async fn run_result_loop(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.cfg.result_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await; // skip immediate first tick, discovery is still running

        loop {
            ticker.tick().await;
            if let Err(e) = self.result_pass().await {
                error!("Result pass failed: {e}");
            }
        }
    }

    /// Fetch every date in the configured window and upsert what comes back.
    pub async fn discovery_pass(&self, today: NaiveDate) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();

        for date in discovery_dates(today, self.cfg.discovery_days_ahead, self.cfg.discovery_window_days) {
            report.dates += 1;
            let listing = match self.provider.fixtures_by_date(date).await {
                Ok(listing) => listing,
                Err(e) => {
                    report.failed_dates += 1;
                    if e.is_upstream() {
                        self.health.add_provider_failures(1);
                    }
                    warn!(date = %date, "Discovery fetch failed, retrying next tick: {e}");
                    continue;
                }
            };

            report.skipped += listing.skipped;

            for item in &listing.fixtures {
                match self.fixtures.upsert_discovered(item).await {
                    Ok(UpsertOutcome::Inserted(f)) => {
                        report.inserted += 1;
                        debug!(fixture_id = f.id, external_id = f.external_id, "New fixture {} vs {}", f.home_team, f.away_team);
                    }
                    Ok(UpsertOutcome::Updated(_)) => report.updated += 1,
                    Ok(UpsertOutcome::Unchanged(_)) => report.unchanged += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(external_id = item.external_id, "Fixture upsert failed: {e}");
                    }
                }
            }
        }

        self.health.mark_discovery();
        info!(
            dates = report.dates,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            failed_dates = report.failed_dates,
            skipped = report.skipped,
            failed = report.failed,
            "Discovery complete: +{} new, {} refreshed",
            report.inserted,
            report.updated,
        );
        report
    }

    /// Poll every `SCHEDULED`/`LIVE` fixture and settle those that just finished.
    pub async fn result_pass(&self) -> Result<ResultPassReport> {
        let pending = self.fixtures.pending_results().await?;
        let mut report = ResultPassReport::default();

        for fixture in &pending {
            report.polled += 1;
            match self.poll_fixture(fixture).await {
                Ok(Poll::Unchanged) => report.unchanged += 1,
                Ok(Poll::Updated) => report.updated += 1,
                Ok(Poll::Settled { wagers }) => {
                    report.updated += 1;
                    report.settled_fixtures += 1;
                    report.wagers_settled += wagers;
                }
                Err(e) => {
                    report.failed += 1;
                    if e.is_upstream() {
                        self.health.add_provider_failures(1);
                    }
                    warn!(
                        fixture_id = fixture.id,
                        external_id = fixture.external_id,
                        "Skipping fixture this pass: {e}",
                    );
                }
            }
        }

        self.health.mark_result_pass();
        self.health.add_wagers_settled(report.wagers_settled as u64);
        info!(
            polled = report.polled,
            updated = report.updated,
            failed = report.failed,
            settled_fixtures = report.settled_fixtures,
            wagers_settled = report.wagers_settled,
            "Result pass complete: {} updated, {} settled",
            report.updated,
            report.settled_fixtures,
        );
        Ok(report)
    }

    async fn poll_fixture(&self, fixture: &Fixture) -> Result<Poll> {
        let remote = self
            .provider
            .fixture_by_external_id(fixture.external_id)
            .await?
            .ok_or_else(|| {
                AppError::MalformedPayload(format!(
                    "provider has no fixture with id {}",
                    fixture.external_id
                ))
            })?;

        let update = FixtureUpdate::new(remote.state, remote.home_score, remote.away_score);
        if update.state == FixtureState::Finished && !update.has_final_score() {
            return Err(AppError::MalformedPayload(format!(
                "fixture {} reported FINISHED without a final score",
                fixture.external_id
            )));
        }
        if update.state == fixture.state
            && update.home_score == fixture.home_score
            && update.away_score == fixture.away_score
        {
            return Ok(Poll::Unchanged);
        }

        // None: an admin moved it to a terminal state since we loaded it.
        let Some(updated) = self.fixtures.apply_provider_result(fixture.id, &update).await? else {
            return Ok(Poll::Unchanged);
        };
        info!(
            fixture_id = updated.id,
            external_id = updated.external_id,
            from = %fixture.state,
            to = %updated.state,
            "Fixture {} vs {} is now {}",
            updated.home_team,
            updated.away_team,
            updated.state,
        );

        if updated.state != FixtureState::Finished {
            return Ok(Poll::Updated);
        }
        match self.engine.settle(updated.id).await {
            Ok(r) => Ok(Poll::Settled { wagers: r.settled }),
            Err(e) => {
                // The result is stored; the sweep retries settlement.
                error!(fixture_id = updated.id, "Settlement after result failed: {e}");
                Ok(Poll::Updated)
            }
        }
    }
}

/// `window_days` consecutive dates starting `days_ahead` after `today`.
pub fn discovery_dates(today: NaiveDate, days_ahead: i64, window_days: i64) -> Vec<NaiveDate> {
    (0..window_days.max(0))
        .filter_map(|i| {
            let offset = days_ahead.saturating_add(i);
            if offset >= 0 {
                today.checked_add_days(Days::new(offset as u64))
            } else {
                today.checked_sub_days(Days::new(offset.unsigned_abs()))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::SqliteUserDirectory;
    use crate::admin::FixtureAdmin;
    use crate::betting::BetPlacementGuard;
    use crate::db::WagerLedger;
    use crate::state::FixtureLocks;
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use crate::api::latency::LatencyStats;
    use crate::fetcher::ApiFootballClient;
    use crate::testkit::{discovered, finished, insert_test_user, provider_item, serve, test_pool, FakeProvider};
    use crate::types::{Outcome, ProviderFixture, WagerResult};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn tomorrow() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    struct World {
        sync: FixtureSynchronizer,
        provider: Arc<FakeProvider>,
        fixtures: FixtureStore,
        wagers: WagerLedger,
        bets: BetPlacementGuard,
        admin: FixtureAdmin,
        health: Arc<HealthState>,
        user_id: i64,
    }

    async fn world(provider: FakeProvider) -> World {
        let pool = test_pool().await;
        let user_id = insert_test_user(&pool, "punter@example.com").await;
        let fixtures = FixtureStore::new(pool.clone());
        let wagers = WagerLedger::new(pool.clone());
        let engine = SettlementEngine::new(fixtures.clone(), wagers.clone(), Arc::new(FixtureLocks::new()));
        let provider = Arc::new(provider);
        let health = Arc::new(HealthState::new());
        let sync = FixtureSynchronizer::new(
            Config::default(),
            fixtures.clone(),
            provider.clone(),
            engine.clone(),
            Arc::clone(&health),
        );
        let bets = BetPlacementGuard::new(
            fixtures.clone(),
            wagers.clone(),
            Arc::new(SqliteUserDirectory::new(pool)),
        );
        let admin = FixtureAdmin::new(fixtures.clone(), engine);
        World { sync, provider, fixtures, wagers, bets, admin, health, user_id }
    }

    #[test]
    fn discovery_window() {
        assert_eq!(discovery_dates(today(), 1, 1), vec![tomorrow()]);
        assert_eq!(discovery_dates(today(), 0, 2), vec![today(), tomorrow()]);
        assert_eq!(discovery_dates(today(), -1, 1), vec![today().pred_opt().unwrap()]);
        assert!(discovery_dates(today(), 1, 0).is_empty());
        assert!(discovery_dates(today(), i64::MAX, 2).is_empty());
        assert!(discovery_dates(today(), i64::MIN, 1).is_empty());
    }

    #[tokio::test]
    async fn discovery_inserts_then_refreshes_in_place() {
        let w = world(FakeProvider::default().with_date(
            tomorrow(),
            vec![discovered(9001, "Arsenal", "Chelsea"), discovered(9002, "Leeds", "Everton")],
        ))
        .await;

        let first = w.sync.discovery_pass(today()).await;
        assert_eq!((first.inserted, first.updated), (2, 0));
        let original = w.fixtures.get_by_external_id(9001).await.unwrap().unwrap();
        assert_eq!(original.state, FixtureState::Scheduled);

        let mut moved = discovered(9001, "Arsenal", "Chelsea");
        moved.kickoff = moved.kickoff + chrono::Duration::hours(2);
        w.provider.by_date.lock().unwrap().insert(tomorrow(), vec![moved.clone()]);

        let second = w.sync.discovery_pass(today()).await;
        assert_eq!((second.inserted, second.updated), (0, 1));

        let refreshed = w.fixtures.get_by_external_id(9001).await.unwrap().unwrap();
        assert_eq!(refreshed.id, original.id);
        assert_eq!(refreshed.kickoff, moved.kickoff);
        assert_eq!(w.fixtures.list().await.unwrap().len(), 2);
        assert!(w.health.snapshot().last_discovery_at.is_some());
    }

    #[tokio::test]
    async fn failed_date_does_not_abort_discovery() {
        let provider = FakeProvider::default()
            .with_date(tomorrow(), vec![discovered(1, "A", "B")])
            .with_date(tomorrow().succ_opt().unwrap(), vec![discovered(2, "C", "D")]);
        provider.fail_date(tomorrow());
        let mut w = world(provider).await;
        w.sync.cfg.discovery_window_days = 2;

        let report = w.sync.discovery_pass(today()).await;
        assert_eq!(report.dates, 2);
        assert_eq!(report.failed_dates, 1);
        assert_eq!(report.inserted, 1);
        assert!(w.fixtures.get_by_external_id(2).await.unwrap().is_some());
        assert_eq!(w.health.snapshot().provider_failures, 1);
    }

    #[tokio::test]
    async fn fixture_9001_end_to_end() {
        let w = world(FakeProvider::default().with_date(tomorrow(), vec![discovered(9001, "Arsenal", "Chelsea")])).await;
        w.sync.discovery_pass(today()).await;
        let fixture = w.fixtures.get_by_external_id(9001).await.unwrap().unwrap();
        assert_eq!(fixture.state, FixtureState::Scheduled);

        let home = w.bets.place(w.user_id, fixture.id, "HOME", 10.0).await.unwrap();
        let away = w.bets.place(w.user_id, fixture.id, "AWAY", 10.0).await.unwrap();
        let draw = w.bets.place(w.user_id, fixture.id, "DRAW", 10.0).await.unwrap();

        // Still not started: nothing changes.
        w.provider.set_fixture(discovered(9001, "Arsenal", "Chelsea"));
        let idle = w.sync.result_pass().await.unwrap();
        assert_eq!((idle.polled, idle.unchanged), (1, 1));

        w.provider.set_fixture(finished(9001, 2, 0));
        let report = w.sync.result_pass().await.unwrap();
        assert_eq!(report.settled_fixtures, 1);
        assert_eq!(report.wagers_settled, 3);

        let fixture = w.fixtures.get(fixture.id).await.unwrap().unwrap();
        assert_eq!(fixture.state, FixtureState::Finished);
        assert_eq!((fixture.home_score, fixture.away_score), (Some(2), Some(0)));

        let home = w.wagers.get(home.id).await.unwrap().unwrap();
        assert!(home.settled && home.won);
        assert_eq!(home.result, Some(WagerResult::Won));
        for id in [away.id, draw.id] {
            let lost = w.wagers.get(id).await.unwrap().unwrap();
            assert!(lost.settled && !lost.won);
        }

        // Finished fixtures are no longer polled.
        let calls = w.provider.call_count();
        let after = w.sync.result_pass().await.unwrap();
        assert_eq!(after.polled, 0);
        assert_eq!(w.provider.call_count(), calls);
    }

    #[tokio::test]
    async fn one_failing_fixture_does_not_abort_the_pass() {
        let w = world(FakeProvider::default().with_date(
            tomorrow(),
            vec![discovered(1, "A", "B"), discovered(2, "C", "D"), discovered(3, "E", "F")],
        ))
        .await;
        w.sync.discovery_pass(today()).await;

        w.provider.fail_on(1);
        w.provider.set_fixture(ProviderFixture { home_score: None, away_score: None, ..finished(2, 0, 0) });
        w.provider.set_fixture(finished(3, 1, 1));

        let report = w.sync.result_pass().await.unwrap();
        assert_eq!(report.polled, 3);
        assert_eq!(report.failed, 2);
        assert_eq!(report.updated, 1);

        // A finished payload without scores persists nothing.
        let two = w.fixtures.get_by_external_id(2).await.unwrap().unwrap();
        assert_eq!(two.state, FixtureState::Scheduled);
        let three = w.fixtures.get_by_external_id(3).await.unwrap().unwrap();
        assert_eq!(three.state, FixtureState::Finished);
        assert_eq!(w.health.snapshot().provider_failures, 2);
    }

    #[tokio::test]
    async fn live_scores_are_not_stored() {
        let w = world(FakeProvider::default().with_date(tomorrow(), vec![discovered(5, "A", "B")])).await;
        w.sync.discovery_pass(today()).await;
        w.provider.set_fixture(ProviderFixture {
            state: FixtureState::Live,
            ..finished(5, 1, 0)
        });

        w.sync.result_pass().await.unwrap();
        let live = w.fixtures.get_by_external_id(5).await.unwrap().unwrap();
        assert_eq!(live.state, FixtureState::Live);
        assert_eq!((live.home_score, live.away_score), (None, None));
    }

    #[tokio::test]
    async fn result_pass_and_admin_update_settle_once() {
        let w = world(FakeProvider::default().with_date(tomorrow(), vec![discovered(9001, "Arsenal", "Chelsea")])).await;
        w.sync.discovery_pass(today()).await;
        let fixture_id = w.fixtures.get_by_external_id(9001).await.unwrap().unwrap().id;
        for prediction in ["HOME", "AWAY", "DRAW", "HOME"] {
            w.bets.place(w.user_id, fixture_id, prediction, 2.5).await.unwrap();
        }
        w.provider.set_fixture(finished(9001, 2, 0));

        let (pass, admin) = tokio::join!(
            w.sync.result_pass(),
            w.admin.update_result(fixture_id, Some(2), Some(0), "FINISHED"),
        );
        pass.unwrap();
        admin.unwrap();

        let wagers = w.wagers.list_for_fixture(fixture_id).await.unwrap();
        assert!(wagers.iter().all(|w| w.settled));
        for wager in &wagers {
            assert_eq!(wager.won, wager.prediction == Outcome::Home);
        }
        assert_eq!(wagers.iter().filter(|w| w.won).count(), 2);
    }

    #[tokio::test]
    async fn slow_provider_fixture_is_skipped_and_the_pass_continues() {
        let app = Router::new().route(
            "/fixtures",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                let response = match q.get("id").map(String::as_str) {
                    Some("1") => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        json!([])
                    }
                    Some("2") => json!([provider_item(2, "FT", Some(1), Some(0))]),
                    _ => json!([
                        provider_item(1, "NS", None, None),
                        provider_item(2, "NS", None, None),
                        { "fixture": { "id": 3, "status": { "short": "??" } } }
                    ]),
                };
                Json(json!({ "errors": [], "response": response }))
            }),
        );
        let cfg = Config { provider_api_url: serve(app).await, provider_timeout_secs: 1, ..Config::default() };
        let provider: Arc<dyn FixtureProvider> =
            Arc::new(ApiFootballClient::new(&cfg, Arc::new(LatencyStats::new())).unwrap());

        let pool = test_pool().await;
        let fixtures = FixtureStore::new(pool.clone());
        let engine = SettlementEngine::new(fixtures.clone(), WagerLedger::new(pool), Arc::new(FixtureLocks::new()));
        let health = Arc::new(HealthState::new());
        let sync = FixtureSynchronizer::new(cfg, fixtures.clone(), provider, engine, Arc::clone(&health));

        let discovery = sync.discovery_pass(today()).await;
        assert_eq!((discovery.inserted, discovery.skipped), (2, 1));

        let report = sync.result_pass().await.unwrap();
        assert_eq!(report.polled, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.settled_fixtures, 1);

        let slow = fixtures.get_by_external_id(1).await.unwrap().unwrap();
        assert_eq!(slow.state, FixtureState::Scheduled);
        let done = fixtures.get_by_external_id(2).await.unwrap().unwrap();
        assert_eq!(done.state, FixtureState::Finished);
        assert_eq!(health.snapshot().provider_failures, 1);
    }
}
