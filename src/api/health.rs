//! Shared health state for the /health endpoint.
//! Updated by the fixture synchronizer and the settlement sweeper.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Timestamps are unix seconds, 0 = never ran.
#[derive(Default)]
pub struct HealthState {
    pub last_discovery_at: AtomicI64,
    pub last_result_pass_at: AtomicI64,
    pub last_sweep_at: AtomicI64,
    /// Provider calls that failed or timed out since startup.
    pub provider_failures: AtomicU64,
    /// Wagers settled by background passes since startup.
    pub wagers_settled: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub last_discovery_at: Option<DateTime<Utc>>,
    pub last_result_pass_at: Option<DateTime<Utc>>,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub provider_failures: u64,
    pub wagers_settled: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_discovery(&self) {
        self.last_discovery_at.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn mark_result_pass(&self) {
        self.last_result_pass_at.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn mark_sweep(&self) {
        self.last_sweep_at.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn add_provider_failures(&self, n: u64) {
        self.provider_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_wagers_settled(&self, n: u64) {
        self.wagers_settled.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            last_discovery_at: to_time(self.last_discovery_at.load(Ordering::Relaxed)),
            last_result_pass_at: to_time(self.last_result_pass_at.load(Ordering::Relaxed)),
            last_sweep_at: to_time(self.last_sweep_at.load(Ordering::Relaxed)),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            wagers_settled: self.wagers_settled.load(Ordering::Relaxed),
        }
    }
}

fn to_time(secs: i64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}
