use std::sync::Arc;

use chrono::FixedOffset;
use sqlx::SqlitePool;

use crate::accounts::{SqliteUserDirectory, UserDirectory};
use crate::admin::FixtureAdmin;
use crate::betting::BetPlacementGuard;
use crate::config::Config;
use crate::db::{ClaimStore, FixtureStore, RewardPolicyStore, WagerLedger};
use crate::error::{AppError, Result};
use crate::rewards::RewardClaimGuard;
use crate::settlement::SettlementEngine;
use crate::state::FixtureLocks;

/// Every store and guard, wired to one pool and one lock registry. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub fixtures: FixtureStore,
    pub wagers: WagerLedger,
    pub policies: RewardPolicyStore,
    pub engine: SettlementEngine,
    pub bets: BetPlacementGuard,
    pub rewards: RewardClaimGuard,
    pub admin: FixtureAdmin,
}

impl Services {
    pub fn new(pool: SqlitePool, cfg: &Config) -> Result<Self> {
        let offset = FixedOffset::east_opt(cfg.reward_utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Config(format!(
                "REWARD_UTC_OFFSET_MINUTES out of range: {}",
                cfg.reward_utc_offset_minutes
            ))
        })?;

        let fixtures = FixtureStore::new(pool.clone());
        let wagers = WagerLedger::new(pool.clone());
        let policies = RewardPolicyStore::new(pool.clone());
        let users: Arc<dyn UserDirectory> = Arc::new(SqliteUserDirectory::new(pool.clone()));
        let engine = SettlementEngine::new(fixtures.clone(), wagers.clone(), Arc::new(FixtureLocks::new()));

        Ok(Self {
            bets: BetPlacementGuard::new(fixtures.clone(), wagers.clone(), Arc::clone(&users)),
            rewards: RewardClaimGuard::new(ClaimStore::new(pool), policies.clone(), users, offset),
            admin: FixtureAdmin::new(fixtures.clone(), engine.clone()),
            fixtures,
            wagers,
            policies,
            engine,
        })
    }
}
