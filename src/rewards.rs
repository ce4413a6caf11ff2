use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::info;

use crate::accounts::UserDirectory;
use crate::db::{ClaimStore, RewardPolicyStore};
use crate::error::{AppError, Result};
use crate::types::DailyRewardClaim;

/// At most one daily reward per user per calendar day. The day boundary follows
/// a fixed UTC offset, not the host timezone.
#[derive(Clone)]
pub struct RewardClaimGuard {
    claims: ClaimStore,
    policies: RewardPolicyStore,
    users: Arc<dyn UserDirectory>,
    offset: FixedOffset,
}

impl RewardClaimGuard {
    pub fn new(
        claims: ClaimStore,
        policies: RewardPolicyStore,
        users: Arc<dyn UserDirectory>,
        offset: FixedOffset,
    ) -> Self {
        Self { claims, policies, users, offset }
    }

    pub async fn claim(&self, user_id: i64) -> Result<DailyRewardClaim> {
        self.claim_at(user_id, Utc::now()).await
    }

    pub(crate) async fn claim_at(&self, user_id: i64, now: DateTime<Utc>) -> Result<DailyRewardClaim> {
        if !self.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }

        let today = self.claim_date(now);
        if self.claims.find(user_id, today).await?.is_some() {
            return Err(AppError::AlreadyClaimed { user_id, date: today });
        }

        let policy = self.policies.get().await?.ok_or_else(|| {
            AppError::InvalidState("no daily reward policy is configured".to_string())
        })?;

        // A concurrent claim can still win between the check above and this insert;
        // the unique index turns that into AlreadyClaimed.
        let claim = self.claims.insert(user_id, today, policy.daily_amount).await?;
        info!(user_id, date = %today, amount = claim.amount, "Daily reward claimed");
        Ok(claim)
    }

    pub async fn list_claims(&self, user_id: i64) -> Result<Vec<DailyRewardClaim>> {
        if !self.users.exists(user_id).await? {
            return Err(AppError::NotFound(format!("user {user_id}")));
        }
        self.claims.list_for_user(user_id).await
    }

    fn claim_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }
}
