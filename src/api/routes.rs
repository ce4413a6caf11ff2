use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::app::Services;
use crate::config::ADMIN_SECRET_HEADER;
use crate::error::AppError;
use crate::settlement::SweepReport;
use crate::types::{DailyRewardClaim, Fixture, RewardPolicy, Wager};

#[derive(Clone)]
pub struct ApiState {
    pub services: Services,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    /// Empty disables every admin route.
    pub admin_secret: Arc<str>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/fixtures", get(get_fixtures))
        .route("/wagers", post(post_wager))
        .route("/wagers/:id", get(get_wager))
        .route("/users/:id/wagers", get(get_user_wagers))
        .route("/users/:id/daily-reward/claim", post(post_daily_reward_claim))
        .route("/users/:id/daily-rewards", get(get_user_daily_rewards))
        .route("/admin/fixtures/:id/result", put(put_fixture_result))
        .route("/admin/fixtures/:id/wagers", get(get_fixture_wagers))
        .route("/admin/reward-policy", get(get_reward_policy).put(put_reward_policy))
        .route("/admin/settlements/sweep", post(post_settlement_sweep))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PlaceWagerRequest {
    pub user_id: i64,
    pub fixture_id: i64,
    pub prediction: String,
    pub amount: f64,
}

#[derive(Deserialize)]
pub struct FixtureResultRequest {
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
    pub status: String,
}

#[derive(Deserialize)]
pub struct RewardPolicyRequest {
    pub daily_amount: f64,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub state: HealthSnapshot,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_fixtures(State(state): State<ApiState>) -> Result<Json<Vec<Fixture>>, AppError> {
    Ok(Json(state.services.fixtures.list().await?))
}

async fn post_wager(
    State(state): State<ApiState>,
    Json(body): Json<PlaceWagerRequest>,
) -> Result<(StatusCode, Json<Wager>), AppError> {
    let wager = state
        .services
        .bets
        .place(body.user_id, body.fixture_id, &body.prediction, body.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(wager)))
}

async fn get_wager(
    State(state): State<ApiState>,
    Path(wager_id): Path<i64>,
) -> Result<Json<Wager>, AppError> {
    let wager = state
        .services
        .wagers
        .get(wager_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("wager {wager_id}")))?;
    Ok(Json(wager))
}

async fn get_user_wagers(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Wager>>, AppError> {
    Ok(Json(state.services.bets.list_wagers(user_id).await?))
}

async fn post_daily_reward_claim(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<DailyRewardClaim>), AppError> {
    let claim = state.services.rewards.claim(user_id).await?;
    Ok((StatusCode::CREATED, Json(claim)))
}

async fn get_user_daily_rewards(
    State(state): State<ApiState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<DailyRewardClaim>>, AppError> {
    Ok(Json(state.services.rewards.list_claims(user_id).await?))
}

async fn put_fixture_result(
    State(state): State<ApiState>,
    Path(fixture_id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<FixtureResultRequest>,
) -> Result<Json<Fixture>, AppError> {
    require_admin(&state, &headers)?;
    let fixture = state
        .services
        .admin
        .update_result(fixture_id, body.home_score, body.away_score, &body.status)
        .await?;
    Ok(Json(fixture))
}

async fn get_fixture_wagers(
    State(state): State<ApiState>,
    Path(fixture_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Vec<Wager>>, AppError> {
    require_admin(&state, &headers)?;
    if state.services.fixtures.get(fixture_id).await?.is_none() {
        return Err(AppError::NotFound(format!("fixture {fixture_id}")));
    }
    Ok(Json(state.services.wagers.list_for_fixture(fixture_id).await?))
}

async fn get_reward_policy(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<RewardPolicy>, AppError> {
    require_admin(&state, &headers)?;
    let policy = state
        .services
        .policies
        .get()
        .await?
        .ok_or_else(|| AppError::NotFound("reward policy".to_string()))?;
    Ok(Json(policy))
}

async fn put_reward_policy(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<RewardPolicyRequest>,
) -> Result<Json<RewardPolicy>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.services.policies.set(body.daily_amount).await?))
}

async fn post_settlement_sweep(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<SweepReport>, AppError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.services.engine.settle_all().await?))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        state: state.health.snapshot(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

fn require_admin(state: &ApiState, headers: &HeaderMap) -> Result<(), AppError> {
    let presented = headers
        .get(ADMIN_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if state.admin_secret.is_empty() || presented != &*state.admin_secret {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
