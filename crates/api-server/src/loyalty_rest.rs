//! Loyalty ledger REST API endpoints.

use crate::rest::{bad_request, internal_error, ApiError, ErrorResponse};
use axum::extract::{Path, State};
use axum::Json;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storefront_core::loyalty::*;
use storefront_loyalty::LoyaltyLedger;
use tracing::{error, warn};
use utoipa::ToSchema;

/// Maximum length of user and reward identifiers.
const MAX_FIELD_LEN: usize = 256;

/// Maximum length of a transaction description.
const MAX_DESCRIPTION_LEN: usize = 512;

/// Ledger shared across handlers. One lock serializes every mutation, so
/// two redemptions for the same user cannot both pass the balance check.
pub type SharedLedger = Arc<Mutex<LoyaltyLedger>>;

/// Shared state for loyalty endpoints.
#[derive(Clone)]
pub struct LoyaltyState {
    pub ledger: SharedLedger,
}

impl LoyaltyState {
    pub fn new(ledger: LoyaltyLedger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    /// Run `f` against the ledger on the blocking pool, since every mutation
    /// writes through to the store.
    async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut LoyaltyLedger) -> T + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = ledger.lock();
            f(&mut *guard)
        })
        .await
        .map_err(|e| {
            error!(error = %e, "Ledger task failed");
            internal_error()
        })
    }
}

fn validate_id(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        warn!(field = field, "Rejected empty identifier");
        return Err(bad_request(&format!("'{field}' must not be empty")));
    }
    if value.len() > MAX_FIELD_LEN {
        warn!(field = field, len = value.len(), "Rejected oversized identifier");
        return Err(bad_request(&format!("'{field}' exceeds maximum length")));
    }
    Ok(())
}

fn validate_amount(points: u64, description: &str) -> Result<(), ApiError> {
    if points == 0 {
        warn!("Rejected zero point amount");
        return Err(bad_request("'points' must be greater than zero"));
    }
    if points > MAX_POINTS {
        warn!(points = points, "Rejected point amount above ceiling");
        return Err(bad_request(&format!("'points' must not exceed {MAX_POINTS}")));
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        warn!(len = description.len(), "Rejected oversized description");
        return Err(bad_request("'description' exceeds maximum length"));
    }
    Ok(())
}

/// GET /v1/loyalty/{user_id}: Loyalty record, created on first access.
#[utoipa::path(
    get,
    path = "/v1/loyalty/{user_id}",
    tag = "Loyalty",
    params(("user_id" = String, Path, description = "Shopper identifier")),
    responses(
        (status = 200, description = "Loyalty record", body = UserLoyalty),
        (status = 400, description = "Invalid user id", body = ErrorResponse),
    )
)]
pub async fn handle_get_loyalty(
    State(state): State<LoyaltyState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserLoyalty>, ApiError> {
    validate_id("user_id", &user_id)?;
    let loyalty = state
        .run(move |ledger| ledger.get_user_loyalty(&user_id).clone())
        .await?;
    Ok(Json(loyalty))
}

/// POST /v1/loyalty/{user_id}/earn: Credit earned points.
#[utoipa::path(
    post,
    path = "/v1/loyalty/{user_id}/earn",
    tag = "Loyalty",
    params(("user_id" = String, Path, description = "Shopper identifier")),
    request_body = EarnPointsRequest,
    responses(
        (status = 200, description = "Updated loyalty record", body = UserLoyalty),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn handle_earn_points(
    State(state): State<LoyaltyState>,
    Path(user_id): Path<String>,
    Json(request): Json<EarnPointsRequest>,
) -> Result<Json<UserLoyalty>, ApiError> {
    validate_id("user_id", &user_id)?;
    validate_amount(request.points, &request.description)?;

    let loyalty = state
        .run(move |ledger| {
            ledger.add_points(
                &user_id,
                request.points,
                &request.description,
                request.order_id.as_deref(),
            );
            ledger.get_user_loyalty(&user_id).clone()
        })
        .await?;
    metrics::counter!("loyalty.api.earn").increment(1);
    Ok(Json(loyalty))
}

/// POST /v1/loyalty/{user_id}/spend: Spend available points.
#[utoipa::path(
    post,
    path = "/v1/loyalty/{user_id}/spend",
    tag = "Loyalty",
    params(("user_id" = String, Path, description = "Shopper identifier")),
    request_body = SpendPointsRequest,
    responses(
        (status = 200, description = "Spend outcome", body = SpendResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn handle_spend_points(
    State(state): State<LoyaltyState>,
    Path(user_id): Path<String>,
    Json(request): Json<SpendPointsRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    validate_id("user_id", &user_id)?;
    validate_amount(request.points, &request.description)?;

    let response = state
        .run(move |ledger| {
            let success = ledger.spend_points(
                &user_id,
                request.points,
                &request.description,
                request.reward_id.as_deref(),
            );
            SpendResponse::new(ledger, user_id, success, "Insufficient points")
        })
        .await?;
    metrics::counter!("loyalty.api.spend").increment(1);
    Ok(Json(response))
}

/// GET /v1/loyalty/{user_id}/rewards: Rewards the user can afford now.
#[utoipa::path(
    get,
    path = "/v1/loyalty/{user_id}/rewards",
    tag = "Loyalty",
    params(("user_id" = String, Path, description = "Shopper identifier")),
    responses(
        (status = 200, description = "Affordable active rewards", body = Vec<LoyaltyReward>),
        (status = 400, description = "Invalid user id", body = ErrorResponse),
    )
)]
pub async fn handle_available_rewards(
    State(state): State<LoyaltyState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LoyaltyReward>>, ApiError> {
    validate_id("user_id", &user_id)?;
    let rewards = state
        .run(move |ledger| ledger.get_available_rewards(&user_id))
        .await?;
    Ok(Json(rewards))
}

/// POST /v1/loyalty/{user_id}/rewards/{reward_id}/redeem: Redeem a reward.
#[utoipa::path(
    post,
    path = "/v1/loyalty/{user_id}/rewards/{reward_id}/redeem",
    tag = "Loyalty",
    params(
        ("user_id" = String, Path, description = "Shopper identifier"),
        ("reward_id" = String, Path, description = "Catalog reward identifier"),
    ),
    responses(
        (status = 200, description = "Redemption outcome", body = SpendResponse),
        (status = 400, description = "Invalid identifiers", body = ErrorResponse),
    )
)]
pub async fn handle_redeem_reward(
    State(state): State<LoyaltyState>,
    Path((user_id, reward_id)): Path<(String, String)>,
) -> Result<Json<SpendResponse>, ApiError> {
    validate_id("user_id", &user_id)?;
    validate_id("reward_id", &reward_id)?;

    let response = state
        .run(move |ledger| {
            let success = ledger.redeem_reward(&user_id, &reward_id);
            SpendResponse::new(
                ledger,
                user_id,
                success,
                "Reward not found or insufficient points",
            )
        })
        .await?;
    if response.success {
        metrics::counter!("loyalty.api.redemptions").increment(1);
    }
    Ok(Json(response))
}

/// GET /v1/loyalty/{user_id}/transactions: History, newest first.
#[utoipa::path(
    get,
    path = "/v1/loyalty/{user_id}/transactions",
    tag = "Loyalty",
    params(("user_id" = String, Path, description = "Shopper identifier")),
    responses(
        (status = 200, description = "Transactions, newest first", body = Vec<LoyaltyTransaction>),
        (status = 400, description = "Invalid user id", body = ErrorResponse),
    )
)]
pub async fn handle_transactions(
    State(state): State<LoyaltyState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<LoyaltyTransaction>>, ApiError> {
    validate_id("user_id", &user_id)?;
    let transactions = state
        .run(move |ledger| ledger.get_user_transactions(&user_id))
        .await?;
    Ok(Json(transactions))
}

/// GET /v1/rewards: Full reward catalog.
#[utoipa::path(
    get,
    path = "/v1/rewards",
    tag = "Loyalty",
    responses(
        (status = 200, description = "Reward catalog", body = Vec<LoyaltyReward>),
    )
)]
pub async fn handle_reward_catalog(
    State(state): State<LoyaltyState>,
) -> Result<Json<Vec<LoyaltyReward>>, ApiError> {
    let rewards = state.run(|ledger| ledger.rewards().to_vec()).await?;
    Ok(Json(rewards))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EarnPointsRequest {
    pub points: u64,
    pub description: String,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SpendPointsRequest {
    pub points: u64,
    pub description: String,
    #[serde(default)]
    pub reward_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SpendResponse {
    pub user_id: String,
    pub success: bool,
    pub available_points: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SpendResponse {
    fn new(ledger: &LoyaltyLedger, user_id: String, success: bool, failure: &str) -> Self {
        let available_points = ledger
            .user(&user_id)
            .map(|u| u.available_points)
            .unwrap_or(0);
        Self {
            user_id,
            success,
            available_points,
            error: (!success).then(|| failure.to_string()),
        }
    }
}
