//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront Loyalty API",
        version = "0.1.0",
        description = "Loyalty points ledger for the storefront: earn and spend points, \
                       tier standing, reward redemption and history.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Loyalty", description = "Loyalty ledger: earn/spend points, tiers, rewards"),
        (name = "Operations", description = "Health, readiness and liveness checks"),
    ),
    paths(
        // Loyalty
        crate::loyalty_rest::handle_get_loyalty,
        crate::loyalty_rest::handle_earn_points,
        crate::loyalty_rest::handle_spend_points,
        crate::loyalty_rest::handle_available_rewards,
        crate::loyalty_rest::handle_redeem_reward,
        crate::loyalty_rest::handle_transactions,
        crate::loyalty_rest::handle_reward_catalog,
        // Operations
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        // Ledger types
        storefront_core::loyalty::LoyaltyTier,
        storefront_core::loyalty::UserLoyalty,
        storefront_core::loyalty::TransactionType,
        storefront_core::loyalty::LoyaltyTransaction,
        storefront_core::loyalty::RewardType,
        storefront_core::loyalty::LoyaltyReward,
        crate::loyalty_rest::EarnPointsRequest,
        crate::loyalty_rest::SpendPointsRequest,
        crate::loyalty_rest::SpendResponse,
        // REST error/health types
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
