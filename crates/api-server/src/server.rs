//! API server: HTTP routes over the loyalty ledger plus the metrics exporter.

use crate::loyalty_rest::{self, LoyaltyState};
use crate::rest::{self, AppState};
use crate::swagger::ApiDoc;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Instant;
use storefront_core::config::AppConfig;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full HTTP router.
pub fn router(loyalty: LoyaltyState, node_id: String) -> Router {
    let state = AppState {
        loyalty,
        node_id,
        start_time: Instant::now(),
    };

    Router::new()
        // Loyalty ledger
        .route("/v1/loyalty/:user_id", get(loyalty_rest::handle_get_loyalty))
        .route("/v1/loyalty/:user_id/earn", post(loyalty_rest::handle_earn_points))
        .route("/v1/loyalty/:user_id/spend", post(loyalty_rest::handle_spend_points))
        .route(
            "/v1/loyalty/:user_id/rewards",
            get(loyalty_rest::handle_available_rewards),
        )
        .route(
            "/v1/loyalty/:user_id/rewards/:reward_id/redeem",
            post(loyalty_rest::handle_redeem_reward),
        )
        .route(
            "/v1/loyalty/:user_id/transactions",
            get(loyalty_rest::handle_transactions),
        )
        .route("/v1/rewards", get(loyalty_rest::handle_reward_catalog))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server wrapping the loyalty ledger.
pub struct ApiServer {
    config: AppConfig,
    loyalty: LoyaltyState,
}

impl ApiServer {
    pub fn new(config: AppConfig, loyalty: LoyaltyState) -> Self {
        Self { config, loyalty }
    }

    /// Start the HTTP REST server. Runs until the listener fails.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let app = router(self.loyalty.clone(), self.config.node_id.clone());

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);

        info!(addr = %addr, "Starting HTTP server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}
