use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_auth;
use crate::handlers;
use crate::state::AppState;

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    #[must_use]
    pub const fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Every route except `/health` requires a resolved caller.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let authenticated = Router::new()
            .route("/universe/current", get(handlers::current_universe))
            .route("/universe/history", get(handlers::universe_history))
            .route("/universe/snapshots", post(handlers::ingest_universe))
            .route("/universe/rebalance-job", post(handlers::enqueue_rebalance))
            .route("/universe/rebalance-job/:job_id", get(handlers::get_rebalance_job))
            .route("/prices/latest", get(handlers::latest_prices))
            .route("/prices/series", get(handlers::price_series))
            .route("/prices/snapshots", post(handlers::ingest_prices))
            .route("/factors/series", get(handlers::factor_series))
            .route("/corporate-actions", get(handlers::corporate_actions))
            .route_layer(middleware::from_fn_with_state(self.state.clone(), require_auth));

        Router::new()
            .route("/health", get(handlers::health))
            .merge(authenticated)
            .fallback(handlers::not_found)
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Starts the web server listening on the specified address.
    ///
    /// # Errors
    /// Returns an error if the server fails to bind to the address or serve requests.
    pub async fn serve(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Reference data API listening on {}", addr);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
