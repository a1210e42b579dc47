//! HTTP transport for the wizard.
//!
//! `GET /{base}` redirects to the first step, `GET|POST /{base}/:step` runs a
//! wizard cycle, `GET /health` reports liveness.

use anyhow::{Context, Result};
use axum::{
    routing::{any, get},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let base = format!("/{}", state.definition.base_route().trim_matches('/'));

    Router::new()
        .route("/health", get(routes::health))
        .route(&base, get(routes::start))
        .route(&format!("{}/:step", base), any(routes::step))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.bind_address();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Wizard listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
