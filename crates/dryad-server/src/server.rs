//! Server setup and routing.

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;

use crate::{handlers, state::AppState};

/// Create the API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(
            "/.well-known/serviceinfo",
            get(handlers::well_known::handle_serviceinfo),
        )
        .route("/health", get(handlers::health::handle_health));

    if state.config.serve_openai {
        router = router
            .route(
                "/v1/completions",
                post(handlers::completions::handle_completion),
            )
            .route("/v1/models", get(handlers::models::handle_models));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Run the HTTP server.
pub async fn run_server(
    state: AppState,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
