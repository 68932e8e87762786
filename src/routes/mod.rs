pub mod api;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Load map
        .route("/api/v1/loadmap", get(api::handle_load_map))
        // Summaries
        .route("/api/v1/nodes", get(api::handle_nodes))
        .route("/api/v1/namespaces", get(api::handle_namespaces))
        // Health
        .route("/healthz", get(api::handle_healthz))
        // Root redirect
        .route(
            "/",
            get(|| async { axum::response::Redirect::to("/api/v1/loadmap") }),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
