//! HTTP application

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AppState;
use crate::handlers::{health_check, upload_file};
use crate::middleware::mw_allow_any_origin;
use crate::realtime::sync_socket;

pub fn router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes();

    Router::new()
        // Bulk data ingestion
        .route("/data", post(upload_file))
        // Realtime model sync (WebSocket)
        .route("/sync", get(sync_socket))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        // Outermost so every response, including rejections, gets the header
        .layer(middleware::from_fn(mw_allow_any_origin))
}
