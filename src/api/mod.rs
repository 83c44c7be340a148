//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/start", post(start_handler))
        .route("/stop", post(stop_handler))
        .route("/restart/request", post(restart_request_handler))
        .route("/restart/confirm", post(restart_confirm_handler))
        .route("/restart/cancel", post(restart_cancel_handler))
        .route("/restart/reason", put(restart_reason_handler))
        .route("/close/request", post(close_request_handler))
        .route("/close/confirm", post(close_confirm_handler))
        .route("/close/cancel", post(close_cancel_handler))
        .route("/label", put(label_handler))
        .route("/lifecycle/foreground", post(foreground_handler))
        .route("/lifecycle/background", post(background_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
