//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
};
use tracing::{error, info};

use crate::{
    error::EngineError,
    services::LifecycleEvent,
    state::AppState,
    tasks::Command,
};
use super::responses::{ApiResponse, HealthResponse, StatusResponse, TextInput};

type ApiResult = Result<Json<ApiResponse>, StatusCode>;

fn engine_failure(action: &str, e: EngineError) -> StatusCode {
    error!("Failed to {}: {}", action, e);
    match e {
        EngineError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn run(state: &AppState, command: Command, message: &str) -> ApiResult {
    let action = command.name();
    state
        .dispatch(command)
        .await
        .map(|timer| Json(ApiResponse::from_timer(message, timer)))
        .map_err(|e| engine_failure(action, e))
}

/// Handle POST /start - Start (or re-anchor) the timer
pub async fn start_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    let timer = state
        .dispatch(Command::Start)
        .await
        .map_err(|e| engine_failure("start timer", e))?;

    if !timer.can_start {
        info!("Start ignored, label is empty");
        return Ok(Json(ApiResponse::ignored("Label is empty, timer not started", timer)));
    }
    Ok(Json(ApiResponse::from_timer("Timer started", timer)))
}

/// Handle POST /stop - Stop the timer and clear its record
pub async fn stop_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::Stop, "Timer stopped").await
}

/// Handle POST /restart/request - Ask for restart confirmation
pub async fn restart_request_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::RequestRestart, "Restart awaiting confirmation").await
}

/// Handle POST /restart/confirm
pub async fn restart_confirm_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::ConfirmRestart, "Timer restarted").await
}

/// Handle POST /restart/cancel
pub async fn restart_cancel_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::CancelRestart, "Restart cancelled").await
}

/// Handle PUT /restart/reason - Edit the restart reason
pub async fn restart_reason_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<TextInput>,
) -> ApiResult {
    run(&state, Command::EditRestartReason(input.value), "Restart reason updated").await
}

/// Handle POST /close/request - Ask for close confirmation
pub async fn close_request_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::RequestClose, "Close awaiting confirmation").await
}

/// Handle POST /close/confirm
pub async fn close_confirm_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::ConfirmClose, "Timer closed").await
}

/// Handle POST /close/cancel
pub async fn close_cancel_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(&state, Command::CancelClose, "Close cancelled").await
}

/// Handle PUT /label - Edit the activity label
pub async fn label_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<TextInput>,
) -> ApiResult {
    run(&state, Command::EditLabel(input.value), "Label updated").await
}

/// Handle POST /lifecycle/foreground
pub async fn foreground_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(
        &state,
        Command::Lifecycle(LifecycleEvent::EnteringForeground),
        "Foreground reconciled",
    )
    .await
}

/// Handle POST /lifecycle/background
pub async fn background_handler(State(state): State<Arc<AppState>>) -> ApiResult {
    run(
        &state,
        Command::Lifecycle(LifecycleEvent::EnteringBackground),
        "Background flushed",
    )
    .await
}

/// Handle GET /status - Return the reconciled timer and server metadata
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, StatusCode> {
    let timer = state
        .snapshot()
        .await
        .map_err(|e| engine_failure("read timer state", e))?;

    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        timer,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
