//! Route definitions for training configuration and jobs.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::training;
use crate::sse;
use crate::state::AppState;

/// Routes mounted at `/configure-training`.
///
/// ```text
/// GET    /            -> get_training_config
/// POST   /            -> configure_training
/// ```
pub fn config_router() -> Router<AppState> {
    Router::new().route(
        "/",
        get(training::get_training_config).post(training::configure_training),
    )
}

/// Routes mounted at `/train`.
///
/// ```text
/// POST   /start       -> start_training
/// GET    /status      -> status_stream (SSE)
/// GET    /progress    -> get_progress
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(training::start_training))
        .route("/status", get(sse::status_stream))
        .route("/progress", get(training::get_progress))
}
