pub mod health;
pub mod model;
pub mod training;

use axum::Router;

use crate::state::AppState;

/// Build the API route tree.
///
/// ```text
/// /configure-training        get, replace the active training config
///
/// /train/start               launch a training job (POST)
/// /train/status              live progress stream (text/event-stream)
/// /train/progress            current progress snapshot
///
/// /download-model            trained weights (application/octet-stream)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/configure-training", training::config_router())
        .nest("/train", training::router())
        .nest("/download-model", model::router())
}
