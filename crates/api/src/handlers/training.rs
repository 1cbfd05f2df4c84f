//! Handlers for the training configuration and job resources.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use trainhub_core::training_config::TrainingConfig;
use trainhub_core::types::JobId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse and validate a training config body.
///
/// Parsing by hand keeps every malformed body a 400 with a readable reason
/// instead of the extractor's 415/422 rejections.
fn parse_config(body: &[u8]) -> AppResult<TrainingConfig> {
    let config: TrainingConfig = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid training config: {e}")))?;
    config.check()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Response for a configuration update.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigureResponse {
    pub message: &'static str,
    pub training_config: TrainingConfig,
}

/// POST /configure-training
///
/// Replace the active training configuration. Takes effect on the next
/// launch; a running job keeps the configuration it was started with.
pub async fn configure_training(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<ConfigureResponse>> {
    let config = parse_config(&body)?;
    *state.training_config.write().await = config.clone();

    tracing::info!(
        model_arch = ?config.model_arch,
        max_epochs = %config.max_epochs,
        learning_rate = %config.learning_rate,
        "Training config updated",
    );

    Ok(Json(ConfigureResponse {
        message: "Training config updated",
        training_config: config,
    }))
}

/// GET /configure-training
pub async fn get_training_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.training_config.read().await.clone();
    Json(DataResponse { data: config })
}

// ---------------------------------------------------------------------------
// Launch
// ---------------------------------------------------------------------------

/// Body of an accepted launch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAccepted {
    pub job_id: JobId,
    pub message: &'static str,
}

/// POST /train/start
///
/// Launch a training job. An optional JSON body supplies the configuration
/// and, once the launch is accepted, becomes the active one; without a body
/// the active configuration is used. Returns 203 on success and 400 when
/// no architecture is configured or a job is already running.
pub async fn start_training(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let submitted = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        Some(parse_config(&body)?)
    };

    let config = match &submitted {
        Some(config) => config.clone(),
        None => state.training_config.read().await.clone(),
    };

    let job_id = state.launcher.launch(&config).map_err(|e| {
        tracing::info!(reason = %e, "Training launch rejected");
        AppError::from(e)
    })?;

    if let Some(config) = submitted {
        *state.training_config.write().await = config;
    }

    Ok((
        StatusCode::NON_AUTHORITATIVE_INFORMATION,
        Json(DataResponse {
            data: LaunchAccepted {
                job_id,
                message: "Training started",
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// GET /train/progress
///
/// Current progress snapshot, for clients that poll instead of streaming.
pub async fn get_progress(State(state): State<AppState>) -> impl IntoResponse {
    Json(DataResponse {
        data: state.tracker.snapshot(),
    })
}
