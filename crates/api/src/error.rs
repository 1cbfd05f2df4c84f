use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use trainhub_core::error::CoreError;
use trainhub_training::LaunchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`LaunchError`] for admission
/// failures, and adds HTTP-specific variants. Implements [`IntoResponse`]
/// to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `trainhub_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A launch request that was refused or could not be carried out.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            // --- Admission control ---
            AppError::Launch(launch) => match launch {
                LaunchError::NotConfigured => (
                    StatusCode::BAD_REQUEST,
                    "NOT_CONFIGURED",
                    launch.to_string(),
                ),
                LaunchError::AlreadyRunning => (
                    StatusCode::BAD_REQUEST,
                    "JOB_ALREADY_RUNNING",
                    launch.to_string(),
                ),
                LaunchError::InvalidConfig(core) => classify_core_error(core),
                LaunchError::Payload(_) | LaunchError::Spawn(_) => {
                    tracing::error!(error = %launch, "Training launch failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "LAUNCH_FAILED",
                        "The trainer could not be started".to_string(),
                    )
                }
            },

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, .. } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("No {}", entity.to_lowercase()),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
    }
}
