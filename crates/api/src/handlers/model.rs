//! Handler for downloading the trained model weights.

use std::io::ErrorKind;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;
use trainhub_core::error::CoreError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /download-model
///
/// Streams the weights the last finished job saved. 404 until a job has
/// written them.
pub async fn download_model(State(state): State<AppState>) -> AppResult<Response> {
    let path = &state.config.model_output_path;

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Trained model",
                id: path.display().to_string(),
            }));
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to open model file {}: {e}",
                path.display()
            )));
        }
    };

    tracing::info!(path = %path.display(), "Sending trained model");

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream"),
            (CONTENT_DISPOSITION, "attachment; filename=model.pth"),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
