use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use trainhub_core::progress::TrainingStatus;

use crate::error::{AppError, AppResult};
use crate::sse::relay::{relay, StreamFrame};
use crate::state::AppState;

/// Frames buffered per client before the relay waits on a slow reader.
const CLIENT_BUFFER: usize = 16;

/// GET /train/status
///
/// Stream the job's progress as Server-Sent Events. The stream opens with an
/// `:ok` comment, carries one JSON record per change, and ends with a
/// `complete` or `error` event after the terminal record. Returns 400 if no
/// job was ever started.
pub async fn status_stream(State(state): State<AppState>) -> AppResult<Response> {
    let subscription = state.tracker.subscribe();
    if state.tracker.status() == TrainingStatus::NotStarted {
        return Err(AppError::BadRequest(
            "No training job has been started".to_string(),
        ));
    }

    let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
    tokio::spawn(relay(
        Arc::clone(&state.tracker),
        subscription,
        tx,
        state.shutdown.clone(),
    ));
    tracing::info!(
        subscribers = state.tracker.bus().subscriber_count(),
        "Status stream opened",
    );

    let opening = stream::once(async { Ok::<Event, axum::Error>(Event::default().comment("ok")) });
    let frames = ReceiverStream::new(rx).map(StreamFrame::into_event);
    let keep_alive = KeepAlive::new().interval(Duration::from_secs(state.config.sse_keep_alive_secs));

    Ok(Sse::new(opening.chain(frames)).keep_alive(keep_alive).into_response())
}
