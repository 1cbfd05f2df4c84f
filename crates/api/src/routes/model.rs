use axum::routing::get;
use axum::Router;

use crate::handlers::model;
use crate::state::AppState;

/// Routes mounted at `/download-model`.
///
/// ```text
/// GET    /            -> download_model
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(model::download_model))
}
