//! Operator diagnostics endpoint

use axum::{Json, Router, extract::State, routing::get};
use roombook_core::status::SyncStatus;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

/// GET /status - Provider and transport health, without booking anything
async fn status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.reporter.report().await)
}
