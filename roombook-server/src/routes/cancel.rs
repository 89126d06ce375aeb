//! The endpoint behind the emailed confirmation link.

use axum::{
    Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::routes::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/cancel/confirm", get(confirm))
}

#[derive(Deserialize)]
pub struct ConfirmParams {
    pub token: String,
}

/// GET /cancel/confirm?token=... - Approve a pending cancellation
///
/// Opened by the admin from their mail client, so the response is plain
/// text. A second click on the same link gets the generic invalid-link
/// error, not a duplicate delete.
async fn confirm(
    State(state): State<AppState>,
    Query(params): Query<ConfirmParams>,
) -> Result<String, ApiError> {
    let meeting = state.coordinator.confirm_cancellation(&params.token).await?;

    Ok(format!(
        "Cancelled: {} in {} on {}.\nThe calendar event has been removed.",
        meeting.team_name,
        meeting.room,
        meeting.start.format("%Y-%m-%d %H:%M UTC"),
    ))
}
