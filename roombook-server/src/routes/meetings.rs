//! Booking endpoints (create, list, request/resend cancellation)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use chrono::{DateTime, Utc};
use roombook_core::coordinator::BookingRequest;
use roombook_core::meeting::{Meeting, Room};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meetings", post(book).get(list))
        .route("/meetings/{id}/cancel", post(request_cancel))
        .route("/meetings/{id}/cancel/resend", post(resend_cancel))
}

#[derive(Deserialize)]
pub struct BookPayload {
    pub team_name: String,
    pub requester_email: String,
    pub room: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// POST /meetings - Book a room and create its calendar event
async fn book(
    State(state): State<AppState>,
    Json(payload): Json<BookPayload>,
) -> Result<(StatusCode, Json<Meeting>), ApiError> {
    let request = BookingRequest {
        team_name: payload.team_name,
        requester_email: payload.requester_email,
        room: Room::from_name(&payload.room),
        start: payload.start,
        end: payload.end,
        notes: payload.notes,
    };

    let meeting = state.coordinator.book(request).await?;
    Ok((StatusCode::CREATED, Json(meeting)))
}

/// GET /meetings - List local meeting records
async fn list(State(state): State<AppState>) -> Json<Vec<Meeting>> {
    Json(state.store.meetings())
}

#[derive(Serialize)]
pub struct CancelRequested {
    pub meeting_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// POST /meetings/{id}/cancel - Start the email-confirmed cancellation
async fn request_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<CancelRequested>), ApiError> {
    let request = state.coordinator.request_cancellation(id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CancelRequested {
            meeting_id: request.meeting_id,
            expires_at: request.expires_at,
        }),
    ))
}

/// POST /meetings/{id}/cancel/resend - Resend the confirmation email,
/// reusing the outstanding token
async fn resend_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.coordinator.resend_cancellation_email(id).await?;
    Ok(StatusCode::ACCEPTED)
}
