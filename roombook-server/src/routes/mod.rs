pub mod cancel;
pub mod meetings;
pub mod status;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use roombook_core::error::SyncError;
use serde::Serialize;

/// Standard API error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Convert sync errors to HTTP responses
pub struct ApiError(SyncError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SyncError::SlotConflict | SyncError::InvalidState(_) => StatusCode::CONFLICT,
            SyncError::InvalidToken => StatusCode::GONE,
            SyncError::MeetingNotFound(_) => StatusCode::NOT_FOUND,
            SyncError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            SyncError::ProviderUnavailable(_) | SyncError::DeliveryFailed(_) => {
                StatusCode::BAD_GATEWAY
            }
            SyncError::InvalidCalendarConfig(_)
            | SyncError::Config(_)
            | SyncError::Io(_)
            | SyncError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        ApiError(err)
    }
}
