//! Error types for the roombook ecosystem.

use thiserror::Error;

/// Errors that can occur in roombook operations.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar configuration invalid: {0}")]
    InvalidCalendarConfig(String),

    #[error("Calendar provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("That room is already booked for the requested time")]
    SlotConflict,

    #[error("This cancellation link is invalid or has already been used")]
    InvalidToken,

    #[error("Meeting is in the wrong state for this operation: {0}")]
    InvalidState(String),

    #[error("Meeting not found: {0}")]
    MeetingNotFound(String),

    #[error("Invalid booking request: {0}")]
    InvalidRequest(String),

    #[error("Failed to deliver notification email: {0}")]
    DeliveryFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for roombook operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Whether a retry of the same operation can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::ProviderUnavailable(_))
    }
}
