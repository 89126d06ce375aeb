//! The calendar provider contract.
//!
//! Vendor adapters (Google Calendar, Microsoft Graph) implement this trait;
//! the coordinator depends only on the operation contract, never on the
//! vendor's wire protocol. Which adapter is active is decided once at
//! startup from `ProviderConfig.vendor`.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::Vendor;
use crate::error::{SyncError, SyncResult};
use crate::meeting::{EventDraft, RemoteEventRef};

/// Ceiling on any single outbound provider call.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a remote delete.
///
/// `NotFound` means the event was already gone, which is the desired end
/// state; callers treat it as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Uniform create/delete operations over one calendar vendor.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    fn vendor(&self) -> Vendor;

    /// Create one remote event for the draft and return its reference.
    ///
    /// Fails with `InvalidCalendarConfig` if no calendar is mapped for the
    /// draft's room, `ProviderUnavailable` on auth/network failure.
    async fn create_event(&self, draft: &EventDraft) -> SyncResult<RemoteEventRef>;

    /// Delete the remote event behind a reference. Idempotent: deleting an
    /// already-deleted or unknown reference returns `Ok(NotFound)`.
    async fn delete_event(&self, event_ref: &RemoteEventRef) -> SyncResult<DeleteOutcome>;
}

/// Stand-in used when the configured provider failed validation at startup.
///
/// Keeps the process (and the diagnostic surface) alive while every booking
/// call reports the configuration problem instead of panicking.
pub struct DisabledProvider {
    vendor: Vendor,
    reason: String,
}

impl DisabledProvider {
    pub fn new(vendor: Vendor, reason: impl Into<String>) -> Self {
        DisabledProvider {
            vendor,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CalendarProvider for DisabledProvider {
    fn vendor(&self) -> Vendor {
        self.vendor
    }

    async fn create_event(&self, _draft: &EventDraft) -> SyncResult<RemoteEventRef> {
        Err(SyncError::InvalidCalendarConfig(self.reason.clone()))
    }

    async fn delete_event(&self, _event_ref: &RemoteEventRef) -> SyncResult<DeleteOutcome> {
        Err(SyncError::InvalidCalendarConfig(self.reason.clone()))
    }
}
