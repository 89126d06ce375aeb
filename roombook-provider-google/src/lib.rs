//! Google Calendar adapter for roombook.
//!
//! Implements the `CalendarProvider` contract against the Calendar API v3.
//! Authentication uses a previously-saved access token (see
//! `roombook_core::session`); acquiring or refreshing the token happens out
//! of band.

mod convert;

use async_trait::async_trait;
use reqwest::StatusCode;
use roombook_core::config::{ProviderConfig, Vendor};
use roombook_core::error::{SyncError, SyncResult};
use roombook_core::meeting::{EventDraft, RemoteEventRef};
use roombook_core::provider::{CalendarProvider, DeleteOutcome, PROVIDER_TIMEOUT};
use roombook_core::session::Session;
use serde::Deserialize;
use tracing::debug;

use crate::convert::event_payload;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

pub struct GoogleCalendarProvider {
    config: ProviderConfig,
    tz: chrono_tz::Tz,
    http: reqwest::Client,
}

impl GoogleCalendarProvider {
    /// Validates the config up front so a bad timezone or an empty calendar
    /// map fails at startup, not on the first booking.
    pub fn new(config: ProviderConfig) -> SyncResult<Self> {
        config.validate()?;
        let tz = config.tz()?;

        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| SyncError::ProviderUnavailable(e.to_string()))?;

        Ok(GoogleCalendarProvider { config, tz, http })
    }

    fn bearer(&self) -> SyncResult<String> {
        Session::load(&self.config.credentials_ref).map(|s| s.access_token)
    }
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Google
    }

    async fn create_event(&self, draft: &EventDraft) -> SyncResult<RemoteEventRef> {
        let calendar_id = self.config.calendar_id_for(&draft.room)?.to_string();
        let token = self.bearer()?;

        let url = format!(
            "{API_BASE}/calendars/{}/events",
            urlencoding::encode(&calendar_id)
        );
        debug!(%calendar_id, title = %draft.title, "creating google event");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&event_payload(draft, &self.tz))
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(create_failure(status, &calendar_id, &body));
        }

        let created: CreatedEvent = response
            .json()
            .await
            .map_err(|e| SyncError::ProviderUnavailable(format!("malformed response: {e}")))?;

        Ok(RemoteEventRef::new(calendar_id, created.id))
    }

    async fn delete_event(&self, event_ref: &RemoteEventRef) -> SyncResult<DeleteOutcome> {
        let token = self.bearer()?;

        let url = format!(
            "{API_BASE}/calendars/{}/events/{}",
            urlencoding::encode(&event_ref.calendar_id),
            urlencoding::encode(&event_ref.event_id),
        );
        debug!(event = %event_ref, "deleting google event");

        let response = self
            .http
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if let Some(outcome) = delete_outcome(status) {
            return Ok(outcome);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SyncError::ProviderUnavailable(format!(
            "delete failed (HTTP {status}): {body}"
        )))
    }
}

fn transport_error(e: reqwest::Error) -> SyncError {
    if e.is_timeout() {
        SyncError::ProviderUnavailable(format!(
            "google request timed out after {}s",
            PROVIDER_TIMEOUT.as_secs()
        ))
    } else {
        SyncError::ProviderUnavailable(format!("google request failed: {e}"))
    }
}

fn create_failure(status: StatusCode, calendar_id: &str, body: &str) -> SyncError {
    match status {
        StatusCode::NOT_FOUND => SyncError::InvalidCalendarConfig(format!(
            "calendar '{calendar_id}' not found on google"
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::ProviderUnavailable(
            format!("google rejected the access token (HTTP {status})"),
        ),
        _ => SyncError::ProviderUnavailable(format!("create failed (HTTP {status}): {body}")),
    }
}

/// Terminal delete statuses. 404/410 means the event is already gone, which
/// is the end state the caller wanted.
fn delete_outcome(status: StatusCode) -> Option<DeleteOutcome> {
    if status.is_success() {
        Some(DeleteOutcome::Deleted)
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Some(DeleteOutcome::NotFound)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_treats_missing_events_as_not_found() {
        assert_eq!(
            delete_outcome(StatusCode::NO_CONTENT),
            Some(DeleteOutcome::Deleted)
        );
        assert_eq!(
            delete_outcome(StatusCode::NOT_FOUND),
            Some(DeleteOutcome::NotFound)
        );
        assert_eq!(
            delete_outcome(StatusCode::GONE),
            Some(DeleteOutcome::NotFound)
        );
        assert_eq!(delete_outcome(StatusCode::SERVICE_UNAVAILABLE), None);
    }

    #[test]
    fn create_failures_map_to_the_right_taxonomy() {
        assert!(matches!(
            create_failure(StatusCode::NOT_FOUND, "cal", ""),
            SyncError::InvalidCalendarConfig(_)
        ));
        assert!(matches!(
            create_failure(StatusCode::UNAUTHORIZED, "cal", ""),
            SyncError::ProviderUnavailable(_)
        ));
        assert!(matches!(
            create_failure(StatusCode::INTERNAL_SERVER_ERROR, "cal", "boom"),
            SyncError::ProviderUnavailable(_)
        ));
    }
}
