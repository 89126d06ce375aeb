//! Microsoft Outlook calendar adapter for roombook.
//!
//! Talks to Microsoft Graph (`/users/{mailbox}/calendars/...`) with a saved
//! access token. The mailbox user comes from `ProviderConfig.mailbox_user`
//! and owns every calendar rooms are mapped to.

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

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";

pub struct OutlookCalendarProvider {
    config: ProviderConfig,
    tz: chrono_tz::Tz,
    mailbox_user: String,
    http: reqwest::Client,
}

impl OutlookCalendarProvider {
    pub fn new(config: ProviderConfig) -> SyncResult<Self> {
        config.validate()?;
        let tz = config.tz()?;
        // validate() already requires this for the outlook vendor.
        let mailbox_user = config.mailbox_user.clone().ok_or_else(|| {
            SyncError::InvalidCalendarConfig("outlook requires mailbox_user".to_string())
        })?;

        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| SyncError::ProviderUnavailable(e.to_string()))?;

        Ok(OutlookCalendarProvider {
            config,
            tz,
            mailbox_user,
            http,
        })
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
impl CalendarProvider for OutlookCalendarProvider {
    fn vendor(&self) -> Vendor {
        Vendor::Outlook
    }

    async fn create_event(&self, draft: &EventDraft) -> SyncResult<RemoteEventRef> {
        let calendar_id = self.config.calendar_id_for(&draft.room)?.to_string();
        let token = self.bearer()?;

        let url = format!(
            "{GRAPH_BASE}/users/{}/calendars/{}/events",
            urlencoding::encode(&self.mailbox_user),
            urlencoding::encode(&calendar_id),
        );
        debug!(%calendar_id, title = %draft.title, "creating outlook event");

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

        // Graph addresses events by id within the mailbox, independent of
        // the calendar they live in.
        let url = format!(
            "{GRAPH_BASE}/users/{}/events/{}",
            urlencoding::encode(&self.mailbox_user),
            urlencoding::encode(&event_ref.event_id),
        );
        debug!(event = %event_ref, "deleting outlook event");

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
            "graph request timed out after {}s",
            PROVIDER_TIMEOUT.as_secs()
        ))
    } else {
        SyncError::ProviderUnavailable(format!("graph request failed: {e}"))
    }
}

fn create_failure(status: StatusCode, calendar_id: &str, body: &str) -> SyncError {
    match status {
        StatusCode::NOT_FOUND => SyncError::InvalidCalendarConfig(format!(
            "calendar '{calendar_id}' not found in the mailbox"
        )),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SyncError::ProviderUnavailable(
            format!("graph rejected the access token (HTTP {status})"),
        ),
        _ => SyncError::ProviderUnavailable(format!("create failed (HTTP {status}): {body}")),
    }
}

/// 204 is Graph's success for DELETE; 404/410 means the event is already
/// gone, which the caller treats as success.
fn delete_outcome(status: StatusCode) -> Option<DeleteOutcome> {
    if status.is_success() {
        Some(DeleteOutcome::Deleted)
    } else if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Some(DeleteOutcome::NotFound)
    } else {
        None
    }
}
