//! Read-only sync diagnostics.
//!
//! Answers the operator's question "can this deployment actually create
//! events and send mail?" without performing a live booking. Checks the
//! provider config, the saved credentials, per-room calendar mappings and
//! the notification transport; never mutates meeting or token state.

use std::sync::Arc;

use serde::Serialize;

use crate::config::ProviderConfig;
use crate::notify::NotificationSender;
use crate::session::Session;
use crate::store::MeetingStore;

#[derive(Debug, Serialize)]
pub struct RoomStatus {
    pub room: String,
    pub calendar_id_set: bool,
}

/// Diagnostic snapshot served by the status endpoint.
#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub vendor: String,
    pub credentials_ok: bool,
    pub credentials_detail: Option<String>,
    pub timezone_ok: bool,
    pub rooms: Vec<RoomStatus>,
    pub smtp_ready: bool,
    pub smtp_detail: Option<String>,
    /// Records waiting on an operator: bookings whose remote event was
    /// never confirmed, plus cancellations the retry queue gave up on.
    pub needs_reconciliation: usize,
    /// True when every check above passed: real events can be created.
    pub ready: bool,
}

pub struct SyncStatusReporter {
    config: ProviderConfig,
    notifier: Arc<dyn NotificationSender>,
    store: Arc<MeetingStore>,
}

impl SyncStatusReporter {
    pub fn new(
        config: ProviderConfig,
        notifier: Arc<dyn NotificationSender>,
        store: Arc<MeetingStore>,
    ) -> Self {
        SyncStatusReporter {
            config,
            notifier,
            store,
        }
    }

    pub async fn report(&self) -> SyncStatus {
        let credentials = Session::load(&self.config.credentials_ref);
        let (credentials_ok, credentials_detail) = match credentials {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        let timezone_ok = self.config.tz().is_ok();

        let rooms: Vec<RoomStatus> = self
            .config
            .configured_rooms()
            .into_iter()
            .map(|room| RoomStatus {
                calendar_id_set: self.config.calendar_id_for(&room).is_ok(),
                room: room.to_string(),
            })
            .collect();

        let (smtp_ready, smtp_detail) = match self.notifier.healthcheck().await {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };

        let all_rooms_mapped = rooms.iter().all(|r| r.calendar_id_set);
        let ready = credentials_ok && timezone_ok && all_rooms_mapped && smtp_ready;

        SyncStatus {
            vendor: self.config.vendor.to_string(),
            credentials_ok,
            credentials_detail,
            timezone_ok,
            rooms,
            smtp_ready,
            smtp_detail,
            needs_reconciliation: self.store.reconciliation_count(),
            ready,
        }
    }
}
