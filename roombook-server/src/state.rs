use std::sync::Arc;

use roombook_core::coordinator::BookingCoordinator;
use roombook_core::status::SyncStatusReporter;
use roombook_core::store::MeetingStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub reporter: Arc<SyncStatusReporter>,
    pub store: Arc<MeetingStore>,
}
