//! Background retry queue for transient provider failures.
//!
//! Remote calls that fail with `ProviderUnavailable` are retried here, out
//! of the request path, with bounded exponential backoff. Exhausting the
//! retry budget never silently abandons a meeting: create failures stay
//! flagged `SyncFailed`, delete failures revert the meeting to `Booked`
//! (the remote event really does still exist), invalidate the token and
//! mark the record for operator attention.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::coordinator::RoomLocks;
use crate::meeting::MeetingStatus;
use crate::provider::CalendarProvider;
use crate::store::MeetingStore;

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum RetryJob {
    /// Re-run the remote create for a `SyncFailed` booking.
    CreateEvent { meeting_id: Uuid },
    /// Re-run the remote delete for a confirmed cancellation.
    DeleteEvent { meeting_id: Uuid, token: String },
}

/// Handle to the background retry worker.
pub struct RetryQueue {
    tx: mpsc::UnboundedSender<RetryJob>,
}

impl RetryQueue {
    /// Spawn the worker task. Must be called from within a tokio runtime.
    ///
    /// The worker shares the coordinator's per-room locks so its state
    /// transitions serialize with foreground bookings.
    pub fn spawn(
        store: Arc<MeetingStore>,
        provider: Arc<dyn CalendarProvider>,
        locks: Arc<RoomLocks>,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                run_job(&store, provider.as_ref(), &locks, job).await;
            }
        });

        RetryQueue { tx }
    }

    pub fn enqueue(&self, job: RetryJob) {
        // Send only fails if the worker is gone, i.e. during shutdown.
        let _ = self.tx.send(job);
    }
}

async fn run_job(
    store: &MeetingStore,
    provider: &dyn CalendarProvider,
    locks: &RoomLocks,
    job: RetryJob,
) {
    match job {
        RetryJob::CreateEvent { meeting_id } => {
            retry_create(store, provider, locks, meeting_id).await
        }
        RetryJob::DeleteEvent { meeting_id, token } => {
            retry_delete(store, provider, locks, meeting_id, &token).await
        }
    }
}

async fn retry_create(
    store: &MeetingStore,
    provider: &dyn CalendarProvider,
    locks: &RoomLocks,
    meeting_id: Uuid,
) {
    for attempt in 1..=MAX_ATTEMPTS {
        sleep(BASE_DELAY * 2u32.pow(attempt - 1)).await;

        // Re-check every round: the booking may have been reconciled or
        // removed while we slept.
        let Some(meeting) = store.meeting(&meeting_id) else {
            return;
        };
        if meeting.status != MeetingStatus::SyncFailed {
            return;
        }

        // Reviving a flagged booking is a booking decision, so it runs
        // inside the same per-room critical section as foreground books.
        let lock = locks.for_room(&meeting.room);
        let _guard = lock.lock().await;

        let Some(mut meeting) = store.meeting(&meeting_id) else {
            return;
        };
        if meeting.status != MeetingStatus::SyncFailed {
            return;
        }

        // A `SyncFailed` record does not hold its slot; someone else may
        // have booked it since. Yield rather than double-book the room.
        if store
            .conflicting_meeting(&meeting.room, meeting.start, meeting.end, Some(meeting.id))
            .is_some()
        {
            warn!(%meeting_id, room = %meeting.room, "slot was rebooked while flagged; leaving for the operator");
            return;
        }

        match provider.create_event(&meeting.event_draft()).await {
            Ok(event_ref) => {
                meeting.status = MeetingStatus::Booked;
                meeting.remote_event_ref = Some(event_ref);
                if let Err(e) = store.update_meeting(meeting) {
                    error!(%meeting_id, error = %e, "failed to persist recovered booking");
                }
                info!(%meeting_id, attempt, "remote event created on retry");
                return;
            }
            Err(e) if e.is_transient() => {
                debug!(%meeting_id, attempt, error = %e, "create retry failed");
            }
            Err(e) => {
                warn!(%meeting_id, error = %e, "create retry hit a permanent error; leaving booking flagged");
                return;
            }
        }
    }

    error!(%meeting_id, "retries exhausted; booking needs manual reconciliation");
}

async fn retry_delete(
    store: &MeetingStore,
    provider: &dyn CalendarProvider,
    locks: &RoomLocks,
    meeting_id: Uuid,
    token: &str,
) {
    for attempt in 1..=MAX_ATTEMPTS {
        sleep(BASE_DELAY * 2u32.pow(attempt - 1)).await;

        let Some(meeting) = store.meeting(&meeting_id) else {
            return;
        };
        let lock = locks.for_room(&meeting.room);
        let _guard = lock.lock().await;

        let Some(mut meeting) = store.meeting(&meeting_id) else {
            return;
        };
        if meeting.status != MeetingStatus::CancelPending {
            // A foreground confirm beat us to it.
            return;
        }

        // The token bounds how long a confirmed-but-unfinished delete may
        // linger. Once it expires, put the booking back and flag it: the
        // requester asked for a cancellation that never happened.
        let usable = store
            .cancellation_by_token(token)
            .is_some_and(|r| r.is_usable(Utc::now()));
        if !usable {
            warn!(%meeting_id, "cancellation token lapsed during retries; reverting to booked");
            meeting.status = MeetingStatus::Booked;
            meeting.needs_attention =
                Some("cancellation token lapsed before the remote delete went through".into());
            if let Err(e) = store.update_meeting(meeting) {
                error!(%meeting_id, error = %e, "failed to persist reverted booking");
            }
            return;
        }

        let Some(event_ref) = meeting.remote_event_ref.clone() else {
            return;
        };

        match provider.delete_event(&event_ref).await {
            Ok(_) => {
                if let Err(e) = store.mark_consumed(token, Utc::now()) {
                    error!(%meeting_id, error = %e, "failed to consume token after delete");
                }
                meeting.status = MeetingStatus::Cancelled;
                meeting.remote_event_ref = None;
                if let Err(e) = store.update_meeting(meeting) {
                    error!(%meeting_id, error = %e, "failed to persist cancelled meeting");
                }
                info!(%meeting_id, attempt, "remote event deleted on retry");
                return;
            }
            Err(e) if e.is_transient() => {
                debug!(%meeting_id, attempt, error = %e, "delete retry failed");
            }
            Err(e) => {
                warn!(%meeting_id, error = %e, "delete retry hit a permanent error");
                break;
            }
        }
    }

    // Give up: the remote event still exists, so Booked is the honest local
    // state. The token is consumed so the stale link cannot fire later, and
    // the record is flagged so the status report surfaces it.
    error!(%meeting_id, "delete retries exhausted; meeting stays booked and needs operator attention");
    if let Err(e) = store.mark_consumed(token, Utc::now()) {
        error!(%meeting_id, error = %e, "failed to consume token after exhausted retries");
    }
    let Some(meeting) = store.meeting(&meeting_id) else {
        return;
    };
    let lock = locks.for_room(&meeting.room);
    let _guard = lock.lock().await;
    if let Some(mut meeting) = store.meeting(&meeting_id) {
        if meeting.status == MeetingStatus::CancelPending {
            meeting.status = MeetingStatus::Booked;
            meeting.needs_attention =
                Some("remote delete kept failing; the calendar event still exists".into());
            if let Err(e) = store.update_meeting(meeting) {
                error!(%meeting_id, error = %e, "failed to persist reverted booking");
            }
        }
    }
}
