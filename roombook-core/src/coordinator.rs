//! Booking orchestration.
//!
//! The coordinator owns the meeting state machine
//! (`Booked -> CancelPending -> Cancelled`) and the agreement between local
//! records and remote calendar events. The distributed intent is
//! at-most-once: a local record never claims a remote event the provider
//! did not confirm.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::meeting::{Meeting, MeetingStatus, Room};
use crate::notify::{NotificationSender, cancellation_email};
use crate::provider::{CalendarProvider, DeleteOutcome};
use crate::retry::{RetryJob, RetryQueue};
use crate::store::MeetingStore;
use crate::token::CancellationRequest;

/// A booking as submitted by a requester.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub team_name: String,
    pub requester_email: String,
    pub room: Room,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub notes: Option<String>,
}

impl BookingRequest {
    fn validate(&self) -> SyncResult<()> {
        if self.team_name.trim().is_empty() {
            return Err(SyncError::InvalidRequest("team name is required".into()));
        }
        if !self.requester_email.contains('@') {
            return Err(SyncError::InvalidRequest(
                "a valid requester email is required".into(),
            ));
        }
        if self.end <= self.start {
            return Err(SyncError::InvalidRequest(
                "end time must be after start time".into(),
            ));
        }
        if self.end <= Utc::now() {
            return Err(SyncError::InvalidRequest(
                "the requested slot is in the past".into(),
            ));
        }
        Ok(())
    }
}

/// One mutex per room: booking decisions serialize within a room while
/// unrelated rooms proceed concurrently.
///
/// Shared with the retry worker so background reconciliation runs inside
/// the same critical section as foreground bookings.
#[derive(Default)]
pub struct RoomLocks {
    inner: StdMutex<HashMap<Room, Arc<Mutex<()>>>>,
}

impl RoomLocks {
    pub fn for_room(&self, room: &Room) -> Arc<Mutex<()>> {
        let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(room.clone()).or_default().clone()
    }
}

pub struct BookingCoordinator {
    store: Arc<MeetingStore>,
    provider: Arc<dyn CalendarProvider>,
    notifier: Arc<dyn NotificationSender>,
    admin_to: String,
    base_url: String,
    retry: RetryQueue,
    room_locks: Arc<RoomLocks>,
}

impl BookingCoordinator {
    /// Build the coordinator and spawn its retry worker. Must be called
    /// from within a tokio runtime.
    pub fn new(
        store: Arc<MeetingStore>,
        provider: Arc<dyn CalendarProvider>,
        notifier: Arc<dyn NotificationSender>,
        admin_to: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let room_locks = Arc::new(RoomLocks::default());
        let retry = RetryQueue::spawn(store.clone(), provider.clone(), room_locks.clone());
        BookingCoordinator {
            store,
            provider,
            notifier,
            admin_to: admin_to.into(),
            base_url: base_url.into(),
            retry,
            room_locks,
        }
    }

    fn room_lock(&self, room: &Room) -> Arc<Mutex<()>> {
        self.room_locks.for_room(room)
    }

    /// Book a room slot and create its remote calendar event.
    ///
    /// Concurrent requests for the same room serialize here; at most one
    /// booking wins a given slot, the loser gets `SlotConflict`. On a
    /// transient provider failure the record is kept as `SyncFailed` and
    /// queued for background reconciliation; on a permanent failure it is
    /// rolled back entirely.
    pub async fn book(&self, request: BookingRequest) -> SyncResult<Meeting> {
        request.validate()?;

        let lock = self.room_lock(&request.room);
        let _guard = lock.lock().await;

        if let Some(existing) =
            self.store
                .conflicting_meeting(&request.room, request.start, request.end, None)
        {
            debug!(room = %request.room, conflict = %existing.id, "slot conflict");
            return Err(SyncError::SlotConflict);
        }

        let mut meeting = Meeting {
            id: Uuid::new_v4(),
            team_name: request.team_name,
            requester_email: request.requester_email,
            room: request.room,
            start: request.start,
            end: request.end,
            notes: request.notes,
            status: MeetingStatus::Booked,
            created_at: Utc::now(),
            needs_attention: None,
            remote_event_ref: None,
        };
        self.store.insert_meeting(meeting.clone())?;

        match self.provider.create_event(&meeting.event_draft()).await {
            Ok(event_ref) => {
                info!(meeting = %meeting.id, event = %event_ref, "booked");
                meeting.remote_event_ref = Some(event_ref);
                self.store.update_meeting(meeting.clone())?;
                Ok(meeting)
            }
            Err(e) if e.is_transient() => {
                // The remote side never confirmed; the record must not
                // present itself as a successful booking.
                warn!(meeting = %meeting.id, error = %e, "remote create failed; flagging for reconciliation");
                meeting.status = MeetingStatus::SyncFailed;
                self.store.update_meeting(meeting.clone())?;
                self.retry.enqueue(RetryJob::CreateEvent {
                    meeting_id: meeting.id,
                });
                Err(e)
            }
            Err(e) => {
                warn!(meeting = %meeting.id, error = %e, "remote create rejected; rolling back");
                self.store.remove_meeting(&meeting.id)?;
                Err(e)
            }
        }
    }

    /// Start the two-step cancellation: issue a single-use token and email
    /// the admin a confirmation link.
    ///
    /// A `DeliveryFailed` error does not revert the `CancelPending`
    /// transition; the token stands and the email can be resent.
    pub async fn request_cancellation(&self, meeting_id: Uuid) -> SyncResult<CancellationRequest> {
        // Expired links are dead weight; drop them while we are here.
        self.store.purge_expired_cancellations(Utc::now())?;

        let meeting = self
            .store
            .meeting(&meeting_id)
            .ok_or_else(|| SyncError::MeetingNotFound(meeting_id.to_string()))?;

        let lock = self.room_lock(&meeting.room);
        let _guard = lock.lock().await;

        // Re-read under the lock; a concurrent request may have won.
        let mut meeting = self
            .store
            .meeting(&meeting_id)
            .ok_or_else(|| SyncError::MeetingNotFound(meeting_id.to_string()))?;
        if meeting.status != MeetingStatus::Booked {
            return Err(SyncError::InvalidState(format!(
                "cancellation requires a booked meeting, this one is {}",
                meeting.status
            )));
        }

        let request = CancellationRequest::issue(meeting_id);
        meeting.status = MeetingStatus::CancelPending;
        self.store.update_meeting(meeting.clone())?;
        self.store.insert_cancellation(request.clone())?;
        info!(meeting = %meeting_id, "cancellation requested");

        let (subject, body) = cancellation_email(&meeting, &request.token, &self.base_url);
        if let Err(e) = self.notifier.send(&self.admin_to, &subject, &body).await {
            // The admin can still be reached another way; the state stands.
            warn!(meeting = %meeting_id, error = %e, "confirmation email failed");
            return Err(e);
        }

        Ok(request)
    }

    /// Resend the confirmation email for a pending cancellation, reusing
    /// the outstanding token.
    pub async fn resend_cancellation_email(&self, meeting_id: Uuid) -> SyncResult<()> {
        let meeting = self
            .store
            .meeting(&meeting_id)
            .ok_or_else(|| SyncError::MeetingNotFound(meeting_id.to_string()))?;
        if meeting.status != MeetingStatus::CancelPending {
            return Err(SyncError::InvalidState(format!(
                "no cancellation is pending, this meeting is {}",
                meeting.status
            )));
        }

        let request = self
            .store
            .usable_cancellation_for(&meeting_id, Utc::now())
            .ok_or(SyncError::InvalidToken)?;

        let (subject, body) = cancellation_email(&meeting, &request.token, &self.base_url);
        self.notifier.send(&self.admin_to, &subject, &body).await
    }

    /// Consume a confirmation token: delete the remote event, then finish
    /// the local record.
    ///
    /// Idempotent under duplicate clicks: the second invocation sees a
    /// consumed token and gets `InvalidToken` without a second delete.
    /// A transient delete failure leaves the meeting `CancelPending` and
    /// the token live, and hands the delete to the retry queue.
    pub async fn confirm_cancellation(&self, token: &str) -> SyncResult<Meeting> {
        let request = self
            .store
            .cancellation_by_token(token)
            .ok_or(SyncError::InvalidToken)?;
        let meeting = self
            .store
            .meeting(&request.meeting_id)
            .ok_or(SyncError::InvalidToken)?;

        let lock = self.room_lock(&meeting.room);
        let _guard = lock.lock().await;

        // Re-read under the lock so duplicate clicks serialize.
        let now = Utc::now();
        let request = self
            .store
            .cancellation_by_token(token)
            .ok_or(SyncError::InvalidToken)?;
        if !request.is_usable(now) {
            return Err(SyncError::InvalidToken);
        }
        let mut meeting = self
            .store
            .meeting(&request.meeting_id)
            .ok_or(SyncError::InvalidToken)?;
        if meeting.status != MeetingStatus::CancelPending {
            return Err(SyncError::InvalidState(format!(
                "cancellation was confirmed for a meeting that is {}",
                meeting.status
            )));
        }

        if let Some(event_ref) = meeting.remote_event_ref.clone() {
            match self.provider.delete_event(&event_ref).await {
                Ok(DeleteOutcome::Deleted) => {
                    info!(meeting = %meeting.id, event = %event_ref, "remote event deleted");
                }
                Ok(DeleteOutcome::NotFound) => {
                    // Already gone remotely: the end state we wanted.
                    debug!(meeting = %meeting.id, event = %event_ref, "remote event was already gone");
                }
                Err(e) if e.is_transient() => {
                    warn!(meeting = %meeting.id, error = %e, "remote delete failed; queued for retry");
                    self.retry.enqueue(RetryJob::DeleteEvent {
                        meeting_id: meeting.id,
                        token: token.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        self.store.mark_consumed(token, now)?;
        meeting.status = MeetingStatus::Cancelled;
        meeting.remote_event_ref = None;
        self.store.update_meeting(meeting.clone())?;
        info!(meeting = %meeting.id, "cancellation complete");

        Ok(meeting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Vendor;
    use crate::meeting::{EventDraft, RemoteEventRef};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockProvider {
        create_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        fail_create: AtomicBool,
        reject_create: AtomicBool,
        fail_delete: AtomicBool,
        delete_not_found: AtomicBool,
    }

    #[async_trait]
    impl CalendarProvider for MockProvider {
        fn vendor(&self) -> Vendor {
            Vendor::Google
        }

        async fn create_event(&self, draft: &EventDraft) -> SyncResult<RemoteEventRef> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(SyncError::ProviderUnavailable("timed out".into()));
            }
            if self.reject_create.load(Ordering::SeqCst) {
                return Err(SyncError::InvalidCalendarConfig(format!(
                    "no calendar for {}",
                    draft.room
                )));
            }
            Ok(RemoteEventRef::new("robotics-cal", "evt123"))
        }

        async fn delete_event(&self, _event_ref: &RemoteEventRef) -> SyncResult<DeleteOutcome> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(SyncError::ProviderUnavailable("timed out".into()));
            }
            if self.delete_not_found.load(Ordering::SeqCst) {
                return Ok(DeleteOutcome::NotFound);
            }
            Ok(DeleteOutcome::Deleted)
        }
    }

    #[derive(Default)]
    struct MockNotifier {
        sent: StdMutex<Vec<(String, String, String)>>,
        fail: AtomicBool,
    }

    #[async_trait]
    impl NotificationSender for MockNotifier {
        async fn send(&self, to: &str, subject: &str, body: &str) -> SyncResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::DeliveryFailed("connection refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string(), body.to_string()));
            Ok(())
        }

        async fn healthcheck(&self) -> SyncResult<()> {
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<MeetingStore>,
        provider: Arc<MockProvider>,
        notifier: Arc<MockNotifier>,
        coordinator: BookingCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MeetingStore::in_memory());
        let provider = Arc::new(MockProvider::default());
        let notifier = Arc::new(MockNotifier::default());
        let coordinator = BookingCoordinator::new(
            store.clone(),
            provider.clone(),
            notifier.clone(),
            "admin@example.edu",
            "https://rooms.example.edu",
        );
        Fixture {
            store,
            provider,
            notifier,
            coordinator,
        }
    }

    fn robotics_request(offset_hours: i64) -> BookingRequest {
        BookingRequest {
            team_name: "Baja".to_string(),
            requester_email: "baja@example.edu".to_string(),
            room: Room::Robotics,
            start: Utc::now() + Duration::hours(offset_hours),
            end: Utc::now() + Duration::hours(offset_hours + 1),
            notes: None,
        }
    }

    #[tokio::test]
    async fn book_links_the_remote_event() {
        let f = fixture();

        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();

        assert_eq!(meeting.status, MeetingStatus::Booked);
        assert_eq!(
            meeting.remote_event_ref.as_ref().unwrap().event_id,
            "evt123"
        );
        assert_eq!(f.provider.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn booking_rejects_bad_slots() {
        let f = fixture();

        let mut backwards = robotics_request(2);
        backwards.end = backwards.start - Duration::minutes(30);
        assert!(matches!(
            f.coordinator.book(backwards).await,
            Err(SyncError::InvalidRequest(_))
        ));

        let mut past = robotics_request(2);
        past.start = Utc::now() - Duration::hours(3);
        past.end = Utc::now() - Duration::hours(2);
        assert!(matches!(
            f.coordinator.book(past).await,
            Err(SyncError::InvalidRequest(_))
        ));

        assert_eq!(f.provider.create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn overlapping_booking_loses_with_slot_conflict() {
        let f = fixture();
        f.coordinator.book(robotics_request(2)).await.unwrap();

        let mut overlapping = robotics_request(2);
        overlapping.team_name = "Rocketry".to_string();
        assert!(matches!(
            f.coordinator.book(overlapping).await,
            Err(SyncError::SlotConflict)
        ));
        // The loser never reached the provider.
        assert_eq!(f.provider.create_calls.load(Ordering::SeqCst), 1);

        // The same slot in another room is unaffected.
        let mut fluids = robotics_request(2);
        fluids.room = Room::Fluids;
        f.coordinator.book(fluids).await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_bookings_produce_exactly_one_event() {
        let f = fixture();
        let coordinator = Arc::new(f.coordinator);

        let a = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.book(robotics_request(2)).await })
        };
        let b = {
            let c = coordinator.clone();
            tokio::spawn(async move { c.book(robotics_request(2)).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            [a, b]
                .into_iter()
                .any(|r| matches!(r, Err(SyncError::SlotConflict)))
        );
        assert_eq!(f.provider.create_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transient_create_failure_flags_the_booking() {
        let f = fixture();
        f.provider.fail_create.store(true, Ordering::SeqCst);

        let err = f.coordinator.book(robotics_request(2)).await.unwrap_err();
        assert!(matches!(err, SyncError::ProviderUnavailable(_)));

        // Never presented as booked with no remote event behind it.
        let meetings = f.store.meetings();
        assert_eq!(meetings.len(), 1);
        assert_eq!(meetings[0].status, MeetingStatus::SyncFailed);
        assert!(meetings[0].remote_event_ref.is_none());
    }

    #[tokio::test]
    async fn permanent_create_failure_rolls_back() {
        let f = fixture();
        f.provider.reject_create.store(true, Ordering::SeqCst);

        let err = f.coordinator.book(robotics_request(2)).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidCalendarConfig(_)));
        assert!(f.store.meetings().is_empty());
    }

    #[tokio::test]
    async fn cancellation_flow_end_to_end() {
        let f = fixture();
        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();

        let request = f
            .coordinator
            .request_cancellation(meeting.id)
            .await
            .unwrap();
        assert_eq!(
            f.store.meeting(&meeting.id).unwrap().status,
            MeetingStatus::CancelPending
        );

        // The admin got a link carrying the token.
        let sent = f.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "admin@example.edu");
        assert!(sent[0].2.contains(&request.token));

        let cancelled = f
            .coordinator
            .confirm_cancellation(&request.token)
            .await
            .unwrap();
        assert_eq!(cancelled.status, MeetingStatus::Cancelled);
        assert!(cancelled.remote_event_ref.is_none());
        assert_eq!(f.provider.delete_calls.load(Ordering::SeqCst), 1);

        // Duplicate click: invalid token, no second delete.
        assert!(matches!(
            f.coordinator.confirm_cancellation(&request.token).await,
            Err(SyncError::InvalidToken)
        ));
        assert_eq!(f.provider.delete_calls.load(Ordering::SeqCst), 1);

        // The freed slot can be booked again.
        f.coordinator.book(robotics_request(2)).await.unwrap();
    }

    #[tokio::test]
    async fn cancellation_requires_a_booked_meeting() {
        let f = fixture();

        assert!(matches!(
            f.coordinator.request_cancellation(Uuid::new_v4()).await,
            Err(SyncError::MeetingNotFound(_))
        ));

        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();
        f.coordinator
            .request_cancellation(meeting.id)
            .await
            .unwrap();

        // Already pending: a second request is an invalid state, not a
        // second token.
        assert!(matches!(
            f.coordinator.request_cancellation(meeting.id).await,
            Err(SyncError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn delivery_failure_keeps_the_transition_and_the_token() {
        let f = fixture();
        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();

        f.notifier.fail.store(true, Ordering::SeqCst);
        let err = f
            .coordinator
            .request_cancellation(meeting.id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::DeliveryFailed(_)));

        // CancelPending stands and the token is still usable.
        assert_eq!(
            f.store.meeting(&meeting.id).unwrap().status,
            MeetingStatus::CancelPending
        );
        let request = f
            .store
            .usable_cancellation_for(&meeting.id, Utc::now())
            .unwrap();

        // Resend reuses the same token once the transport recovers.
        f.notifier.fail.store(false, Ordering::SeqCst);
        f.coordinator
            .resend_cancellation_email(meeting.id)
            .await
            .unwrap();
        let sent = f.notifier.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains(&request.token));
    }

    #[tokio::test]
    async fn confirm_tolerates_already_deleted_remote_event() {
        let f = fixture();
        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();
        let request = f
            .coordinator
            .request_cancellation(meeting.id)
            .await
            .unwrap();

        f.provider.delete_not_found.store(true, Ordering::SeqCst);
        let cancelled = f
            .coordinator
            .confirm_cancellation(&request.token)
            .await
            .unwrap();
        assert_eq!(cancelled.status, MeetingStatus::Cancelled);
    }

    #[tokio::test]
    async fn transient_delete_failure_leaves_a_retry_path() {
        let f = fixture();
        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();
        let request = f
            .coordinator
            .request_cancellation(meeting.id)
            .await
            .unwrap();

        f.provider.fail_delete.store(true, Ordering::SeqCst);
        let err = f
            .coordinator
            .confirm_cancellation(&request.token)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::ProviderUnavailable(_)));

        // Meeting stays CancelPending and the token stays valid, so the
        // delete can be retried.
        assert_eq!(
            f.store.meeting(&meeting.id).unwrap().status,
            MeetingStatus::CancelPending
        );
        assert!(
            f.store
                .usable_cancellation_for(&meeting.id, Utc::now())
                .is_some()
        );
    }

    #[tokio::test]
    async fn expired_token_refuses_confirmation() {
        let f = fixture();
        let meeting = f.coordinator.book(robotics_request(2)).await.unwrap();

        let mut meeting = f.store.meeting(&meeting.id).unwrap();
        meeting.status = MeetingStatus::CancelPending;
        f.store.update_meeting(meeting.clone()).unwrap();

        let mut request = CancellationRequest::issue(meeting.id);
        request.expires_at = Utc::now() - Duration::hours(1);
        let token = request.token.clone();
        f.store.insert_cancellation(request).unwrap();

        assert!(matches!(
            f.coordinator.confirm_cancellation(&token).await,
            Err(SyncError::InvalidToken)
        ));
        assert_eq!(f.provider.delete_calls.load(Ordering::SeqCst), 0);
    }
}
