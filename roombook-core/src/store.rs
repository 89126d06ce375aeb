//! Local persistence for meetings and cancellation requests.
//!
//! Tables live in memory behind an `RwLock` and are snapshotted to a TOML
//! file after every mutation, so a restart picks up where the process left
//! off. Locks are only held across in-memory work plus the snapshot write;
//! no remote call happens under a store lock.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::meeting::{Meeting, MeetingStatus, Room};
use crate::token::CancellationRequest;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Tables {
    #[serde(default)]
    meetings: HashMap<Uuid, Meeting>,
    /// Keyed by confirmation token.
    #[serde(default)]
    cancellations: HashMap<String, CancellationRequest>,
}

pub struct MeetingStore {
    path: Option<PathBuf>,
    inner: RwLock<Tables>,
}

impl MeetingStore {
    /// In-memory store with no snapshot file (tests).
    pub fn in_memory() -> Self {
        MeetingStore {
            path: None,
            inner: RwLock::new(Tables::default()),
        }
    }

    /// Open a store backed by a snapshot file, loading it if present.
    pub fn open(path: PathBuf) -> SyncResult<Self> {
        let tables = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str(&content).map_err(|e| SyncError::Serialization(e.to_string()))?
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Tables::default()
        };

        Ok(MeetingStore {
            path: Some(path),
            inner: RwLock::new(tables),
        })
    }

    fn persist(&self, tables: &Tables) -> SyncResult<()> {
        if let Some(path) = &self.path {
            let content = toml::to_string_pretty(tables)
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            std::fs::write(path, content)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Meetings
    // ------------------------------------------------------------------

    pub fn insert_meeting(&self, meeting: Meeting) -> SyncResult<()> {
        let mut tables = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        tables.meetings.insert(meeting.id, meeting);
        self.persist(&tables)
    }

    /// Upsert; used for every status/ref transition.
    pub fn update_meeting(&self, meeting: Meeting) -> SyncResult<()> {
        self.insert_meeting(meeting)
    }

    pub fn remove_meeting(&self, id: &Uuid) -> SyncResult<Option<Meeting>> {
        let mut tables = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let removed = tables.meetings.remove(id);
        self.persist(&tables)?;
        Ok(removed)
    }

    pub fn meeting(&self, id: &Uuid) -> Option<Meeting> {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        tables.meetings.get(id).cloned()
    }

    pub fn meetings(&self) -> Vec<Meeting> {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut meetings: Vec<_> = tables.meetings.values().cloned().collect();
        meetings.sort_by_key(|m| m.start);
        meetings
    }

    /// First meeting occupying an overlapping slot in the room, if any.
    pub fn conflicting_meeting(
        &self,
        room: &Room,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude: Option<Uuid>,
    ) -> Option<Meeting> {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .meetings
            .values()
            .find(|m| {
                Some(m.id) != exclude
                    && m.room == *room
                    && m.occupies_slot()
                    && m.overlaps(start, end)
            })
            .cloned()
    }

    /// Records waiting on a person: bookings whose remote event was never
    /// confirmed, plus anything the retry queue gave up on and flagged.
    pub fn reconciliation_count(&self) -> usize {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .meetings
            .values()
            .filter(|m| m.status == MeetingStatus::SyncFailed || m.needs_attention.is_some())
            .count()
    }

    // ------------------------------------------------------------------
    // Cancellation requests
    // ------------------------------------------------------------------

    pub fn insert_cancellation(&self, request: CancellationRequest) -> SyncResult<()> {
        let mut tables = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        tables.cancellations.insert(request.token.clone(), request);
        self.persist(&tables)
    }

    pub fn cancellation_by_token(&self, token: &str) -> Option<CancellationRequest> {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        tables.cancellations.get(token).cloned()
    }

    /// The usable (unconsumed, unexpired) request for a meeting, if one exists.
    pub fn usable_cancellation_for(
        &self,
        meeting_id: &Uuid,
        now: DateTime<Utc>,
    ) -> Option<CancellationRequest> {
        let tables = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .cancellations
            .values()
            .find(|r| r.meeting_id == *meeting_id && r.is_usable(now))
            .cloned()
    }

    /// Mark a token consumed. Errors if the token is unknown.
    pub fn mark_consumed(&self, token: &str, now: DateTime<Utc>) -> SyncResult<()> {
        let mut tables = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let request = tables
            .cancellations
            .get_mut(token)
            .ok_or(SyncError::InvalidToken)?;
        request.consumed_at = Some(now);
        self.persist(&tables)
    }

    /// Drop expired, unconsumed requests. Returns how many were removed.
    pub fn purge_expired_cancellations(&self, now: DateTime<Utc>) -> SyncResult<usize> {
        let mut tables = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = tables.cancellations.len();
        tables
            .cancellations
            .retain(|_, r| r.is_consumed() || !r.is_expired(now));
        let removed = before - tables.cancellations.len();
        if removed > 0 {
            self.persist(&tables)?;
        }
        Ok(removed)
    }
}
