//! Provider-neutral booking types.
//!
//! A `Meeting` is the local record of a room booking. Each booked meeting is
//! linked to exactly one remote calendar event through `remote_event_ref`;
//! the coordinator is responsible for keeping the two sides in agreement.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A bookable room.
///
/// Robotics and Fluids are the rooms every deployment has; anything else
/// configured with its own calendar id comes through as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Room {
    Robotics,
    Fluids,
    Other(String),
}

impl Room {
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "Robotics Room" | "Robotics" | "robotics" => Room::Robotics,
            "Fluids Lab" | "Fluids" | "fluids" => Room::Fluids,
            other => Room::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Robotics => write!(f, "Robotics Room"),
            Room::Fluids => write!(f, "Fluids Lab"),
            Room::Other(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for Room {
    fn from(name: String) -> Self {
        Room::from_name(&name)
    }
}

impl From<Room> for String {
    fn from(room: Room) -> Self {
        room.to_string()
    }
}

/// Opaque reference to the remote calendar event backing a meeting.
///
/// The coordinator never inspects the contents; only the adapter that
/// created the event knows how to delete it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEventRef {
    pub calendar_id: String,
    pub event_id: String,
}

impl RemoteEventRef {
    pub fn new(calendar_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        RemoteEventRef {
            calendar_id: calendar_id.into(),
            event_id: event_id.into(),
        }
    }
}

impl fmt::Display for RemoteEventRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.calendar_id, self.event_id)
    }
}

/// Lifecycle state of a meeting.
///
/// `Booked -> CancelPending -> Cancelled` is the normal path; `Booked` is
/// also a terminal success state if the meeting is never cancelled.
/// `SyncFailed` records a booking whose remote event was never confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Booked,
    CancelPending,
    Cancelled,
    SyncFailed,
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetingStatus::Booked => "booked",
            MeetingStatus::CancelPending => "cancel_pending",
            MeetingStatus::Cancelled => "cancelled",
            MeetingStatus::SyncFailed => "sync_failed",
        };
        write!(f, "{s}")
    }
}

/// A local meeting record.
///
/// Invariant: `remote_event_ref` is `Some` iff `status` is `Booked` or
/// `CancelPending` (a record briefly violates this while a create call is
/// in flight, under the room's lock).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: Uuid,
    pub team_name: String,
    pub requester_email: String,
    pub room: Room,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub notes: Option<String>,
    pub status: MeetingStatus,
    pub created_at: DateTime<Utc>,
    /// Set when automatic reconciliation gave up on this record, e.g. a
    /// confirmed cancellation whose remote delete never went through. The
    /// status report counts flagged records until an operator clears them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_attention: Option<String>,
    // Kept last so the TOML snapshot serializes it as a trailing table.
    pub remote_event_ref: Option<RemoteEventRef>,
}

impl Meeting {
    /// Whether this meeting counts as occupying its slot for conflict checks.
    pub fn occupies_slot(&self) -> bool {
        matches!(
            self.status,
            MeetingStatus::Booked | MeetingStatus::CancelPending
        )
    }

    /// Half-open interval overlap: [start, end) against [self.start, self.end).
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }

    /// What the remote calendar event for this meeting should look like.
    pub fn event_draft(&self) -> EventDraft {
        let mut description = format!("Booked by {}", self.requester_email);
        if let Some(notes) = &self.notes {
            description.push_str("\n\n");
            description.push_str(notes);
        }

        EventDraft {
            room: self.room.clone(),
            start: self.start,
            end: self.end,
            title: format!("{} ({})", self.team_name, self.room),
            description: Some(description),
            attendees: vec![self.requester_email.clone()],
        }
    }
}

/// Provider-neutral description of a calendar event to create.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub room: Room,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub title: String,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn room_round_trips_through_display_names() {
        assert_eq!(Room::from_name("Robotics Room"), Room::Robotics);
        assert_eq!(Room::from_name("robotics"), Room::Robotics);
        assert_eq!(Room::from_name("Fluids Lab"), Room::Fluids);
        assert_eq!(
            Room::from_name("Design Studio"),
            Room::Other("Design Studio".to_string())
        );

        for room in [
            Room::Robotics,
            Room::Fluids,
            Room::Other("Design Studio".to_string()),
        ] {
            assert_eq!(Room::from_name(&room.to_string()), room);
        }
    }

    #[test]
    fn overlap_is_half_open() {
        let meeting = Meeting {
            id: Uuid::new_v4(),
            team_name: "Baja".to_string(),
            requester_email: "baja@example.edu".to_string(),
            room: Room::Robotics,
            start: Utc.with_ymd_and_hms(2026, 9, 1, 14, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 9, 1, 15, 0, 0).unwrap(),
            notes: None,
            status: MeetingStatus::Booked,
            needs_attention: None,
            remote_event_ref: None,
            created_at: Utc::now(),
        };

        // Back-to-back slots do not conflict.
        assert!(!meeting.overlaps(
            Utc.with_ymd_and_hms(2026, 9, 1, 15, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 16, 0, 0).unwrap(),
        ));
        assert!(!meeting.overlaps(
            Utc.with_ymd_and_hms(2026, 9, 1, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 14, 0, 0).unwrap(),
        ));

        // Any shared minute does.
        assert!(meeting.overlaps(
            Utc.with_ymd_and_hms(2026, 9, 1, 14, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 15, 30, 0).unwrap(),
        ));
        assert!(meeting.overlaps(
            Utc.with_ymd_and_hms(2026, 9, 1, 13, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 9, 1, 16, 0, 0).unwrap(),
        ));
    }

    #[test]
    fn draft_carries_requester_and_notes() {
        let mut meeting = Meeting {
            id: Uuid::new_v4(),
            team_name: "Baja".to_string(),
            requester_email: "baja@example.edu".to_string(),
            room: Room::Fluids,
            start: Utc::now(),
            end: Utc::now(),
            notes: Some("Bring the pump rig".to_string()),
            status: MeetingStatus::Booked,
            needs_attention: None,
            remote_event_ref: None,
            created_at: Utc::now(),
        };

        let draft = meeting.event_draft();
        assert_eq!(draft.title, "Baja (Fluids Lab)");
        assert_eq!(draft.attendees, vec!["baja@example.edu".to_string()]);
        let description = draft.description.unwrap();
        assert!(description.contains("baja@example.edu"));
        assert!(description.contains("Bring the pump rig"));

        meeting.notes = None;
        let draft = meeting.event_draft();
        assert!(!draft.description.unwrap().contains("pump rig"));
    }
}
