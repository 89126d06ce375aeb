//! Core types and orchestration for the roombook ecosystem.
//!
//! This crate provides everything shared by the server and the calendar
//! provider adapters:
//! - `Meeting` and related types for local booking records
//! - the `CalendarProvider` contract implemented by each vendor adapter
//! - the `BookingCoordinator` that keeps a local meeting record and its
//!   remote calendar event in agreement across partial failures

pub mod config;
pub mod coordinator;
pub mod error;
pub mod meeting;
pub mod notify;
pub mod provider;
pub mod retry;
pub mod session;
pub mod status;
pub mod store;
pub mod token;

// Re-export the types almost every consumer needs at crate root.
pub use config::{Config, ProviderConfig, SmtpConfig, Vendor};
pub use coordinator::{BookingCoordinator, BookingRequest};
pub use error::{SyncError, SyncResult};
pub use meeting::{EventDraft, Meeting, MeetingStatus, RemoteEventRef, Room};
pub use provider::{CalendarProvider, DeleteOutcome};
