//! Notification boundary.
//!
//! The coordinator only needs "send this email" and "is the transport
//! reachable"; the actual SMTP wiring lives in the server binary so the
//! core stays testable with a recording fake.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::meeting::Meeting;

#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Deliver one email. Fails with `DeliveryFailed` on transport errors.
    async fn send(&self, to: &str, subject: &str, body: &str) -> SyncResult<()>;

    /// Lightweight connectivity check for diagnostics. No mail is sent.
    async fn healthcheck(&self) -> SyncResult<()>;
}

/// Build the cancellation-approval email for a meeting.
///
/// The embedded link authorizes exactly one remote delete; resending the
/// email reuses the same token rather than minting a new one.
pub fn cancellation_email(meeting: &Meeting, token: &str, base_url: &str) -> (String, String) {
    let subject = format!(
        "Cancellation requested: {} in {}",
        meeting.team_name, meeting.room
    );

    let link = format!(
        "{}/cancel/confirm?token={}",
        base_url.trim_end_matches('/'),
        token
    );

    let body = format!(
        "A cancellation was requested for the following booking:\n\n\
         Team: {}\n\
         Room: {}\n\
         Start: {}\n\
         End: {}\n\
         Requested by: {}\n\n\
         To approve the cancellation and remove the calendar event, open:\n\n\
         {}\n\n\
         The link is single-use and expires after 72 hours. If you did not\n\
         expect this request, you can ignore this email.",
        meeting.team_name,
        meeting.room,
        meeting.start.to_rfc3339(),
        meeting.end.to_rfc3339(),
        meeting.requester_email,
        link,
    );

    (subject, body)
}
