//! Cancellation confirmation tokens.
//!
//! Cancelling a booking is a two-step flow: the requester asks for a
//! cancellation, the admin confirms it by clicking an emailed link. The link
//! embeds a single-use, time-bounded token; a token that has been consumed
//! or has expired must never trigger a remote delete.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a confirmation link stays valid.
pub const TOKEN_TTL_HOURS: i64 = 72;

/// A pending cancellation, keyed by its confirmation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub meeting_id: Uuid,
    pub token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl CancellationRequest {
    /// Issue a fresh token for a meeting.
    pub fn issue(meeting_id: Uuid) -> Self {
        let now = Utc::now();
        CancellationRequest {
            meeting_id,
            token: Uuid::new_v4().simple().to_string(),
            issued_at: now,
            expires_at: now + Duration::hours(TOKEN_TTL_HOURS),
            consumed_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// A token authorizes a delete only while unconsumed and unexpired.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.is_consumed() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_usable_until_ttl() {
        let request = CancellationRequest::issue(Uuid::new_v4());
        let now = Utc::now();

        assert!(request.is_usable(now));
        assert!(request.is_usable(now + Duration::hours(TOKEN_TTL_HOURS - 1)));
        assert!(!request.is_usable(now + Duration::hours(TOKEN_TTL_HOURS + 1)));
    }

    #[test]
    fn consumed_token_is_never_usable() {
        let mut request = CancellationRequest::issue(Uuid::new_v4());
        request.consumed_at = Some(Utc::now());

        assert!(!request.is_usable(Utc::now()));
    }

    #[test]
    fn tokens_are_unique() {
        let meeting_id = Uuid::new_v4();
        let a = CancellationRequest::issue(meeting_id);
        let b = CancellationRequest::issue(meeting_id);
        assert_ne!(a.token, b.token);
    }
}
