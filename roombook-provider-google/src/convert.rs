//! Draft-to-Google-event conversion.

use chrono_tz::Tz;
use roombook_core::meeting::EventDraft;
use serde_json::{Value, json};

/// Request body for `events.insert`.
///
/// Times are sent as RFC 3339 in the configured timezone, with the zone
/// name attached so Google renders the event in the room's local time.
pub fn event_payload(draft: &EventDraft, tz: &Tz) -> Value {
    let attendees: Vec<Value> = draft
        .attendees
        .iter()
        .map(|email| json!({ "email": email }))
        .collect();

    json!({
        "summary": draft.title,
        "description": draft.description,
        "start": {
            "dateTime": draft.start.with_timezone(tz).to_rfc3339(),
            "timeZone": tz.name(),
        },
        "end": {
            "dateTime": draft.end.with_timezone(tz).to_rfc3339(),
            "timeZone": tz.name(),
        },
        "attendees": attendees,
    })
}
