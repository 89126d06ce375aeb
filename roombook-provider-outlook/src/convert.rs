//! Draft-to-Graph-event conversion.

use chrono_tz::Tz;
use roombook_core::meeting::EventDraft;
use serde_json::{Value, json};

/// Graph wants local wall-clock times with the zone name in a separate
/// field, not an offset-bearing RFC 3339 string.
const GRAPH_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

/// Request body for creating an event in a mailbox calendar.
pub fn event_payload(draft: &EventDraft, tz: &Tz) -> Value {
    let attendees: Vec<Value> = draft
        .attendees
        .iter()
        .map(|email| {
            json!({
                "emailAddress": { "address": email },
                "type": "required",
            })
        })
        .collect();

    json!({
        "subject": draft.title,
        "body": {
            "contentType": "text",
            "content": draft.description.clone().unwrap_or_default(),
        },
        "start": {
            "dateTime": draft.start.with_timezone(tz).format(GRAPH_DATETIME).to_string(),
            "timeZone": tz.name(),
        },
        "end": {
            "dateTime": draft.end.with_timezone(tz).format(GRAPH_DATETIME).to_string(),
            "timeZone": tz.name(),
        },
        "attendees": attendees,
    })
}
