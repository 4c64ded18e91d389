//! Tracking-signal generators.

use serde_json::json;

/// A bare tracking signal of the given type.
pub fn signal(kind: &str) -> serde_json::Value {
    json!({ "type": kind })
}

/// A page view on a specific path.
pub fn page_view(path: &str) -> serde_json::Value {
    json!({
        "type": "page_view",
        "path": path,
        "device": { "os": "macOS", "browser": "Firefox", "deviceType": "desktop" },
        "location": { "country": "DE", "region": "BE" }
    })
}

/// A page view linked to an existing session.
pub fn page_view_in_session(path: &str, session_id: &str) -> serde_json::Value {
    json!({
        "type": "page_view",
        "path": path,
        "sessionId": session_id
    })
}

/// A `session_end` signal for an existing session.
pub fn session_end(session_id: &str) -> serde_json::Value {
    json!({ "type": "session_end", "sessionId": session_id })
}

/// An admin-created synthetic event body.
pub fn synthetic_event(user_id: &str, path: &str) -> serde_json::Value {
    json!({
        "type": "click",
        "userId": user_id,
        "path": path
    })
}
