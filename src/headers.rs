//! HTTP header and media-type constants shared by the dispatcher.

pub const HEADER_SESSION_ID: &str = "mcp-session-id";
pub const HEADER_LAST_EVENT_ID: &str = "last-event-id";

pub const JSON_MIME: &str = "application/json";
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

pub fn accept_lists(accept: &str, mime: &str) -> bool {
    accept.split(',').any(|part| part.trim().starts_with(mime))
}

pub fn content_type_is_json(content_type: &str) -> bool {
    content_type.trim_start().starts_with(JSON_MIME)
}
