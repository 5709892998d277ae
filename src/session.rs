//! Session and stream identifiers.
//!
//! Both are cheaply-clonable interned strings: they get copied into every
//! outbound frame and routing-table key, so `Arc<str>` avoids repeated
//! heap allocation compared to `String`.

use std::sync::Arc;

pub type SessionId = Arc<str>;
pub type StreamId = Arc<str>;

/// The sentinel stream id used for the standalone GET stream, matching the
/// `<streamId>_<uuid>` event id convention but without ambiguity against a
/// POST-request stream's randomly generated id.
pub const STANDALONE_STREAM_ID: &str = "_standalone_stream";

pub fn new_session_id() -> SessionId {
    Arc::from(uuid::Uuid::new_v4().to_string())
}

pub fn new_request_stream_id() -> StreamId {
    Arc::from(uuid::Uuid::new_v4().to_string())
}
