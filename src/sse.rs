//! Wire framing for the Server-Sent Events stream: `id:`/`data:` lines only.
//! No `event:` field and no keep-alive comments are ever emitted; a client
//! sees exactly the JSON-RPC traffic the transport is asked to forward.

use crate::protocol::Message;

/// Renders one SSE frame for `message`, attaching `event_id` when present.
///
/// `event_id` is `None` whenever no event store is configured, per the
/// resumability contract: an id is only worth sending if a client could
/// later use it to resume.
pub fn format_frame(event_id: Option<&str>, message: &Message) -> String {
    let data = serde_json::to_string(message).expect("Message always serializes");
    let mut frame = String::with_capacity(data.len() + 32);
    if let Some(id) = event_id {
        frame.push_str("id: ");
        frame.push_str(id);
        frame.push('\n');
    }
    frame.push_str("data: ");
    frame.push_str(&data);
    frame.push_str("\n\n");
    frame
}
