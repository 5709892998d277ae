//! Resumable delivery support: an append-only log of outbound messages keyed
//! by stream, so a dropped SSE connection can be resumed with `Last-Event-ID`.

use tokio::sync::Mutex;

use crate::protocol::Message;
use crate::session::StreamId;

pub type EventId = String;

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("event id {0} is unknown")]
    UnknownEventId(String),
}

/// Storage for events written to a stream, used to replay everything a
/// client missed after reconnecting with `Last-Event-ID`.
///
/// Grounded on the outbound bookkeeping in the reference session type, but
/// expressed as a trait over an ordered replay rather than a callback, since
/// that is the more natural async-Rust shape for "give me everything after
/// this point".
#[async_trait::async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Records `message` as having been sent on `stream_id` and returns the
    /// event id to attach to its SSE frame.
    async fn store_event(&self, stream_id: StreamId, message: Message) -> EventId;

    /// Returns the stream that produced `last_event_id`, plus every event
    /// recorded on that stream strictly after it, in original order.
    async fn replay_events_after(
        &self,
        last_event_id: &str,
    ) -> Result<(StreamId, Vec<(EventId, Message)>), EventStoreError>;
}

struct Entry {
    event_id: EventId,
    stream_id: StreamId,
    message: Message,
}

#[derive(Default)]
struct Log {
    entries: Vec<Entry>,
}

/// The reference [`EventStore`]: an in-process, unbounded log. Suitable for
/// a single server instance; a real deployment spanning multiple processes
/// would back this with shared storage instead.
pub struct InMemoryEventStore {
    log: Mutex<Log>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self {
            log: Mutex::new(Log::default()),
        }
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn store_event(&self, stream_id: StreamId, message: Message) -> EventId {
        let event_id = format!("{stream_id}_{}", uuid::Uuid::new_v4());
        let mut log = self.log.lock().await;
        log.entries.push(Entry {
            event_id: event_id.clone(),
            stream_id,
            message,
        });
        event_id
    }

    async fn replay_events_after(
        &self,
        last_event_id: &str,
    ) -> Result<(StreamId, Vec<(EventId, Message)>), EventStoreError> {
        let log = self.log.lock().await;
        let position = log
            .entries
            .iter()
            .position(|entry| entry.event_id == last_event_id)
            .ok_or_else(|| EventStoreError::UnknownEventId(last_event_id.to_string()))?;
        let stream_id = log.entries[position].stream_id.clone();
        let replay = log.entries[position + 1..]
            .iter()
            .filter(|entry| entry.stream_id == stream_id)
            .map(|entry| (entry.event_id.clone(), entry.message.clone()))
            .collect();
        Ok((stream_id, replay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn notification(tag: &str) -> Message {
        Message::notification(tag.to_string(), None)
    }

    #[tokio::test]
    async fn replay_returns_only_later_events_on_the_same_stream() {
        let store = InMemoryEventStore::new();
        let stream: StreamId = Arc::from("stream-a");
        let other: StreamId = Arc::from("stream-b");

        let e1 = store.store_event(stream.clone(), notification("a1")).await;
        store.store_event(other.clone(), notification("b1")).await;
        let e2 = store.store_event(stream.clone(), notification("a2")).await;
        let e3 = store.store_event(stream.clone(), notification("a3")).await;

        let (resumed_stream, events) = store.replay_events_after(&e1).await.unwrap();
        assert_eq!(resumed_stream, stream);
        let ids: Vec<_> = events.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(ids, vec![e2, e3]);
    }

    #[tokio::test]
    async fn replay_of_last_known_event_yields_nothing_new() {
        let store = InMemoryEventStore::new();
        let stream: StreamId = Arc::from("stream-a");
        let e1 = store.store_event(stream.clone(), notification("a1")).await;
        let (_, events) = store.replay_events_after(&e1).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn replay_of_unknown_event_id_errors() {
        let store = InMemoryEventStore::new();
        let err = store.replay_events_after("bogus").await.unwrap_err();
        assert!(matches!(err, EventStoreError::UnknownEventId(id) if id == "bogus"));
    }
}
