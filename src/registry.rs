//! Session-scoped bookkeeping: which HTTP response a given outbound message
//! belongs on.
//!
//! Grounded on the reference transport's per-session routing table, which
//! keeps one entry per in-flight request id pointing at the response stream
//! that should receive its reply, plus a single slot for the standalone
//! push stream. Collapsed here into one state struct behind one lock, since
//! the reference implementation itself notes that fine-grained locking
//! brings no correctness benefit over a single coarse lock.

use std::collections::{HashMap, HashSet};

use tokio::sync::{Mutex, mpsc};

use crate::protocol::{Message, RequestId};
use crate::session::{SessionId, StreamId};

/// Where an outbound message should be written.
pub enum Route {
    /// Write to the request stream identified here.
    Stream(mpsc::UnboundedSender<Message>),
    /// No stream is available to carry the message.
    Dropped,
}

struct RequestStreamEntry {
    pending: HashSet<RequestId>,
    sender: mpsc::UnboundedSender<Message>,
}

struct StandaloneStream {
    stream_id: StreamId,
    sender: mpsc::UnboundedSender<Message>,
}

struct Inner {
    session_id: Option<SessionId>,
    initialized: bool,
    closed: bool,
    standalone: Option<StandaloneStream>,
    request_streams: HashMap<StreamId, RequestStreamEntry>,
    request_owner: HashMap<RequestId, StreamId>,
}

/// All per-session mutable state the dispatcher needs, behind one lock.
pub struct SessionRegistry {
    inner: Mutex<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                session_id: None,
                initialized: false,
                closed: false,
                standalone: None,
                request_streams: HashMap::new(),
                request_owner: HashMap::new(),
            }),
        }
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.lock().await.session_id.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.initialized
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    pub async fn mark_initialized(&self, session_id: Option<SessionId>) {
        let mut inner = self.inner.lock().await;
        inner.initialized = true;
        inner.session_id = session_id;
    }

    pub async fn matches_session(&self, candidate: &str) -> bool {
        match &self.inner.lock().await.session_id {
            Some(current) => current.as_ref() == candidate,
            None => false,
        }
    }

    pub async fn has_standalone_stream(&self) -> bool {
        self.inner.lock().await.standalone.is_some()
    }

    /// Registers a freshly opened standalone stream. The caller is
    /// responsible for first checking `has_standalone_stream`.
    pub async fn open_standalone_stream(
        &self,
        stream_id: StreamId,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut inner = self.inner.lock().await;
        inner.standalone = Some(StandaloneStream { stream_id, sender });
    }

    pub async fn close_standalone_stream(&self) {
        self.inner.lock().await.standalone = None;
    }

    /// Registers a new request stream carrying replies for `ids`.
    pub async fn open_request_stream(
        &self,
        stream_id: StreamId,
        ids: Vec<RequestId>,
        sender: mpsc::UnboundedSender<Message>,
    ) {
        let mut inner = self.inner.lock().await;
        for id in &ids {
            inner.request_owner.insert(id.clone(), stream_id.clone());
        }
        inner.request_streams.insert(
            stream_id,
            RequestStreamEntry {
                pending: ids.into_iter().collect(),
                sender,
            },
        );
    }

    /// Drops a request stream and its pending ids without sending anything
    /// further on it, e.g. on client disconnect.
    pub async fn abandon_request_stream(&self, stream_id: &StreamId) {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.request_streams.remove(stream_id) {
            for id in entry.pending {
                inner.request_owner.remove(&id);
            }
        }
    }

    /// Routes `message` to the stream that should carry it, per the
    /// outbound router's classification rules, and updates bookkeeping
    /// (removing satisfied request ids, closing streams once drained).
    pub async fn route_outbound(
        &self,
        message: &Message,
        related_request_id: Option<&RequestId>,
    ) -> Route {
        let mut inner = self.inner.lock().await;

        if let Some(related) = related_request_id {
            if let Some(stream_id) = inner.request_owner.get(related).cloned() {
                if let Some(entry) = inner.request_streams.get(&stream_id) {
                    return Route::Stream(entry.sender.clone());
                }
            }
        }

        match message {
            Message::Response { id, .. } => {
                let Some(stream_id) = inner.request_owner.get(id).cloned() else {
                    return Route::Dropped;
                };
                let route = inner
                    .request_streams
                    .get(&stream_id)
                    .map(|entry| Route::Stream(entry.sender.clone()))
                    .unwrap_or(Route::Dropped);

                if let Some(entry) = inner.request_streams.get_mut(&stream_id) {
                    entry.pending.remove(id);
                    if entry.pending.is_empty() {
                        inner.request_streams.remove(&stream_id);
                    }
                }
                inner.request_owner.remove(id);
                route
            }
            Message::Request { .. } | Message::Notification { .. } => inner
                .standalone
                .as_ref()
                .map(|standalone| Route::Stream(standalone.sender.clone()))
                .unwrap_or(Route::Dropped),
        }
    }

    /// Closes everything: every open stream's sender is dropped (ending its
    /// HTTP response), the session is invalidated, and further dispatch is
    /// rejected.
    pub async fn close(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }
        inner.closed = true;
        inner.standalone = None;
        inner.request_streams.clear();
        inner.request_owner.clear();
        true
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(id: i64) -> Message {
        Message::response_result(RequestId::Number(id), json!({}))
    }

    #[tokio::test]
    async fn response_routes_to_owning_stream_and_drains_pending() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream_id: StreamId = std::sync::Arc::from("s1");
        registry
            .open_request_stream(
                stream_id.clone(),
                vec![RequestId::Number(1), RequestId::Number(2)],
                tx,
            )
            .await;

        match registry.route_outbound(&response(1), None).await {
            Route::Stream(sender) => sender.send(response(1)).unwrap(),
            Route::Dropped => panic!("expected a stream"),
        }
        assert!(rx.recv().await.is_some());

        // second id still pending: stream must still exist
        match registry.route_outbound(&response(2), None).await {
            Route::Stream(sender) => sender.send(response(2)).unwrap(),
            Route::Dropped => panic!("expected a stream"),
        }
        assert!(rx.recv().await.is_some());

        // both ids satisfied: the sender was dropped, closing the channel
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn response_with_unknown_id_is_dropped() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.route_outbound(&response(99), None).await,
            Route::Dropped
        ));
    }

    #[tokio::test]
    async fn notification_with_no_standalone_stream_is_dropped() {
        let registry = SessionRegistry::new();
        let notification = Message::notification("ping", None);
        assert!(matches!(
            registry.route_outbound(&notification, None).await,
            Route::Dropped
        ));
    }

    #[tokio::test]
    async fn notification_routes_to_standalone_stream() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .open_standalone_stream(std::sync::Arc::from("_standalone_stream"), tx)
            .await;
        let notification = Message::notification("ping", None);
        match registry.route_outbound(&notification, None).await {
            Route::Stream(sender) => sender.send(notification).unwrap(),
            Route::Dropped => panic!("expected the standalone stream"),
        }
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn related_request_id_overrides_default_routing() {
        let registry = SessionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let stream_id: StreamId = std::sync::Arc::from("s1");
        registry
            .open_request_stream(stream_id, vec![RequestId::Number(1)], tx)
            .await;

        let progress = Message::notification("progress", None);
        match registry
            .route_outbound(&progress, Some(&RequestId::Number(1)))
            .await
        {
            Route::Stream(sender) => sender.send(progress).unwrap(),
            Route::Dropped => panic!("expected the related request's stream"),
        }
        assert!(rx.recv().await.is_some());
    }
}
