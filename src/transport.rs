//! The Streamable HTTP transport: an axum `Router` that terminates one
//! session's worth of bidirectional JSON-RPC traffic over plain HTTP.
//!
//! One [`StreamableHttpTransport`] owns exactly one session end to end; an
//! embedder juggling many clients runs one transport per session (see
//! `src/bin/demo.rs` for a minimal registry on top of this).

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{Stream, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::Instrument;

use crate::config::StreamableHttpTransportConfig;
use crate::error::TransportError;
use crate::event_store::EventId;
use crate::headers::{
    EVENT_STREAM_MIME, HEADER_LAST_EVENT_ID, HEADER_SESSION_ID, JSON_MIME, accept_lists,
    content_type_is_json,
};
use crate::protocol::{Batch, Message, RequestId};
use crate::registry::{Route, SessionRegistry};
use crate::session::{STANDALONE_STREAM_ID, SessionId, StreamId, new_request_stream_id};

/// A single inbound happening the upper protocol layer cares about. Stands
/// in for the reference transport's three callbacks (`onmessage`,
/// `onclose`, `onerror`), unified into one stream so a consumer drains one
/// channel instead of juggling three.
#[derive(Debug)]
pub enum TransportEvent {
    Message(Message),
    Error(String),
    Closed,
}

pub struct StreamableHttpTransport {
    config: StreamableHttpTransportConfig,
    registry: SessionRegistry,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
}

impl StreamableHttpTransport {
    /// Builds a transport and the receiving end of its event stream. The
    /// receiver is meant to be drained by exactly one consumer.
    pub fn new(
        config: StreamableHttpTransportConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            config,
            registry: SessionRegistry::new(),
            events_tx,
        });
        (transport, events_rx)
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.registry.session_id().await
    }

    /// Mounts the transport's POST/GET/DELETE handlers at `path`.
    pub fn router(self: &Arc<Self>, path: &str) -> Router {
        Router::new()
            .route(
                path,
                get(get_handler).post(post_handler).delete(delete_handler),
            )
            .with_state(self.clone())
    }

    /// Sends a server-initiated message, routed per the outbound router:
    /// replies go to the request stream waiting on their id; requests and
    /// notifications go to the standalone stream unless
    /// `related_request_id` says otherwise.
    pub async fn send(
        &self,
        message: Message,
        related_request_id: Option<&RequestId>,
    ) -> Result<(), TransportError> {
        if self.registry.is_closed().await {
            return Err(TransportError::Closed);
        }
        match self.registry.route_outbound(&message, related_request_id).await {
            Route::Stream(sender) => {
                let _ = sender.send(message);
                Ok(())
            }
            Route::Dropped => {
                self.report_error(format!(
                    "no open stream for outbound message {:?}",
                    message.id()
                ));
                Ok(())
            }
        }
    }

    /// Closes every open stream, invalidates the session, and fires
    /// [`TransportEvent::Closed`]. Idempotent.
    pub async fn close(&self) {
        if self.registry.close().await {
            let _ = self.events_tx.send(TransportEvent::Closed);
        }
    }

    fn emit(&self, message: Message) {
        let _ = self.events_tx.send(TransportEvent::Message(message));
    }

    fn report_error(&self, message: String) {
        tracing::warn!(%message, "transport error");
        let _ = self.events_tx.send(TransportEvent::Error(message));
    }
}

async fn post_handler(
    State(transport): State<Arc<StreamableHttpTransport>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_post(&transport, &headers, body)
        .instrument(tracing::debug_span!("streamable_http_post"))
        .await
        .unwrap_or_else(|error| error_response(&error))
}

async fn get_handler(
    State(transport): State<Arc<StreamableHttpTransport>>,
    headers: HeaderMap,
) -> Response {
    handle_get(&transport, &headers)
        .instrument(tracing::debug_span!("streamable_http_get"))
        .await
        .unwrap_or_else(|error| error_response(&error))
}

async fn delete_handler(
    State(transport): State<Arc<StreamableHttpTransport>>,
    headers: HeaderMap,
) -> Response {
    handle_delete(&transport, &headers)
        .instrument(tracing::debug_span!("streamable_http_delete"))
        .await
        .unwrap_or_else(|error| error_response(&error))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Validates the `mcp-session-id` header against the current session.
/// Called whenever the transport is configured as stateful, including
/// before `initialize` has run — a request arriving that early still has to
/// carry a header, it just can never match one yet, so it is rejected with
/// "missing" or "not found" same as any other bad header.
async fn check_session_header(
    transport: &StreamableHttpTransport,
    headers: &HeaderMap,
) -> Result<(), TransportError> {
    let Some(candidate) = header_str(headers, HEADER_SESSION_ID) else {
        return Err(TransportError::missing_session_id());
    };
    if transport.registry.matches_session(candidate).await {
        Ok(())
    } else {
        Err(TransportError::session_not_found(candidate))
    }
}

async fn handle_post(
    transport: &Arc<StreamableHttpTransport>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, TransportError> {
    if transport.registry.is_closed().await {
        return Err(TransportError::Closed);
    }

    let accept = header_str(headers, header::ACCEPT.as_str()).unwrap_or_default();
    if !accept_lists(accept, JSON_MIME) || !accept_lists(accept, EVENT_STREAM_MIME) {
        return Err(TransportError::not_acceptable(
            "both application/json and text/event-stream",
        ));
    }
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str()).unwrap_or_default();
    if !content_type_is_json(content_type) {
        return Err(TransportError::unsupported_media_type());
    }

    let value: Value = serde_json::from_slice(&body).map_err(|_| TransportError::parse_error())?;
    let batch: Batch =
        serde_json::from_value(value).map_err(|_| TransportError::invalid_message_shape())?;
    let messages = batch.into_messages();

    let init_count = messages.iter().filter(|m| m.is_initialize_request()).count();
    let is_initialize_batch = init_count > 0;

    if !is_initialize_batch && transport.config.stateful {
        check_session_header(transport, headers).await?;
    }

    if is_initialize_batch {
        if init_count > 1 {
            return Err(TransportError::only_one_initialize_request());
        }
        if transport.registry.is_initialized().await {
            return Err(TransportError::already_initialized());
        }
        let session_id = (transport.config.session_id_generator)();
        transport.registry.mark_initialized(session_id).await;
    } else if !transport.registry.is_initialized().await {
        return Err(TransportError::server_not_initialized());
    }

    let requests: Vec<RequestId> = messages
        .iter()
        .filter(|m| m.is_request())
        .map(|m| m.id().cloned().expect("request always has an id"))
        .collect();

    let session_header = transport.session_id().await;

    if requests.is_empty() {
        for message in messages {
            transport.emit(message);
        }
        let mut response = StatusCode::ACCEPTED.into_response();
        apply_session_header(&mut response, session_header);
        return Ok(response);
    }

    let stream_id = new_request_stream_id();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();
    transport
        .registry
        .open_request_stream(stream_id.clone(), requests.clone(), tx)
        .await;

    for message in messages {
        transport.emit(message);
    }

    if transport.config.enable_json_response {
        // Guards the buffering await below: if this handler future is
        // dropped mid-collect (client disconnect), the stream's pending ids
        // are still cleared instead of leaking in the registry.
        let _guard = RequestStreamGuard {
            transport: transport.clone(),
            stream_id: stream_id.clone(),
        };
        let replies: Vec<Message> = UnboundedReceiverStream::new(rx).collect().await;
        let body = if requests.len() > 1 {
            json!(replies)
        } else {
            serde_json::to_value(replies.into_iter().next()).unwrap_or(Value::Null)
        };
        let mut response = (StatusCode::OK, axum::Json(body)).into_response();
        apply_session_header(&mut response, session_header);
        Ok(response)
    } else {
        let sse_stream = request_stream_body(transport.clone(), stream_id, rx);
        let mut response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, EVENT_STREAM_MIME)
            .header(header::CACHE_CONTROL, "no-cache, no-transform")
            .header(header::CONNECTION, "keep-alive")
            .body(Body::from_stream(sse_stream))
            .expect("static response parts are valid");
        apply_session_header(&mut response, session_header);
        Ok(response)
    }
}

async fn handle_get(
    transport: &Arc<StreamableHttpTransport>,
    headers: &HeaderMap,
) -> Result<Response, TransportError> {
    if transport.registry.is_closed().await {
        return Err(TransportError::Closed);
    }

    let accept = header_str(headers, header::ACCEPT.as_str()).unwrap_or_default();
    if !accept_lists(accept, EVENT_STREAM_MIME) {
        return Err(TransportError::not_acceptable("text/event-stream"));
    }

    if transport.config.stateful {
        check_session_header(transport, headers).await?;
    }

    if transport.registry.has_standalone_stream().await {
        return Err(TransportError::standalone_stream_conflict());
    }

    let last_event_id = header_str(headers, HEADER_LAST_EVENT_ID);
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let (stream_id, replay) = match (last_event_id, &transport.config.event_store) {
        (Some(last_event_id), Some(store)) => store.replay_events_after(last_event_id).await?,
        _ => (StreamId::from(STANDALONE_STREAM_ID), Vec::new()),
    };

    transport
        .registry
        .open_standalone_stream(stream_id.clone(), tx)
        .await;

    let session_header = transport.session_id().await;
    let body_stream = standalone_stream_body(transport.clone(), stream_id, replay, rx);
    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, EVENT_STREAM_MIME)
        .header(header::CACHE_CONTROL, "no-cache, no-transform")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body_stream))
        .expect("static response parts are valid");
    apply_session_header(&mut response, session_header);
    Ok(response)
}

async fn handle_delete(
    transport: &Arc<StreamableHttpTransport>,
    headers: &HeaderMap,
) -> Result<Response, TransportError> {
    if transport.registry.is_closed().await {
        return Err(TransportError::Closed);
    }
    if transport.config.stateful {
        check_session_header(transport, headers).await?;
    }
    transport.close().await;
    Ok(StatusCode::OK.into_response())
}

struct RequestStreamGuard {
    transport: Arc<StreamableHttpTransport>,
    stream_id: StreamId,
}

impl Drop for RequestStreamGuard {
    fn drop(&mut self) {
        let transport = self.transport.clone();
        let stream_id = self.stream_id.clone();
        tokio::spawn(async move {
            transport.registry.abandon_request_stream(&stream_id).await;
        });
    }
}

struct StandaloneStreamGuard {
    transport: Arc<StreamableHttpTransport>,
}

impl Drop for StandaloneStreamGuard {
    fn drop(&mut self) {
        let transport = self.transport.clone();
        tokio::spawn(async move {
            transport.registry.close_standalone_stream().await;
        });
    }
}

/// Builds the SSE body for a request stream: every reply is framed without
/// an event id (request streams are not resumable, only the standalone
/// stream is), and the stream ends once the channel closes, which happens
/// as soon as every expected reply has been routed.
fn request_stream_body(
    transport: Arc<StreamableHttpTransport>,
    stream_id: StreamId,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let _guard = RequestStreamGuard { transport, stream_id };
        while let Some(message) = rx.recv().await {
            yield Ok(Bytes::from(crate::sse::format_frame(None, &message)));
        }
    }
}

fn standalone_stream_body(
    transport: Arc<StreamableHttpTransport>,
    stream_id: StreamId,
    replay: Vec<(EventId, Message)>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    async_stream::stream! {
        let _guard = StandaloneStreamGuard { transport: transport.clone() };
        for (event_id, message) in replay {
            yield Ok(Bytes::from(crate::sse::format_frame(Some(&event_id), &message)));
        }
        while let Some(message) = rx.recv().await {
            let event_id = match &transport.config.event_store {
                Some(store) => Some(store.store_event(stream_id.clone(), message.clone()).await),
                None => None,
            };
            yield Ok(Bytes::from(crate::sse::format_frame(event_id.as_deref(), &message)));
        }
    }
}

fn apply_session_header(response: &mut Response, session_id: Option<SessionId>) {
    if let Some(session_id) = session_id {
        if let Ok(value) = axum::http::HeaderValue::from_str(&session_id) {
            response.headers_mut().insert(HEADER_SESSION_ID, value);
        }
    }
}

fn error_response(error: &TransportError) -> Response {
    let status = error.status();
    let body = json!({
        "jsonrpc": "2.0",
        "error": {
            "code": error.json_rpc_code(),
            "message": error.client_message(),
        },
        "id": Value::Null,
    });
    (status, axum::Json(body)).into_response()
}
