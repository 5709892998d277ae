//! Error types for the transport, and their mapping onto HTTP status codes
//! and JSON-RPC error codes. Every row of the HTTP/JSON-RPC mapping table
//! has exactly one constructor here, so there is only one place that knows
//! what status+code+message a given rejection produces.

use http::StatusCode;

use crate::protocol::error_codes;

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    pub status: StatusCode,
    pub code: i64,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("transport is closed")]
    Closed,
    #[error(transparent)]
    EventStore(#[from] crate::event_store::EventStoreError),
}

impl TransportError {
    pub fn status(&self) -> StatusCode {
        match self {
            TransportError::Protocol(err) => err.status,
            TransportError::Closed => StatusCode::SERVICE_UNAVAILABLE,
            TransportError::EventStore(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn json_rpc_code(&self) -> i64 {
        match self {
            TransportError::Protocol(err) => err.code,
            TransportError::Closed => error_codes::SERVER_ERROR,
            TransportError::EventStore(_) => error_codes::SERVER_ERROR,
        }
    }

    pub fn client_message(&self) -> String {
        match self {
            TransportError::Protocol(err) => err.message.clone(),
            TransportError::Closed => "Transport closed".to_string(),
            TransportError::EventStore(err) => err.to_string(),
        }
    }

    fn protocol(status: StatusCode, code: i64, message: impl Into<String>) -> Self {
        ProtocolError {
            status,
            code,
            message: message.into(),
        }
        .into()
    }

    pub fn parse_error() -> Self {
        Self::protocol(StatusCode::BAD_REQUEST, error_codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_message_shape() -> Self {
        Self::protocol(StatusCode::BAD_REQUEST, error_codes::INVALID_REQUEST, "Invalid Request")
    }

    pub fn only_one_initialize_request() -> Self {
        Self::protocol(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_REQUEST,
            "Only one initialization request is allowed",
        )
    }

    pub fn already_initialized() -> Self {
        Self::protocol(
            StatusCode::BAD_REQUEST,
            error_codes::INVALID_REQUEST,
            "Server already initialized",
        )
    }

    pub fn missing_session_id() -> Self {
        Self::protocol(StatusCode::BAD_REQUEST, error_codes::SERVER_ERROR, "Bad Request")
    }

    pub fn session_not_found(_session_id: &str) -> Self {
        Self::protocol(
            StatusCode::NOT_FOUND,
            error_codes::SESSION_NOT_FOUND,
            "Session not found",
        )
    }

    pub fn server_not_initialized() -> Self {
        Self::protocol(
            StatusCode::BAD_REQUEST,
            error_codes::SERVER_ERROR,
            "Server not initialized",
        )
    }

    pub fn not_acceptable(required: &str) -> Self {
        Self::protocol(
            StatusCode::NOT_ACCEPTABLE,
            error_codes::SERVER_ERROR,
            format!("Client must accept {required}"),
        )
    }

    pub fn unsupported_media_type() -> Self {
        Self::protocol(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            error_codes::SERVER_ERROR,
            "Content-Type must be application/json",
        )
    }

    pub fn standalone_stream_conflict() -> Self {
        Self::protocol(
            StatusCode::CONFLICT,
            error_codes::SERVER_ERROR,
            "Only one SSE stream is allowed per session",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_not_found_maps_to_404_and_dash_32001() {
        let err = TransportError::session_not_found("abc");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.json_rpc_code(), error_codes::SESSION_NOT_FOUND);
    }

    #[test]
    fn standalone_conflict_maps_to_409() {
        let err = TransportError::standalone_stream_conflict();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.client_message(), "Only one SSE stream is allowed per session");
    }

    #[test]
    fn not_acceptable_maps_to_406() {
        let err = TransportError::not_acceptable("text/event-stream");
        assert_eq!(err.status(), StatusCode::NOT_ACCEPTABLE);
        assert!(err.client_message().contains("text/event-stream"));
    }

    #[test]
    fn already_initialized_maps_to_400_and_dash_32600() {
        let err = TransportError::already_initialized();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.json_rpc_code(), error_codes::INVALID_REQUEST);
    }
}
