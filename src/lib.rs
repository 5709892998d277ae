//! A Streamable HTTP transport for bidirectional JSON-RPC: POST carries a
//! client request (answered by a JSON body, an SSE reply stream, or a bare
//! 202), GET opens a long-lived SSE stream for server-initiated messages,
//! and DELETE tears the session down.

mod config;
mod error;
mod event_store;
mod headers;
mod protocol;
mod registry;
mod session;
mod sse;
mod transport;

pub use config::{
    CliArgs, SessionIdGenerator, StreamableHttpTransportConfig, random_session_id_generator,
    stateless_session_id_generator,
};
pub use error::TransportError;
pub use event_store::{EventId, EventStore, EventStoreError, InMemoryEventStore};
pub use protocol::{Batch, ErrorObject, Message, MessageShapeError, RequestId, error_codes};
pub use session::{SessionId, StreamId};
pub use transport::{StreamableHttpTransport, TransportEvent};
