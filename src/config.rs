//! Transport configuration, and the CLI/env surface used by the demo binary.

use std::sync::Arc;

use crate::event_store::EventStore;
use crate::session::SessionId;

/// Produces a fresh session id for a newly initialized session, or returns
/// `None` to run the transport in stateless mode (no session tracking, no
/// standalone stream, no resumability).
pub type SessionIdGenerator = Arc<dyn Fn() -> Option<SessionId> + Send + Sync>;

pub fn random_session_id_generator() -> SessionIdGenerator {
    Arc::new(|| Some(crate::session::new_session_id()))
}

pub fn stateless_session_id_generator() -> SessionIdGenerator {
    Arc::new(|| None)
}

/// Configuration for a single [`crate::transport::StreamableHttpTransport`]
/// instance, which owns at most one session end to end.
#[derive(Clone)]
pub struct StreamableHttpTransportConfig {
    /// How (or whether) to mint a session id on `initialize`.
    pub session_id_generator: SessionIdGenerator,
    /// Whether this transport tracks a session at all. Must agree with
    /// `session_id_generator` (`false` iff the generator always yields
    /// `None`) — kept as its own field, rather than derived by probing the
    /// generator, so the dispatcher can gate session-header checks before
    /// `initialize` has ever run the generator.
    pub stateful: bool,
    /// When `true`, a POST whose replies are all available before the
    /// handler returns is answered with a single `application/json` body
    /// instead of an SSE stream.
    pub enable_json_response: bool,
    /// When set, outbound messages are recorded so a dropped SSE connection
    /// can resume with `Last-Event-ID`. Required for resumability; without
    /// it, `Last-Event-ID` is rejected.
    pub event_store: Option<Arc<dyn EventStore>>,
}

impl Default for StreamableHttpTransportConfig {
    fn default() -> Self {
        Self {
            session_id_generator: random_session_id_generator(),
            stateful: true,
            enable_json_response: false,
            event_store: None,
        }
    }
}

impl std::fmt::Debug for StreamableHttpTransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamableHttpTransportConfig")
            .field("enable_json_response", &self.enable_json_response)
            .field("stateful", &self.stateful)
            .field("resumable", &self.event_store.is_some())
            .finish_non_exhaustive()
    }
}

/// Command-line configuration for the demo binary. Every flag can also be
/// supplied as an environment variable (e.g. `MCP_HTTP_BIND`), which is
/// convenient for container deployments that prefer env config over flags.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "streamable-http-demo", about = "Streamable HTTP transport demo server")]
pub struct CliArgs {
    /// Address to bind the HTTP listener to.
    #[arg(long, env = "MCP_HTTP_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Path the transport is mounted at.
    #[arg(long, env = "MCP_HTTP_PATH", default_value = "/mcp")]
    pub path: String,

    /// Run without session tracking (no `Mcp-Session-Id`, no resumability).
    #[arg(long, env = "MCP_HTTP_STATELESS", default_value_t = false)]
    pub stateless: bool,

    /// Answer POSTs with a single JSON body instead of SSE when possible.
    #[arg(long, env = "MCP_HTTP_JSON_RESPONSE", default_value_t = false)]
    pub json_response: bool,

    /// Log verbosity, forwarded to `RUST_LOG`-style filtering.
    #[arg(long, env = "MCP_HTTP_LOG", default_value = "info")]
    pub log: String,
}
