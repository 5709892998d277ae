//! A minimal single-session server exercising the transport: it answers
//! `initialize` and one toy tool, `greet`. Running more than one client
//! concurrently is out of scope here — an embedder that needs that mints
//! one [`StreamableHttpTransport`] per session and fans requests out by
//! `Mcp-Session-Id` before reaching this layer.

use std::sync::Arc;

use clap::Parser;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use streamable_http_transport::{
    CliArgs, ErrorObject, InMemoryEventStore, Message, RequestId, StreamableHttpTransport,
    StreamableHttpTransportConfig, TransportEvent, random_session_id_generator,
    stateless_session_id_generator,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(cli.log.clone()))
        .init();

    let session_id_generator = if cli.stateless {
        stateless_session_id_generator()
    } else {
        random_session_id_generator()
    };

    let config = StreamableHttpTransportConfig {
        session_id_generator,
        stateful: !cli.stateless,
        enable_json_response: cli.json_response,
        event_store: Some(Arc::new(InMemoryEventStore::new())),
    };

    let (transport, events) = StreamableHttpTransport::new(config);
    tokio::spawn(run_server(transport.clone(), events));

    let app = transport.router(&cli.path);
    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!(bind = %cli.bind, path = %cli.path, "streamable HTTP demo listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

async fn run_server(
    transport: Arc<StreamableHttpTransport>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Message(message) => handle_message(&transport, message).await,
            TransportEvent::Error(message) => {
                tracing::warn!(%message, "transport reported an error");
            }
            TransportEvent::Closed => {
                tracing::info!("session closed");
                break;
            }
        }
    }
}

async fn handle_message(transport: &Arc<StreamableHttpTransport>, message: Message) {
    let Message::Request { id, method, params } = message else {
        // Notifications and client-sent responses don't expect a reply.
        return;
    };
    let reply = match method.as_str() {
        "initialize" => Message::response_result(id, initialize_result()),
        "tools/call" => handle_tool_call(id, params),
        other => Message::response_error(
            id,
            ErrorObject::new(-32601, format!("method not found: {other}")),
        ),
    };
    if let Err(error) = transport.send(reply, None).await {
        tracing::warn!(%error, "failed to deliver reply");
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2025-03-26",
        "serverInfo": { "name": "streamable-http-demo", "version": env!("CARGO_PKG_VERSION") },
        "capabilities": { "tools": {} },
    })
}

fn handle_tool_call(id: RequestId, params: Option<Value>) -> Message {
    let tool_name = params.as_ref().and_then(|p| p.get("name")).and_then(Value::as_str);
    match tool_name {
        Some("greet") => {
            let name = params
                .as_ref()
                .and_then(|p| p.get("arguments"))
                .and_then(|a| a.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("world");
            Message::response_result(
                id,
                json!({ "content": [{ "type": "text", "text": greeting(name) }] }),
            )
        }
        _ => Message::response_error(id, ErrorObject::new(-32602, "unknown tool")),
    }
}

fn greeting(name: &str) -> String {
    const TEMPLATES: [&str; 3] = ["Hello, {name}!", "Hi, {name}!", "Hey, {name}!"];
    let template = TEMPLATES[rand::random::<u32>() as usize % TEMPLATES.len()];
    template.replace("{name}", name)
}
