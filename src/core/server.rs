/// MCP Server Transports
///
/// This module wires the dispatcher to its transports:
/// - HTTP (Actix Web): `GET /sse` keep-alive stream, single-frame POST replies,
///   REST webhook facade, info/health/metrics endpoints
/// - STDIO: line-delimited JSON-RPC on stdin/stdout
///
/// Every adapter writes exactly one reply per request and never lets a
/// failure escape without one.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use actix_web::dev::Extensions;
use actix_web::http::{StatusCode, header};
use actix_web::{
    App, HttpRequest, HttpResponse, HttpServer, Result, web,
    middleware::{Compress, DefaultHeaders, Logger},
};
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

use crate::core::config::Config;
use crate::core::dispatcher::{Dispatcher, ServerInfo};
use crate::core::error::CallError;
use crate::core::protocol::{INVALID_REQUEST, MCPRequest, MCPResponse};
use crate::core::registry::ToolRegistry;
use crate::core::session::{PeerClosed, SessionTracker, watch_peer};
use crate::tools;
use crate::tools::source::http_client;

/// Largest POST body read by the message and REST adapters.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state shared across all worker threads in HTTP mode.
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub sessions: Arc<SessionTracker>,
    pub keepalive: Duration,
    /// Protocol messages received over HTTP since start-up.
    pub requests: AtomicU64,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, keepalive: Duration) -> Self {
        Self {
            dispatcher,
            sessions: Arc::new(SessionTracker::new()),
            keepalive,
            requests: AtomicU64::new(0),
        }
    }
}

/// Build the registry with every tool bound to its remote table.
pub fn initialize_tools(config: &Config) -> std::result::Result<Arc<ToolRegistry>, reqwest::Error> {
    let client = http_client(config.upstream_timeout)?;
    let mut registry = ToolRegistry::new();
    tools::register_all(&mut registry, &config.tables, client);
    Ok(Arc::new(registry))
}

pub fn build_dispatcher(config: &Config) -> std::result::Result<Dispatcher, reqwest::Error> {
    let registry = initialize_tools(config)?;
    Ok(Dispatcher::new(
        ServerInfo {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
        },
        registry,
    ))
}

/// Register all HTTP routes. The REST facade is optional.
pub fn routes(cfg: &mut web::ServiceConfig, rest_facade: bool) {
    cfg.route("/", web::get().to(info))
        .route("/", web::post().to(message))
        .route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics))
        .route("/sse", web::get().to(open_stream))
        .route("/sse", web::post().to(message))
        .route("/messages", web::post().to(message))
        .route("/mcp", web::post().to(message));
    if rest_facade {
        cfg.route("/tools/{name}", web::post().to(rest_tool));
    }
    cfg.route(
        "/{tail:.*}",
        web::method(actix_web::http::Method::OPTIONS).to(preflight),
    );
}

fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS, DELETE"))
        .add((
            "Access-Control-Allow-Headers",
            "Content-Type, Accept, Mcp-Session-Id, MCP-Protocol-Version",
        ))
        .add(("X-Content-Type-Options", "nosniff"))
}

/// Server info endpoint.
async fn info(state: web::Data<AppState>) -> Result<HttpResponse> {
    let server = state.dispatcher.info();
    Ok(HttpResponse::Ok().json(json!({
        "name": server.name,
        "version": server.version,
        "status": "running",
        "protocol": "MCP Streamable HTTP",
        "endpoint": "/sse",
        "tools": state.dispatcher.registry().names(),
        "activeStreams": state.sessions.active()
    })))
}

/// Liveness check.
async fn health(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": state.dispatcher.info().name
    })))
}

async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "requests_total": state.requests.load(Ordering::Relaxed),
        "active_streams": state.sessions.active(),
        "status": "ok"
    })))
}

async fn preflight() -> HttpResponse {
    HttpResponse::Ok().finish()
}

/// `on_connect` hook: attach a close signal to every TCP connection.
fn track_connection(conn: &dyn Any, ext: &mut Extensions) {
    let Some(tcp) = conn.downcast_ref::<actix_web::rt::net::TcpStream>() else {
        return;
    };
    match watch_peer(tcp) {
        Ok(closed) => {
            ext.insert(closed);
        }
        Err(e) => tracing::debug!(error = %e, "connection not watched for close"),
    }
}

/// Open the SSE keep-alive stream.
///
/// The body is a `SessionStream`. It ends as soon as the connection's close
/// signal fires, and actix drops it, which cancels the keep-alive timer.
async fn open_stream(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let closed = req.conn_data::<PeerClosed>().cloned();
    let stream = state.sessions.open(state.keepalive, closed);
    tracing::debug!(session = stream.id(), interval = ?state.keepalive, "streaming keep-alives");
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        // Keep Compress from buffering the stream.
        .insert_header((header::CONTENT_ENCODING, "identity"))
        .insert_header(("x-accel-buffering", "no"))
        .streaming(stream)
}

enum BodyError {
    TooLarge,
    Read(String),
}

impl BodyError {
    fn message(&self) -> String {
        match self {
            BodyError::TooLarge => format!("Request body exceeds {} bytes", MAX_BODY_BYTES),
            BodyError::Read(e) => format!("Request body error: {}", e),
        }
    }
}

/// Collect a request body, refusing anything over `MAX_BODY_BYTES`.
async fn read_body(mut payload: web::Payload) -> std::result::Result<Bytes, BodyError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| BodyError::Read(e.to_string()))?;
        if body.len() + chunk.len() > MAX_BODY_BYTES {
            return Err(BodyError::TooLarge);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

/// Request/response adapter: one JSON-RPC message in, one `data:` frame out.
async fn message(state: web::Data<AppState>, payload: web::Payload) -> HttpResponse {
    state.requests.fetch_add(1, Ordering::Relaxed);

    let response = match read_body(payload).await {
        Ok(body) => match MCPRequest::decode(&body) {
            Ok(req) => state.dispatcher.dispatch(req).await,
            Err(reply) => {
                tracing::debug!(error = ?reply.error, "rejected undecodable message");
                reply
            }
        },
        Err(e) => {
            tracing::warn!(error = %e.message(), "rejected request body");
            MCPResponse::failure(None, INVALID_REQUEST, e.message())
        }
    };
    sse_reply(&response)
}

fn sse_reply(response: &MCPResponse) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(header::CacheControl(vec![header::CacheDirective::NoCache]))
        .insert_header(("x-accel-buffering", "no"))
        .body(response.to_sse_frame())
}

/// REST webhook facade: raw tool arguments in, `{success, data|error}` out.
async fn rest_tool(
    state: web::Data<AppState>,
    name: web::Path<String>,
    payload: web::Payload,
) -> HttpResponse {
    let body = match read_body(payload).await {
        Ok(body) => body,
        Err(e @ BodyError::TooLarge) => {
            return rest_reply(StatusCode::PAYLOAD_TOO_LARGE, false, "error", e.message());
        }
        Err(e) => return rest_reply(StatusCode::BAD_REQUEST, false, "error", e.message()),
    };
    let arguments: Value = if body.is_empty() {
        json!({})
    } else {
        match serde_json::from_slice(&body) {
            Ok(args) => args,
            Err(e) => {
                return rest_reply(StatusCode::BAD_REQUEST, false, "error", format!("Invalid JSON body: {}", e));
            }
        }
    };

    match state.dispatcher.registry().call(&name, arguments).await {
        Ok(result) if result.is_error() => {
            rest_reply(StatusCode::BAD_REQUEST, false, "error", result.joined_text())
        }
        Ok(result) => rest_reply(StatusCode::OK, true, "data", result.joined_text()),
        Err(e @ CallError::UnknownTool(_)) => {
            rest_reply(StatusCode::NOT_FOUND, false, "error", e.to_string())
        }
        Err(CallError::Tool(e)) => {
            rest_reply(StatusCode::INTERNAL_SERVER_ERROR, false, "error", e.to_string())
        }
    }
}

fn rest_reply(status: StatusCode, success: bool, key: &str, text: String) -> HttpResponse {
    let mut body = serde_json::Map::new();
    body.insert("success".to_string(), Value::Bool(success));
    body.insert(key.to_string(), Value::String(text));
    HttpResponse::build(status).json(Value::Object(body))
}

/// Run the MCP server in HTTP mode.
///
/// # Configuration
/// - Worker threads: from `Config::workers`
/// - Max connections: 10,000 concurrent connections
/// - Connection rate limit: 1,000 connections per second
/// - Keep-alive: 30 seconds
/// - Request timeout: 30 seconds
/// - Shutdown timeout: 10 seconds
pub async fn run_server_http(config: Config, dispatcher: Dispatcher) -> std::io::Result<()> {
    let bind_addr = config.bind_addr();
    let rest_facade = config.rest_facade;
    let state = web::Data::new(AppState::new(dispatcher, config.keepalive_interval));

    tracing::info!(
        name = %config.server_name,
        version = %config.server_version,
        bind = %bind_addr,
        workers = config.workers,
        rest_facade,
        tools = ?state.dispatcher.registry().names(),
        "MCP server starting (HTTP mode)"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Compress::default())
            .wrap(cors_headers())
            // %r = request line, %s = status, %Dms = duration in milliseconds
            .wrap(Logger::new("%r %s %Dms"))
            .configure(|cfg| routes(cfg, rest_facade))
    })
    .workers(config.workers)
    .on_connect(track_connection)
    .max_connections(10000)
    .max_connection_rate(1000)
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_secs(30))
    .client_disconnect_timeout(Duration::from_secs(2))
    .shutdown_timeout(10)
    .bind(&bind_addr)?
    .run()
    .await
}

/// Run the MCP server in STDIO mode.
///
/// Reads one JSON-RPC request per line from stdin and writes each response
/// as one line on stdout. Logging goes to stderr.
pub async fn run_server_stdio(dispatcher: Dispatcher) -> std::io::Result<()> {
    tracing::info!(name = %dispatcher.info().name, "MCP server starting (STDIO mode)");

    let stdin = BufReader::with_capacity(8192, tokio::io::stdin());
    let stdout = BufWriter::with_capacity(8192, tokio::io::stdout());
    serve_lines(&dispatcher, stdin, stdout).await
}

/// Line-delimited JSON-RPC loop over any reader/writer pair.
///
/// Lines are read as raw bytes, so invalid UTF-8 is a parse error and not an
/// I/O error. Notifications get no reply. A line that is not JSON gets a
/// `-32700` reply with a null id; JSON that is not a request gets `-32600`
/// carrying its id when one is readable.
pub async fn serve_lines<R, W>(dispatcher: &Dispatcher, mut reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = Vec::with_capacity(1024);
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.trim_ascii().is_empty() {
            continue;
        }

        let response = match MCPRequest::decode(&line) {
            Ok(req) if req.is_notification() => {
                tracing::debug!(method = %req.method, "notification");
                continue;
            }
            Ok(req) => dispatcher.dispatch(req).await,
            Err(reply) => {
                tracing::warn!(error = ?reply.error, "undecodable line");
                reply
            }
        };

        let mut frame = match serde_json::to_vec(&response) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                continue;
            }
        };
        frame.push(b'\n');
        writer.write_all(&frame).await?;
        writer.flush().await?;
    }
    Ok(())
}
