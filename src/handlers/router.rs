use crate::tracing_util::{elapsed_ms, generate_request_id, status_class};
use smol::net::TcpStream;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument, Span};

use super::files::serve_target;
use super::parser::{parse_http_request, read_request_head, RequestHead};
use super::response::{map_error_to_reply, write_reply, Reply};
use super::ServeContext;

pub async fn handle_request(stream: TcpStream, addr: SocketAddr, ctx: Arc<ServeContext>) {
    let request_id = generate_request_id();
    let request_start = Instant::now();
    let client_ip = addr.ip().to_string();

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        client_ip = %client_ip,
        method = tracing::field::Empty,
        route = tracing::field::Empty,
        status_code = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    serve_connection(stream, addr, ctx, request_start, span.clone())
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServeContext>,
    request_start: Instant,
    span: Span,
) {
    let _connection_guard = ctx.metrics.connection_guard();
    debug!("New connection from {}", addr);

    let request_bytes = match read_request_head(&mut stream).await {
        RequestHead::Complete(bytes) => bytes,
        RequestHead::Empty => return,
        RequestHead::TooLarge => {
            finish(&mut stream, &ctx, "UNKNOWN", Reply::error(431, "Request header too large"), true).await;
            return;
        }
        RequestHead::Failed(e) => {
            warn!("Failed to read from {}: {}", addr, e);
            return;
        }
    };

    let parsed_request = match parse_http_request(&request_bytes) {
        Ok(req) => req,
        Err(err) => {
            finish(&mut stream, &ctx, "UNKNOWN", map_error_to_reply(&err), true).await;
            return;
        }
    };

    span.record("method", parsed_request.method());
    span.record("route", parsed_request.route_path());
    debug!(
        version = parsed_request.version(),
        user_agent = parsed_request.header("user-agent").unwrap_or("-"),
        "Parsed request"
    );

    let (reply, include_body) = match parsed_request.method() {
        "GET" => (serve_target(&ctx, parsed_request.target()).await, true),
        "HEAD" => (serve_target(&ctx, parsed_request.target()).await, false),
        other => (
            Reply::error(501, &format!("Unsupported method ({:?})", other)),
            true,
        ),
    };

    let status = finish(&mut stream, &ctx, parsed_request.method(), reply, include_body).await;
    span.record("status_code", status);
    span.record("latency_ms", elapsed_ms(request_start));
    info!(status_class = status_class(status), "Request completed");
}

/// Sends the reply and records it; returns the status that was sent.
async fn finish(
    stream: &mut TcpStream,
    ctx: &ServeContext,
    method: &str,
    reply: Reply,
    include_body: bool,
) -> u16 {
    let status = reply.status;
    match write_reply(stream, reply, include_body).await {
        Ok(sent) => ctx.metrics.add_bytes_served(sent),
        Err(e) => warn!(status, "Failed to write response: {}", e),
    }
    ctx.metrics.record_request(method, status);
    status
}
