use crate::errors::{ServeError, ServeResult};
use smol::io::AsyncReadExt;
use smol::net::TcpStream;
use std::collections::HashMap;
use std::io;

pub(super) const MAX_HEADER_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub(super) struct ParsedRequest {
    method: String,
    target: String,
    version: String,
    headers: HashMap<String, String>,
}

impl ParsedRequest {
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(|value| value.as_str())
    }

    pub fn route_path(&self) -> &str {
        self.target
            .split(|c: char| c == '?' || c == '#')
            .next()
            .unwrap_or(self.target.as_str())
    }
}

/// Outcome of reading the request head off a fresh connection.
#[derive(Debug)]
pub(super) enum RequestHead {
    Complete(Vec<u8>),
    /// The peer closed the connection without sending anything.
    Empty,
    TooLarge,
    Failed(io::Error),
}

pub(super) async fn read_request_head(stream: &mut TcpStream) -> RequestHead {
    let mut request_bytes = Vec::new();
    let mut buffer = [0u8; 4096];

    loop {
        match stream.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                request_bytes.extend_from_slice(&buffer[..n]);
                if find_header_end(&request_bytes).is_some() {
                    return RequestHead::Complete(request_bytes);
                }
                if request_bytes.len() > MAX_HEADER_BYTES {
                    return RequestHead::TooLarge;
                }
            }
            Err(e) => return RequestHead::Failed(e),
        }
    }

    if request_bytes.is_empty() {
        RequestHead::Empty
    } else {
        // Truncated head; let the parser report it.
        RequestHead::Complete(request_bytes)
    }
}

pub(super) fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|window| window == b"\r\n\r\n")
}

pub(super) fn parse_http_request(request_bytes: &[u8]) -> ServeResult<ParsedRequest> {
    let header_end = find_header_end(request_bytes)
        .ok_or_else(|| ServeError::BadRequest("Malformed HTTP request".to_string()))?;

    let header_str = std::str::from_utf8(&request_bytes[..header_end])
        .map_err(|_| ServeError::BadRequest("Invalid HTTP headers".to_string()))?;

    let mut header_lines = header_str.split("\r\n");
    let request_line = header_lines
        .next()
        .ok_or_else(|| ServeError::BadRequest("Missing request line".to_string()))?;
    let parts: Vec<&str> = request_line.split_whitespace().collect();
    if parts.len() != 3 {
        return Err(ServeError::BadRequest(format!(
            "Bad request syntax ({:?})",
            request_line
        )));
    }
    if !parts[2].starts_with("HTTP/") {
        return Err(ServeError::BadRequest(format!(
            "Bad request version ({:?})",
            parts[2]
        )));
    }
    if !parts[1].starts_with('/') {
        return Err(ServeError::BadRequest(format!(
            "Bad request target ({:?})",
            parts[1]
        )));
    }

    // `//host` would otherwise come back as a protocol-relative redirect.
    let target = if parts[1].starts_with("//") {
        format!("/{}", parts[1].trim_start_matches('/'))
    } else {
        parts[1].to_string()
    };

    let mut headers = HashMap::with_capacity(16);
    for line in header_lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    Ok(ParsedRequest {
        method: parts[0].to_string(),
        target,
        version: parts[2].to_string(),
        headers,
    })
}
