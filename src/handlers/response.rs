use crate::errors::ServeError;
use smol::io::AsyncWriteExt;
use smol::net::TcpStream;
use std::io::Write as IoWrite;

pub(super) const SERVER_HEADER: &str = concat!("repo-server/", env!("CARGO_PKG_VERSION"));

pub(super) enum ReplyBody {
    Bytes(Vec<u8>),
    File { file: smol::fs::File, len: u64 },
}

impl ReplyBody {
    fn len(&self) -> u64 {
        match self {
            ReplyBody::Bytes(bytes) => bytes.len() as u64,
            ReplyBody::File { len, .. } => *len,
        }
    }
}

pub(super) struct Reply {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: ReplyBody,
}

impl Reply {
    pub fn bytes(status: u16, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            headers: vec![("Content-Type", content_type.to_string())],
            body: ReplyBody::Bytes(body),
        }
    }

    pub fn file(file: smol::fs::File, len: u64, content_type: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type", content_type.to_string())],
            body: ReplyBody::File { file, len },
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&serde_json::json!({
            "error": {
                "message": message,
            }
        }))
        .expect("JSON serialization should not fail");
        Self::bytes(status, "application/json", body)
    }

    pub fn redirect(location: String) -> Self {
        Self::bytes(301, "text/plain", Vec::new()).with_header("Location", location)
    }

    pub fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }
}

pub(super) fn map_error_to_reply(err: &ServeError) -> Reply {
    match err {
        ServeError::BadRequest(msg) => Reply::error(400, msg),
        other => Reply::error(500, &other.to_string()),
    }
}

pub(super) fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "Unknown",
    }
}

pub(super) fn build_response_head(status: u16, headers: &[(&str, String)], content_length: u64) -> Vec<u8> {
    let mut head = Vec::with_capacity(256);
    write!(
        &mut head,
        "HTTP/1.1 {} {}\r\nServer: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status,
        reason_phrase(status),
        SERVER_HEADER,
        content_length
    )
    .expect("writing to Vec<u8> cannot fail");

    for (key, value) in headers {
        write!(&mut head, "{}: {}\r\n", key, value).expect("writing to Vec<u8> cannot fail");
    }

    head.extend_from_slice(b"\r\n");
    head
}

/// Writes `reply` to the client and returns the number of body bytes sent.
/// The body is skipped for HEAD requests; `Content-Length` still reflects it.
pub(super) async fn write_reply(
    stream: &mut TcpStream,
    reply: Reply,
    include_body: bool,
) -> std::io::Result<u64> {
    let head = build_response_head(reply.status, &reply.headers, reply.body.len());
    stream.write_all(&head).await?;

    let sent = if !include_body {
        0
    } else {
        match reply.body {
            ReplyBody::Bytes(bytes) => {
                stream.write_all(&bytes).await?;
                bytes.len() as u64
            }
            ReplyBody::File { file, .. } => smol::io::copy(file, &mut *stream).await?,
        }
    };

    stream.flush().await?;
    Ok(sent)
}
