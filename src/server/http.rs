//! Minimal HTTP/1.1 request parsing and response writing
//!
//! One request per connection; every response closes the connection.

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_HEADER_BYTES: usize = 16 * 1024;
const MAX_BODY_BYTES: usize = 64 * 1024;

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    /// Request target including any query string
    pub target: String,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Path component of the target, or `/` if it looks hostile
    pub fn path(&self) -> String {
        normalize_path(&self.target)
    }

    /// Decoded query parameter; empty values count as absent
    pub fn query_param(&self, key: &str) -> Option<String> {
        extract_query_param_raw(&self.target, key)
            .as_deref()
            .and_then(decode_query_value)
    }
}

/// A response ready to be written
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: &'static str,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: &'static str, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => Self::text(
                "500 Internal Server Error",
                format!("Failed to encode response: {}", e),
            ),
        }
    }

    pub fn text(status: &'static str, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into().into_bytes(),
        }
    }

    pub fn empty(status: &'static str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }

    /// Numeric status code
    pub fn code(&self) -> u16 {
        self.status
            .split_whitespace()
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or(500)
    }
}

/// Read one request; `Ok(None)` if the peer sent nothing parseable
pub async fn read_request<R>(stream: &mut R) -> std::io::Result<Option<HttpRequest>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut data = Vec::<u8>::new();
    loop {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        data.extend_from_slice(&buf[..read]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") || data.len() > MAX_HEADER_BYTES {
            break;
        }
    }
    if data.is_empty() {
        return Ok(None);
    }

    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
        .unwrap_or(data.len());
    let header_bytes = &data[..header_end];
    let mut body = data[header_end..].to_vec();

    let header_text = String::from_utf8_lossy(header_bytes);
    let mut lines = header_text.split("\r\n");
    let Some(request_line) = lines.next() else {
        return Ok(None);
    };
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_ascii_uppercase();
    let target = parts.next().unwrap_or("/").to_string();
    if method.is_empty() {
        return Ok(None);
    }

    let mut content_length: usize = 0;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            content_length = value.trim().parse::<usize>().unwrap_or(0);
        }
    }
    let content_length = content_length.min(MAX_BODY_BYTES);

    while body.len() < content_length {
        let read = stream.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&buf[..read]);
    }
    body.truncate(content_length);

    Ok(Some(HttpRequest {
        method,
        target,
        body,
    }))
}

/// Write `response` with CORS headers
pub async fn write_response<W>(stream: &mut W, response: &HttpResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut headers = String::new();
    headers.push_str("HTTP/1.1 ");
    headers.push_str(response.status);
    headers.push_str("\r\n");
    headers.push_str("Content-Type: ");
    headers.push_str(response.content_type);
    headers.push_str("\r\n");
    headers.push_str("Access-Control-Allow-Origin: *\r\n");
    headers.push_str("Access-Control-Allow-Methods: GET, POST, DELETE, OPTIONS\r\n");
    headers.push_str("Access-Control-Allow-Headers: Content-Type\r\n");
    headers.push_str("Cache-Control: no-store\r\n");
    headers.push_str("Connection: close\r\n");
    headers.push_str("Content-Length: ");
    headers.push_str(&response.body.len().to_string());
    headers.push_str("\r\n\r\n");

    stream.write_all(headers.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await
}

fn normalize_path(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.split('?').next().unwrap_or(raw);
    if raw.is_empty() {
        return "/".to_string();
    }
    if raw.len() > 256 || raw.contains("..") || raw.contains('\\') {
        return "/".to_string();
    }
    raw.to_string()
}

fn extract_query_param_raw(raw: &str, key: &str) -> Option<String> {
    let query = raw.split_once('?')?.1;
    for pair in query.split('&') {
        let mut parts = pair.splitn(2, '=');
        let name = parts.next().unwrap_or("").trim();
        if name != key {
            continue;
        }
        let value = parts.next().unwrap_or("").trim();
        if value.is_empty() {
            return None;
        }
        return Some(value.to_string());
    }
    None
}

fn decode_query_value(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.len() > 512 {
        return None;
    }

    let mut out: Vec<u8> = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut idx = 0usize;
    while idx < bytes.len() {
        match bytes[idx] {
            b'+' => {
                out.push(b' ');
                idx += 1;
            }
            b'%' if idx + 2 < bytes.len() => {
                let hex = |b: u8| match b {
                    b'0'..=b'9' => Some(b - b'0'),
                    b'a'..=b'f' => Some(b - b'a' + 10),
                    b'A'..=b'F' => Some(b - b'A' + 10),
                    _ => None,
                };
                let hi = hex(bytes[idx + 1])?;
                let lo = hex(bytes[idx + 2])?;
                out.push((hi << 4) | lo);
                idx += 3;
            }
            byte => {
                out.push(byte);
                idx += 1;
            }
        }
    }

    String::from_utf8(out).ok()
}
