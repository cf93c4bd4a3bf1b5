//! Minimal HTTP/1.1 framing: one request per connection, `Connection: close`.

use std::collections::HashMap;
use std::io;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_LINE_BYTES: u64 = 8 * 1024;
const MAX_HEADERS: usize = 100;

pub const SSE_RESPONSE_HEAD: &str = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\nConnection: close\r\nX-Accel-Buffering: no\r\n\r\n";

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http io error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed http request: {0}")]
    Malformed(String),
    #[error("request body of {declared} bytes exceeds the {limit} byte limit")]
    BodyTooLarge { declared: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Names are lowercased.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, value: &Value) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.into().into_bytes(),
        }
    }
}

/// Reads one request. `Ok(None)` means the peer closed before sending a
/// request line.
pub async fn read_http_request<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<HttpRequest>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(first) = read_line(reader).await? else {
        return Ok(None);
    };
    if first.is_empty() {
        return Ok(None);
    }

    let mut parts = first.split_whitespace();
    let Some(method) = parts.next() else {
        return Err(HttpError::Malformed("missing method".to_string()));
    };
    let Some(path_with_query) = parts.next() else {
        return Err(HttpError::Malformed("missing path".to_string()));
    };
    let (path, query) = parse_path_query(path_with_query);

    let mut content_length = 0usize;
    let mut headers = HashMap::new();
    while let Some(header) = read_line(reader).await? {
        if header.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADERS {
            return Err(HttpError::Malformed("too many headers".to_string()));
        }
        if let Some((name, value)) = header.split_once(':') {
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            if name == "content-length" {
                content_length = value
                    .parse::<usize>()
                    .map_err(|_| HttpError::Malformed(format!("bad content-length: {value}")))?;
            }
            headers.insert(name, value.to_string());
        }
    }

    if content_length > max_body_bytes {
        return Err(HttpError::BodyTooLarge {
            declared: content_length,
            limit: max_body_bytes,
        });
    }
    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }
    Ok(Some(HttpRequest {
        method: method.to_ascii_uppercase(),
        path,
        query,
        headers,
        body,
    }))
}

async fn read_line<R>(reader: &mut R) -> Result<Option<String>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_line(&mut line)
        .await
        .map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => HttpError::Malformed("line is not valid UTF-8".to_string()),
            _ => HttpError::Io(err),
        })?;
    if read == 0 {
        return Ok(None);
    }
    if !line.ends_with('\n') && read as u64 >= MAX_LINE_BYTES {
        return Err(HttpError::Malformed("header line too long".to_string()));
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

pub async fn write_http_response<W>(writer: &mut W, response: &HttpResponse) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        http_reason_phrase(response.status),
        response.content_type,
        response.body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await
}

/// One `event:`/`data:` frame terminated by a blank line.
pub fn sse_frame(kind: &str, payload: &Value) -> String {
    let data = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    format!("event: {kind}\ndata: {data}\n\n")
}

pub const fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "OK",
    }
}

pub fn parse_path_query(raw: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = raw.split_once('?').unwrap_or((raw, ""));
    let query = query_str
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();
    (path.to_string(), query)
}
