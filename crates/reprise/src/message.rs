//! Logical request and response types carried through the chain.
//!
//! A [`Request`] is what the application hands to the client; a [`Response`] is
//! either produced by the live transport or read back from a fixture. Responses
//! keep their headers as raw ordered pairs so a replay reproduces them verbatim.

use crate::error::{ReplayError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use hyper::header::{HeaderName, HeaderValue, HOST};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};

/// Outbound request issued by the application.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Body chunks in the order they were written
    pub body: Vec<Bytes>,
    /// Only present for chunked bodies with trailers
    pub trailers: Option<HeaderMap>,
}

impl Request {
    /// Create a request for an absolute URL.
    pub fn new(method: Method, url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ReplayError::InvalidRequest(format!("{url}: {e}")))?;
        if uri.scheme().is_none() || uri.host().is_none() {
            return Err(ReplayError::InvalidRequest(format!(
                "{url}: an absolute URL with scheme and host is required"
            )));
        }
        Ok(Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Vec::new(),
            trailers: None,
        })
    }

    pub fn get(url: &str) -> Result<Self> {
        Self::new(Method::GET, url)
    }

    pub fn post(url: &str) -> Result<Self> {
        Self::new(Method::POST, url)
    }

    /// Append a header value, keeping any existing values for the same name.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ReplayError::InvalidRequest(format!("header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ReplayError::InvalidRequest(format!("header '{name}': {e}")))?;
        self.headers.append(name, value);
        Ok(self)
    }

    /// Append one body chunk.
    pub fn body(mut self, chunk: impl Into<Bytes>) -> Self {
        self.body.push(chunk.into());
        self
    }

    pub fn trailers(mut self, trailers: HeaderMap) -> Self {
        self.trailers = Some(trailers);
        self
    }

    /// Host name without port. Empty when the URI carries none.
    pub fn host(&self) -> &str {
        self.uri.host().unwrap_or_default()
    }

    pub fn scheme(&self) -> &str {
        self.uri.scheme_str().unwrap_or("http")
    }

    /// Explicit port, or the scheme's default.
    pub fn port(&self) -> u16 {
        self.uri
            .port_u16()
            .or_else(|| default_port(self.scheme()))
            .unwrap_or(80)
    }

    /// All body chunks joined into one buffer.
    pub fn body_bytes(&self) -> Bytes {
        join_chunks(self.body.iter())
    }

    /// Copy of this request aimed at another host, keeping scheme, port, path and query.
    ///
    /// The original authority stays visible to the target as the `host` header,
    /// unless the request already carries one.
    pub fn with_host(&self, host: &str) -> Result<Self> {
        let authority = match self.uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let mut parts = self.uri.clone().into_parts();
        parts.authority = Some(
            authority
                .parse()
                .map_err(|e| ReplayError::InvalidRequest(format!("host '{host}': {e}")))?,
        );
        if parts.path_and_query.is_none() {
            parts.path_and_query = Some(hyper::http::uri::PathAndQuery::from_static("/"));
        }
        let uri = Uri::from_parts(parts)
            .map_err(|e| ReplayError::InvalidRequest(format!("rewriting host to '{host}': {e}")))?;

        let mut headers = self.headers.clone();
        if !headers.contains_key(HOST) {
            if let Some(original) = self.uri.authority() {
                let value = HeaderValue::from_str(original.as_str()).map_err(|e| {
                    ReplayError::InvalidRequest(format!("host header '{original}': {e}"))
                })?;
                headers.insert(HOST, value);
            }
        }

        Ok(Self {
            uri,
            headers,
            ..self.clone()
        })
    }
}

/// Default port for a URL scheme.
pub fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

fn join_chunks<'a>(chunks: impl Iterator<Item = &'a Bytes>) -> Bytes {
    let mut buffer = BytesMut::new();
    for chunk in chunks {
        buffer.extend_from_slice(chunk);
    }
    buffer.freeze()
}

/// Response delivered back to the application, live or replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// HTTP version, e.g. "1.1"
    #[serde(default = "default_version")]
    pub version: String,
    pub status: u16,
    #[serde(default)]
    pub status_message: String,
    /// Raw header pairs in received order; duplicates are kept
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: Vec<BodyChunk>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trailers: Vec<(String, String)>,
}

fn default_version() -> String {
    "1.1".to_string()
}

impl Response {
    pub fn new(status: u16) -> Self {
        let status_message = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or_default()
            .to_string();
        Self {
            version: default_version(),
            status,
            status_message,
            headers: Vec::new(),
            body: Vec::new(),
            trailers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, chunk: impl Into<Bytes>) -> Self {
        self.body.push(BodyChunk::new(chunk));
        self
    }

    /// First value of a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_bytes(&self) -> Bytes {
        join_chunks(self.body.iter().map(|chunk| &chunk.data))
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body_bytes()).into_owned()
    }
}

/// Storage encoding of a body chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    Utf8,
    Base64,
}

/// One body chunk. Text chunks are stored as text, anything else as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredChunk", into = "StoredChunk")]
pub struct BodyChunk {
    pub data: Bytes,
}

impl BodyChunk {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    pub fn encoding(&self) -> ChunkEncoding {
        if std::str::from_utf8(&self.data).is_ok() {
            ChunkEncoding::Utf8
        } else {
            ChunkEncoding::Base64
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "lowercase")]
enum StoredChunk {
    Utf8(String),
    Base64(String),
}

impl From<BodyChunk> for StoredChunk {
    fn from(chunk: BodyChunk) -> Self {
        match String::from_utf8(chunk.data.to_vec()) {
            Ok(text) => StoredChunk::Utf8(text),
            Err(_) => StoredChunk::Base64(STANDARD.encode(&chunk.data)),
        }
    }
}

impl TryFrom<StoredChunk> for BodyChunk {
    type Error = base64::DecodeError;

    fn try_from(stored: StoredChunk) -> std::result::Result<Self, Self::Error> {
        match stored {
            StoredChunk::Utf8(text) => Ok(BodyChunk::new(text)),
            StoredChunk::Base64(encoded) => Ok(BodyChunk::new(STANDARD.decode(encoded)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_absolute_url() {
        assert!(Request::get("http://example.com/path").is_ok());
        let err = Request::get("/relative/path").unwrap_err();
        assert!(matches!(err, ReplayError::InvalidRequest(_)));
    }

    #[test]
    fn test_request_port_defaults_by_scheme() {
        assert_eq!(Request::get("http://example.com/").unwrap().port(), 80);
        assert_eq!(Request::get("https://example.com/").unwrap().port(), 443);
        assert_eq!(Request::get("http://example.com:8080/").unwrap().port(), 8080);
    }

    #[test]
    fn test_request_body_chunks_join() {
        let request = Request::post("http://example.com/")
            .unwrap()
            .body("hello ")
            .body("world");
        assert_eq!(request.body.len(), 2);
        assert_eq!(request.body_bytes(), Bytes::from("hello world"));
    }

    #[test]
    fn test_request_header_keeps_duplicates() {
        let request = Request::get("http://example.com/")
            .unwrap()
            .header("Accept", "text/html")
            .unwrap()
            .header("accept", "application/json")
            .unwrap();
        let values: Vec<_> = request.headers.get_all("accept").iter().collect();
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_request_invalid_header_rejected() {
        let err = Request::get("http://example.com/")
            .unwrap()
            .header("x-bad", "line\nbreak")
            .unwrap_err();
        assert!(matches!(err, ReplayError::InvalidRequest(_)));
    }

    #[test]
    fn test_with_host_keeps_port_and_path() {
        let request = Request::get("http://api.example.com:3000/users?page=2").unwrap();
        let local = request.with_host("127.0.0.1").unwrap();
        assert_eq!(local.uri.to_string(), "http://127.0.0.1:3000/users?page=2");
        assert_eq!(local.method, Method::GET);
        assert_eq!(local.headers["host"], "api.example.com:3000");
    }

    #[test]
    fn test_with_host_keeps_explicit_host_header() {
        let request = Request::get("http://api.example.com/")
            .unwrap()
            .header("host", "tenant.example.com")
            .unwrap();
        let local = request.with_host("127.0.0.1").unwrap();
        assert_eq!(local.uri.to_string(), "http://127.0.0.1/");
        assert_eq!(local.headers.get_all("host").iter().count(), 1);
        assert_eq!(local.headers["host"], "tenant.example.com");
    }

    #[test]
    fn test_response_new_sets_reason() {
        let response = Response::new(404);
        assert_eq!(response.status_message, "Not Found");
        assert_eq!(response.version, "1.1");
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = Response::new(200)
            .with_header("Content-Type", "text/plain")
            .with_header("Set-Cookie", "a=1")
            .with_header("Set-Cookie", "b=2");
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.header("set-cookie"), Some("a=1"));
        assert_eq!(response.headers.len(), 3);
    }

    #[test]
    fn test_body_chunk_storage_encoding() {
        let text = BodyChunk::new("plain text");
        assert_eq!(text.encoding(), ChunkEncoding::Utf8);
        let json = serde_json::to_value(&text).unwrap();
        assert_eq!(json["encoding"], "utf8");
        assert_eq!(json["data"], "plain text");

        let binary = BodyChunk::new(vec![0xff, 0x00, 0xfe]);
        assert_eq!(binary.encoding(), ChunkEncoding::Base64);
        let json = serde_json::to_value(&binary).unwrap();
        assert_eq!(json["encoding"], "base64");
        let back: BodyChunk = serde_json::from_value(json).unwrap();
        assert_eq!(back, binary);
    }

    #[test]
    fn test_body_chunk_rejects_bad_base64() {
        let json = serde_json::json!({"encoding": "base64", "data": "!!not base64!!"});
        assert!(serde_json::from_value::<BodyChunk>(json).is_err());
    }
}
