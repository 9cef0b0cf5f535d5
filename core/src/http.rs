//! HTTP transport types.
//!
//! # Design
//! Requests and responses are plain data. The client builds an `HttpRequest`
//! for every operation and hands it to a `Transport`, which owns the actual
//! network I/O (timeouts, retries). Unit tests swap in a recording transport
//! and assert on the built requests field by field.

use std::fmt;

use crate::error::TransportError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is absolute and already has its path segments escaped; `query`
/// pairs are unescaped and left to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    /// Replace any existing header with the same (case-insensitive) name.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("authorization", format!("Bearer {token}"))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes `HttpRequest`s against the network.
///
/// Implementations apply their own timeout and retry envelope; the client
/// calls `send` once per logical round-trip and never retries on its own.
/// Non-2xx responses are returned as `Ok`, only failures that produced no
/// response at all are `Err`.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_defaults_to_json_content_type() {
        let req = HttpRequest::new(HttpMethod::Get, "http://localhost:8090/api/health");
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert!(req.query.is_empty());
        assert!(req.body.is_none());
    }

    #[test]
    fn with_header_replaces_case_insensitively() {
        let req = HttpRequest::new(HttpMethod::Post, "http://x")
            .with_header("Content-Type", "multipart/form-data; boundary=abc");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(
            req.header("content-type"),
            Some("multipart/form-data; boundary=abc")
        );
    }

    #[test]
    fn bearer_token_sets_authorization_header() {
        let req = HttpRequest::new(HttpMethod::Get, "http://x").with_bearer("abc");
        assert_eq!(req.header("Authorization"), Some("Bearer abc"));
    }

    #[test]
    fn success_range() {
        let mut resp = HttpResponse {
            status: 204,
            headers: Vec::new(),
            body: String::new(),
        };
        assert!(resp.is_success());
        resp.status = 404;
        assert!(!resp.is_success());
    }
}
