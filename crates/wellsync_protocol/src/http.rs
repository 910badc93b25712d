//! Plain HTTP values exchanged with the central backend.
//!
//! These are transport-agnostic: the sync engine maps them onto a real
//! client, and in-process servers (tests) consume them directly through
//! [`LoopbackServer`].

use crate::error::ProtocolResult;
use crate::messages::encode_json;
use serde::Serialize;

/// Content type of every backend body.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Absolute URL including query string.
    pub url: String,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// A GET request accepting JSON.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: vec![("Accept".into(), JSON_CONTENT_TYPE.into())],
            body: None,
        }
    }

    /// A POST request with a JSON body.
    pub fn post_json<T: Serialize>(url: impl Into<String>, body: &T) -> ProtocolResult<Self> {
        Ok(Self {
            method: Method::Post,
            url: url.into(),
            headers: vec![
                ("Accept".into(), JSON_CONTENT_TYPE.into()),
                ("Content-Type".into(), JSON_CONTENT_TYPE.into()),
            ],
            body: Some(encode_json(body)?),
        })
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Looks a header up case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// A JSON response.
    pub fn json<T: Serialize>(status: u16, body: &T) -> ProtocolResult<Self> {
        Ok(Self {
            status,
            content_type: Some(JSON_CONTENT_TYPE.into()),
            body: encode_json(body)?,
        })
    }

    /// A response with an arbitrary content type and body.
    pub fn raw(status: u16, content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.map(String::from),
            body: body.into(),
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the content type announces JSON.
    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains(JSON_CONTENT_TYPE))
    }
}

/// A server that can answer requests in-process.
///
/// `Err` stands for a connection-level failure (nothing was received).
pub trait LoopbackServer {
    /// Handles one request.
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, String>;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for &S {
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        (**self).handle(request)
    }
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for std::sync::Arc<S> {
    fn handle(&self, request: &HttpRequest) -> Result<HttpResponse, String> {
        (**self).handle(request)
    }
}
