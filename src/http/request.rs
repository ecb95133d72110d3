//! Inbound request handling.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Capture the routing-relevant parts of the request (scheme, host, path)
//! - Rebuild the absolute target URI the listener received
//! - Hold the body stream until the proxy decides to forward it
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The body can be taken exactly once

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Method, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use url::Url;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values as UUID v4 strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// The request as received by the listener.
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    /// `http` or `https`.
    pub scheme: String,
    /// Host and optional port, as sent by the client.
    pub host: Option<String>,
    /// Mount point of the proxy inside the host application (may be empty).
    pub path_base: String,
    pub path: String,
    /// Query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Taken at most once. The mutex keeps the request `Sync`; the body
    /// itself is only reached through `&mut self`.
    body: Mutex<Option<Body>>,
    pub remote_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// Create a bare request for `method` and an absolute or origin-form `uri`.
    pub fn new(method: Method, uri: &str) -> Self {
        let mut request = Self {
            method,
            scheme: "http".to_string(),
            host: None,
            path_base: String::new(),
            path: "/".to_string(),
            query: None,
            headers: HeaderMap::new(),
            body: Mutex::new(None),
            remote_addr: None,
        };
        if let Ok(parsed) = uri.parse::<axum::http::Uri>() {
            if let Some(scheme) = parsed.scheme_str() {
                request.scheme = scheme.to_string();
            }
            request.host = parsed.authority().map(|a| a.to_string());
            request.path = parsed.path().to_string();
            request.query = parsed.query().map(str::to_string);
        }
        request
    }

    /// Convert a request handed over by the HTTP server.
    pub fn from_http(request: Request<Body>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = request.into_parts();

        // HTTP/2 carries the authority in the URI, HTTP/1.1 in the Host header.
        let host = parts
            .uri
            .authority()
            .map(|a| a.to_string())
            .or_else(|| {
                parts
                    .headers
                    .get(header::HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            });

        Self {
            method: parts.method,
            scheme: parts.uri.scheme_str().unwrap_or("http").to_string(),
            host,
            path_base: String::new(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers,
            body: Mutex::new(Some(body)),
            remote_addr,
        }
    }

    /// Attach a body to the request.
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Mutex::new(Some(body.into()));
        self
    }

    /// Take the body, leaving `None` behind.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.get_mut().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub fn has_body(&self) -> bool {
        self.body
            .lock()
            .map(|body| body.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Add a header to the request.
    pub fn with_header(mut self, name: header::HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Set the client address.
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn is_https(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("https")
    }

    /// The Host header value, falling back to the request authority.
    pub fn host_header(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or(self.host.as_deref())
    }

    /// Rebuild `scheme://host{path_base}{path}{?query}`.
    pub fn target_uri(&self) -> Result<Url, url::ParseError> {
        let host = match self.host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => return Err(url::ParseError::EmptyHost),
        };
        let mut uri = format!("{}://{}{}{}", self.scheme, host, self.path_base, self.path);
        if let Some(query) = &self.query {
            uri.push('?');
            uri.push_str(query);
        }
        Url::parse(&uri)
    }
}
