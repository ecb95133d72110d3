//! Outbound request construction.
//!
//! # Responsibilities
//! - Copy method and target URI from the matched request
//! - Stream the inbound body, except for body-less methods
//! - Copy headers, splitting content headers onto the body
//! - Let the matched rule rewrite the request
//! - Recompute `Host` from the final target, add `Forwarded` on demand
//!
//! # Design Decisions
//! - No header validation beyond the content/request split
//! - The rule runs after the generic copy so it always wins
//! - `Host` is derived after the rule so a rewritten target is honoured

use std::net::IpAddr;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use url::Url;

use crate::http::request::InboundRequest;
use crate::proxy::context::ProxyContext;
use crate::rules::{ProxyRule, RuleError};

/// Headers that describe the body rather than the request.
const CONTENT_HEADERS: &[&str] = &[
    "allow",
    "content-disposition",
    "content-encoding",
    "content-language",
    "content-length",
    "content-location",
    "content-md5",
    "content-range",
    "content-type",
    "expires",
    "last-modified",
];

pub fn is_content_header(name: &HeaderName) -> bool {
    CONTENT_HEADERS.contains(&name.as_str())
}

/// Methods whose outbound request never carries a body.
pub fn is_bodyless(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::DELETE | Method::TRACE)
}

/// Body of an outbound request with its content headers.
#[derive(Debug)]
pub struct OutboundContent {
    pub headers: HeaderMap,
    pub body: Body,
}

impl OutboundContent {
    pub fn new(body: impl Into<Body>) -> Self {
        Self {
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Request about to be sent upstream.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Url,
    /// Request-level headers.
    pub headers: HeaderMap,
    /// `None` for requests without a body.
    pub content: Option<OutboundContent>,
}

impl OutboundRequest {
    pub fn new(method: Method, uri: Url) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            content: None,
        }
    }

    /// Attach `value` as a request header, or as a content header when the
    /// name describes the body. Content headers are dropped when there is
    /// no body to carry them.
    pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
        if !is_content_header(&name) {
            self.headers.append(name, value);
        } else if let Some(content) = self.content.as_mut() {
            content.headers.append(name, value);
        }
    }

    /// Convert into an `http` request for the transport.
    pub fn into_http(self) -> Result<Request<Body>, axum::http::uri::InvalidUri> {
        let uri: Uri = self.uri.as_str().parse()?;

        let mut headers = self.headers;
        let body = match self.content {
            Some(content) => {
                headers.extend(content.headers);
                content.body
            }
            None => Body::empty(),
        };

        let mut request = Request::new(body);
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// `host` alone on the scheme's default port, `host:port` otherwise.
pub fn host_header_value(uri: &Url) -> Option<String> {
    let host = uri.host_str()?;
    Some(match uri.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Builds outbound requests from inbound ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestTransformer {
    add_forwarded_header: bool,
}

impl RequestTransformer {
    pub fn new(add_forwarded_header: bool) -> Self {
        Self { add_forwarded_header }
    }

    /// Build the request for `target`, consuming the inbound body.
    pub fn transform(
        &self,
        target: &Url,
        rule: &dyn ProxyRule,
        ctx: &mut ProxyContext,
    ) -> Result<OutboundRequest, RuleError> {
        let mut outbound = OutboundRequest::new(ctx.request.method.clone(), target.clone());

        if !is_bodyless(&outbound.method) {
            let body = ctx.request.take_body().unwrap_or_else(Body::empty);
            outbound.content = Some(OutboundContent::new(body));
        }

        for (name, value) in ctx.request.headers.iter() {
            outbound.add_header(name.clone(), value.clone());
        }

        rule.modify_request(&mut outbound, &ctx.user)?;

        match host_header_value(&outbound.uri) {
            Some(host) => match HeaderValue::from_str(&host) {
                Ok(value) => {
                    outbound.headers.insert(header::HOST, value);
                }
                Err(_) => {
                    tracing::warn!(host = %host, "Target host is not a valid header value");
                    outbound.headers.remove(header::HOST);
                }
            },
            // The client's Host names this proxy, never a host-less target.
            None => {
                outbound.headers.remove(header::HOST);
            }
        }

        if self.add_forwarded_header {
            append_forwarded(&mut outbound.headers, &ctx.request);
        }

        Ok(outbound)
    }
}

/// Append `for`, `host` and `proto` elements describing the inbound hop.
fn append_forwarded(headers: &mut HeaderMap, inbound: &InboundRequest) {
    let client = match inbound.remote_addr.map(|a| a.ip()) {
        Some(IpAddr::V6(ip)) => format!("[{ip}]"),
        Some(ip) => ip.to_string(),
        None => "unknown".to_string(),
    };
    let host = inbound.host_header().unwrap_or_default();
    let proto = if inbound.is_https() { "https" } else { "http" };

    for (key, value) in [("for", client.as_str()), ("host", host), ("proto", proto)] {
        if let Ok(value) = HeaderValue::from_str(&forwarded_pair(key, value)) {
            headers.append(header::FORWARDED, value);
        }
    }
}

/// `key=value`, quoting the value when it is not a plain token.
fn forwarded_pair(key: &str, value: &str) -> String {
    let is_token = !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b));
    if is_token {
        format!("{key}={value}")
    } else {
        format!("{key}=\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    }
}
