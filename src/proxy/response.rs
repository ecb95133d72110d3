//! Response handling and transformation.
//!
//! # Responsibilities
//! - Copy the upstream status and headers onto the client response
//! - Strip `transfer-encoding`, the body is re-framed by our own server
//! - Hand the upstream body to the client response without buffering
//! - Give the matched rule the last word on the response
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Copying is skipped entirely for rules that build the response themselves

use axum::body::Body;
use axum::http::{header, HeaderMap, Response, StatusCode, Version};

use crate::http::response::InboundResponse;
use crate::proxy::context::ProxyContext;
use crate::rules::{ProxyRule, RuleError};

/// Response received from the upstream.
///
/// Headers are read eagerly; the body can be taken once.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    body: Option<Body>,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            version: Version::HTTP_11,
            headers,
            body: Some(body),
        }
    }

    /// Take the body stream. `None` once it has been consumed.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }
}

impl From<Response<Body>> for UpstreamResponse {
    fn from(response: Response<Body>) -> Self {
        let (parts, body) = response.into_parts();
        Self {
            status: parts.status,
            version: parts.version,
            headers: parts.headers,
            body: Some(body),
        }
    }
}

/// Applies the upstream response to the client response.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseTransformer;

impl ResponseTransformer {
    /// Copy (if the rule asks for it) and then run the rule's response hook.
    pub async fn apply(
        &self,
        rule: &dyn ProxyRule,
        upstream: &mut UpstreamResponse,
        ctx: &mut ProxyContext,
    ) -> Result<(), RuleError> {
        if rule.pre_process_response() {
            copy_response(upstream, &mut ctx.response);
        }
        rule.modify_response(upstream, ctx).await
    }
}

/// Mirror status, headers and body of `upstream` onto `response`.
pub fn copy_response(upstream: &mut UpstreamResponse, response: &mut InboundResponse) {
    response.status = upstream.status;

    match upstream.headers.get(header::CONTENT_TYPE) {
        Some(content_type) => {
            response.headers.insert(header::CONTENT_TYPE, content_type.clone());
        }
        None => {
            response.headers.remove(header::CONTENT_TYPE);
        }
    }

    for name in upstream.headers.keys() {
        response.headers.remove(name);
        for value in upstream.headers.get_all(name) {
            response.headers.append(name.clone(), value.clone());
        }
    }

    response.headers.remove(header::TRANSFER_ENCODING);

    if let Some(body) = upstream.take_body() {
        response.body = body;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Principal;
    use crate::http::request::InboundRequest;
    use crate::proxy::request::OutboundRequest;
    use async_trait::async_trait;
    use axum::http::{HeaderValue, Method};
    use url::Url;

    fn upstream() -> UpstreamResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        UpstreamResponse::new(StatusCode::CREATED, headers, Body::from("{\"ok\":true}"))
    }

    fn context() -> ProxyContext {
        ProxyContext::new(InboundRequest::new(Method::GET, "http://api.example.com/"))
    }

    /// Records what the client response looked like when the hook ran.
    #[derive(Debug)]
    struct Probe {
        pre_process: bool,
    }

    #[async_trait]
    impl ProxyRule for Probe {
        fn pre_process_response(&self) -> bool {
            self.pre_process
        }

        fn matches(&self, _uri: &Url) -> bool {
            true
        }

        fn modify_request(&self, _request: &mut OutboundRequest, _principal: &Principal) -> Result<(), RuleError> {
            Ok(())
        }

        async fn modify_response(
            &self,
            response: &mut UpstreamResponse,
            ctx: &mut ProxyContext,
        ) -> Result<(), RuleError> {
            let seen = if response.has_body() { "body-pending" } else { "body-copied" };
            ctx.response.headers.insert("x-probe", HeaderValue::from_static(seen));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_copy_mirrors_upstream_without_transfer_encoding() {
        let mut ctx = context();
        ctx.response.headers.insert("set-cookie", HeaderValue::from_static("stale=1"));
        let mut up = upstream();

        ResponseTransformer
            .apply(&Probe { pre_process: true }, &mut up, &mut ctx)
            .await
            .unwrap();

        let response = ctx.response;
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(
            response.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json; charset=utf-8"
        );
        assert!(response.headers.get(header::TRANSFER_ENCODING).is_none());
        let cookies: Vec<_> = response.headers.get_all("set-cookie").iter().collect();
        assert_eq!(cookies, ["a=1", "b=2"]);
        assert_eq!(response.headers.get("x-probe").unwrap(), "body-copied");

        let body = axum::body::to_bytes(response.body, usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn test_no_pre_process_leaves_response_to_rule() {
        let mut ctx = context();
        let mut up = upstream();

        ResponseTransformer
            .apply(&Probe { pre_process: false }, &mut up, &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.response.status, StatusCode::OK);
        assert!(ctx.response.headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(ctx.response.headers.get("x-probe").unwrap(), "body-pending");
        assert!(up.take_body().is_some());
    }

    #[test]
    fn test_missing_content_type_clears_stale_value() {
        let mut response = InboundResponse::default();
        response.headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        let mut up = UpstreamResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), Body::empty());

        copy_response(&mut up, &mut response);
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(response.headers.get(header::CONTENT_TYPE).is_none());
    }
}
