//! Outbound transport shared by every request.
//!
//! # Responsibilities
//! - Own the single pooled HTTP client used for all upstream calls
//! - Reach both http and https upstreams
//! - Follow redirects when configured, re-deriving `Host` on every hop
//! - Resolve as soon as response headers arrive; the body stays a stream
//!
//! # Design Decisions
//! - Built once at startup and cloned cheaply; never rebuilt per request
//! - Every `Err` is a connection-level fault. HTTP error statuses are `Ok`
//! - TLS via rustls with the webpki root store

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Response, Uri};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::ServiceExt;
use tower_http::follow_redirect::{
    policy::{Action, Attempt, Policy, Standard},
    FollowRedirect,
};
use url::Url;

use crate::proxy::request::host_header_value;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure to obtain any HTTP response from the upstream.
#[derive(Debug, thiserror::Error)]
#[error("upstream transport failure: {0}")]
pub struct TransportError(#[source] BoxError);

impl TransportError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self(source.into())
    }
}

/// Sends outbound requests. Implementations must be safe for concurrent use.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError>;
}

type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Standard redirect policy that also points `Host` at each new location.
///
/// The redirected request inherits the previous hop's headers, so without
/// this a cross-host redirect would still name the first upstream.
#[derive(Debug, Clone, Default)]
pub struct RetargetHost(Standard);

impl<B, E> Policy<B, E> for RetargetHost {
    fn redirect(&mut self, attempt: &Attempt<'_>) -> Result<Action, E> {
        Policy::<B, E>::redirect(&mut self.0, attempt)
    }

    fn on_request(&mut self, request: &mut Request<B>) {
        Policy::<B, E>::on_request(&mut self.0, request);
        match host_header_for(request.uri()) {
            Some(host) => {
                request.headers_mut().insert(header::HOST, host);
            }
            None => {
                request.headers_mut().remove(header::HOST);
            }
        }
    }

    fn clone_body(&self, body: &B) -> Option<B> {
        Policy::<B, E>::clone_body(&self.0, body)
    }
}

fn host_header_for(uri: &Uri) -> Option<HeaderValue> {
    let url = Url::parse(&uri.to_string()).ok()?;
    HeaderValue::from_str(&host_header_value(&url)?).ok()
}

#[derive(Clone)]
enum Inner {
    Direct(HttpClient),
    Redirecting(FollowRedirect<HttpClient, RetargetHost>),
}

/// Default transport over a pooled hyper client.
#[derive(Clone)]
pub struct HyperTransport {
    inner: Inner,
}

impl HyperTransport {
    pub fn new(follow_redirects: bool) -> Self {
        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .enable_http2()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        let inner = if follow_redirects {
            Inner::Redirecting(FollowRedirect::with_policy(client, RetargetHost::default()))
        } else {
            Inner::Direct(client)
        };
        Self { inner }
    }

    pub fn follows_redirects(&self) -> bool {
        matches!(self.inner, Inner::Redirecting(_))
    }
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("follow_redirects", &self.follows_redirects())
            .finish()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: Request<Body>) -> Result<Response<Body>, TransportError> {
        let response = match &self.inner {
            Inner::Direct(client) => client.request(request).await,
            Inner::Redirecting(client) => client.clone().oneshot(request).await,
        }
        .map_err(TransportError::new)?;

        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_redirect_mode() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        assert!(HyperTransport::new(true).follows_redirects());
        assert!(!HyperTransport::new(false).follows_redirects());
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        // Reserve a port, then free it so nothing is listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = Request::builder()
            .uri(format!("http://{addr}/"))
            .body(Body::empty())
            .unwrap();
        let result = HyperTransport::new(false).send(request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_https_targets_are_dialled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = tokio::spawn(async move { listener.accept().await.is_ok() });

        let request = Request::builder()
            .uri(format!("https://{addr}/"))
            .body(Body::empty())
            .unwrap();
        // The listener speaks no TLS, so the handshake fails after connecting.
        let result = HyperTransport::new(false).send(request).await;
        assert!(result.is_err());
        assert!(accepted.await.unwrap());
    }

    fn redirected(uri: &str) -> Request<Body> {
        let mut request = Request::builder()
            .uri(uri)
            .header(header::HOST, "first.example.com:8080")
            .body(Body::empty())
            .unwrap();
        Policy::<Body, std::convert::Infallible>::on_request(&mut RetargetHost::default(), &mut request);
        request
    }

    #[test]
    fn test_redirect_recomputes_host() {
        let request = redirected("http://second.example.com:9090/new");
        assert_eq!(request.headers()[header::HOST], "second.example.com:9090");

        let request = redirected("https://second.example.com:443/new");
        assert_eq!(request.headers()[header::HOST], "second.example.com");
    }
}
