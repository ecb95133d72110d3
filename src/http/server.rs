//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with a catch-all handler
//! - Wire up middleware (request ID, tracing)
//! - Bind server to listener with graceful shutdown
//! - Run each request through the proxy pipeline
//! - Turn client disconnects into pipeline aborts
//!
//! # Design Decisions
//! - The pipeline runs on its own task so a disconnect is observed and
//!   reported instead of silently dropping the request
//! - Pipeline errors map to 400 (unusable target) or 500 (rule fault)

use std::future::Future;
use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::http::request::{InboundRequest, MakeRequestUuid, X_REQUEST_ID};
use crate::proxy::{AbortHandle, AbortSignal, ProxyContext, ProxyError, ProxyPipeline};

/// HTTP server fronting the proxy pipeline.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(pipeline: ProxyPipeline) -> Self {
        Self {
            router: Self::build_router(pipeline),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(pipeline: ProxyPipeline) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);

        let middleware = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(PropagateRequestIdLayer::new(request_id));

        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(pipeline)
            .layer(middleware)
    }

    /// The router, for embedding or driving without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Fires the abort signal if the handler future is dropped mid-request.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn proxy_handler(
    State(pipeline): State<ProxyPipeline>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (handle, signal) = AbortSignal::new();
    let _abort_on_drop = AbortOnDrop(handle);

    let mut ctx = ProxyContext::new(InboundRequest::from_http(request, Some(addr))).with_abort_signal(signal);

    let task = tokio::spawn(async move {
        let result = pipeline.invoke(&mut ctx).await;
        (ctx, result)
    });

    match task.await {
        Ok((ctx, Ok(()))) => ctx.response.into_response(),
        Ok((_, Err(e))) => error_response(e),
        Err(e) => {
            tracing::error!(error = %e, "Proxy task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn error_response(error: ProxyError) -> Response {
    match error {
        ProxyError::InvalidTarget(e) => {
            tracing::warn!(error = %e, "Rejecting request without a usable target");
            (StatusCode::BAD_REQUEST, "Invalid request target").into_response()
        }
        ProxyError::Rule(e) => {
            tracing::error!(error = %e, "Proxy rule failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
