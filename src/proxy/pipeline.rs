//! Per-request orchestration.
//!
//! ```text
//! Received → Matching ─┬─ no rule ──────────────→ NotProxied (next handler)
//!                      └─ rule → Authenticating ─┬─ rejected → 401
//!                                                └─ Forwarding ─┬─ unreachable → 503
//!                                                               └─ Responding
//! ```
//! Each terminal state reports exactly one outcome. Steps run strictly in
//! order for a given request; concurrency comes only from the host running
//! many requests at once.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::auth::{AuthenticationGate, Authenticator, GateDecision};
use crate::proxy::context::ProxyContext;
use crate::proxy::error::ProxyError;
use crate::proxy::forwarder::{ForwardError, UpstreamForwarder};
use crate::proxy::options::ProxyOptions;
use crate::proxy::outcome::{OutcomeBuilder, ProxyOutcome};
use crate::proxy::request::RequestTransformer;
use crate::proxy::response::ResponseTransformer;
use crate::proxy::transport::{HyperTransport, Transport};

/// Status reported when the client went away before the upstream answered.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Handler invoked for requests no rule claims.
#[async_trait]
pub trait NextHandler: Send + Sync {
    async fn handle(&self, ctx: &mut ProxyContext);
}

/// Answers unclaimed requests with 404.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFound;

#[async_trait]
impl NextHandler for NotFound {
    async fn handle(&self, ctx: &mut ProxyContext) {
        ctx.response.status = StatusCode::NOT_FOUND;
        ctx.response.body = "No matching proxy rule".into();
    }
}

/// The rule-based forwarding pipeline.
#[derive(Clone)]
pub struct ProxyPipeline {
    options: Arc<ProxyOptions>,
    gate: AuthenticationGate,
    request_transformer: RequestTransformer,
    forwarder: UpstreamForwarder,
    response_transformer: ResponseTransformer,
    next: Arc<dyn NextHandler>,
}

impl ProxyPipeline {
    /// Build the pipeline. The transport is created here, once, unless the
    /// options carry an override.
    pub fn new(options: ProxyOptions) -> Self {
        let transport: Arc<dyn Transport> = match options.transport() {
            Some(transport) => transport.clone(),
            None => Arc::new(HyperTransport::new(options.follow_redirects())),
        };

        Self {
            request_transformer: RequestTransformer::new(options.add_forwarded_header()),
            forwarder: UpstreamForwarder::new(transport),
            response_transformer: ResponseTransformer,
            gate: AuthenticationGate::default(),
            next: Arc::new(NotFound),
            options: Arc::new(options),
        }
    }

    /// Use `authenticator` for rules that require authentication.
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.gate = AuthenticationGate::new(authenticator);
        self
    }

    /// Use `next` for requests no rule matches.
    pub fn with_next_handler(mut self, next: Arc<dyn NextHandler>) -> Self {
        self.next = next;
        self
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Run one request through the pipeline.
    ///
    /// On `Ok`, `ctx.response` holds the response for the client and the
    /// outcome has been reported. Errors are rule faults or an unusable
    /// inbound URI; nothing is reported for them.
    pub async fn invoke(&self, ctx: &mut ProxyContext) -> Result<(), ProxyError> {
        let uri = ctx.request.target_uri()?;
        let outcome = OutcomeBuilder::new(uri.clone());

        let Some(rule) = self.options.rules().find(&uri) else {
            tracing::debug!(uri = %uri, "No rule matched, passing through");
            self.next.handle(ctx).await;
            self.report(outcome.not_proxied(ctx.response.status));
            return Ok(());
        };
        tracing::debug!(uri = %uri, rule = ?rule, "Rule matched");

        if rule.requires_authentication()
            && self.gate.check(rule.authentication_schemes(), ctx).await == GateDecision::Rejected
        {
            tracing::warn!(uri = %uri, "Authentication failed for proxied request");
            ctx.response.status = StatusCode::UNAUTHORIZED;
            self.report(outcome.not_authenticated());
            return Ok(());
        }

        let outbound = self.request_transformer.transform(&uri, rule.as_ref(), ctx)?;
        let target = outbound.uri.clone();

        let status = match self.forwarder.forward(outbound, &mut ctx.aborted).await {
            Ok(mut upstream) => {
                self.response_transformer
                    .apply(rule.as_ref(), &mut upstream, ctx)
                    .await?;
                ctx.response.status.as_u16()
            }
            Err(ForwardError::Aborted) => {
                tracing::debug!(upstream = %target, "Client aborted before upstream answered");
                if let Ok(status) = StatusCode::from_u16(CLIENT_CLOSED_REQUEST) {
                    ctx.response.status = status;
                }
                CLIENT_CLOSED_REQUEST
            }
            Err(e) => {
                tracing::warn!(upstream = %target, error = %e, "Upstream request failed");
                ctx.response.status = StatusCode::SERVICE_UNAVAILABLE;
                ctx.response.status.as_u16()
            }
        };

        self.report(outcome.proxied(target, status));
        Ok(())
    }

    fn report(&self, outcome: ProxyOutcome) {
        self.options.reporter().report(outcome);
    }
}

impl std::fmt::Debug for ProxyPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyPipeline")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
