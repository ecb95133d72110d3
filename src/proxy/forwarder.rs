//! Upstream dispatch.
//!
//! Sends one transformed request over the shared transport and races it
//! against the client's abort signal. Exactly one attempt, no retry.

use std::sync::Arc;

use crate::proxy::context::AbortSignal;
use crate::proxy::request::OutboundRequest;
use crate::proxy::response::UpstreamResponse;
use crate::proxy::transport::{Transport, TransportError};

/// Why no upstream response is available.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream unreachable: {0}")]
    Unreachable(#[source] TransportError),

    #[error("outbound request has an unusable target: {0}")]
    InvalidRequest(#[from] axum::http::uri::InvalidUri),

    #[error("inbound request aborted by client")]
    Aborted,
}

/// Dispatches outbound requests over a shared transport.
#[derive(Clone)]
pub struct UpstreamForwarder {
    transport: Arc<dyn Transport>,
}

impl UpstreamForwarder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `request`, resolving once the upstream response headers are in.
    pub async fn forward(
        &self,
        request: OutboundRequest,
        aborted: &mut AbortSignal,
    ) -> Result<UpstreamResponse, ForwardError> {
        let request = request.into_http()?;

        tokio::select! {
            result = self.transport.send(request) => result
                .map(UpstreamResponse::from)
                .map_err(ForwardError::Unreachable),
            _ = aborted.aborted() => Err(ForwardError::Aborted),
        }
    }
}

impl std::fmt::Debug for UpstreamForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamForwarder").finish_non_exhaustive()
    }
}
