//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Expose a Prometheus-compatible scrape endpoint
//! - Count request outcomes
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by outcome and status
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   embedders that skip `init_metrics` pay nothing
//! - Labels stay low-cardinality: never the URI

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::proxy::outcome::ProxyOutcome;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one finished request.
pub fn record_outcome(outcome: &ProxyOutcome) {
    metrics::counter!(
        "proxy_requests_total",
        "outcome" => outcome.kind.label(),
        "status" => outcome.status_code.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::outcome::OutcomeBuilder;
    use url::Url;

    #[test]
    fn test_record_without_recorder_is_noop() {
        let uri = Url::parse("http://api.example.com/").unwrap();
        record_outcome(&OutcomeBuilder::new(uri.clone()).not_authenticated());
        record_outcome(&OutcomeBuilder::new(uri.clone()).proxied(uri, 503));
    }
}
