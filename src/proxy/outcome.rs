//! Per-request outcome and the reporter callback.
//!
//! Every request produces one [`ProxyOutcome`], handed to the configured
//! [`Reporter`] exactly once at whichever terminal point the pipeline
//! reaches.

use std::fmt;
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use url::Url;

use crate::observability::metrics;

/// How a request left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeKind {
    /// No rule matched; the next handler answered.
    NotProxied,
    /// A rule matched but authentication failed.
    NotAuthenticated,
    /// Forwarded (or attempted) to `target`.
    Proxied { target: Url },
}

impl OutcomeKind {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::NotProxied => "not_proxied",
            OutcomeKind::NotAuthenticated => "not_authenticated",
            OutcomeKind::Proxied { .. } => "proxied",
        }
    }
}

/// Terminal classification of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyOutcome {
    pub original_uri: Url,
    #[serde(flatten)]
    pub kind: OutcomeKind,
    pub status_code: u16,
}

impl ProxyOutcome {
    pub fn status(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status_code).ok()
    }

    /// Upstream target, for proxied requests.
    pub fn target(&self) -> Option<&Url> {
        match &self.kind {
            OutcomeKind::Proxied { target } => Some(target),
            _ => None,
        }
    }
}

/// Collects the original URI at request start and finishes into an outcome.
#[derive(Debug)]
pub struct OutcomeBuilder {
    original_uri: Url,
}

impl OutcomeBuilder {
    pub fn new(original_uri: Url) -> Self {
        Self { original_uri }
    }

    pub fn not_proxied(self, status: StatusCode) -> ProxyOutcome {
        self.finish(OutcomeKind::NotProxied, status.as_u16())
    }

    pub fn not_authenticated(self) -> ProxyOutcome {
        self.finish(OutcomeKind::NotAuthenticated, StatusCode::UNAUTHORIZED.as_u16())
    }

    pub fn proxied(self, target: Url, status_code: u16) -> ProxyOutcome {
        self.finish(OutcomeKind::Proxied { target }, status_code)
    }

    fn finish(self, kind: OutcomeKind, status_code: u16) -> ProxyOutcome {
        ProxyOutcome {
            original_uri: self.original_uri,
            kind,
            status_code,
        }
    }
}

/// Callback receiving every outcome. Defaults to a no-op.
///
/// The proxy does not guard against a panicking reporter; keeping it
/// infallible is the caller's job.
#[derive(Clone)]
pub struct Reporter(Arc<dyn Fn(ProxyOutcome) + Send + Sync>);

impl Reporter {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(ProxyOutcome) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Log each outcome as a structured `tracing` event.
    pub fn logging() -> Self {
        Self::new(|outcome| log_outcome(&outcome))
    }

    /// Count each outcome in `proxy_requests_total`.
    pub fn metrics() -> Self {
        Self::new(|outcome| metrics::record_outcome(&outcome))
    }

    /// Invoke `self`, then `next`, with the same outcome.
    pub fn chain(self, next: Reporter) -> Self {
        Self::new(move |outcome: ProxyOutcome| {
            (self.0)(outcome.clone());
            (next.0)(outcome);
        })
    }

    pub fn report(&self, outcome: ProxyOutcome) {
        (self.0)(outcome)
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reporter")
    }
}

fn log_outcome(outcome: &ProxyOutcome) {
    match &outcome.kind {
        OutcomeKind::Proxied { target } => tracing::info!(
            outcome = outcome.kind.label(),
            original_uri = %outcome.original_uri,
            upstream = %target,
            status = outcome.status_code,
            "Request proxied"
        ),
        kind => tracing::info!(
            outcome = kind.label(),
            original_uri = %outcome.original_uri,
            status = outcome.status_code,
            "Request not proxied"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn uri() -> Url {
        Url::parse("http://api.example.com/foo").unwrap()
    }

    #[test]
    fn test_builder_outcomes() {
        let outcome = OutcomeBuilder::new(uri()).not_proxied(StatusCode::NOT_FOUND);
        assert_eq!(outcome.kind, OutcomeKind::NotProxied);
        assert_eq!(outcome.status(), Some(StatusCode::NOT_FOUND));

        let outcome = OutcomeBuilder::new(uri()).not_authenticated();
        assert_eq!(outcome.status_code, 401);
        assert!(outcome.target().is_none());

        let target = Url::parse("http://10.0.0.5:8080/foo").unwrap();
        let outcome = OutcomeBuilder::new(uri()).proxied(target.clone(), 503);
        assert_eq!(outcome.target(), Some(&target));
        assert_eq!(outcome.original_uri, uri());
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let target = Url::parse("http://10.0.0.5:8080/foo").unwrap();
        let outcome = OutcomeBuilder::new(uri()).proxied(target, 200);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "original_uri": "http://api.example.com/foo",
                "kind": "proxied",
                "target": "http://10.0.0.5:8080/foo",
                "status_code": 200
            })
        );
    }

    #[test]
    fn test_chain_reports_to_both() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let a = seen.clone();
        let b = seen.clone();
        let reporter = Reporter::new(move |o: ProxyOutcome| a.lock().unwrap().push(("a", o.status_code)))
            .chain(Reporter::new(move |o: ProxyOutcome| b.lock().unwrap().push(("b", o.status_code))));

        reporter.report(OutcomeBuilder::new(uri()).not_authenticated());
        assert_eq!(*seen.lock().unwrap(), vec![("a", 401), ("b", 401)]);
    }
}
