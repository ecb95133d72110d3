//! Proxy rule subsystem.
//!
//! # Data Flow
//! ```text
//! Target URI (scheme, host, path base, path, query)
//!     → RuleSet::find (registration order)
//!     → ProxyRule::matches
//!     → Return: first matching rule or None (pass-through)
//!
//! Rule construction (at startup):
//!     RuleConfig[] → configured.rs (ConfiguredRule)
//!     embedding code → generic.rs (GenericRule) or a custom ProxyRule
//!     → frozen into an immutable RuleSet
//! ```
//!
//! # Design Decisions
//! - Rules are built once at startup and never mutated afterwards
//! - Rules hold no per-request state; one instance serves every request concurrently
//! - Deterministic: first registered match wins, no priorities
//! - Rule faults are returned as `RuleError` and propagate out of the pipeline

pub mod configured;
pub mod generic;
pub mod matcher;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::auth::Principal;
use crate::proxy::context::ProxyContext;
use crate::proxy::request::OutboundRequest;
use crate::proxy::response::UpstreamResponse;

pub use configured::ConfiguredRule;
pub use generic::GenericRule;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fault raised by a rule while modifying a request or response.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RuleError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// A policy unit deciding whether and how a request is proxied.
///
/// Implementations are shared across all in-flight requests and must not
/// keep per-request state.
#[async_trait]
pub trait ProxyRule: Send + Sync + fmt::Debug {
    /// Schemes tried, in order, when authentication is required.
    fn authentication_schemes(&self) -> &[String] {
        &[]
    }

    /// Whether the pipeline copies the upstream response onto the client
    /// response before [`ProxyRule::modify_response`] runs.
    ///
    /// When `false`, `modify_response` receives the upstream response with
    /// its body untouched and the client response still at its defaults
    /// (status 200, no headers, empty body); the rule builds it itself.
    fn pre_process_response(&self) -> bool {
        true
    }

    fn requires_authentication(&self) -> bool {
        false
    }

    /// Does this rule handle `uri`?
    fn matches(&self, uri: &Url) -> bool;

    /// Customize the outbound request. Runs after the generic copy, so
    /// anything set here wins.
    fn modify_request(&self, request: &mut OutboundRequest, principal: &Principal) -> Result<(), RuleError>;

    /// Final look at the exchange once the upstream has answered.
    async fn modify_response(
        &self,
        _response: &mut UpstreamResponse,
        _ctx: &mut ProxyContext,
    ) -> Result<(), RuleError> {
        Ok(())
    }
}

/// Ordered, immutable collection of rules.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Arc<dyn ProxyRule>>,
}

impl RuleSet {
    pub fn new(rules: Vec<Arc<dyn ProxyRule>>) -> Self {
        Self { rules }
    }

    /// First rule, in registration order, matching `uri`.
    pub fn find(&self, uri: &Url) -> Option<&Arc<dyn ProxyRule>> {
        self.rules.iter().find(|rule| rule.matches(uri))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ProxyRule>> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FromIterator<Arc<dyn ProxyRule>> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Arc<dyn ProxyRule>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_rule(host: &'static str, tag: &'static str) -> Arc<dyn ProxyRule> {
        Arc::new(
            GenericRule::new(move |uri: &Url| uri.host_str() == Some(host)).with_modifier(
                move |req: &mut OutboundRequest, _: &Principal| {
                    req.headers.insert("x-rule", axum::http::HeaderValue::from_static(tag));
                    Ok(())
                },
            ),
        )
    }

    #[test]
    fn test_first_match_wins() {
        let rules = RuleSet::new(vec![
            host_rule("other.example.com", "other"),
            host_rule("api.example.com", "first"),
            host_rule("api.example.com", "second"),
        ]);
        let uri = Url::parse("http://api.example.com/foo").unwrap();

        let matched = rules.find(&uri).expect("a rule should match");
        assert!(Arc::ptr_eq(matched, &rules.rules[1]));
    }

    #[test]
    fn test_no_match() {
        let rules: RuleSet = vec![host_rule("api.example.com", "a")].into_iter().collect();
        let uri = Url::parse("http://unrelated.example.com/").unwrap();
        assert!(rules.find(&uri).is_none());
        assert_eq!(rules.len(), 1);
    }

    #[test]
    fn test_rule_error_source() {
        let err = RuleError::with_source("rewrite failed", std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "rewrite failed");
        assert!(std::error::Error::source(&err).is_some());
    }
}
