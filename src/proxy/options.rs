//! Process-wide proxy options, built once before serving.

use std::sync::Arc;

use crate::proxy::outcome::Reporter;
use crate::proxy::transport::Transport;
use crate::rules::{ProxyRule, RuleSet};

/// Immutable proxy configuration.
#[derive(Clone)]
pub struct ProxyOptions {
    rules: RuleSet,
    follow_redirects: bool,
    add_forwarded_header: bool,
    transport: Option<Arc<dyn Transport>>,
    reporter: Reporter,
}

impl ProxyOptions {
    pub fn builder() -> ProxyOptionsBuilder {
        ProxyOptionsBuilder::default()
    }

    /// Rules in registration order.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    pub fn add_forwarded_header(&self) -> bool {
        self.add_forwarded_header
    }

    /// Transport override, if any.
    pub fn transport(&self) -> Option<&Arc<dyn Transport>> {
        self.transport.as_ref()
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for ProxyOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyOptions")
            .field("rules", &self.rules.len())
            .field("follow_redirects", &self.follow_redirects)
            .field("add_forwarded_header", &self.add_forwarded_header)
            .field("custom_transport", &self.transport.is_some())
            .finish()
    }
}

/// Builder for [`ProxyOptions`].
pub struct ProxyOptionsBuilder {
    rules: Vec<Arc<dyn ProxyRule>>,
    follow_redirects: bool,
    add_forwarded_header: bool,
    transport: Option<Arc<dyn Transport>>,
    reporter: Reporter,
}

impl Default for ProxyOptionsBuilder {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            follow_redirects: true,
            add_forwarded_header: false,
            transport: None,
            reporter: Reporter::noop(),
        }
    }
}

impl ProxyOptionsBuilder {
    /// Append a rule. Earlier rules take precedence.
    pub fn rule(mut self, rule: impl ProxyRule + 'static) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Append already shared rules, keeping their order.
    pub fn rules(mut self, rules: impl IntoIterator<Item = Arc<dyn ProxyRule>>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Ignored when a custom transport is supplied.
    pub fn follow_redirects(mut self, enabled: bool) -> Self {
        self.follow_redirects = enabled;
        self
    }

    pub fn add_forwarded_header(mut self, enabled: bool) -> Self {
        self.add_forwarded_header = enabled;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn build(self) -> ProxyOptions {
        ProxyOptions {
            rules: RuleSet::new(self.rules),
            follow_redirects: self.follow_redirects,
            add_forwarded_header: self.add_forwarded_header,
            transport: self.transport,
            reporter: self.reporter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProxyOptions::default();
        assert!(options.rules().is_empty());
        assert!(options.follow_redirects());
        assert!(!options.add_forwarded_header());
        assert!(options.transport().is_none());
    }
}
