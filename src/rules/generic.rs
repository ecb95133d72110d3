//! Closure-backed rule for embedding the proxy in code.

use std::fmt;

use url::Url;

use crate::auth::Principal;
use crate::proxy::request::OutboundRequest;
use crate::rules::{ProxyRule, RuleError};

type MatchFn = dyn Fn(&Url) -> bool + Send + Sync;
type ModifyFn = dyn Fn(&mut OutboundRequest, &Principal) -> Result<(), RuleError> + Send + Sync;

/// Rule assembled from a match predicate and an optional request modifier.
///
/// The response modifier is a no-op; implement [`ProxyRule`] directly when
/// the response needs adjusting.
pub struct GenericRule {
    matcher: Box<MatchFn>,
    modifier: Option<Box<ModifyFn>>,
    authentication_schemes: Vec<String>,
    requires_authentication: bool,
    pre_process_response: bool,
}

impl GenericRule {
    pub fn new<F>(matcher: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        Self {
            matcher: Box::new(matcher),
            modifier: None,
            authentication_schemes: Vec::new(),
            requires_authentication: false,
            pre_process_response: true,
        }
    }

    pub fn with_modifier<F>(mut self, modifier: F) -> Self
    where
        F: Fn(&mut OutboundRequest, &Principal) -> Result<(), RuleError> + Send + Sync + 'static,
    {
        self.modifier = Some(Box::new(modifier));
        self
    }

    /// Require authentication against `schemes`, tried in order.
    pub fn require_authentication<I, S>(mut self, schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires_authentication = true;
        self.authentication_schemes = schemes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pre_process_response(mut self, enabled: bool) -> Self {
        self.pre_process_response = enabled;
        self
    }
}

impl fmt::Debug for GenericRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericRule")
            .field("authentication_schemes", &self.authentication_schemes)
            .field("requires_authentication", &self.requires_authentication)
            .field("pre_process_response", &self.pre_process_response)
            .finish_non_exhaustive()
    }
}

impl ProxyRule for GenericRule {
    fn authentication_schemes(&self) -> &[String] {
        &self.authentication_schemes
    }

    fn pre_process_response(&self) -> bool {
        self.pre_process_response
    }

    fn requires_authentication(&self) -> bool {
        self.requires_authentication
    }

    fn matches(&self, uri: &Url) -> bool {
        (self.matcher)(uri)
    }

    fn modify_request(&self, request: &mut OutboundRequest, principal: &Principal) -> Result<(), RuleError> {
        match &self.modifier {
            Some(modifier) => modifier(request, principal),
            None => Ok(()),
        }
    }
}
