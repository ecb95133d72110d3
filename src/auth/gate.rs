//! Authentication gate in front of matched rules.
//!
//! Walks a rule's schemes in order and stops at the first success, whose
//! principal replaces the request principal. A request that already carries
//! an authenticated principal passes without a challenge.

use std::sync::Arc;

use crate::auth::{AuthResult, Authenticator, SchemeRegistry};
use crate::proxy::context::ProxyContext;

/// Outcome of the gate for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Rejected,
}

/// Consults the authentication collaborator for rules that require it.
#[derive(Clone)]
pub struct AuthenticationGate {
    authenticator: Arc<dyn Authenticator>,
}

impl AuthenticationGate {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Authenticate `ctx` against `schemes`, in order.
    pub async fn check(&self, schemes: &[String], ctx: &mut ProxyContext) -> GateDecision {
        if ctx.user.is_authenticated() {
            return GateDecision::Allowed;
        }

        for scheme in schemes {
            match self.authenticator.authenticate(scheme, &ctx.request).await {
                AuthResult::Success(principal) => {
                    tracing::debug!(
                        scheme = %scheme,
                        principal = principal.name().unwrap_or("-"),
                        "Authentication succeeded"
                    );
                    ctx.user = principal;
                    return GateDecision::Allowed;
                }
                AuthResult::Failure(reason) => {
                    tracing::debug!(scheme = %scheme, reason = %reason, "Authentication failed");
                }
                AuthResult::NoResult => {
                    tracing::debug!(scheme = %scheme, "No credentials for scheme");
                }
            }
        }

        GateDecision::Rejected
    }
}

impl Default for AuthenticationGate {
    fn default() -> Self {
        Self::new(Arc::new(SchemeRegistry::new()))
    }
}

impl std::fmt::Debug for AuthenticationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationGate").finish_non_exhaustive()
    }
}
