//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Matched rule (requires_authentication = true)
//!     → gate.rs (walk the rule's schemes in order)
//!     → Authenticator::authenticate(scheme, request)
//!         → SchemeRegistry → bearer.rs / api_key.rs
//!     → first success replaces the request principal
//!     → all failed: 401, upstream never contacted
//! ```
//!
//! # Design Decisions
//! - The gate knows nothing about credentials; handlers know nothing about rules
//! - Unknown schemes fail instead of erroring, so a typo yields 401 not 500
//! - Handlers are immutable after startup and shared across requests

pub mod api_key;
pub mod bearer;
pub mod gate;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::request::InboundRequest;

pub use api_key::ApiKeyHandler;
pub use bearer::BearerTokenHandler;
pub use gate::{AuthenticationGate, GateDecision};

/// Identity attached to a request.
///
/// A principal without an authentication type is anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Principal {
    name: Option<String>,
    authentication_type: Option<String>,
    claims: BTreeMap<String, Vec<String>>,
}

impl Principal {
    /// The unauthenticated principal every request starts with.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An identity established by `scheme`.
    pub fn authenticated(name: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            authentication_type: Some(scheme.into()),
            claims: BTreeMap::new(),
        }
    }

    /// Add a claim value.
    pub fn with_claim(mut self, claim: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.entry(claim.into()).or_default().push(value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Scheme that authenticated this principal.
    pub fn authentication_type(&self) -> Option<&str> {
        self.authentication_type.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authentication_type.is_some()
    }

    /// All values of `claim`.
    pub fn claim(&self, claim: &str) -> &[String] {
        self.claims.get(claim).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Result of authenticating a request against one scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthResult {
    Success(Principal),
    /// Credentials were present but rejected.
    Failure(String),
    /// The scheme found no credentials it understands.
    NoResult,
}

impl AuthResult {
    pub fn succeeded(&self) -> bool {
        matches!(self, AuthResult::Success(_))
    }
}

/// External authentication collaborator consulted by the gate.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate `request` with the scheme registered as `scheme`.
    async fn authenticate(&self, scheme: &str, request: &InboundRequest) -> AuthResult;
}

/// Handler for a single authentication scheme.
#[async_trait]
pub trait SchemeHandler: Send + Sync + fmt::Debug {
    async fn authenticate(&self, scheme: &str, request: &InboundRequest) -> AuthResult;
}

/// Named scheme handlers, resolved at request time by scheme identifier.
#[derive(Debug, Clone, Default)]
pub struct SchemeRegistry {
    handlers: HashMap<String, Arc<dyn SchemeHandler>>,
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `scheme`, replacing any earlier handler.
    pub fn register(mut self, scheme: impl Into<String>, handler: impl SchemeHandler + 'static) -> Self {
        self.handlers.insert(scheme.into(), Arc::new(handler));
        self
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.handlers.contains_key(scheme)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[async_trait]
impl Authenticator for SchemeRegistry {
    async fn authenticate(&self, scheme: &str, request: &InboundRequest) -> AuthResult {
        match self.handlers.get(scheme) {
            Some(handler) => handler.authenticate(scheme, request).await,
            None => AuthResult::Failure(format!("no handler registered for scheme '{scheme}'")),
        }
    }
}
