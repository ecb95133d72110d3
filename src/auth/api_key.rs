//! API key authentication via a configurable request header.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::HeaderName;

use crate::auth::{AuthResult, Principal, SchemeHandler};
use crate::http::request::InboundRequest;

/// Scheme reading a key from `header` and mapping it to an identity name.
#[derive(Debug, Clone)]
pub struct ApiKeyHandler {
    header: HeaderName,
    keys: HashMap<String, String>,
}

impl ApiKeyHandler {
    pub fn new(header: HeaderName) -> Self {
        Self {
            header,
            keys: HashMap::new(),
        }
    }

    /// Accept `key` as the identity `name`.
    pub fn with_key(mut self, key: impl Into<String>, name: impl Into<String>) -> Self {
        self.keys.insert(key.into(), name.into());
        self
    }
}

#[async_trait]
impl SchemeHandler for ApiKeyHandler {
    async fn authenticate(&self, scheme: &str, request: &InboundRequest) -> AuthResult {
        let key = match request.headers.get(&self.header) {
            Some(val) => val.to_str().unwrap_or_default(),
            None => return AuthResult::NoResult,
        };

        match self.keys.get(key) {
            Some(name) => AuthResult::Success(Principal::authenticated(name, scheme)),
            None => AuthResult::Failure(format!("unknown key in {}", self.header)),
        }
    }
}
