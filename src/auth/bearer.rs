//! Static bearer-token authentication.
//!
//! Accepts `Authorization: Bearer <token>` and maps each known token to a
//! named identity with optional roles.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::header;

use crate::auth::{AuthResult, Principal, SchemeHandler};
use crate::http::request::InboundRequest;

#[derive(Debug, Clone)]
struct Identity {
    name: String,
    roles: Vec<String>,
}

/// Bearer token scheme backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct BearerTokenHandler {
    tokens: HashMap<String, Identity>,
}

impl BearerTokenHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as the identity `name` holding `roles`.
    pub fn with_token(mut self, token: impl Into<String>, name: impl Into<String>, roles: Vec<String>) -> Self {
        self.tokens.insert(token.into(), Identity { name: name.into(), roles });
        self
    }
}

#[async_trait]
impl SchemeHandler for BearerTokenHandler {
    async fn authenticate(&self, scheme: &str, request: &InboundRequest) -> AuthResult {
        let Some(auth_val) = request
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
        else {
            return AuthResult::NoResult;
        };

        let Some(token) = auth_val
            .split_once(' ')
            .filter(|(kind, _)| kind.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token.trim())
        else {
            return AuthResult::NoResult;
        };

        match self.tokens.get(token) {
            Some(identity) => {
                let principal = identity
                    .roles
                    .iter()
                    .fold(Principal::authenticated(&identity.name, scheme), |p, role| {
                        p.with_claim("role", role)
                    });
                AuthResult::Success(principal)
            }
            None => AuthResult::Failure("invalid bearer token".to_string()),
        }
    }
}
