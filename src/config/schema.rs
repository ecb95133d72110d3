//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Pipeline-wide switches.
    pub proxy: ProxySettings,

    /// Proxy rules, in matching order.
    pub rules: Vec<RuleConfig>,

    /// Authentication schemes available to rules.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Switches applied to every proxied request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Follow upstream redirects instead of relaying them.
    pub follow_redirects: bool,

    /// Append a `Forwarded` header describing the client hop.
    pub add_forwarded_header: bool,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            add_forwarded_header: false,
        }
    }
}

/// A proxy rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Rule identifier for logging.
    pub name: String,

    /// Target host to match (exact, case-insensitive).
    pub host: Option<String>,

    /// Target path prefix to match.
    pub path_prefix: Option<String>,

    /// Upstream base URL (e.g., "http://10.0.0.5:8080/api").
    pub upstream: String,

    /// Remove `path_prefix` from the path before forwarding.
    #[serde(default)]
    pub strip_prefix: bool,

    #[serde(default)]
    pub requires_authentication: bool,

    /// Schemes tried in order when authentication is required.
    #[serde(default)]
    pub authentication_schemes: Vec<String>,

    /// Copy the upstream response to the client before the rule's hook.
    #[serde(default = "default_true")]
    pub pre_process_response: bool,

    /// Header carrying the authenticated principal's name upstream.
    pub principal_header: Option<String>,

    #[serde(default)]
    pub request_headers: HeaderRules,

    #[serde(default)]
    pub response_headers: HeaderRules,
}

fn default_true() -> bool {
    true
}

/// Header edits applied by a rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderRules {
    /// Headers to set (overwrite).
    pub set: BTreeMap<String, String>,

    /// Headers to remove.
    pub remove: Vec<String>,
}

/// Authentication schemes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `Authorization: Bearer` schemes.
    pub bearer: Vec<BearerSchemeConfig>,

    /// Header API key schemes.
    pub api_key: Vec<ApiKeySchemeConfig>,
}

impl AuthConfig {
    /// Names of all declared schemes.
    pub fn scheme_names(&self) -> impl Iterator<Item = &str> {
        self.bearer
            .iter()
            .map(|s| s.scheme.as_str())
            .chain(self.api_key.iter().map(|s| s.scheme.as_str()))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BearerSchemeConfig {
    /// Scheme identifier referenced by rules.
    pub scheme: String,

    #[serde(default)]
    pub tokens: Vec<CredentialConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeySchemeConfig {
    /// Scheme identifier referenced by rules.
    pub scheme: String,

    /// Header carrying the key.
    #[serde(default = "default_api_key_header")]
    pub header: String,

    #[serde(default)]
    pub keys: Vec<CredentialConfig>,
}

fn default_api_key_header() -> String {
    "x-api-key".to_string()
}

/// A secret and the identity it stands for.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    pub token: String,

    /// Principal name.
    pub name: String,

    #[serde(default)]
    pub roles: Vec<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format (pretty, json).
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
