//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (rules reference declared auth schemes)
//! - Validate values (addresses parse, upstreams are http(s) URLs, header names are legal)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};
use url::Url;

use crate::config::schema::{HeaderRules, ProxyConfig, RuleConfig};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("rule #{index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error("duplicate rule name '{0}'")]
    DuplicateRule(String),

    #[error("rule '{rule}': invalid upstream '{upstream}': {reason}")]
    InvalidUpstream {
        rule: String,
        upstream: String,
        reason: String,
    },

    #[error("rule '{rule}': unknown authentication scheme '{scheme}'")]
    UnknownScheme { rule: String, scheme: String },

    #[error("rule '{rule}': invalid header '{header}'")]
    InvalidHeader { rule: String, header: String },

    #[error("duplicate authentication scheme '{0}'")]
    DuplicateScheme(String),

    #[error("invalid api key header '{0}'")]
    InvalidApiKeyHeader(String),

    #[error("unknown log format '{0}' (expected pretty or json)")]
    InvalidLogFormat(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener",
            value: config.listener.bind_address.clone(),
        });
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "metrics",
            value: observability.metrics_address.clone(),
        });
    }
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::InvalidLogFormat(observability.log_format.clone()));
    }

    let mut schemes = HashSet::new();
    for scheme in config.auth.scheme_names() {
        if !schemes.insert(scheme) {
            errors.push(ValidationError::DuplicateScheme(scheme.to_string()));
        }
    }
    for api_key in &config.auth.api_key {
        if HeaderName::from_bytes(api_key.header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidApiKeyHeader(api_key.header.clone()));
        }
    }

    let mut names = HashSet::new();
    for (index, rule) in config.rules.iter().enumerate() {
        if rule.name.is_empty() {
            errors.push(ValidationError::EmptyRuleName { index });
        } else if !names.insert(rule.name.as_str()) {
            errors.push(ValidationError::DuplicateRule(rule.name.clone()));
        }

        if let Err(reason) = check_upstream(&rule.upstream) {
            errors.push(ValidationError::InvalidUpstream {
                rule: rule.name.clone(),
                upstream: rule.upstream.clone(),
                reason,
            });
        }

        for scheme in &rule.authentication_schemes {
            if !schemes.contains(scheme.as_str()) {
                errors.push(ValidationError::UnknownScheme {
                    rule: rule.name.clone(),
                    scheme: scheme.clone(),
                });
            }
        }

        check_headers(rule, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_upstream(upstream: &str) -> Result<(), String> {
    let url = Url::parse(upstream).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    Ok(())
}

fn check_headers(rule: &RuleConfig, errors: &mut Vec<ValidationError>) {
    let mut invalid = |header: &str| {
        errors.push(ValidationError::InvalidHeader {
            rule: rule.name.clone(),
            header: header.to_string(),
        })
    };

    let mut check = |rules: &HeaderRules| {
        for (name, value) in &rules.set {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                invalid(name);
            }
        }
        for name in &rules.remove {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                invalid(name);
            }
        }
    };
    check(&rule.request_headers);
    check(&rule.response_headers);

    if let Some(name) = &rule.principal_header {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            invalid(name);
        }
    }
}
