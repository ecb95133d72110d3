//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn validated configuration into a ready `ProxyPipeline`
//! - Register configured authentication schemes
//! - Build rules in file order
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Observability and listeners are the binary's business; this only
//!   assembles the request path

use std::sync::Arc;

use axum::http::HeaderName;

use crate::auth::{ApiKeyHandler, BearerTokenHandler, SchemeRegistry};
use crate::config::ProxyConfig;
use crate::proxy::{ProxyOptions, ProxyPipeline, Reporter};
use crate::rules::{ConfiguredRule, ProxyRule, RuleError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Rule(#[from] RuleError),

    #[error("api key scheme '{scheme}': invalid header '{header}'")]
    ApiKeyHeader { scheme: String, header: String },
}

/// Build the registry of configured authentication schemes.
pub fn build_authenticator(config: &ProxyConfig) -> Result<SchemeRegistry, StartupError> {
    let mut registry = SchemeRegistry::new();

    for bearer in &config.auth.bearer {
        let handler = bearer
            .tokens
            .iter()
            .fold(BearerTokenHandler::new(), |handler, credential| {
                handler.with_token(&credential.token, &credential.name, credential.roles.clone())
            });
        registry = registry.register(&bearer.scheme, handler);
    }

    for api_key in &config.auth.api_key {
        let header = HeaderName::from_bytes(api_key.header.as_bytes()).map_err(|_| {
            StartupError::ApiKeyHeader {
                scheme: api_key.scheme.clone(),
                header: api_key.header.clone(),
            }
        })?;
        let handler = api_key
            .keys
            .iter()
            .fold(ApiKeyHandler::new(header), |handler, credential| {
                handler.with_key(&credential.token, &credential.name)
            });
        registry = registry.register(&api_key.scheme, handler);
    }

    Ok(registry)
}

/// Assemble the pipeline from configuration, reporting outcomes to logs and metrics.
pub fn build_pipeline(config: &ProxyConfig) -> Result<ProxyPipeline, StartupError> {
    build_pipeline_with_reporter(config, Reporter::logging().chain(Reporter::metrics()))
}

pub fn build_pipeline_with_reporter(
    config: &ProxyConfig,
    reporter: Reporter,
) -> Result<ProxyPipeline, StartupError> {
    let authenticator = build_authenticator(config)?;

    let mut rules: Vec<Arc<dyn ProxyRule>> = Vec::with_capacity(config.rules.len());
    for rule_config in &config.rules {
        let rule = ConfiguredRule::from_config(rule_config)?;
        if rule.requires_authentication() && rule.authentication_schemes().is_empty() {
            tracing::warn!(
                rule = rule.name(),
                "Rule requires authentication but lists no schemes; every request will be rejected"
            );
        }
        tracing::debug!(rule = rule.name(), upstream = %rule_config.upstream, "Rule loaded");
        rules.push(Arc::new(rule));
    }

    tracing::info!(
        rules = rules.len(),
        schemes = authenticator.len(),
        follow_redirects = config.proxy.follow_redirects,
        add_forwarded_header = config.proxy.add_forwarded_header,
        "Proxy pipeline built"
    );

    let options = ProxyOptions::builder()
        .rules(rules)
        .follow_redirects(config.proxy.follow_redirects)
        .add_forwarded_header(config.proxy.add_forwarded_header)
        .reporter(reporter)
        .build();

    Ok(ProxyPipeline::new(options).with_authenticator(Arc::new(authenticator)))
}
