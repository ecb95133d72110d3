//! Rules built from `[[rules]]` configuration entries.
//!
//! # Responsibilities
//! - Match on host and/or path prefix
//! - Rewrite the target onto the configured upstream
//! - Apply configured request and response header edits
//! - Pass the authenticated principal upstream on request
//!
//! # Design Decisions
//! - Everything is parsed once at startup; request-time work never fails on config
//! - With `pre_process_response = false` the rule relays status and body only,
//!   hiding every upstream header from the client

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::auth::Principal;
use crate::config::schema::{HeaderRules, RuleConfig};
use crate::proxy::context::ProxyContext;
use crate::proxy::request::OutboundRequest;
use crate::proxy::response::UpstreamResponse;
use crate::rules::matcher::{strip_path_prefix, AndMatcher, HostMatcher, Matcher, PathPrefixMatcher};
use crate::rules::{ProxyRule, RuleError};

/// Parsed header edits.
#[derive(Debug, Clone, Default)]
struct HeaderEdits {
    set: Vec<(HeaderName, HeaderValue)>,
    remove: Vec<HeaderName>,
}

impl HeaderEdits {
    fn parse(rule: &str, rules: &HeaderRules) -> Result<Self, RuleError> {
        let set = rules
            .set
            .iter()
            .map(|(name, value)| Ok((header_name(rule, name)?, header_value(rule, value)?)))
            .collect::<Result<_, RuleError>>()?;
        let remove = rules
            .remove
            .iter()
            .map(|name| header_name(rule, name))
            .collect::<Result<_, _>>()?;
        Ok(Self { set, remove })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        for name in &self.remove {
            headers.remove(name);
        }
        for (name, value) in &self.set {
            headers.insert(name.clone(), value.clone());
        }
    }
}

fn header_name(rule: &str, name: &str) -> Result<HeaderName, RuleError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| RuleError::with_source(format!("rule '{rule}': invalid header name '{name}'"), e))
}

fn header_value(rule: &str, value: &str) -> Result<HeaderValue, RuleError> {
    HeaderValue::from_str(value)
        .map_err(|e| RuleError::with_source(format!("rule '{rule}': invalid header value '{value}'"), e))
}

/// Rule driven entirely by configuration.
#[derive(Debug)]
pub struct ConfiguredRule {
    name: String,
    matcher: AndMatcher,
    path_prefix: Option<String>,
    upstream: Url,
    strip_prefix: bool,
    requires_authentication: bool,
    authentication_schemes: Vec<String>,
    pre_process_response: bool,
    principal_header: Option<HeaderName>,
    request_headers: HeaderEdits,
    response_headers: HeaderEdits,
}

impl ConfiguredRule {
    pub fn from_config(config: &RuleConfig) -> Result<Self, RuleError> {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        let upstream = Url::parse(&config.upstream).map_err(|e| {
            RuleError::with_source(format!("rule '{}': invalid upstream", config.name), e)
        })?;

        let principal_header = config
            .principal_header
            .as_deref()
            .map(|name| header_name(&config.name, name))
            .transpose()?;

        Ok(Self {
            name: config.name.clone(),
            matcher: AndMatcher::new(matchers),
            path_prefix: config.path_prefix.clone(),
            upstream,
            strip_prefix: config.strip_prefix,
            requires_authentication: config.requires_authentication,
            authentication_schemes: config.authentication_schemes.clone(),
            pre_process_response: config.pre_process_response,
            principal_header,
            request_headers: HeaderEdits::parse(&config.name, &config.request_headers)?,
            response_headers: HeaderEdits::parse(&config.name, &config.response_headers)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Map `uri` onto the upstream: upstream scheme/authority, upstream base
    /// path followed by the (optionally stripped) request path, same query.
    fn rewrite(&self, uri: &Url) -> Url {
        let mut path = uri.path();
        if self.strip_prefix {
            if let Some(rest) = self.path_prefix.as_deref().and_then(|p| strip_path_prefix(path, p)) {
                path = rest;
            }
        }
        let path = path.trim_start_matches('/');
        let base = self.upstream.path().trim_end_matches('/');

        let mut target = self.upstream.clone();
        target.set_path(&format!("{base}/{path}"));
        target.set_query(uri.query());
        target
    }
}

#[async_trait]
impl ProxyRule for ConfiguredRule {
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
        self.matcher.matches(uri)
    }

    fn modify_request(&self, request: &mut OutboundRequest, principal: &Principal) -> Result<(), RuleError> {
        request.uri = self.rewrite(&request.uri);
        self.request_headers.apply(&mut request.headers);

        if let Some(header) = &self.principal_header {
            match principal.name().filter(|_| principal.is_authenticated()) {
                Some(name) => {
                    request.headers.insert(header.clone(), header_value(&self.name, name)?);
                }
                // Never let the client impersonate a principal.
                None => {
                    request.headers.remove(header);
                }
            }
        }
        Ok(())
    }

    async fn modify_response(
        &self,
        response: &mut UpstreamResponse,
        ctx: &mut ProxyContext,
    ) -> Result<(), RuleError> {
        if !self.pre_process_response {
            ctx.response.status = response.status;
            if let Some(body) = response.take_body() {
                ctx.response.body = body;
            }
        }
        self.response_headers.apply(&mut ctx.response.headers);
        Ok(())
    }
}
