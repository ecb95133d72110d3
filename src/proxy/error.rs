//! Errors that escape the proxy pipeline.
//!
//! Upstream connectivity failures and authentication rejection are handled
//! inside the pipeline and never show up here.

use crate::rules::RuleError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The inbound request does not form an absolute URI (e.g. no host).
    #[error("inbound request has no valid target uri: {0}")]
    InvalidTarget(#[from] url::ParseError),

    /// A rule failed while modifying the request or response.
    #[error("proxy rule failed: {0}")]
    Rule(#[from] RuleError),
}
