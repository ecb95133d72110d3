//! Target URI matching logic.
//!
//! # Responsibilities
//! - Match the target host (exact match, case-insensitive)
//! - Match the target path prefix (case-sensitive)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - Empty condition = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use url::Url;

/// Trait for matching target URIs against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the URI matches this condition.
    fn matches(&self, uri: &Url) -> bool;
}

/// Matches the target host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, uri: &Url) -> bool {
        uri.host_str()
            .map(|h| h.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches the target path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, uri: &Url) -> bool {
        strip_path_prefix(uri.path(), &self.prefix).is_some()
    }
}

/// Strip `prefix` from `path` only on a segment boundary, so `/v1` covers
/// `/v1` and `/v1/x` but not `/v10`.
pub fn strip_path_prefix<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, uri: &Url) -> bool {
        self.matchers.iter().all(|m| m.matches(uri))
    }
}
