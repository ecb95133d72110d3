//! Rule-based HTTP reverse proxy library.
//!
//! Requests are matched against an ordered set of rules; the first rule
//! that claims a request may demand authentication, rewrites the request
//! onto its upstream, and shapes the response on the way back.

pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod rules;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use proxy::{ProxyContext, ProxyOptions, ProxyOutcome, ProxyPipeline, Reporter};
pub use rules::{ProxyRule, RuleSet};
