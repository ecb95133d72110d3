//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → lifecycle::startup builds rules, auth schemes and options from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload, rules are fixed at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, HeaderRules, ListenerConfig, ObservabilityConfig, ProxyConfig, ProxySettings, RuleConfig,
};
