//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Pick pretty or JSON output
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - JSON format for production, pretty format for development

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Default filter when neither `RUST_LOG` nor a level is configured.
const DEFAULT_DIRECTIVES: &str = "rule_proxy=info,tower_http=info";

/// Build the filter: `RUST_LOG` if set, else `level` for this crate and tower-http.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if level.is_empty() {
            EnvFilter::new(DEFAULT_DIRECTIVES)
        } else {
            EnvFilter::new(format!("rule_proxy={level},tower_http={level}"))
        }
    })
}

/// Install the global subscriber. Call once, before anything logs.
pub fn init(config: &ObservabilityConfig) {
    let filter = env_filter(&config.log_level);

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
