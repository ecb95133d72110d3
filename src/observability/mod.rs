//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline produces one ProxyOutcome per request
//!     → Reporter::logging  → logging.rs subscriber (structured events)
//!     → Reporter::metrics  → metrics.rs (proxy_requests_total)
//!
//! HTTP layer produces:
//!     → TraceLayer spans carrying x-request-id
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the inbound request to the upstream and back
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
