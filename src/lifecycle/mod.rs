//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → auth schemes + rules + options → ProxyPipeline
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → graceful shutdown future handed to the server
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then pipeline, then listener
//! - Shutdown stops accepting and lets in-flight requests finish

pub mod signals;
pub mod startup;

pub use signals::shutdown_signal;
pub use startup::{build_pipeline, StartupError};
