//! Rule-based forwarding pipeline.
//!
//! # Data Flow
//! ```text
//! ProxyContext (inbound request, client response, principal, abort signal)
//!     → pipeline.rs   (match rule via RuleSet)
//!     → auth::gate    (only when the rule requires it)
//!     → request.rs    (RequestTransformer: inbound → OutboundRequest)
//!     → forwarder.rs  (send through transport.rs, race the abort signal)
//!     → response.rs   (ResponseTransformer: upstream → client response)
//!     → outcome.rs    (exactly one ProxyOutcome to the Reporter)
//! ```
//!
//! # Design Decisions
//! - One HTTP client per pipeline, shared by all requests
//! - Upstream failures become a 503 response, not an error
//! - Rule faults are errors and propagate to the host

pub mod context;
pub mod error;
pub mod forwarder;
pub mod options;
pub mod outcome;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod transport;

pub use context::{AbortHandle, AbortSignal, ProxyContext};
pub use error::ProxyError;
pub use forwarder::{ForwardError, UpstreamForwarder};
pub use options::{ProxyOptions, ProxyOptionsBuilder};
pub use outcome::{OutcomeKind, ProxyOutcome, Reporter};
pub use pipeline::{NextHandler, NotFound, ProxyPipeline, CLIENT_CLOSED_REQUEST};
pub use request::{OutboundContent, OutboundRequest, RequestTransformer};
pub use response::{ResponseTransformer, UpstreamResponse};
pub use transport::{HyperTransport, Transport, TransportError};
