//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → request.rs (InboundRequest: scheme, host, path, body)
//!     → proxy pipeline (rules, auth, forwarding)
//!     → response.rs (InboundResponse → axum Response)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, MakeRequestUuid, X_REQUEST_ID};
pub use response::InboundResponse;
pub use server::HttpServer;
