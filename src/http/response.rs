//! Response under construction for the inbound client.
//!
//! The proxy pipeline and the rules write status, headers and body here;
//! the server turns it into an axum response once the pipeline finishes.

use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;

/// Mutable response sent back to the client.
#[derive(Debug)]
pub struct InboundResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

impl Default for InboundResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }
}

impl IntoResponse for InboundResponse {
    fn into_response(self) -> Response<Body> {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
