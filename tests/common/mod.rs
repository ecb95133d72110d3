//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use rule_proxy::config::parse_config;
use rule_proxy::http::HttpServer;
use rule_proxy::lifecycle::startup::build_pipeline_with_reporter;
use rule_proxy::{ProxyOutcome, Reporter};

/// Serve `router` as a mock upstream on an ephemeral port.
pub async fn start_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Upstream that answers every request with a JSON description of it.
pub async fn start_echo_upstream() -> SocketAddr {
    start_upstream(Router::new().fallback(echo)).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header = |name: &str| {
        let values: Vec<_> = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    };
    Json(json!({
        "method": method.as_str(),
        "path": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        "host": header("host"),
        "content_type": header("content-type"),
        "user": header("x-user"),
        "request_id": header("x-request-id"),
        "forwarded": header("forwarded"),
        "body": String::from_utf8_lossy(&body),
    }))
}

/// Outcomes reported by a proxy under test.
#[derive(Clone, Default)]
pub struct Outcomes(Arc<Mutex<Vec<ProxyOutcome>>>);

impl Outcomes {
    pub fn reporter(&self) -> Reporter {
        let outcomes = self.0.clone();
        Reporter::new(move |outcome| outcomes.lock().unwrap().push(outcome))
    }

    pub fn take(&self) -> Vec<ProxyOutcome> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

/// Start a proxy configured from TOML on an ephemeral port.
pub async fn start_proxy(config: &str) -> (SocketAddr, Outcomes) {
    let config = parse_config(config).unwrap();
    let outcomes = Outcomes::default();
    let pipeline = build_pipeline_with_reporter(&config, outcomes.reporter()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = HttpServer::new(pipeline)
            .run(listener, std::future::pending())
            .await;
    });
    (addr, outcomes)
}

/// An address nothing listens on.
pub async fn freed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}
