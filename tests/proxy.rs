//! End-to-end tests: client → proxy → mock upstream.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::Router;
use serde_json::Value;

use rule_proxy::proxy::OutcomeKind;

mod common;

#[tokio::test]
async fn test_rewrites_onto_upstream() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, outcomes) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
host = "api.example.com"
path_prefix = "/v1"
strip_prefix = true
upstream = "http://{upstream}/base"
"#
    ))
    .await;

    let res = common::client()
        .get(format!("http://{proxy}/v1/items?x=1"))
        .header(header::HOST, "api.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let request_id = res.headers().get("x-request-id").cloned();
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["path"], "/base/items?x=1");
    assert_eq!(echo["host"], upstream.to_string());
    assert_eq!(
        echo["request_id"].as_str(),
        request_id.as_ref().and_then(|v| v.to_str().ok())
    );

    let outcomes = outcomes.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].original_uri.as_str(), "http://api.example.com/v1/items?x=1");
    assert_eq!(
        outcomes[0].target().map(|t| t.as_str().to_string()),
        Some(format!("http://{upstream}/base/items?x=1"))
    );
    assert_eq!(outcomes[0].status_code, 200);
}

#[tokio::test]
async fn test_unmatched_request_falls_through() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, outcomes) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
host = "api.example.com"
upstream = "http://{upstream}"
"#
    ))
    .await;

    let res = common::client()
        .get(format!("http://{proxy}/anything"))
        .header(header::HOST, "www.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "No matching proxy rule");

    let outcomes = outcomes.take();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].kind, OutcomeKind::NotProxied);
    assert_eq!(outcomes[0].status_code, 404);
}

const AUTH_CONFIG: &str = r#"
[[auth.bearer]]
scheme = "bearer"
tokens = [{ token = "s3cret", name = "alice" }]

[[auth.api_key]]
scheme = "key"
keys = [{ token = "k1", name = "ci" }]
"#;

#[tokio::test]
async fn test_authentication_required() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, outcomes) = common::start_proxy(&format!(
        r#"{AUTH_CONFIG}
[[rules]]
name = "private"
upstream = "http://{upstream}"
requires_authentication = true
authentication_schemes = ["bearer", "key"]
principal_header = "x-user"
"#
    ))
    .await;
    let client = common::client();
    let url = format!("http://{proxy}/secret");

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(&url)
        .header(header::AUTHORIZATION, "Bearer wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(&url)
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["user"], "alice");

    let res = client.get(&url).header("x-api-key", "k1").send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["user"], "ci");

    let kinds: Vec<_> = outcomes.take().into_iter().map(|o| o.kind.label()).collect();
    assert_eq!(
        kinds,
        ["not_authenticated", "not_authenticated", "proxied", "proxied"]
    );
}

#[tokio::test]
async fn test_unreachable_upstream_is_503() {
    let dead = common::freed_port().await;
    let (proxy, outcomes) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "dead"
upstream = "http://{dead}"
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/x")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let outcomes = outcomes.take();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].target().is_some());
    assert_eq!(outcomes[0].status_code, 503);
}

#[tokio::test]
async fn test_post_body_and_content_type_forwarded() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
upstream = "http://{upstream}"
"#
    ))
    .await;

    let res = common::client()
        .post(format!("http://{proxy}/submit"))
        .header(header::CONTENT_TYPE, "text/plain")
        .body("hello upstream")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["method"], "POST");
    assert_eq!(echo["body"], "hello upstream");
    assert_eq!(echo["content_type"], "text/plain");
}

#[tokio::test]
async fn test_forwarded_header() {
    let upstream = common::start_echo_upstream().await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[proxy]
add_forwarded_header = true

[[rules]]
name = "api"
upstream = "http://{upstream}"
"#
    ))
    .await;

    let res = common::client()
        .get(format!("http://{proxy}/"))
        .header(header::HOST, "api.example.com")
        .send()
        .await
        .unwrap();
    let echo: Value = res.json().await.unwrap();
    let forwarded = echo["forwarded"].as_str().unwrap();
    assert!(forwarded.contains("for=127.0.0.1"), "{forwarded}");
    assert!(forwarded.contains("host=api.example.com"), "{forwarded}");
    assert!(forwarded.contains("proto=http"), "{forwarded}");
}

async fn start_header_upstream() -> std::net::SocketAddr {
    common::start_upstream(Router::new().fallback(|| async {
        (
            StatusCode::CREATED,
            [("server", "upstream/1.0"), ("x-upstream", "yes")],
            "made",
        )
            .into_response()
    }))
    .await
}

#[tokio::test]
async fn test_response_headers_copied_and_edited() {
    let upstream = start_header_upstream().await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
upstream = "http://{upstream}"
response_headers = {{ remove = ["server"], set = {{ "x-proxy" = "rule-proxy" }} }}
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.headers()["x-upstream"], "yes");
    assert_eq!(res.headers()["x-proxy"], "rule-proxy");
    assert!(res.headers().get("server").is_none());
    assert_eq!(res.text().await.unwrap(), "made");
}

#[tokio::test]
async fn test_without_pre_processing_only_status_and_body_relayed() {
    let upstream = start_header_upstream().await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
upstream = "http://{upstream}"
pre_process_response = false
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get("x-upstream").is_none());
    assert_eq!(res.text().await.unwrap(), "made");
}

fn redirect_upstream() -> Router {
    Router::new()
        .route("/old", get(|| async { Redirect::temporary("/new") }))
        .route("/new", get(|| async { "arrived" }))
}

#[tokio::test]
async fn test_follows_redirects_by_default() {
    let upstream = common::start_upstream(redirect_upstream()).await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
upstream = "http://{upstream}"
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.text().await.unwrap(), "arrived");
}

#[tokio::test]
async fn test_relays_redirects_when_disabled() {
    let upstream = common::start_upstream(redirect_upstream()).await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[proxy]
follow_redirects = false

[[rules]]
name = "api"
upstream = "http://{upstream}"
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(res.headers()[header::LOCATION], "/new");
}

#[tokio::test]
async fn test_cross_host_redirect_retargets_host() {
    let second = common::start_echo_upstream().await;
    let first = common::start_upstream(Router::new().route(
        "/old",
        get(move || async move { Redirect::temporary(&format!("http://{second}/new")) }),
    ))
    .await;
    let (proxy, _) = common::start_proxy(&format!(
        r#"
[[rules]]
name = "api"
upstream = "http://{first}"
"#
    ))
    .await;

    let res = common::client().get(format!("http://{proxy}/old")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["path"], "/new");
    assert_eq!(echo["host"], second.to_string());
}
