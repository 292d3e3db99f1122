use std::sync::Arc;

use axum::{
    extract::{RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::error::{ProxyError, JSON_CONTENT_TYPE};
use crate::upstream::{forward, UpstreamClient, KLINES_PATH};

const ALLOWED_METHODS: &str = "GET, OPTIONS";

#[derive(Clone)]
pub struct AppState {
    upstream: Arc<dyn UpstreamClient>,
    hosts: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(upstream: Arc<dyn UpstreamClient>, hosts: Vec<String>) -> Self {
        Self {
            upstream,
            hosts: Arc::new(hosts),
        }
    }
}

/// `/klines` plus a `/fapi/v1/klines` alias so the proxy can stand in for an exchange host
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/klines", get(klines).options(preflight))
        .route(KLINES_PATH, get(klines).options(preflight))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn klines(State(state): State<AppState>, RawQuery(query): RawQuery) -> Result<Response, ProxyError> {
    let body = forward(state.upstream.as_ref(), &state.hosts, query.as_deref()).await?;

    Ok((
        [
            (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
        ],
        body,
    )
        .into_response())
}

async fn preflight() -> impl IntoResponse {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, ALLOWED_METHODS),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        ],
    )
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UPSTREAM_FAILED_BODY;
    use crate::upstream::tests::{hosts, FakeUpstream};
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request},
    };
    use tower::ServiceExt;

    async fn call(fake: Arc<FakeUpstream>, method: Method, uri: &str) -> Response {
        let app = router(AppState::new(fake, hosts(5)));
        app.oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn header_value<'a>(response: &'a Response, name: header::HeaderName) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_all_upstreams_fail() {
        let fake = Arc::new(FakeUpstream::default().with("https://h2.test", Err(503)));
        let response = call(fake.clone(), Method::GET, "/klines?symbol=ETHUSDT&interval=1m").await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(header_value(&response, header::CONTENT_TYPE), Some(JSON_CONTENT_TYPE));
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
        assert_eq!(body_string(response).await, UPSTREAM_FAILED_BODY);
        assert_eq!(fake.calls().len(), 5);
    }

    #[tokio::test]
    async fn test_third_upstream_serves() {
        let fake = Arc::new(
            FakeUpstream::default()
                .with("https://h3.test", Ok("[[1700000000000,\"1\",\"2\",\"0.5\",\"1.5\"]]"))
                .with("https://h4.test", Ok("[]")),
        );
        let response = call(fake.clone(), Method::GET, "/klines?symbol=ETHUSDT&interval=1m&limit=2").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_value(&response, header::CONTENT_TYPE), Some(JSON_CONTENT_TYPE));
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_METHODS), Some(ALLOWED_METHODS));
        assert_eq!(body_string(response).await, "[[1700000000000,\"1\",\"2\",\"0.5\",\"1.5\"]]");

        let calls = fake.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|u| u.ends_with("/fapi/v1/klines?symbol=ETHUSDT&interval=1m&limit=2")));
        assert!(!calls.iter().any(|u| u.starts_with("https://h4.test") || u.starts_with("https://h5.test")));
    }

    #[tokio::test]
    async fn test_exchange_path_alias() {
        let fake = Arc::new(FakeUpstream::default().with("https://h1.test", Ok("[]")));
        let response = call(fake.clone(), Method::GET, "/fapi/v1/klines?symbol=BTCUSDT").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(fake.calls(), vec!["https://h1.test/fapi/v1/klines?symbol=BTCUSDT".to_string()]);
    }

    #[tokio::test]
    async fn test_preflight() {
        let fake = Arc::new(FakeUpstream::default());
        let response = call(fake.clone(), Method::OPTIONS, "/klines").await;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN), Some("*"));
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_METHODS), Some(ALLOWED_METHODS));
        assert_eq!(header_value(&response, header::ACCESS_CONTROL_ALLOW_HEADERS), Some("*"));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_health() {
        let response = call(Arc::new(FakeUpstream::default()), Method::GET, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, r#"{"status":"ok"}"#);
    }
}
