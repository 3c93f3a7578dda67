use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use clima_config::AppConfig;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

async fn app() -> (axum::Router, Arc<clima_api::AppState>) {
    let mut cfg = AppConfig::default();
    cfg.archive.kind = clima_config::ArchiveKind::Simulator;
    cfg.geocoder.kind = clima_config::GeocoderKind::Static;
    let shutdown = CancellationToken::new();
    let service = clima_api::build_service(&cfg, shutdown.clone()).await.unwrap();
    clima_api::build_app(Arc::new(service), shutdown).unwrap()
}

#[tokio::test]
async fn health_ready_metrics_endpoints() {
    let (app, state) = app().await;

    // /healthz returns 200 and increments a counter
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // /readyz initially 503
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    clima_api::set_ready(&state, true);

    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/readyz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // /metrics returns prometheus text and contains our counter
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ct = res.headers().get("content-type").unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/plain"));
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("clima_requests_total"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _state) = app().await;
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/current")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cors_preflight_is_allowed() {
    let (app, _state) = app().await;
    let res = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/printer/working-hours/")
                .header("origin", "http://example.com")
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("access-control-allow-origin")
            .unwrap()
            .to_str()
            .unwrap(),
        "*"
    );
}
