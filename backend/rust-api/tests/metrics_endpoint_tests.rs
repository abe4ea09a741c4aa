use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use base64::{engine::general_purpose, Engine as _};
use serial_test::serial;
use tower::ServiceExt;

mod common;

#[tokio::test]
#[serial]
async fn metrics_require_basic_auth() {
    std::env::set_var("METRICS_AUTH", "metrics:sekret");
    let app = common::create_test_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = general_purpose::STANDARD.encode("metrics:wrong");
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", format!("Basic {}", wrong))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    std::env::remove_var("METRICS_AUTH");
}

#[tokio::test]
#[serial]
async fn metrics_render_with_valid_credentials() {
    std::env::set_var("METRICS_AUTH", "metrics:sekret");
    let app = common::create_test_app().await;

    // lazy_static registers a metric on first touch
    let _ = careercompass_api::metrics::SESSIONS_ACTIVE.get();

    let credentials = general_purpose::STANDARD.encode("metrics:sekret");
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/metrics")
                .header("authorization", format!("Basic {}", credentials))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("sessions_active"));

    std::env::remove_var("METRICS_AUTH");
}
