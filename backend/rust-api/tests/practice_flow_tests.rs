use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn start_session(app: &Router, token: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/sessions",
        Some(token),
        Some(json!({ "class_level": "10", "stream": "Science" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body {}", body);
    assert_eq!(body["question_count"], 4);
    assert_eq!(body["seconds_per_question"], 30);
    body["session_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_without_identity_is_rejected() {
    let app = common::create_test_app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        None,
        Some(json!({ "class_level": "10", "stream": "Science" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "authentication required");
}

#[tokio::test]
async fn empty_generated_set_refuses_to_start() {
    let app = common::create_test_app_with(common::FakeGenerationClient::empty()).await;
    let token = common::auth_token("user-empty");

    let (status, _body) = send(
        &app,
        "POST",
        "/api/v1/sessions",
        Some(&token),
        Some(json!({ "class_level": "10", "stream": "Science" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn quiz_operations_require_the_quiz_state() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-phase");
    let session_id = start_session(&app, &token).await;

    // still on the instructions step
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/advance", session_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/v1/sessions/{}/answers", session_id),
        Some(&token),
        Some(json!({ "index": 0, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn full_practice_flow_through_roadmap() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-flow");
    let session_id = start_session(&app, &token).await;
    let base = format!("/api/v1/sessions/{}", session_id);

    let (status, body) = send(&app, "GET", &base, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "practice");
    assert_eq!(body["phase"]["state"], "instructions");

    let (status, body) = send(&app, "POST", &format!("{}/begin", base), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["state"], "quiz");
    assert_eq!(body["phase"]["current"], 0);
    assert_eq!(body["phase"]["remaining_seconds"], 30);
    // the answer key never leaves the engine
    assert!(body["phase"]["question"].get("correct_option").is_none());

    // Q1 answered correctly
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 0, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visitation"][0], "answered");

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/advance", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["current"], 1);
    assert_eq!(body["phase"]["remaining_seconds"], 30);

    // Q2 answered incorrectly
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 1, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // palette jump straight to the free-text question; Q3 stays untouched
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/jump", base),
        Some(&token),
        Some(json!({ "index": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["current"], 3);
    assert_eq!(body["phase"]["remaining_seconds"], 30);
    assert_eq!(body["visitation"][1], "answered");
    assert_eq!(body["visitation"][2], "not-visited");

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 3, "free_text": "I built a weather station" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // submit: Q1 correct, Q2 incorrect, Q3 skipped, Q4 free text counts
    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/submit", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body {}", body);
    assert_eq!(body["phase"]["state"], "results");
    let result = &body["phase"]["result"];
    assert_eq!(result["correct"], 2);
    assert_eq!(result["incorrect"], 1);
    assert_eq!(result["skipped"], 1);
    assert_eq!(result["score"], 10);
    assert_eq!(result["total"], 20);
    assert_eq!(result["percentage"], 50.0);
    let accuracy = result["accuracy"].as_f64().unwrap();
    assert!((accuracy - 200.0 / 3.0).abs() < 1e-9);

    // submitting twice does not rescore
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/submit", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/continue", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["state"], "path-selection");

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/track", base),
        Some(&token),
        Some(json!({ "track": "jobs" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "unexpected body {}", body);
    assert_eq!(body["phase"]["state"], "recommendations");
    assert_eq!(body["phase"]["track"], "jobs");
    let recommendations = body["phase"]["recommendations"].as_array().unwrap();
    assert_eq!(recommendations.len(), 2);
    for rec in recommendations {
        assert!(rec["image_url"].as_str().unwrap().starts_with("https://images.test/"));
    }
    let chosen = recommendations[0]["title"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/roadmap", base),
        Some(&token),
        Some(json!({ "title": chosen })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["state"], "roadmap");
    assert_eq!(body["phase"]["steps"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn untouched_submission_lands_on_the_low_score_branch() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-low");
    let session_id = start_session(&app, &token).await;
    let base = format!("/api/v1/sessions/{}", session_id);

    send(&app, "POST", &format!("{}/begin", base), Some(&token), None).await;

    let (status, body) = send(
        &app,
        "POST",
        &format!("{}/submit", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"]["state"], "low-score");
    assert_eq!(body["phase"]["result"]["percentage"], 0.0);
    assert_eq!(body["phase"]["result"]["skipped"], 4);

    // the low-score branch is terminal: no pipeline from here
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/continue", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn answer_index_is_bounds_checked() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-bounds");
    let session_id = start_session(&app, &token).await;
    let base = format!("/api/v1/sessions/{}", session_id);

    send(&app, "POST", &format!("{}/begin", base), Some(&token), None).await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 10, "option_index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // a choice outside the question's option list is rejected too
    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 0, "option_index": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn clearing_an_answer_marks_it_not_answered() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-clear");
    let session_id = start_session(&app, &token).await;
    let base = format!("/api/v1/sessions/{}", session_id);

    send(&app, "POST", &format!("{}/begin", base), Some(&token), None).await;
    send(
        &app,
        "POST",
        &format!("{}/answers", base),
        Some(&token),
        Some(json!({ "index": 0, "option_index": 1 })),
    )
    .await;

    let (status, body) = send(
        &app,
        "DELETE",
        &format!("{}/answers/0", base),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["visitation"][0], "not-answered");
    assert_eq!(body["phase"]["answer"]["type"], "empty");
}

#[tokio::test]
async fn exiting_a_session_tears_it_down() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-exit");
    let session_id = start_session(&app, &token).await;
    let base = format!("/api/v1/sessions/{}", session_id);

    let (status, _) = send(&app, "DELETE", &base, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", &base, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_is_a_not_found() {
    let app = common::create_test_app().await;
    let token = common::auth_token("user-missing");

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/sessions/3f8a2c44-9b1e-4f6a-8a77-2c3d5e6f7a8b",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_bearer_token_is_rejected() {
    let app = common::create_test_app().await;

    let (status, _) = send(
        &app,
        "GET",
        "/api/v1/sessions/whatever",
        Some("not-a-real-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
