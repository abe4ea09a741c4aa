use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::ValidatedJson,
    models::SubmittedTestSummary,
    services::{
        proctor_service::{EnterTestOutcome, ProctorService},
        AppState,
    },
};

use super::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct EnterTestRequest {
    #[validate(length(min = 1, max = 128))]
    pub test_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AuthenticateRequest {
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum EnterTestResponse {
    /// The record is already completed: straight to the summary, no
    /// password prompt.
    AlreadySubmitted { summary: SubmittedTestSummary },
    AwaitingPassword { session_id: String },
}

pub async fn enter_test(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<EnterTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Entering proctored test: {}", req.test_id);

    let outcome = proctor_service(&state).enter_test(&req.test_id).await?;
    let response = match outcome {
        EnterTestOutcome::AlreadySubmitted(summary) => {
            EnterTestResponse::AlreadySubmitted { summary }
        }
        EnterTestOutcome::Ready { session_id } => EnterTestResponse::AwaitingPassword { session_id },
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Password gate. Wrong passwords are retryable in place and never reveal
/// more than "incorrect password".
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    ValidatedJson(req): ValidatedJson<AuthenticateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = proctor_service(&state).authenticate(&session_id, &req.password)?;
    Ok(Json(snapshot))
}

fn proctor_service(state: &Arc<AppState>) -> ProctorService {
    ProctorService::new(
        state.mongo.clone(),
        state.generation.clone(),
        state.sessions.clone(),
    )
}
