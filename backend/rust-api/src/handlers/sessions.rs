use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::ValidatedJson,
    middlewares::auth::IdentityClaims,
    models::AnswerSlot,
    services::{session_service::SessionService, AppState},
};

use super::ApiError;

#[derive(Debug, Deserialize, Validate)]
pub struct StartPracticeRequest {
    #[validate(length(min = 1, max = 32))]
    pub class_level: String,
    #[validate(length(min = 1, max = 64))]
    pub stream: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectAnswerRequest {
    pub index: usize,
    pub option_index: Option<usize>,
    pub free_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JumpRequest {
    pub index: usize,
}

/// Practice setup. Without an authenticated identity the caller is told to
/// authenticate first; the engine never starts an anonymous practice run.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<IdentityClaims>>,
    ValidatedJson(req): ValidatedJson<StartPracticeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(Extension(claims)) = identity else {
        return Err(ApiError::unauthorized("authentication required"));
    };

    tracing::info!(
        "Creating practice session for user_id={}, class={}, stream={}",
        claims.sub,
        req.class_level,
        req.stream
    );

    let service = session_service(&state);
    let started = service
        .start_practice(claims.sub, req.class_level, req.stream)
        .await?;
    Ok((StatusCode::CREATED, Json(started)))
}

pub async fn begin_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).begin(&session_id)?;
    Ok(Json(snapshot))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).snapshot(&session_id)?;
    Ok(Json(snapshot))
}

pub async fn select_answer(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<SelectAnswerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let answer = match (req.option_index, req.free_text) {
        (Some(option), None) => AnswerSlot::Choice { index: option },
        (None, Some(text)) => AnswerSlot::FreeText { text },
        _ => {
            return Err(ApiError::bad_request(
                "provide exactly one of option_index or free_text",
            ))
        }
    };

    let snapshot = session_service(&state).select_answer(&session_id, req.index, answer)?;
    Ok(Json(snapshot))
}

pub async fn clear_answer(
    State(state): State<Arc<AppState>>,
    Path((session_id, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).clear_answer(&session_id, index)?;
    Ok(Json(snapshot))
}

pub async fn advance_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).advance(&session_id).await?;
    Ok(Json(snapshot))
}

pub async fn jump_to_question(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<JumpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).jump_to(&session_id, req.index)?;
    Ok(Json(snapshot))
}

pub async fn submit_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).submit(&session_id).await?;
    Ok(Json(snapshot))
}

pub async fn continue_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = session_service(&state).continue_to_paths(&session_id)?;
    Ok(Json(snapshot))
}

pub async fn exit_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    session_service(&state).exit(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

fn session_service(state: &Arc<AppState>) -> SessionService {
    SessionService::new(
        state.mongo.clone(),
        state.generation.clone(),
        state.sessions.clone(),
    )
}
