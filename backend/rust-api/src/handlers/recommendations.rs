use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    extractors::ValidatedJson,
    models::Track,
    services::{recommendation_service::RecommendationService, AppState},
};

use super::ApiError;

#[derive(Debug, Deserialize)]
pub struct ChooseTrackRequest {
    pub track: Track,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RoadmapRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

pub async fn choose_track(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<ChooseTrackRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Generating {} recommendations for session {}",
        req.track.as_str(),
        session_id
    );

    let snapshot = recommendation_service(&state)
        .choose_track(&session_id, req.track)
        .await?;
    Ok(Json(snapshot))
}

pub async fn request_roadmap(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    ValidatedJson(req): ValidatedJson<RoadmapRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(
        "Generating roadmap '{}' for session {}",
        req.title,
        session_id
    );

    let snapshot = recommendation_service(&state)
        .roadmap(&session_id, req.title)
        .await?;
    Ok(Json(snapshot))
}

fn recommendation_service(state: &Arc<AppState>) -> RecommendationService {
    RecommendationService::new(state.generation.clone(), state.sessions.clone())
}
