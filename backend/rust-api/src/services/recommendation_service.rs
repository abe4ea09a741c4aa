use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;

use crate::models::{Recommendation, SessionError, SessionMode, SessionSnapshot, Track};
use crate::utils::time::format_elapsed;

use super::generation_client::{GenerationClient, RecommendationRequest};
use super::session_service::SessionRegistry;
use super::EngineError;

/// Post-result pipeline: recommendations conditioned on the transcript, one
/// generated image per recommendation, and an on-demand roadmap for a chosen
/// one.
pub struct RecommendationService {
    generation: Arc<dyn GenerationClient>,
    sessions: Arc<SessionRegistry>,
}

impl RecommendationService {
    pub fn new(generation: Arc<dyn GenerationClient>, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            generation,
            sessions,
        }
    }

    pub async fn choose_track(
        &self,
        session_id: &str,
        track: Track,
    ) -> Result<SessionSnapshot, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::SessionNotFound)?;

        let (epoch, request) = {
            let mut state = session.lock().unwrap();
            let epoch = state.begin_recommendations(track)?;
            let SessionMode::Practice {
                class_level,
                stream,
            } = &state.mode
            else {
                return Err(SessionError::WrongPhase(state.phase.name()).into());
            };
            let request = RecommendationRequest {
                transcript: state.transcript(),
                class_level: class_level.clone(),
                stream: stream.clone(),
                track,
                time_taken: format_elapsed(state.elapsed(Utc::now())),
            };
            (epoch, request)
        };

        let recommendations = match self.generation.generate_recommendations(&request).await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                session.lock().unwrap().fail_recommendations(
                    epoch,
                    format!("recommendation generation failed: {}", e),
                );
                return Err(e.into());
            }
        };

        // One image per recommendation, fanned out concurrently and joined
        // before rendering. A failed image leaves the slot empty.
        let images = join_all(recommendations.iter().map(|rec| {
            let generation = self.generation.clone();
            async move {
                match generation.generate_image(&rec.image_prompt).await {
                    Ok(url) => url,
                    Err(e) => {
                        tracing::warn!("Image generation failed for '{}': {}", rec.title, e);
                        None
                    }
                }
            }
        }))
        .await;

        let recommendations: Vec<Recommendation> = recommendations
            .into_iter()
            .zip(images)
            .map(|(mut rec, url)| {
                rec.image_url = url;
                rec
            })
            .collect();

        let mut state = session.lock().unwrap();
        if !state.apply_recommendations(epoch, recommendations) {
            tracing::debug!(
                "Discarding stale recommendation round for session {}",
                session_id
            );
        }
        Ok(state.snapshot())
    }

    /// A roadmap failure degrades to an empty step sequence; the view still
    /// renders.
    pub async fn roadmap(
        &self,
        session_id: &str,
        title: String,
    ) -> Result<SessionSnapshot, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::SessionNotFound)?;

        let epoch = session.lock().unwrap().begin_roadmap(title.clone())?;

        let steps = match self.generation.generate_roadmap(&title).await {
            Ok(steps) => steps,
            Err(e) => {
                tracing::warn!("Roadmap generation failed for '{}': {}", title, e);
                Vec::new()
            }
        };

        let mut state = session.lock().unwrap();
        if !state.apply_roadmap(epoch, steps) {
            tracing::debug!("Discarding stale roadmap round for session {}", session_id);
        }
        Ok(state.snapshot())
    }
}
