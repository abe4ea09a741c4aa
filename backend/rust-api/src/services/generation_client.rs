use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::track_generation_call;
use crate::models::{
    AptitudeAnalysis, Question, Recommendation, RoadmapStep, Track, TranscriptEntry,
};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("generation backend returned {status}: {message}")]
    Api { status: u16, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub class_level: String,
    pub stream: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecommendationRequest {
    pub transcript: Vec<TranscriptEntry>,
    pub class_level: String,
    pub stream: String,
    pub track: Track,
    pub time_taken: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AptitudeRequest {
    pub transcript: Vec<TranscriptEntry>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    pub aptitude_estimate: f64,
}

/// Seam to the external text/image generation capability. The engine only
/// consumes these request/response contracts, never the generator internals.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate_questions(
        &self,
        ctx: &QuestionContext,
    ) -> Result<Vec<Question>, GenerationError>;

    async fn generate_recommendations(
        &self,
        req: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, GenerationError>;

    /// A missing image is non-fatal; `None` simply leaves the slot blank.
    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError>;

    async fn generate_roadmap(&self, title: &str) -> Result<Vec<RoadmapStep>, GenerationError>;

    async fn analyze_aptitude(
        &self,
        req: &AptitudeRequest,
    ) -> Result<AptitudeAnalysis, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    questions: Vec<Question>,
}

#[derive(Debug, Deserialize)]
struct RecommendationsResponse {
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoadmapResponse {
    steps: Vec<RoadmapStep>,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Serialize)]
struct RoadmapRequest<'a> {
    title: &'a str,
}

/// HTTP implementation talking to the generation backend service.
pub struct HttpGenerationClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpGenerationClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
        }
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: DeserializeOwned>(
        &self,
        path: &str,
        payload: &Req,
    ) -> Result<Resp, GenerationError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("Calling generation backend: {}", url);

        let mut request = self.http_client.post(&url).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::Api { status, message });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate_questions(
        &self,
        ctx: &QuestionContext,
    ) -> Result<Vec<Question>, GenerationError> {
        let response: QuestionsResponse = track_generation_call("questions", async {
            self.post_json("/v1/generate/questions", ctx).await
        })
        .await?;

        tracing::info!(
            "Generated {} questions for class {} / {}",
            response.questions.len(),
            ctx.class_level,
            ctx.stream
        );
        Ok(response.questions)
    }

    async fn generate_recommendations(
        &self,
        req: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, GenerationError> {
        let response: RecommendationsResponse = track_generation_call("recommendations", async {
            self.post_json("/v1/generate/recommendations", req).await
        })
        .await?;

        tracing::info!(
            "Generated {} {} recommendations",
            response.recommendations.len(),
            req.track.as_str()
        );
        Ok(response.recommendations)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        let response: ImageResponse = track_generation_call("image", async {
            self.post_json("/v1/generate/image", &ImageRequest { prompt })
                .await
        })
        .await?;
        Ok(response.image_url)
    }

    async fn generate_roadmap(&self, title: &str) -> Result<Vec<RoadmapStep>, GenerationError> {
        let response: RoadmapResponse = track_generation_call("roadmap", async {
            self.post_json("/v1/generate/roadmap", &RoadmapRequest { title })
                .await
        })
        .await?;
        Ok(response.steps)
    }

    async fn analyze_aptitude(
        &self,
        req: &AptitudeRequest,
    ) -> Result<AptitudeAnalysis, GenerationError> {
        track_generation_call("aptitude", async {
            self.post_json("/v1/analyze/aptitude", req).await
        })
        .await
    }
}
