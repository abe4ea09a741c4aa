use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;

use careercompass_api::{
    config::Config,
    create_router,
    middlewares::auth::{IdentityClaims, JwtService},
    models::{AptitudeAnalysis, Question, Recommendation, RoadmapStep},
    services::{
        generation_client::{
            AptitudeRequest, GenerationClient, GenerationError, QuestionContext,
            RecommendationRequest,
        },
        AppState,
    },
};

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

/// Scripted generation backend: deterministic payloads, no network.
pub struct FakeGenerationClient {
    questions: Vec<Question>,
}

impl FakeGenerationClient {
    pub fn scripted() -> Self {
        Self {
            questions: vec![
                Question {
                    text: "Which subject do you enjoy most?".to_string(),
                    options: Some(vec![
                        "Mathematics".to_string(),
                        "Biology".to_string(),
                        "Literature".to_string(),
                    ]),
                    correct_option: Some(0),
                },
                Question {
                    text: "Pick the next number: 3, 6, 12, ...".to_string(),
                    options: Some(vec!["18".to_string(), "24".to_string()]),
                    correct_option: Some(1),
                },
                Question {
                    text: "A puzzle takes 5 people 5 hours. How long for 10?".to_string(),
                    options: Some(vec!["2.5 hours".to_string(), "10 hours".to_string()]),
                    correct_option: Some(0),
                },
                Question {
                    text: "Describe a project you are proud of.".to_string(),
                    options: None,
                    correct_option: None,
                },
            ],
        }
    }

    /// Signals generation failure: the engine must refuse to start a session.
    pub fn empty() -> Self {
        Self {
            questions: Vec::new(),
        }
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate_questions(
        &self,
        _ctx: &QuestionContext,
    ) -> Result<Vec<Question>, GenerationError> {
        Ok(self.questions.clone())
    }

    async fn generate_recommendations(
        &self,
        req: &RecommendationRequest,
    ) -> Result<Vec<Recommendation>, GenerationError> {
        Ok(vec![
            Recommendation {
                title: format!("{} option one", req.track.as_str()),
                description: "A strong match for the answer profile".to_string(),
                image_prompt: "an engineer at a workbench".to_string(),
                image_url: None,
            },
            Recommendation {
                title: format!("{} option two", req.track.as_str()),
                description: "A solid alternative".to_string(),
                image_prompt: "a researcher in a lab".to_string(),
                image_url: None,
            },
        ])
    }

    async fn generate_image(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        Ok(Some(format!(
            "https://images.test/{}.png",
            prompt.replace(' ', "-")
        )))
    }

    async fn generate_roadmap(&self, title: &str) -> Result<Vec<RoadmapStep>, GenerationError> {
        Ok(vec![
            RoadmapStep {
                title: format!("Foundations of {}", title),
                duration: "3 months".to_string(),
                description: "Build the basics".to_string(),
            },
            RoadmapStep {
                title: "First portfolio project".to_string(),
                duration: "2 months".to_string(),
                description: "Apply the basics".to_string(),
            },
            RoadmapStep {
                title: "Internship".to_string(),
                duration: "6 months".to_string(),
                description: "Work alongside practitioners".to_string(),
            },
        ])
    }

    async fn analyze_aptitude(
        &self,
        req: &AptitudeRequest,
    ) -> Result<AptitudeAnalysis, GenerationError> {
        Ok(AptitudeAnalysis {
            analysis: format!("Estimated aptitude {:.0} in {}", req.aptitude_estimate, req.subject),
            verdict: "promising".to_string(),
            swot: None,
            teaching_plan: None,
            suggestions: None,
        })
    }
}

pub async fn create_test_app() -> Router {
    create_test_app_with(FakeGenerationClient::scripted()).await
}

pub async fn create_test_app_with(generation: FakeGenerationClient) -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // No Redis in tests; the limiter short-circuits before dialing it.
    std::env::set_var("RATE_LIMIT_DISABLED", "1");

    let config = test_config();

    // Both clients dial lazily; the practice flow never touches them.
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create test MongoDB client");
    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    let app_state = Arc::new(AppState::with_generation(
        config,
        mongo_client,
        redis_client,
        Arc::new(generation),
    ));

    create_router(app_state)
}

pub fn test_config() -> Config {
    Config {
        mongo_uri: "mongodb://localhost:27017/?serverSelectionTimeoutMS=500&connectTimeoutMS=500"
            .to_string(),
        mongo_database: "careercompass_test".to_string(),
        redis_uri: "redis://127.0.0.1:6379/0".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        generation_api_url: "http://localhost:8000".to_string(),
        generation_api_key: None,
    }
}

pub fn auth_token(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = IdentityClaims {
        sub: user_id.to_string(),
        role: "student".to_string(),
        exp: (now + 3600) as usize,
        iat: now as usize,
    };
    JwtService::new(TEST_JWT_SECRET)
        .generate_token(claims)
        .expect("Failed to sign test token")
}
