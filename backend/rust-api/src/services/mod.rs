use std::sync::Arc;

use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::models::SessionError;

pub mod generation_client;
pub mod proctor_service;
pub mod recommendation_service;
pub mod scoring;
pub mod session_service;
pub mod timer;

use generation_client::{GenerationClient, GenerationError, HttpGenerationClient};
use session_service::SessionRegistry;

/// Failures the engine surfaces to its HTTP layer. Every variant is handled
/// in place by the handlers; nothing escalates to a process-wide handler.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("session not found")]
    SessionNotFound,

    #[error("test not found")]
    TestNotFound,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("question generation returned an empty set")]
    EmptyQuestionSet,

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("generation backend failure: {0}")]
    Generation(#[from] GenerationError),

    #[error("document store failure: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub generation: Arc<dyn GenerationClient>,
    pub sessions: Arc<SessionRegistry>,
    redis_client: redis::Client,
    redis: OnceCell<ConnectionManager>,
}

impl AppState {
    pub fn new(config: Config, mongo_client: MongoClient, redis_client: redis::Client) -> Self {
        let generation: Arc<dyn GenerationClient> = Arc::new(HttpGenerationClient::new(
            config.generation_api_url.clone(),
            config.generation_api_key.clone(),
        ));
        Self::with_generation(config, mongo_client, redis_client, generation)
    }

    /// Seam for tests: same state, scripted generation backend.
    pub fn with_generation(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
        generation: Arc<dyn GenerationClient>,
    ) -> Self {
        let mongo = mongo_client.database(&config.mongo_database);
        Self {
            config,
            mongo,
            generation,
            sessions: Arc::new(SessionRegistry::default()),
            redis_client,
            redis: OnceCell::new(),
        }
    }

    /// Redis is dialed on first use. Only rate limiting and the health
    /// check depend on it, and both degrade when it is unreachable.
    pub async fn redis(&self) -> anyhow::Result<ConnectionManager> {
        let manager = self
            .redis
            .get_or_try_init(|| async {
                tracing::info!("Connecting to Redis...");
                ConnectionManager::new(self.redis_client.clone()).await
            })
            .await?;
        Ok(manager.clone())
    }
}
