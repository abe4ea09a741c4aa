use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use mongodb::Database;
use serde::Serialize;
use uuid::Uuid;

use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::{
    ActiveSession, AdvanceOutcome, AnswerSlot, SessionMode, SessionPhase, SessionSnapshot,
    QUESTION_SECONDS,
};

use super::generation_client::{GenerationClient, QuestionContext};
use super::timer::{QuestionTimer, SubmissionContext};
use super::{proctor_service, scoring, EngineError};

/// All live sessions. Each entry owns the session state and, once the quiz
/// has started, the countdown task; removing an entry drops the timer handle
/// and thereby aborts the task.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, SessionEntry>>,
}

struct SessionEntry {
    state: Arc<Mutex<ActiveSession>>,
    timer: Option<QuestionTimer>,
}

impl SessionRegistry {
    pub fn insert(&self, session: ActiveSession) -> Arc<Mutex<ActiveSession>> {
        let id = session.id.clone();
        let state = Arc::new(Mutex::new(session));
        self.inner.lock().unwrap().insert(
            id,
            SessionEntry {
                state: state.clone(),
                timer: None,
            },
        );
        SESSIONS_ACTIVE.inc();
        state
    }

    pub fn get(&self, id: &str) -> Option<Arc<Mutex<ActiveSession>>> {
        self.inner
            .lock()
            .unwrap()
            .get(id)
            .map(|entry| entry.state.clone())
    }

    pub fn remove(&self, id: &str) -> bool {
        let removed = self.inner.lock().unwrap().remove(id).is_some();
        if removed {
            SESSIONS_ACTIVE.dec();
        }
        removed
    }

    pub fn start_timer(&self, id: &str, ctx: SubmissionContext) {
        let mut entries = self.inner.lock().unwrap();
        if let Some(entry) = entries.get_mut(id) {
            entry.timer = Some(QuestionTimer::spawn(entry.state.clone(), ctx));
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub session_id: String,
    pub question_count: usize,
    pub seconds_per_question: u32,
}

pub struct SessionService {
    mongo: Database,
    generation: Arc<dyn GenerationClient>,
    sessions: Arc<SessionRegistry>,
}

impl SessionService {
    pub fn new(
        mongo: Database,
        generation: Arc<dyn GenerationClient>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            mongo,
            generation,
            sessions,
        }
    }

    /// Start a practice session: generate the question set, then park the
    /// session on the instructions step. No session exists until generation
    /// has produced a usable set.
    pub async fn start_practice(
        &self,
        user_id: String,
        class_level: String,
        stream: String,
    ) -> Result<StartedSession, EngineError> {
        let ctx = QuestionContext {
            class_level: class_level.clone(),
            stream: stream.clone(),
        };
        let questions = self.generation.generate_questions(&ctx).await?;
        if questions.is_empty() {
            return Err(EngineError::EmptyQuestionSet);
        }

        let session_id = Uuid::new_v4().to_string();
        let question_count = questions.len();
        let session = ActiveSession::practice(
            session_id.clone(),
            user_id.clone(),
            class_level,
            stream,
            questions,
        );
        self.sessions.insert(session);

        SESSIONS_TOTAL
            .with_label_values(&["practice", "created"])
            .inc();
        tracing::info!(
            "Practice session created: {} for user: {} ({} questions)",
            session_id,
            user_id,
            question_count
        );

        Ok(StartedSession {
            session_id,
            question_count,
            seconds_per_question: QUESTION_SECONDS,
        })
    }

    /// Leave the instructions step and enter the quiz; the countdown task
    /// starts here and lives until the session is torn down.
    pub fn begin(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        {
            let mut state = session.lock().unwrap();
            state.start_quiz()?;
        }
        self.sessions
            .start_timer(session_id, self.submission_context());
        Ok(self.snapshot_of(&session))
    }

    pub fn select_answer(
        &self,
        session_id: &str,
        index: usize,
        answer: AnswerSlot,
    ) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        session.lock().unwrap().select_answer(index, answer)?;
        Ok(self.snapshot_of(&session))
    }

    pub fn clear_answer(
        &self,
        session_id: &str,
        index: usize,
    ) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        session.lock().unwrap().clear_answer(index)?;
        Ok(self.snapshot_of(&session))
    }

    pub fn jump_to(&self, session_id: &str, index: usize) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        session.lock().unwrap().jump_to(index)?;
        Ok(self.snapshot_of(&session))
    }

    pub async fn advance(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        let outcome = session.lock().unwrap().advance(false)?;
        if outcome == AdvanceOutcome::Completed {
            self.finalize(&session).await?;
        }
        Ok(self.snapshot_of(&session))
    }

    pub async fn submit(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        session.lock().unwrap().submit()?;
        self.finalize(&session).await?;
        Ok(self.snapshot_of(&session))
    }

    pub fn continue_to_paths(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        session.lock().unwrap().continue_to_paths()?;
        Ok(self.snapshot_of(&session))
    }

    pub fn snapshot(&self, session_id: &str) -> Result<SessionSnapshot, EngineError> {
        let session = self.require(session_id)?;
        Ok(self.snapshot_of(&session))
    }

    /// Exit the session. Removing the registry entry drops the timer handle,
    /// which aborts the countdown task.
    pub fn exit(&self, session_id: &str) -> Result<(), EngineError> {
        let mode = {
            let session = self.require(session_id)?;
            let state = session.lock().unwrap();
            state.mode.name()
        };
        if !self.sessions.remove(session_id) {
            return Err(EngineError::SessionNotFound);
        }
        SESSIONS_TOTAL.with_label_values(&[mode, "exited"]).inc();
        tracing::info!("Session exited: {}", session_id);
        Ok(())
    }

    pub fn require(&self, session_id: &str) -> Result<Arc<Mutex<ActiveSession>>, EngineError> {
        self.sessions
            .get(session_id)
            .ok_or(EngineError::SessionNotFound)
    }

    fn submission_context(&self) -> SubmissionContext {
        SubmissionContext {
            mongo: self.mongo.clone(),
            generation: self.generation.clone(),
        }
    }

    async fn finalize(&self, session: &Arc<Mutex<ActiveSession>>) -> Result<(), EngineError> {
        let is_practice = {
            let state = session.lock().unwrap();
            matches!(state.mode, SessionMode::Practice { .. })
        };
        if is_practice {
            finalize_practice(session);
            Ok(())
        } else {
            proctor_service::submit_active_session(session, &self.mongo, self.generation.clone())
                .await
                .map(|_| ())
        }
    }

    fn snapshot_of(&self, session: &Arc<Mutex<ActiveSession>>) -> SessionSnapshot {
        session.lock().unwrap().snapshot()
    }
}

/// Practice submission is a pure reduction; it happens under the session
/// lock, so a manual submit and a timer-driven one cannot both score.
pub(crate) fn finalize_practice(session: &Arc<Mutex<ActiveSession>>) {
    let mut state = session.lock().unwrap();
    if !matches!(state.phase, SessionPhase::Submitting { .. }) {
        return;
    }
    let result = scoring::score_session(&state);
    let mode = state.mode.name();
    if state.finish(result).is_ok() {
        SUBMISSIONS_TOTAL
            .with_label_values(&[mode, "success"])
            .inc();
        tracing::info!("Practice session scored: {}", state.id);
    }
}
