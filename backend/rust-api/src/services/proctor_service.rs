use std::sync::{Arc, Mutex};

use chrono::Utc;
use mongodb::bson::{doc, to_bson, Document};
use mongodb::Database;
use uuid::Uuid;

use crate::metrics::{SESSIONS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::{
    ActiveSession, ProctoredTest, SessionMode, SessionPhase, SessionSnapshot, SubmittedTestSummary,
    TestStatus, TestSubmission, PROCTORED_TESTS_COLLECTION, STUDENTS_COLLECTION,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::chrono_to_bson;

use super::generation_client::{AptitudeRequest, GenerationClient};
use super::session_service::SessionRegistry;
use super::timer::SubmissionContext;
use super::{scoring, EngineError};

/// Fixed linear mapping from the raw percentage to the aptitude scale
/// reported to teachers: `baseline + percentage-weighted span`.
pub const APTITUDE_BASELINE: f64 = 70.0;
pub const APTITUDE_SPAN: f64 = 80.0;

pub fn aptitude_estimate(percentage: f64) -> f64 {
    (APTITUDE_BASELINE + (percentage / 100.0) * APTITUDE_SPAN)
        .clamp(APTITUDE_BASELINE, APTITUDE_BASELINE + APTITUDE_SPAN)
}

/// Password check for a proctored test: verbatim, case-sensitive.
pub fn password_matches(stored: &str, candidate: &str) -> bool {
    stored == candidate
}

pub enum EnterTestOutcome {
    /// The record is already `completed`; no credentials prompt, no
    /// re-attempt — straight to the stored summary.
    AlreadySubmitted(SubmittedTestSummary),
    /// A session now waits on the password.
    Ready { session_id: String },
}

pub struct ProctorService {
    mongo: Database,
    generation: Arc<dyn GenerationClient>,
    sessions: Arc<SessionRegistry>,
}

impl ProctorService {
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

    pub async fn enter_test(&self, test_id: &str) -> Result<EnterTestOutcome, EngineError> {
        let collection = self
            .mongo
            .collection::<ProctoredTest>(PROCTORED_TESTS_COLLECTION);
        let test = collection
            .find_one(doc! { "_id": test_id })
            .await?
            .ok_or(EngineError::TestNotFound)?;

        if test.status == TestStatus::Completed {
            tracing::info!("Test {} already completed; short-circuiting", test_id);
            return Ok(EnterTestOutcome::AlreadySubmitted(
                SubmittedTestSummary::from_test(&test),
            ));
        }

        let session_id = Uuid::new_v4().to_string();
        let session = ActiveSession::proctored(session_id.clone(), test);
        self.sessions.insert(session);

        SESSIONS_TOTAL
            .with_label_values(&["proctored", "created"])
            .inc();
        tracing::info!(
            "Proctored session created: {} for test: {}",
            session_id,
            test_id
        );

        Ok(EnterTestOutcome::Ready { session_id })
    }

    /// Check the password; on success load the test's fixed question set and
    /// start the quiz. A wrong password leaves the session exactly where it
    /// was, ready for another attempt.
    pub fn authenticate(
        &self,
        session_id: &str,
        candidate: &str,
    ) -> Result<SessionSnapshot, EngineError> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(EngineError::SessionNotFound)?;
        {
            let mut state = session.lock().unwrap();
            if !matches!(state.phase, SessionPhase::AwaitingPassword) {
                return Err(crate::models::SessionError::WrongPhase(state.phase.name()).into());
            }
            let questions = match &state.mode {
                SessionMode::Proctored { test } => {
                    if !password_matches(&test.password, candidate) {
                        tracing::warn!("Wrong password for session {}", session_id);
                        return Err(EngineError::IncorrectPassword);
                    }
                    test.questions.clone()
                }
                SessionMode::Practice { .. } => {
                    return Err(
                        crate::models::SessionError::WrongPhase(state.phase.name()).into(),
                    )
                }
            };
            state.load_questions(questions)?;
            state.start_quiz()?;
        }
        self.sessions.start_timer(
            session_id,
            SubmissionContext {
                mongo: self.mongo.clone(),
                generation: self.generation.clone(),
            },
        );
        let snapshot = session.lock().unwrap().snapshot();
        Ok(snapshot)
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }
}

/// Drive a proctored submission for a session already in `Submitting`.
/// Shared between the manual submit path and the timer-driven one.
///
/// On any failure the session reverts to the quiz with answers intact; the
/// caller reports the error in place and the operator can retry.
pub async fn submit_active_session(
    session: &Arc<Mutex<ActiveSession>>,
    mongo: &Database,
    generation: Arc<dyn GenerationClient>,
) -> Result<SubmittedTestSummary, EngineError> {
    let (test, transcript, result) = {
        let state = session.lock().unwrap();
        if !matches!(state.phase, SessionPhase::Submitting { .. }) {
            return Err(crate::models::SessionError::WrongPhase(state.phase.name()).into());
        }
        let test = match &state.mode {
            SessionMode::Proctored { test } => test.clone(),
            SessionMode::Practice { .. } => {
                return Err(EngineError::Internal(anyhow::anyhow!(
                    "practice sessions are not submitted to the store"
                )))
            }
        };
        (test, state.transcript(), scoring::score_session(&state))
    };

    let estimate = aptitude_estimate(result.percentage);

    let analysis = match generation
        .analyze_aptitude(&AptitudeRequest {
            transcript: transcript.clone(),
            subject: test.subject_category(),
            specialization: test.specialization(),
            aptitude_estimate: estimate,
        })
        .await
    {
        Ok(analysis) => analysis,
        Err(e) => {
            record_failed_submission(session, format!("aptitude analysis failed: {}", e));
            return Err(e.into());
        }
    };

    let submission = TestSubmission {
        submitted_at: Utc::now(),
        answers: transcript,
        result: result.clone(),
        aptitude_estimate: estimate,
        analysis,
    };
    let update = match build_submission_update(&submission) {
        Ok(update) => update,
        Err(e) => {
            record_failed_submission(session, format!("failed to encode submission: {}", e));
            return Err(EngineError::Internal(e));
        }
    };

    // Conditional on status=pending: a concurrent submission cannot complete
    // the same record twice. True exactly-once would additionally need a
    // server-side guard; see DESIGN.md.
    let collection = mongo.collection::<ProctoredTest>(PROCTORED_TESTS_COLLECTION);
    let filter = doc! { "_id": &test.id, "status": TestStatus::Pending.as_str() };
    let write = retry_async_with_config(RetryConfig::aggressive(), || async {
        collection.update_one(filter.clone(), update.clone()).await
    })
    .await;

    match write {
        Ok(outcome) if outcome.matched_count == 0 => {
            tracing::warn!(
                "Test {} was completed elsewhere; keeping the stored submission",
                test.id
            );
        }
        Ok(_) => {
            tracing::info!("Proctored submission written: test={}", test.id);
        }
        Err(e) => {
            record_failed_submission(session, format!("store write failed: {}", e));
            return Err(EngineError::Store(e));
        }
    }

    // Best-effort denormalization onto the student record; its failure must
    // not fail the submission.
    if let Err(e) = update_student_aptitude(mongo, &test.student_id, estimate).await {
        tracing::warn!(
            "Failed to refresh aptitude on student {}: {}",
            test.student_id,
            e
        );
    }

    {
        let mut state = session.lock().unwrap();
        state.submitted(result.clone(), estimate)?;
    }
    SUBMISSIONS_TOTAL
        .with_label_values(&["proctored", "success"])
        .inc();

    Ok(SubmittedTestSummary {
        test_id: test.id,
        status: TestStatus::Completed,
        submitted_at: Some(submission.submitted_at),
        result: Some(result),
        aptitude_estimate: Some(estimate),
    })
}

fn record_failed_submission(session: &Arc<Mutex<ActiveSession>>, error: String) {
    SUBMISSIONS_TOTAL
        .with_label_values(&["proctored", "error"])
        .inc();
    session.lock().unwrap().revert_submit(error);
}

fn build_submission_update(submission: &TestSubmission) -> anyhow::Result<Document> {
    let submission_bson = to_bson(submission)?;
    Ok(doc! {
        "$set": {
            "status": TestStatus::Completed.as_str(),
            "submitted_at": chrono_to_bson(submission.submitted_at),
            "submission": submission_bson,
        }
    })
}

async fn update_student_aptitude(
    mongo: &Database,
    student_id: &str,
    estimate: f64,
) -> Result<(), mongodb::error::Error> {
    let students = mongo.collection::<Document>(STUDENTS_COLLECTION);
    students
        .update_one(
            doc! { "_id": student_id },
            doc! { "$set": {
                "aptitude_score": estimate,
                "aptitude_updated_at": chrono_to_bson(Utc::now()),
            }},
        )
        .await
        .map(|_| ())
}
