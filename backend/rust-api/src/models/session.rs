use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::proctored::ProctoredTest;
use super::question::{Question, QuestionView};
use super::recommendation::{Recommendation, RoadmapStep, Track};
use super::result::SessionResult;

/// Countdown granted to every question.
pub const QUESTION_SECONDS: u32 = 30;

/// Results below this overall percentage branch to the low-score view
/// instead of the recommendation pipeline.
pub const LOW_SCORE_THRESHOLD: f64 = 30.0;

#[derive(Debug, Clone)]
pub enum SessionMode {
    Practice { class_level: String, stream: String },
    Proctored { test: ProctoredTest },
}

impl SessionMode {
    pub fn name(&self) -> &'static str {
        match self {
            SessionMode::Practice { .. } => "practice",
            SessionMode::Proctored { .. } => "proctored",
        }
    }
}

/// One answer slot per question, index-aligned with `questions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerSlot {
    Empty,
    Choice { index: usize },
    FreeText { text: String },
}

impl AnswerSlot {
    pub fn is_empty(&self) -> bool {
        matches!(self, AnswerSlot::Empty)
    }
}

/// Per-question interaction status. A slot leaves `NotVisited` exactly once;
/// `Skipped` is only reached by timer expiry while still `NotVisited`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visitation {
    NotVisited,
    NotAnswered,
    Answered,
    Skipped,
}

/// Explicit session state. One variant per named state, each carrying
/// exactly the data that state needs; transitions are the methods on
/// [`ActiveSession`] and nothing else.
#[derive(Debug, Clone)]
pub enum SessionPhase {
    Instructions,
    Quiz {
        current: usize,
        remaining_seconds: u32,
    },
    Submitting {
        resume: usize,
    },
    Results {
        result: SessionResult,
    },
    LowScore {
        result: SessionResult,
    },
    PathSelection {
        result: SessionResult,
    },
    GeneratingRecommendations {
        result: SessionResult,
        track: Track,
    },
    Recommendations {
        track: Track,
        recommendations: Vec<Recommendation>,
    },
    GeneratingRoadmap {
        title: String,
    },
    Roadmap {
        title: String,
        steps: Vec<RoadmapStep>,
    },
    AwaitingPassword,
    Submitted {
        result: SessionResult,
        aptitude_estimate: f64,
    },
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Instructions => "instructions",
            SessionPhase::Quiz { .. } => "quiz",
            SessionPhase::Submitting { .. } => "submitting",
            SessionPhase::Results { .. } => "results",
            SessionPhase::LowScore { .. } => "low-score",
            SessionPhase::PathSelection { .. } => "path-selection",
            SessionPhase::GeneratingRecommendations { .. } => "generating-recommendations",
            SessionPhase::Recommendations { .. } => "recommendations",
            SessionPhase::GeneratingRoadmap { .. } => "generating-roadmap",
            SessionPhase::Roadmap { .. } => "roadmap",
            SessionPhase::AwaitingPassword => "proctored-auth",
            SessionPhase::Submitted { .. } => "submitted",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("operation not allowed in the '{0}' state")]
    WrongPhase(&'static str),
    #[error("question index {index} out of bounds ({len} questions)")]
    OutOfBounds { index: usize, len: usize },
    #[error("an answer must carry an option index or non-empty free text")]
    EmptyAnswer,
    #[error("cannot start a quiz with no questions loaded")]
    NoQuestions,
}

#[derive(Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// Moved on to the question at this index, countdown reset.
    Moved(usize),
    /// The last question was left; the session is now submitting.
    Completed,
}

/// What one timer tick did to the session.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown is paused: the operator cannot currently see a question.
    Idle,
    Ticked {
        current: usize,
        remaining_seconds: u32,
    },
    /// Countdown expired and the session moved to the next question.
    AutoSkipped {
        current: usize,
    },
    /// Countdown expired on the last question; the session is submitting.
    Completed,
    /// The session left the quiz for good; the timer can stop.
    Terminal,
}

/// One question/answer pair of the raw transcript handed to the external
/// generation calls and written back on proctored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
}

/// One in-progress or completed attempt at an assessment.
///
/// Owns its answer and visitation sequences for its whole lifetime; both are
/// always index-aligned with `questions`.
#[derive(Debug)]
pub struct ActiveSession {
    pub id: String,
    pub user_id: Option<String>,
    pub mode: SessionMode,
    pub questions: Vec<Question>,
    pub answers: Vec<AnswerSlot>,
    pub visitation: Vec<Visitation>,
    pub phase: SessionPhase,
    pub started_at: DateTime<Utc>,
    /// Bumped whenever a generation round starts; async results carrying an
    /// older epoch are stale and must be discarded, not applied.
    pipeline_epoch: u64,
    /// Last in-place failure, surfaced on the snapshot as a retry affordance.
    pub last_error: Option<String>,
}

impl ActiveSession {
    pub fn practice(
        id: String,
        user_id: String,
        class_level: String,
        stream: String,
        questions: Vec<Question>,
    ) -> Self {
        let count = questions.len();
        Self {
            id,
            user_id: Some(user_id),
            mode: SessionMode::Practice {
                class_level,
                stream,
            },
            questions,
            answers: vec![AnswerSlot::Empty; count],
            visitation: vec![Visitation::NotVisited; count],
            phase: SessionPhase::Instructions,
            started_at: Utc::now(),
            pipeline_epoch: 0,
            last_error: None,
        }
    }

    /// A proctored session starts without questions; they are loaded only
    /// after the password check succeeds.
    pub fn proctored(id: String, test: ProctoredTest) -> Self {
        Self {
            id,
            user_id: Some(test.student_id.clone()),
            mode: SessionMode::Proctored { test },
            questions: Vec::new(),
            answers: Vec::new(),
            visitation: Vec::new(),
            phase: SessionPhase::AwaitingPassword,
            started_at: Utc::now(),
            pipeline_epoch: 0,
            last_error: None,
        }
    }

    pub fn load_questions(&mut self, questions: Vec<Question>) -> Result<(), SessionError> {
        if !matches!(self.phase, SessionPhase::AwaitingPassword) {
            return Err(SessionError::WrongPhase(self.phase.name()));
        }
        let count = questions.len();
        self.questions = questions;
        self.answers = vec![AnswerSlot::Empty; count];
        self.visitation = vec![Visitation::NotVisited; count];
        Ok(())
    }

    /// Enter the quiz. Reachable only from `instructions` (practice) or
    /// `proctored-auth` (proctored); there is no way back in afterwards.
    pub fn start_quiz(&mut self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Instructions | SessionPhase::AwaitingPassword => {}
            _ => return Err(SessionError::WrongPhase(self.phase.name())),
        }
        if self.questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        self.started_at = Utc::now();
        self.phase = SessionPhase::Quiz {
            current: 0,
            remaining_seconds: QUESTION_SECONDS,
        };
        Ok(())
    }

    pub fn select_answer(&mut self, index: usize, answer: AnswerSlot) -> Result<(), SessionError> {
        self.require_quiz()?;
        self.check_bounds(index)?;
        match &answer {
            AnswerSlot::Empty => return Err(SessionError::EmptyAnswer),
            AnswerSlot::FreeText { text } if text.trim().is_empty() => {
                return Err(SessionError::EmptyAnswer)
            }
            AnswerSlot::Choice { index: option } => {
                let options = self.questions[index].options.as_deref().unwrap_or(&[]);
                if *option >= options.len() {
                    return Err(SessionError::OutOfBounds {
                        index: *option,
                        len: options.len(),
                    });
                }
            }
            AnswerSlot::FreeText { .. } => {}
        }
        self.answers[index] = answer;
        self.visitation[index] = Visitation::Answered;
        Ok(())
    }

    pub fn clear_answer(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_quiz()?;
        self.check_bounds(index)?;
        self.answers[index] = AnswerSlot::Empty;
        self.visitation[index] = Visitation::NotAnswered;
        Ok(())
    }

    /// Leave the current question. With `auto_skip` (timer expiry) an
    /// untouched question is marked skipped; otherwise its status is derived
    /// from whether an answer exists. Switching always resets the countdown.
    pub fn advance(&mut self, auto_skip: bool) -> Result<AdvanceOutcome, SessionError> {
        let current = self.require_quiz()?;
        self.settle_visitation(current, auto_skip);
        if current + 1 == self.questions.len() {
            self.phase = SessionPhase::Submitting { resume: current };
            Ok(AdvanceOutcome::Completed)
        } else {
            self.phase = SessionPhase::Quiz {
                current: current + 1,
                remaining_seconds: QUESTION_SECONDS,
            };
            Ok(AdvanceOutcome::Moved(current + 1))
        }
    }

    /// Palette navigation. Leaves the visitation of the question being left
    /// untouched; resets the countdown for the new current question.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_quiz()?;
        self.check_bounds(index)?;
        self.phase = SessionPhase::Quiz {
            current: index,
            remaining_seconds: QUESTION_SECONDS,
        };
        Ok(())
    }

    /// Explicit submission from anywhere inside the quiz.
    pub fn submit(&mut self) -> Result<(), SessionError> {
        let current = self.require_quiz()?;
        self.settle_visitation(current, false);
        self.phase = SessionPhase::Submitting { resume: current };
        Ok(())
    }

    /// One second of wall-clock time. Decrements only while a question is
    /// actually on screen; any loading or submitting state is a pause.
    pub fn tick(&mut self) -> TickOutcome {
        match self.phase {
            SessionPhase::Quiz {
                current,
                remaining_seconds,
            } => {
                let remaining = remaining_seconds.saturating_sub(1);
                if remaining == 0 {
                    match self.advance(true) {
                        Ok(AdvanceOutcome::Moved(next)) => TickOutcome::AutoSkipped { current: next },
                        Ok(AdvanceOutcome::Completed) => TickOutcome::Completed,
                        Err(_) => TickOutcome::Idle,
                    }
                } else {
                    self.phase = SessionPhase::Quiz {
                        current,
                        remaining_seconds: remaining,
                    };
                    TickOutcome::Ticked {
                        current,
                        remaining_seconds: remaining,
                    }
                }
            }
            SessionPhase::Instructions
            | SessionPhase::AwaitingPassword
            | SessionPhase::Submitting { .. } => TickOutcome::Idle,
            _ => TickOutcome::Terminal,
        }
    }

    /// Record the computed result. Practice terminal step: low percentages
    /// branch to the low-score view instead of the pipeline.
    pub fn finish(&mut self, result: SessionResult) -> Result<(), SessionError> {
        if !matches!(self.phase, SessionPhase::Submitting { .. }) {
            return Err(SessionError::WrongPhase(self.phase.name()));
        }
        self.last_error = None;
        self.phase = if result.percentage < LOW_SCORE_THRESHOLD {
            SessionPhase::LowScore { result }
        } else {
            SessionPhase::Results { result }
        };
        Ok(())
    }

    /// Proctored terminal step after the store write succeeded.
    pub fn submitted(
        &mut self,
        result: SessionResult,
        aptitude_estimate: f64,
    ) -> Result<(), SessionError> {
        if !matches!(self.phase, SessionPhase::Submitting { .. }) {
            return Err(SessionError::WrongPhase(self.phase.name()));
        }
        self.last_error = None;
        self.phase = SessionPhase::Submitted {
            result,
            aptitude_estimate,
        };
        Ok(())
    }

    /// A failed submission returns to the quiz with all answers intact so a
    /// retry loses nothing.
    pub fn revert_submit(&mut self, error: impl Into<String>) {
        if let SessionPhase::Submitting { resume } = self.phase {
            self.last_error = Some(error.into());
            self.phase = SessionPhase::Quiz {
                current: resume,
                remaining_seconds: QUESTION_SECONDS,
            };
        }
    }

    pub fn continue_to_paths(&mut self) -> Result<(), SessionError> {
        match &self.phase {
            SessionPhase::Results { result } => {
                self.phase = SessionPhase::PathSelection {
                    result: result.clone(),
                };
                Ok(())
            }
            other => Err(SessionError::WrongPhase(other.name())),
        }
    }

    /// Start a recommendation round for the chosen track. Returns the epoch
    /// the caller must present when applying the generated result.
    pub fn begin_recommendations(&mut self, track: Track) -> Result<u64, SessionError> {
        match &self.phase {
            SessionPhase::PathSelection { result } => {
                self.pipeline_epoch += 1;
                self.last_error = None;
                self.phase = SessionPhase::GeneratingRecommendations {
                    result: result.clone(),
                    track,
                };
                Ok(self.pipeline_epoch)
            }
            other => Err(SessionError::WrongPhase(other.name())),
        }
    }

    /// Apply a finished recommendation round. Returns false (and changes
    /// nothing) when the round is stale.
    pub fn apply_recommendations(
        &mut self,
        epoch: u64,
        recommendations: Vec<Recommendation>,
    ) -> bool {
        if epoch != self.pipeline_epoch {
            return false;
        }
        match &self.phase {
            SessionPhase::GeneratingRecommendations { track, .. } => {
                self.phase = SessionPhase::Recommendations {
                    track: *track,
                    recommendations,
                };
                true
            }
            _ => false,
        }
    }

    /// Roll a failed recommendation round back to path selection so the
    /// operator can retry.
    pub fn fail_recommendations(&mut self, epoch: u64, error: impl Into<String>) {
        if epoch != self.pipeline_epoch {
            return;
        }
        if let SessionPhase::GeneratingRecommendations { result, .. } = &self.phase {
            self.last_error = Some(error.into());
            self.phase = SessionPhase::PathSelection {
                result: result.clone(),
            };
        }
    }

    pub fn begin_roadmap(&mut self, title: String) -> Result<u64, SessionError> {
        match &self.phase {
            SessionPhase::Recommendations { .. } => {
                self.pipeline_epoch += 1;
                self.last_error = None;
                self.phase = SessionPhase::GeneratingRoadmap { title };
                Ok(self.pipeline_epoch)
            }
            other => Err(SessionError::WrongPhase(other.name())),
        }
    }

    pub fn apply_roadmap(&mut self, epoch: u64, steps: Vec<RoadmapStep>) -> bool {
        if epoch != self.pipeline_epoch {
            return false;
        }
        match &self.phase {
            SessionPhase::GeneratingRoadmap { title } => {
                self.phase = SessionPhase::Roadmap {
                    title: title.clone(),
                    steps,
                };
                true
            }
            _ => false,
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        now - self.started_at
    }

    /// Raw question/answer transcript for generation calls and the proctored
    /// write-back.
    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.questions
            .iter()
            .zip(self.answers.iter())
            .map(|(question, answer)| TranscriptEntry {
                question: question.text.clone(),
                answer: match answer {
                    AnswerSlot::Empty => "Not answered".to_string(),
                    AnswerSlot::FreeText { text } => text.clone(),
                    AnswerSlot::Choice { index } => question
                        .option_text(*index)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Option {}", index + 1)),
                },
            })
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            mode: self.mode.name(),
            phase: self.phase_view(),
            question_count: self.questions.len(),
            visitation: self.visitation.clone(),
            started_at: self.started_at,
            error: self.last_error.clone(),
        }
    }

    fn phase_view(&self) -> PhaseView {
        match &self.phase {
            SessionPhase::Instructions => PhaseView::Instructions {
                seconds_per_question: QUESTION_SECONDS,
            },
            SessionPhase::Quiz {
                current,
                remaining_seconds,
            } => PhaseView::Quiz {
                current: *current,
                remaining_seconds: *remaining_seconds,
                total_seconds: QUESTION_SECONDS,
                question: self.questions[*current].view(),
                answer: self.answers[*current].clone(),
            },
            SessionPhase::Submitting { .. } => PhaseView::Submitting,
            SessionPhase::Results { result } => PhaseView::Results {
                result: result.clone(),
            },
            SessionPhase::LowScore { result } => PhaseView::LowScore {
                result: result.clone(),
            },
            SessionPhase::PathSelection { result } => PhaseView::PathSelection {
                result: result.clone(),
            },
            SessionPhase::GeneratingRecommendations { track, .. } => {
                PhaseView::GeneratingRecommendations { track: *track }
            }
            SessionPhase::Recommendations {
                track,
                recommendations,
            } => PhaseView::Recommendations {
                track: *track,
                recommendations: recommendations.clone(),
            },
            SessionPhase::GeneratingRoadmap { title } => PhaseView::GeneratingRoadmap {
                title: title.clone(),
            },
            SessionPhase::Roadmap { title, steps } => PhaseView::Roadmap {
                title: title.clone(),
                steps: steps.clone(),
            },
            SessionPhase::AwaitingPassword => PhaseView::ProctoredAuth,
            SessionPhase::Submitted {
                result,
                aptitude_estimate,
            } => PhaseView::Submitted {
                result: result.clone(),
                aptitude_estimate: *aptitude_estimate,
            },
        }
    }

    fn require_quiz(&self) -> Result<usize, SessionError> {
        match self.phase {
            SessionPhase::Quiz { current, .. } => Ok(current),
            _ => Err(SessionError::WrongPhase(self.phase.name())),
        }
    }

    fn check_bounds(&self, index: usize) -> Result<(), SessionError> {
        if index >= self.questions.len() {
            return Err(SessionError::OutOfBounds {
                index,
                len: self.questions.len(),
            });
        }
        Ok(())
    }

    fn settle_visitation(&mut self, index: usize, auto_skip: bool) {
        if self.visitation[index] == Visitation::NotVisited {
            self.visitation[index] = if auto_skip {
                Visitation::Skipped
            } else if self.answers[index].is_empty() {
                Visitation::NotAnswered
            } else {
                Visitation::Answered
            };
        }
    }
}

/// Client-facing projection of a session: the phase with its data, the
/// palette, and never the answer key.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub mode: &'static str,
    pub phase: PhaseView,
    pub question_count: usize,
    pub visitation: Vec<Visitation>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum PhaseView {
    Instructions {
        seconds_per_question: u32,
    },
    Quiz {
        current: usize,
        remaining_seconds: u32,
        total_seconds: u32,
        question: QuestionView,
        answer: AnswerSlot,
    },
    Submitting,
    Results {
        result: SessionResult,
    },
    LowScore {
        result: SessionResult,
    },
    PathSelection {
        result: SessionResult,
    },
    GeneratingRecommendations {
        track: Track,
    },
    Recommendations {
        track: Track,
        recommendations: Vec<Recommendation>,
    },
    GeneratingRoadmap {
        title: String,
    },
    Roadmap {
        title: String,
        steps: Vec<RoadmapStep>,
    },
    #[serde(rename = "proctored-auth")]
    ProctoredAuth,
    Submitted {
        result: SessionResult,
        aptitude_estimate: f64,
    },
}
