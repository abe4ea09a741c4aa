use serde::{Deserialize, Serialize};

/// Outcome of one question after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOutcome {
    Correct,
    Incorrect,
    Skipped,
}

/// Summary derived exactly once at submission, immutable thereafter.
///
/// `percentage` is computed over all questions; `accuracy` only over the
/// attempted (non-skipped) ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionResult {
    pub score: u32,
    pub total: u32,
    pub percentage: f64,
    pub accuracy: f64,
    pub correct: u32,
    pub incorrect: u32,
    pub skipped: u32,
    pub time_taken: String,
}
