pub mod proctored;
pub mod question;
pub mod recommendation;
pub mod result;
pub mod session;
pub mod timer;

pub use proctored::{
    AptitudeAnalysis, JobDetails, ProctoredTest, SubmittedTestSummary, Swot, TestKind, TestStatus,
    TestSubmission, PROCTORED_TESTS_COLLECTION, STUDENTS_COLLECTION,
};
pub use question::{Question, QuestionView};
pub use recommendation::{Recommendation, RoadmapStep, Track};
pub use result::{QuestionOutcome, SessionResult};
pub use session::{
    ActiveSession, AdvanceOutcome, AnswerSlot, PhaseView, SessionError, SessionMode, SessionPhase,
    SessionSnapshot, TickOutcome, TranscriptEntry, Visitation, LOW_SCORE_THRESHOLD,
    QUESTION_SECONDS,
};
