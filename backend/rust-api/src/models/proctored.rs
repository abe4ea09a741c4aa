use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::question::Question;
use super::result::SessionResult;
use super::session::TranscriptEntry;

pub const PROCTORED_TESTS_COLLECTION: &str = "proctored_tests";
pub const STUDENTS_COLLECTION: &str = "students";

/// Teacher-authored, password-gated test record. Owned by the document
/// store; the engine keeps a transient copy while a session is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProctoredTest {
    #[serde(rename = "_id")]
    pub id: String,
    pub password: String,
    pub questions: Vec<Question>,
    pub status: TestStatus,
    pub student_id: String,
    pub teacher_id: String,
    #[serde(rename = "type")]
    pub kind: TestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_details: Option<JobDetails>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission: Option<TestSubmission>,
}

impl ProctoredTest {
    /// Subject category handed to the aptitude analysis: the job title for
    /// role-specific tests, a generic label otherwise.
    pub fn subject_category(&self) -> String {
        match (&self.kind, &self.job_details) {
            (TestKind::Specific, Some(details)) => details.title.clone(),
            _ => "General Aptitude".to_string(),
        }
    }

    pub fn specialization(&self) -> Option<String> {
        self.job_details
            .as_ref()
            .and_then(|details| details.description.clone())
    }
}

/// Lifecycle: created externally by a teacher, `pending -> completed`
/// exactly once on successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Pending,
    Completed,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    General,
    Specific,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetails {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Enrichment merged onto the test record when the student submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSubmission {
    pub submitted_at: DateTime<Utc>,
    pub answers: Vec<TranscriptEntry>,
    pub result: SessionResult,
    pub aptitude_estimate: f64,
    pub analysis: AptitudeAnalysis,
}

/// Payload of the external aptitude-analysis enrichment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AptitudeAnalysis {
    pub analysis: String,
    pub verdict: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swot: Option<Swot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaching_plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swot {
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
}

/// Compact summary returned when a completed test is fetched again; the
/// flow short-circuits to this instead of re-prompting for a password.
#[derive(Debug, Clone, Serialize)]
pub struct SubmittedTestSummary {
    pub test_id: String,
    pub status: TestStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aptitude_estimate: Option<f64>,
}

impl SubmittedTestSummary {
    pub fn from_test(test: &ProctoredTest) -> Self {
        Self {
            test_id: test.id.clone(),
            status: test.status,
            submitted_at: test.submission.as_ref().map(|s| s.submitted_at),
            result: test.submission.as_ref().map(|s| s.result.clone()),
            aptitude_estimate: test.submission.as_ref().map(|s| s.aptitude_estimate),
        }
    }
}
