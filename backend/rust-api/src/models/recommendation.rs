use serde::{Deserialize, Serialize};

/// Post-result pipeline track chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    Jobs,
    Studies,
}

impl Track {
    pub fn as_str(&self) -> &'static str {
        match self {
            Track::Jobs => "jobs",
            Track::Studies => "studies",
        }
    }
}

/// A generated career or study suggestion. `image_url` is resolved lazily;
/// a missing image is a rendering concern, not a pipeline failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// One milestone of a linear roadmap toward a chosen recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapStep {
    pub title: String,
    pub duration: String,
    pub description: String,
}
