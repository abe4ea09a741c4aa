use serde::{Deserialize, Serialize};

/// A single assessment question. Immutable once loaded into a session.
/// `options` absent means the question takes a free-text answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<usize>,
}

/// Client-facing projection of a question. Never carries the answer key.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

impl Question {
    pub fn view(&self) -> QuestionView {
        QuestionView {
            text: self.text.clone(),
            options: self.options.clone(),
        }
    }

    pub fn option_text(&self, index: usize) -> Option<&str> {
        self.options
            .as_ref()
            .and_then(|opts| opts.get(index))
            .map(String::as_str)
    }
}
