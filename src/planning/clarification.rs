//! Clarifying questions asked before planning, and their answers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A question put to the user before a plan is drafted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarifyingQuestion {
    /// "q-" followed by 8 hex characters
    pub id: String,
    pub question: String,
    /// Free-form grouping such as "scope" or "constraints"
    pub category: String,
    /// Suggested answers; empty for free text
    #[serde(default)]
    pub options: Vec<String>,
    pub required: bool,
    /// Answer used when the question is skipped
    pub default: Option<String>,
}

impl ClarifyingQuestion {
    pub fn new(question: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: format!("q-{}", &Uuid::new_v4().simple().to_string()[..8]),
            question: question.into(),
            category: category.into(),
            options: Vec::new(),
            required: false,
            default: None,
        }
    }

    /// Record an answer to this question.
    pub fn answer(&self, answer: impl Into<String>) -> ClarificationResponse {
        ClarificationResponse {
            question_id: self.id.clone(),
            question: self.question.clone(),
            answer: answer.into(),
            skipped: false,
        }
    }

    /// Record a skip; the default answer, if any, stands in.
    pub fn skip(&self) -> ClarificationResponse {
        ClarificationResponse {
            question_id: self.id.clone(),
            question: self.question.clone(),
            answer: self.default.clone().unwrap_or_default(),
            skipped: true,
        }
    }
}

/// An answered (or skipped) clarifying question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationResponse {
    pub question_id: String,
    /// Original question text, kept for the plan artifact
    #[serde(default)]
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub skipped: bool,
}

impl ClarificationResponse {
    /// The answer to act on, if there is one.
    pub fn effective_answer(&self) -> Option<&str> {
        if self.answer.trim().is_empty() {
            None
        } else {
            Some(&self.answer)
        }
    }
}
