//! Step confidence ratings.

use serde::Serialize;

/// Discrete confidence level derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Speculative,
    Low,
    Moderate,
    Confident,
    Certain,
}

impl ConfidenceLevel {
    /// Map a score in [0,1] to its level.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            ConfidenceLevel::Certain
        } else if score >= 0.7 {
            ConfidenceLevel::Confident
        } else if score >= 0.5 {
            ConfidenceLevel::Moderate
        } else if score >= 0.3 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::Speculative
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Certain => "certain",
            ConfidenceLevel::Confident => "confident",
            ConfidenceLevel::Moderate => "moderate",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Speculative => "speculative",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence in a single step. The score is clamped to [0,1] on
/// construction and the level always agrees with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceRating {
    score: f64,
    level: ConfidenceLevel,
    reasoning: String,
    risks: Vec<String>,
}

impl ConfidenceRating {
    pub fn from_score(score: f64, reasoning: impl Into<String>, risks: Vec<String>) -> Self {
        let score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        Self {
            score,
            level: ConfidenceLevel::from_score(score),
            reasoning: reasoning.into(),
            risks,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn level(&self) -> ConfidenceLevel {
        self.level
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    pub fn risks(&self) -> &[String] {
        &self.risks
    }
}
