//! Alternative plans scored by verbalized outcome probabilities.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::PlanDraft;

/// Strategy archetype of a candidate plan. Declaration order is the
/// final tie-breaker during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStrategy {
    /// Conventional, proven approach
    Standard,
    /// Parallel, speed-first approach
    Accelerator,
    /// Unconventional approach
    Lateral,
}

impl PlanStrategy {
    pub const ALL: [PlanStrategy; 3] = [
        PlanStrategy::Standard,
        PlanStrategy::Accelerator,
        PlanStrategy::Lateral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStrategy::Standard => "standard",
            PlanStrategy::Accelerator => "accelerator",
            PlanStrategy::Lateral => "lateral",
        }
    }

    /// Display letter used in multi-plan reports.
    pub fn letter(&self) -> char {
        match self {
            PlanStrategy::Standard => 'A',
            PlanStrategy::Accelerator => 'B',
            PlanStrategy::Lateral => 'C',
        }
    }

    pub(crate) fn rank(&self) -> u8 {
        match self {
            PlanStrategy::Standard => 0,
            PlanStrategy::Accelerator => 1,
            PlanStrategy::Lateral => 2,
        }
    }
}

impl std::fmt::Display for PlanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default P(time overrun) when a source does not estimate it.
pub const DEFAULT_TIME_OVERRUN: f64 = 0.3;
/// Default P(quality) when a source does not estimate it.
pub const DEFAULT_QUALITY: f64 = 0.7;

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The four verbalized probabilities of a candidate, each in [0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeProbabilities {
    success: f64,
    friction: f64,
    time_overrun: f64,
    quality: f64,
}

impl OutcomeProbabilities {
    /// Values outside [0,1] are clamped; NaN becomes 0.
    pub fn new(success: f64, friction: f64, time_overrun: f64, quality: f64) -> Self {
        Self {
            success: clamp_unit(success),
            friction: clamp_unit(friction),
            time_overrun: clamp_unit(time_overrun),
            quality: clamp_unit(quality),
        }
    }

    pub fn with_defaults(success: f64, friction: f64) -> Self {
        Self::new(success, friction, DEFAULT_TIME_OVERRUN, DEFAULT_QUALITY)
    }

    pub fn success(&self) -> f64 {
        self.success
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn time_overrun(&self) -> f64 {
        self.time_overrun
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// (success × quality) / (friction + time overrun); infinite when the
    /// denominator is zero.
    pub fn risk_reward_ratio(&self) -> f64 {
        let risk = self.friction + self.time_overrun;
        if risk == 0.0 {
            return f64::INFINITY;
        }
        (self.success * self.quality) / risk
    }

    /// Weighted overall score in [0,1].
    pub fn overall_score(&self) -> f64 {
        0.4 * self.success
            + 0.25 * (1.0 - self.friction)
            + 0.15 * (1.0 - self.time_overrun)
            + 0.2 * self.quality
    }

    /// `P(Success)=0.80 | P(Friction)=0.20 | P(Quality)=0.70`
    pub fn to_display(&self) -> String {
        format!(
            "P(Success)={:.2} | P(Friction)={:.2} | P(Quality)={:.2}",
            self.success, self.friction, self.quality
        )
    }
}

/// One candidate plan with its probabilities and trade-offs.
#[derive(Debug, Clone, Serialize)]
pub struct AlternativePlan {
    pub strategy: PlanStrategy,
    pub name: String,
    pub description: String,
    /// Body, finalized only once this candidate is chosen
    pub plan: PlanDraft,
    pub probabilities: OutcomeProbabilities,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub best_for: String,
}

impl AlternativePlan {
    pub fn new(
        strategy: PlanStrategy,
        name: impl Into<String>,
        plan: PlanDraft,
        probabilities: OutcomeProbabilities,
    ) -> Self {
        Self {
            strategy,
            name: name.into(),
            description: String::new(),
            plan,
            probabilities,
            pros: Vec::new(),
            cons: Vec::new(),
            best_for: String::new(),
        }
    }

    pub fn overall_score(&self) -> f64 {
        self.probabilities.overall_score()
    }

    pub fn risk_reward_ratio(&self) -> f64 {
        self.probabilities.risk_reward_ratio()
    }
}

/// Outcome of multi-plan selection.
#[derive(Debug, Clone, Serialize)]
pub struct MultiPlanResult {
    pub task_summary: String,
    pub plans: Vec<AlternativePlan>,
    pub recommended_plan: PlanStrategy,
    pub recommendation_reasoning: String,
    pub comparison_summary: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub generation_time_ms: Option<u64>,
    #[serde(skip)]
    pub(crate) recommended_index: usize,
}

impl MultiPlanResult {
    /// First candidate with the given strategy.
    pub fn get_plan(&self, strategy: PlanStrategy) -> Option<&AlternativePlan> {
        self.plans.iter().find(|p| p.strategy == strategy)
    }

    /// The candidate that won selection.
    pub fn get_recommended(&self) -> Option<&AlternativePlan> {
        self.plans.get(self.recommended_index)
    }

    /// Consume the result, keeping only the recommended candidate.
    pub fn into_recommended(mut self) -> Option<AlternativePlan> {
        if self.recommended_index < self.plans.len() {
            Some(self.plans.swap_remove(self.recommended_index))
        } else {
            None
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut lines: Vec<String> = vec![
            "# Multi-Plan Analysis (Verbalized Sampling)".to_string(),
            String::new(),
            format!("**Task:** {}", self.task_summary),
            String::new(),
            "---".to_string(),
            String::new(),
        ];

        for plan in &self.plans {
            lines.push(format!("## Plan {}: {}", plan.strategy.letter(), plan.name));
            if !plan.description.is_empty() {
                lines.push(format!("*{}*", plan.description));
            }
            lines.push(String::new());
            lines.push(format!("**Probabilities:** {}", plan.probabilities.to_display()));
            lines.push(format!("**Overall Score:** {:.2}", plan.overall_score()));
            let steps: usize = plan.plan.stages().iter().map(|s| s.steps().len()).sum();
            lines.push(format!("**Steps:** {}", steps));
            if !plan.best_for.is_empty() {
                lines.push(format!("**Best for:** {}", plan.best_for));
            }
            lines.push(String::new());

            if !plan.pros.is_empty() {
                lines.push("**Pros:**".to_string());
                lines.extend(plan.pros.iter().map(|p| format!("- {}", p)));
                lines.push(String::new());
            }
            if !plan.cons.is_empty() {
                lines.push("**Cons:**".to_string());
                lines.extend(plan.cons.iter().map(|c| format!("- {}", c)));
                lines.push(String::new());
            }
            lines.push("---".to_string());
            lines.push(String::new());
        }

        lines.push("## RECOMMENDATION".to_string());
        lines.push(String::new());
        if let Some(chosen) = self.get_recommended() {
            lines.push(format!(
                "**Selected:** Plan {} - {}",
                self.recommended_plan.as_str().to_uppercase(),
                chosen.name
            ));
        }
        lines.push(String::new());
        lines.push(format!("**Reasoning:** {}", self.recommendation_reasoning));
        if let Some(summary) = &self.comparison_summary {
            lines.push(String::new());
            lines.push("**Comparison:**".to_string());
            lines.push(summary.clone());
        }

        lines.join("\n")
    }
}
