//! Multi-Plan Generator
//!
//! Asks a `CandidateSource` for one candidate per strategy archetype and
//! hands the set to the selector. Where the probabilities come from is up
//! to the source; `HeuristicCandidateSource` derives them from keyword
//! dimensions of the request.
//!
//! ## Dimensions
//! - **Scope**: how much of the codebase the request touches
//! - **Complexity**: technical difficulty and architectural impact
//! - **Risk**: potential for breaking changes

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use super::alternatives::{AlternativePlan, MultiPlanResult, OutcomeProbabilities, PlanStrategy};
use super::confidence::ConfidenceRating;
use super::error::{PlanError, SelectionError};
use super::model::{CheckpointKind, ExecutionStrategy, PlanDraft, Stage, Step, StepPriority, StepSpec};
use super::selector;

/// Produces one candidate plan for a strategy archetype.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn propose(
        &self,
        task: &str,
        strategy: PlanStrategy,
    ) -> Result<AlternativePlan, PlanError>;
}

/// Runs a source across every archetype and selects among the results.
#[derive(Clone)]
pub struct MultiPlanGenerator {
    source: Arc<dyn CandidateSource>,
}

impl MultiPlanGenerator {
    pub fn new(source: Arc<dyn CandidateSource>) -> Self {
        Self { source }
    }

    /// Candidates that fail to generate are skipped. Fails with
    /// `EmptyCandidateSet` when none succeed.
    pub async fn generate(&self, task: &str) -> Result<MultiPlanResult, SelectionError> {
        let started = Instant::now();
        let mut candidates = Vec::with_capacity(PlanStrategy::ALL.len());

        for strategy in PlanStrategy::ALL {
            match self.source.propose(task, strategy).await {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    tracing::warn!(
                        strategy = %strategy,
                        error = %e,
                        "Candidate generation failed; skipping"
                    );
                }
            }
        }

        let mut result = selector::select(summarize(task), candidates)?;
        result.generation_time_ms = Some(started.elapsed().as_millis() as u64);
        Ok(result)
    }
}

/// First line of the request, capped at 80 characters.
fn summarize(task: &str) -> String {
    let first_line = task.lines().next().unwrap_or("").trim();
    if first_line.chars().count() <= 80 {
        return first_line.to_string();
    }
    let cut: String = first_line.chars().take(77).collect();
    format!("{}...", cut.trim_end())
}

// ============================================================================
// Heuristic source
// ============================================================================

/// Scores across each dimension (0.0 - 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskDimensions {
    pub scope: f64,
    pub complexity: f64,
    pub risk: f64,
}

/// Deterministic keyword-driven candidate source.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicCandidateSource;

impl HeuristicCandidateSource {
    const SCOPE_KEYWORDS: &'static [&'static str] = &[
        "entire",
        "whole",
        "all ",
        "across",
        "every",
        "system",
        "codebase",
        "modules",
        "project",
        "platform",
    ];

    const COMPLEXITY_KEYWORDS: &'static [&'static str] = &[
        "refactor",
        "architect",
        "redesign",
        "migrate",
        "migration",
        "concurren",
        "async",
        "distributed",
        "protocol",
        "performance",
        "integration",
    ];

    const RISK_KEYWORDS: &'static [&'static str] = &[
        "auth",
        "security",
        "payment",
        "billing",
        "production",
        "database",
        "schema",
        "delete",
        "deploy",
        "breaking",
        "critical",
    ];

    fn count_keyword_matches(text: &str, keywords: &[&str]) -> usize {
        keywords.iter().filter(|kw| text.contains(*kw)).count()
    }

    /// Score a request on each dimension.
    pub fn dimensions(task: &str) -> TaskDimensions {
        let lower = task.to_lowercase();
        let words = task.split_whitespace().count();
        let length_factor = if words > 60 {
            0.3
        } else if words > 20 {
            0.15
        } else {
            0.0
        };

        let score = |keywords: &[&str], per_match: f64, base: f64| {
            let matches = Self::count_keyword_matches(&lower, keywords) as f64;
            (base + matches * per_match).clamp(0.0, 1.0)
        };

        TaskDimensions {
            scope: score(Self::SCOPE_KEYWORDS, 0.25, 0.1 + length_factor),
            complexity: score(Self::COMPLEXITY_KEYWORDS, 0.2, 0.1 + length_factor),
            risk: score(Self::RISK_KEYWORDS, 0.2, 0.05),
        }
    }

    fn probabilities(strategy: PlanStrategy, d: TaskDimensions) -> OutcomeProbabilities {
        match strategy {
            PlanStrategy::Standard => OutcomeProbabilities::new(
                0.85 - 0.2 * d.complexity - 0.1 * d.risk,
                0.15 + 0.2 * d.scope,
                0.3 + 0.15 * d.scope,
                0.8,
            ),
            PlanStrategy::Accelerator => OutcomeProbabilities::new(
                0.75 - 0.25 * d.complexity - 0.2 * d.risk,
                0.3 + 0.3 * d.risk,
                0.15,
                0.65 - 0.1 * d.complexity,
            ),
            PlanStrategy::Lateral => OutcomeProbabilities::new(
                0.6 - 0.1 * d.complexity,
                0.35 + 0.1 * d.scope,
                0.4,
                0.75 + 0.1 * d.complexity,
            ),
        }
    }

    fn step(
        ordinal: u32,
        title: &str,
        description: String,
        agent: &str,
        tools: &[&str],
        confidence: f64,
    ) -> StepSpec {
        StepSpec {
            tools: tools.iter().map(|t| t.to_string()).collect(),
            confidence: Some(ConfidenceRating::from_score(
                confidence,
                "heuristic estimate",
                Vec::new(),
            )),
            ..StepSpec::new(ordinal, title, description, agent)
        }
    }

    fn standard_body(task: &str, d: TaskDimensions, c: f64) -> Result<PlanDraft, PlanError> {
        let mut draft = PlanDraft::new(format!("Standard: {}", summarize(task)), task);
        let analysis = draft.push_stage("Analysis", ExecutionStrategy::Sequential)?;
        let implementation = draft.push_stage("Implementation", ExecutionStrategy::Sequential)?;
        draft.add_stage(
            Stage::new(3, "Verification", ExecutionStrategy::Sequential)
                .with_checkpoint(CheckpointKind::Validation),
        )?;

        let survey = StepSpec {
            expected_output: "List of affected files and call sites".to_string(),
            ..Self::step(
                1,
                "Survey affected code",
                format!("Locate code related to: {task}"),
                "explorer",
                &["search", "read_file"],
                c + 0.1,
            )
        };
        let change = StepSpec {
            priority: StepPriority::High,
            estimated_tokens: 2000 + (2000.0 * d.scope) as u32,
            depends_on: vec![1],
            checkpoint: (d.risk >= 0.4).then_some(CheckpointKind::Rollback),
            ..Self::step(
                2,
                "Apply changes",
                "Make the changes incrementally".to_string(),
                "coder",
                &["read_file", "edit_file"],
                c,
            )
        };
        let verify = StepSpec {
            depends_on: vec![2],
            validation: vec!["Existing tests pass".to_string(), "No new warnings".to_string()],
            ..Self::step(
                3,
                "Run tests",
                "Run the test suite and fix regressions".to_string(),
                "reviewer",
                &["shell"],
                c,
            )
        };

        draft.add_step(analysis, Step::new(survey)?)?;
        draft.add_step(implementation, Step::new(change)?)?;
        draft.add_step(3, Step::new(verify)?)?;
        Ok(draft)
    }

    fn accelerator_body(task: &str, d: TaskDimensions, c: f64) -> Result<PlanDraft, PlanError> {
        let mut draft = PlanDraft::new(format!("Accelerator: {}", summarize(task)), task);
        let implementation = draft.push_stage("Parallel implementation", ExecutionStrategy::Parallel)?;
        let verification = draft.push_stage("Verification", ExecutionStrategy::Sequential)?;

        let core = StepSpec {
            priority: StepPriority::High,
            estimated_tokens: 1500 + (1500.0 * d.scope) as u32,
            ..Self::step(
                1,
                "Change core code",
                format!("Implement the core of: {task}"),
                "coder",
                &["search", "edit_file"],
                c,
            )
        };
        let callers = Self::step(
            2,
            "Update call sites",
            "Adjust callers alongside the core change".to_string(),
            "coder",
            &["search", "edit_file"],
            c - 0.05,
        );
        let verify = StepSpec {
            depends_on: vec![1, 2],
            validation: vec!["Build succeeds".to_string(), "Tests pass".to_string()],
            checkpoint: Some(CheckpointKind::Validation),
            ..Self::step(
                3,
                "Verify",
                "Build and run tests once both changes land".to_string(),
                "reviewer",
                &["shell"],
                c,
            )
        };

        draft.add_step(implementation, Step::new(core)?)?;
        draft.add_step(implementation, Step::new(callers)?)?;
        draft.add_step(verification, Step::new(verify)?)?;
        Ok(draft)
    }

    fn lateral_body(task: &str, d: TaskDimensions, c: f64) -> Result<PlanDraft, PlanError> {
        let mut draft = PlanDraft::new(format!("Lateral: {}", summarize(task)), task);
        let prototype = draft.push_stage("Prototype", ExecutionStrategy::Sequential)?;
        draft.add_stage(
            Stage::new(2, "Evaluation", ExecutionStrategy::ForkJoin)
                .with_checkpoint(CheckpointKind::Decision),
        )?;
        let adoption = draft.push_stage("Adoption", ExecutionStrategy::Sequential)?;

        let sketch = StepSpec {
            expected_output: "A minimal prototype of the alternative approach".to_string(),
            ..Self::step(
                1,
                "Prototype alternative",
                format!("Sketch an unconventional approach to: {task}"),
                "coder",
                &["read_file", "edit_file"],
                c - 0.1,
            )
        };
        let measure = StepSpec {
            depends_on: vec![1],
            ..Self::step(
                2,
                "Measure prototype",
                "Exercise the prototype".to_string(),
                "reviewer",
                &["shell"],
                c,
            )
        };
        let compare = StepSpec {
            depends_on: vec![1],
            ..Self::step(
                3,
                "Compare with current design",
                "Contrast against the existing code".to_string(),
                "explorer",
                &["search", "read_file"],
                c,
            )
        };
        let adopt = StepSpec {
            estimated_tokens: 1500 + (2500.0 * d.complexity) as u32,
            depends_on: vec![2, 3],
            checkpoint: Some(CheckpointKind::Rollback),
            validation: vec!["Tests pass".to_string()],
            ..Self::step(
                4,
                "Adopt or discard",
                "Roll the prototype out or revert it".to_string(),
                "coder",
                &["edit_file", "shell"],
                c,
            )
        };

        draft.add_step(prototype, Step::new(sketch)?)?;
        draft.add_step(2, Step::new(measure)?)?;
        draft.add_step(2, Step::new(compare)?)?;
        draft.add_step(adoption, Step::new(adopt)?)?;
        Ok(draft)
    }
}

#[async_trait]
impl CandidateSource for HeuristicCandidateSource {
    async fn propose(
        &self,
        task: &str,
        strategy: PlanStrategy,
    ) -> Result<AlternativePlan, PlanError> {
        let d = Self::dimensions(task);
        let probabilities = Self::probabilities(strategy, d);
        let c = probabilities.success();

        let (name, body, description, pros, cons, best_for) = match strategy {
            PlanStrategy::Standard => (
                "Incremental, test-backed change",
                Self::standard_body(task, d, c)?,
                "Survey first, change incrementally, verify with the existing suite",
                vec!["Predictable", "Easy to review"],
                vec!["Slowest path"],
                "Risky or unfamiliar code",
            ),
            PlanStrategy::Accelerator => (
                "Parallel fast track",
                Self::accelerator_body(task, d, c)?,
                "Change core code and callers side by side, verify once at the end",
                vec!["Fastest path"],
                vec!["Higher chance of rework", "Late feedback"],
                "Well-understood, low-risk changes",
            ),
            PlanStrategy::Lateral => (
                "Prototype an alternative",
                Self::lateral_body(task, d, c)?,
                "Prototype a different design and decide with evidence",
                vec!["May find a simpler design"],
                vec!["Exploration may be discarded"],
                "Problems where the current design is the obstacle",
            ),
        };

        let to_strings = |v: Vec<&str>| v.into_iter().map(String::from).collect::<Vec<_>>();
        let mut candidate = AlternativePlan::new(strategy, name, body, probabilities);
        candidate.description = description.to_string();
        candidate.pros = to_strings(pros);
        candidate.cons = to_strings(cons);
        candidate.best_for = best_for.to_string();
        Ok(candidate)
    }
}
