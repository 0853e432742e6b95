//! Plan Model
//!
//! Three-level task breakdown: an `ExecutionPlan` holds ordered `Stage`s,
//! each holding ordered `Step`s. Plans are assembled in a `PlanDraft`,
//! which checks ordinals as they are added and the full dependency graph
//! at `finalize()`. Dependencies may point forward, so they are only
//! resolved once the draft is complete.
//!
//! A finalized plan is immutable apart from mode transitions and recording
//! where its artifact was persisted.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::clarification::ClarificationResponse;
use super::confidence::ConfidenceRating;
use super::error::PlanError;

/// Token estimate used when a step does not state one.
pub const DEFAULT_STEP_TOKENS: u32 = 1000;

// ============================================================================
// Enums
// ============================================================================

/// Step priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPriority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for StepPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepPriority::Critical => write!(f, "critical"),
            StepPriority::High => write!(f, "high"),
            StepPriority::Medium => write!(f, "medium"),
            StepPriority::Low => write!(f, "low"),
        }
    }
}

/// Designated point for validation, rollback, or a branching decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointKind {
    Validation,
    Rollback,
    Decision,
}

impl std::fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointKind::Validation => write!(f, "validation"),
            CheckpointKind::Rollback => write!(f, "rollback"),
            CheckpointKind::Decision => write!(f, "decision"),
        }
    }
}

/// How a stage's steps are meant to run. Descriptive: the core loop itself
/// always executes tools one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStrategy {
    #[default]
    Sequential,
    Parallel,
    ForkJoin,
    Pipeline,
    Conditional,
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::Sequential => write!(f, "sequential"),
            ExecutionStrategy::Parallel => write!(f, "parallel"),
            ExecutionStrategy::ForkJoin => write!(f, "fork_join"),
            ExecutionStrategy::Pipeline => write!(f, "pipeline"),
            ExecutionStrategy::Conditional => write!(f, "conditional"),
        }
    }
}

/// Plan lifecycle mode. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanningMode {
    Exploration,
    #[default]
    Planning,
    Execution,
}

impl std::fmt::Display for PlanningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanningMode::Exploration => write!(f, "exploration"),
            PlanningMode::Planning => write!(f, "planning"),
            PlanningMode::Execution => write!(f, "execution"),
        }
    }
}

// ============================================================================
// Step & Stage
// ============================================================================

/// Plain description of a step, validated by `Step::new`.
#[derive(Debug, Clone, PartialEq)]
pub struct StepSpec {
    /// Unique across the whole plan
    pub ordinal: u32,
    pub title: String,
    pub description: String,
    /// Owning agent identifier
    pub agent: String,
    pub tools: Vec<String>,
    pub expected_output: String,
    pub validation: Vec<String>,
    pub estimated_tokens: u32,
    pub priority: StepPriority,
    pub depends_on: Vec<u32>,
    pub checkpoint: Option<CheckpointKind>,
    pub confidence: Option<ConfidenceRating>,
}

impl StepSpec {
    /// Spec with defaults for everything but identity.
    pub fn new(
        ordinal: u32,
        title: impl Into<String>,
        description: impl Into<String>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            ordinal,
            title: title.into(),
            description: description.into(),
            agent: agent.into(),
            tools: Vec::new(),
            expected_output: String::new(),
            validation: Vec::new(),
            estimated_tokens: DEFAULT_STEP_TOKENS,
            priority: StepPriority::default(),
            depends_on: Vec::new(),
            checkpoint: None,
            confidence: None,
        }
    }
}

/// A validated step. Never depends on itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    ordinal: u32,
    title: String,
    description: String,
    agent: String,
    tools: Vec<String>,
    expected_output: String,
    validation: Vec<String>,
    estimated_tokens: u32,
    priority: StepPriority,
    depends_on: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<CheckpointKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<ConfidenceRating>,
}

impl Step {
    pub fn new(spec: StepSpec) -> Result<Self, PlanError> {
        if spec.depends_on.contains(&spec.ordinal) {
            return Err(PlanError::SelfDependency(spec.ordinal));
        }
        if spec.estimated_tokens == 0 {
            return Err(PlanError::InvalidTokenEstimate(spec.ordinal));
        }

        let mut depends_on = spec.depends_on;
        depends_on.sort_unstable();
        depends_on.dedup();

        Ok(Self {
            ordinal: spec.ordinal,
            title: spec.title,
            description: spec.description,
            agent: spec.agent,
            tools: spec.tools,
            expected_output: spec.expected_output,
            validation: spec.validation,
            estimated_tokens: spec.estimated_tokens,
            priority: spec.priority,
            depends_on,
            checkpoint: spec.checkpoint,
            confidence: spec.confidence,
        })
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn tools(&self) -> &[String] {
        &self.tools
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn validation(&self) -> &[String] {
        &self.validation
    }

    pub fn estimated_tokens(&self) -> u32 {
        self.estimated_tokens
    }

    pub fn priority(&self) -> StepPriority {
        self.priority
    }

    /// Sorted, deduplicated
    pub fn depends_on(&self) -> &[u32] {
        &self.depends_on
    }

    pub fn checkpoint(&self) -> Option<CheckpointKind> {
        self.checkpoint
    }

    pub fn confidence(&self) -> Option<&ConfidenceRating> {
        self.confidence.as_ref()
    }
}

/// A group of steps sharing an execution strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    ordinal: u32,
    name: String,
    steps: Vec<Step>,
    strategy: ExecutionStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    checkpoint: Option<CheckpointKind>,
}

impl Stage {
    /// An empty stage; steps are added through `PlanDraft::add_step`.
    pub fn new(ordinal: u32, name: impl Into<String>, strategy: ExecutionStrategy) -> Self {
        Self {
            ordinal,
            name: name.into(),
            steps: Vec::new(),
            strategy,
            checkpoint: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: CheckpointKind) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn strategy(&self) -> ExecutionStrategy {
        self.strategy
    }

    pub fn checkpoint(&self) -> Option<CheckpointKind> {
        self.checkpoint
    }
}

// ============================================================================
// Draft
// ============================================================================

/// A plan under construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanDraft {
    title: String,
    objective: String,
    stages: Vec<Stage>,
    clarifications: Vec<ClarificationResponse>,
    mode: PlanningMode,
}

impl PlanDraft {
    pub fn new(title: impl Into<String>, objective: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            objective: objective.into(),
            stages: Vec::new(),
            clarifications: Vec::new(),
            mode: PlanningMode::default(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Attach Q/A pairs collected before planning.
    pub fn set_clarifications(&mut self, clarifications: Vec<ClarificationResponse>) {
        self.clarifications = clarifications;
    }

    /// Starting mode of the finalized plan.
    pub fn set_mode(&mut self, mode: PlanningMode) {
        self.mode = mode;
    }

    /// Append a stage with an explicit ordinal.
    pub fn add_stage(&mut self, stage: Stage) -> Result<(), PlanError> {
        if self.stages.iter().any(|s| s.ordinal == stage.ordinal) {
            return Err(PlanError::DuplicateStageOrdinal(stage.ordinal));
        }
        for step in &stage.steps {
            self.ensure_step_ordinal_free(step.ordinal)?;
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Append a stage, assigning the next ordinal. Returns that ordinal.
    pub fn push_stage(
        &mut self,
        name: impl Into<String>,
        strategy: ExecutionStrategy,
    ) -> Result<u32, PlanError> {
        let ordinal = next_ordinal(self.stages.iter().map(|s| s.ordinal))?;
        self.stages.push(Stage::new(ordinal, name, strategy));
        Ok(ordinal)
    }

    /// Add a step to the stage with `stage_ordinal`.
    pub fn add_step(&mut self, stage_ordinal: u32, step: Step) -> Result<(), PlanError> {
        self.ensure_step_ordinal_free(step.ordinal)?;
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.ordinal == stage_ordinal)
            .ok_or(PlanError::UnknownStage(stage_ordinal))?;
        stage.steps.push(step);
        Ok(())
    }

    /// Next unused step ordinal.
    pub fn next_step_ordinal(&self) -> Result<u32, PlanError> {
        next_ordinal(self.all_steps().map(|s| s.ordinal))
    }

    fn all_steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|s| s.steps.iter())
    }

    fn ensure_step_ordinal_free(&self, ordinal: u32) -> Result<(), PlanError> {
        if self.all_steps().any(|s| s.ordinal == ordinal) {
            return Err(PlanError::DuplicateStepOrdinal(ordinal));
        }
        Ok(())
    }

    /// Check the whole dependency graph and freeze the plan.
    pub fn finalize(self) -> Result<ExecutionPlan, PlanError> {
        let ordinals: HashSet<u32> = self.all_steps().map(|s| s.ordinal).collect();
        for step in self.all_steps() {
            if let Some(missing) = step.depends_on.iter().find(|d| !ordinals.contains(*d)) {
                return Err(PlanError::UnresolvedDependency {
                    step: step.ordinal,
                    missing: *missing,
                });
            }
        }

        let layers = dependency_layers(self.all_steps());
        let placed: usize = layers.iter().map(Vec::len).sum();
        if placed < ordinals.len() {
            let layered: HashSet<u32> = layers.iter().flatten().copied().collect();
            let mut steps: Vec<u32> = ordinals.difference(&layered).copied().collect();
            steps.sort_unstable();
            return Err(PlanError::CyclicDependency { steps });
        }

        let total_estimated_tokens = self
            .all_steps()
            .map(|s| u64::from(s.estimated_tokens))
            .sum();

        let plan = ExecutionPlan {
            plan_id: format!("plan-{}", &Uuid::new_v4().simple().to_string()[..8]),
            title: self.title,
            objective: self.objective,
            stages: self.stages,
            total_estimated_tokens,
            created_at: Utc::now(),
            clarifications: self.clarifications,
            mode: self.mode,
            artifact_path: None,
        };
        tracing::info!(
            plan_id = %plan.plan_id,
            stages = plan.stages.len(),
            steps = plan.total_steps(),
            "Plan finalized"
        );
        Ok(plan)
    }
}

/// One past the highest ordinal in use, starting from 1.
fn next_ordinal(used: impl Iterator<Item = u32>) -> Result<u32, PlanError> {
    match used.max() {
        None => Ok(1),
        Some(highest) => highest
            .checked_add(1)
            .ok_or(PlanError::OrdinalExhausted(highest)),
    }
}

/// Kahn layering over step ordinals. Steps caught in a cycle never reach
/// in-degree zero and are left out of every layer.
fn dependency_layers<'a>(steps: impl Iterator<Item = &'a Step>) -> Vec<Vec<u32>> {
    let mut in_degree: BTreeMap<u32, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

    for step in steps {
        *in_degree.entry(step.ordinal).or_insert(0) += step.depends_on.len();
        for dep in &step.depends_on {
            in_degree.entry(*dep).or_insert(0);
            dependents.entry(*dep).or_default().push(step.ordinal);
        }
    }

    let mut layers = Vec::new();
    let mut ready: BTreeSet<u32> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&ordinal, _)| ordinal)
        .collect();

    while !ready.is_empty() {
        let layer: Vec<u32> = ready.iter().copied().collect();
        ready.clear();
        for ordinal in &layer {
            for dependent in dependents.get(ordinal).into_iter().flatten() {
                if let Some(deg) = in_degree.get_mut(dependent) {
                    *deg = deg.saturating_sub(1);
                    if *deg == 0 {
                        ready.insert(*dependent);
                    }
                }
            }
        }
        layers.push(layer);
    }

    layers
}

// ============================================================================
// ExecutionPlan
// ============================================================================

/// Steps that may start together once every earlier batch is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionBatch {
    /// 0-based
    pub index: usize,
    /// Ascending
    pub step_ordinals: Vec<u32>,
}

/// A finalized, dependency-checked plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    plan_id: String,
    title: String,
    objective: String,
    stages: Vec<Stage>,
    total_estimated_tokens: u64,
    created_at: DateTime<Utc>,
    clarifications: Vec<ClarificationResponse>,
    mode: PlanningMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact_path: Option<PathBuf>,
}

impl ExecutionPlan {
    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn total_estimated_tokens(&self) -> u64 {
        self.total_estimated_tokens
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn clarifications(&self) -> &[ClarificationResponse] {
        &self.clarifications
    }

    pub fn mode(&self) -> PlanningMode {
        self.mode
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.artifact_path.as_deref()
    }

    /// Sum of all stage step counts.
    pub fn total_steps(&self) -> usize {
        self.stages.iter().map(|s| s.steps.len()).sum()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|s| s.steps.iter())
    }

    pub fn step(&self, ordinal: u32) -> Option<&Step> {
        self.steps().find(|s| s.ordinal == ordinal)
    }

    /// Move to a later mode. Re-entering the current mode is a no-op.
    pub fn advance_mode(&mut self, next: PlanningMode) -> Result<(), PlanError> {
        if next < self.mode {
            return Err(PlanError::InvalidModeTransition {
                from: self.mode,
                to: next,
            });
        }
        if next != self.mode {
            tracing::debug!(plan_id = %self.plan_id, from = %self.mode, to = %next, "Plan mode advanced");
            self.mode = next;
        }
        Ok(())
    }

    /// Dependency-ordered batches, the order an execution engine would
    /// follow.
    pub fn execution_batches(&self) -> Vec<ExecutionBatch> {
        dependency_layers(self.steps())
            .into_iter()
            .enumerate()
            .map(|(index, step_ordinals)| ExecutionBatch {
                index,
                step_ordinals,
            })
            .collect()
    }

    /// Write the artifact text to `<dir>/<plan_id>.md` and remember the
    /// path.
    pub fn persist(&mut self, dir: &Path) -> Result<PathBuf, PlanError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.md", self.plan_id));
        std::fs::write(&path, self.to_artifact_text())?;
        tracing::info!(plan_id = %self.plan_id, path = %path.display(), "Plan artifact written");
        self.artifact_path = Some(path.clone());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(ordinal: u32, deps: &[u32]) -> Step {
        Step::new(StepSpec {
            depends_on: deps.to_vec(),
            ..StepSpec::new(ordinal, format!("Step {ordinal}"), "do it", "coder")
        })
        .unwrap()
    }

    fn two_stage_draft() -> PlanDraft {
        let mut draft = PlanDraft::new("Refactor auth", "Split the auth module");
        let analysis = draft.push_stage("Analysis", ExecutionStrategy::Sequential).unwrap();
        let build = draft.push_stage("Build", ExecutionStrategy::Parallel).unwrap();
        draft.add_step(analysis, step(1, &[])).unwrap();
        draft.add_step(build, step(2, &[1])).unwrap();
        draft.add_step(build, step(3, &[1])).unwrap();
        draft
    }

    #[test]
    fn test_self_dependency_rejected() {
        let err = Step::new(StepSpec {
            depends_on: vec![2, 3],
            ..StepSpec::new(3, "Loop", "", "coder")
        })
        .unwrap_err();
        assert!(matches!(err, PlanError::SelfDependency(3)));
    }

    #[test]
    fn test_zero_token_estimate_rejected() {
        let err = Step::new(StepSpec {
            estimated_tokens: 0,
            ..StepSpec::new(1, "Free", "", "coder")
        })
        .unwrap_err();
        assert!(matches!(err, PlanError::InvalidTokenEstimate(1)));
    }

    #[test]
    fn test_step_defaults() {
        let step = step(1, &[]);
        assert_eq!(step.estimated_tokens(), DEFAULT_STEP_TOKENS);
        assert_eq!(step.priority(), StepPriority::Medium);
        assert!(step.checkpoint().is_none());
    }

    #[test]
    fn test_duplicate_stage_ordinal() {
        let mut draft = PlanDraft::new("t", "o");
        draft.add_stage(Stage::new(1, "A", ExecutionStrategy::Sequential)).unwrap();
        let err = draft
            .add_stage(Stage::new(1, "B", ExecutionStrategy::Sequential))
            .unwrap_err();
        assert!(matches!(err, PlanError::DuplicateStageOrdinal(1)));
    }

    #[test]
    fn test_push_stage_assigns_increasing_ordinals() {
        let mut draft = PlanDraft::new("t", "o");
        draft.add_stage(Stage::new(4, "A", ExecutionStrategy::Sequential)).unwrap();
        assert_eq!(draft.push_stage("B", ExecutionStrategy::Pipeline).unwrap(), 5);
        assert_eq!(draft.push_stage("C", ExecutionStrategy::Pipeline).unwrap(), 6);
    }

    #[test]
    fn test_ordinals_exhausted_at_max() {
        let mut draft = PlanDraft::new("t", "o");
        draft
            .add_stage(Stage::new(u32::MAX, "Last", ExecutionStrategy::Sequential))
            .unwrap();
        assert!(matches!(
            draft.push_stage("Next", ExecutionStrategy::Sequential).unwrap_err(),
            PlanError::OrdinalExhausted(u32::MAX)
        ));
        assert_eq!(draft.stages().len(), 1);

        draft.add_step(u32::MAX, step(u32::MAX, &[])).unwrap();
        assert!(matches!(
            draft.next_step_ordinal().unwrap_err(),
            PlanError::OrdinalExhausted(u32::MAX)
        ));
    }

    #[test]
    fn test_add_step_errors() {
        let mut draft = two_stage_draft();
        assert!(matches!(
            draft.add_step(9, step(4, &[])).unwrap_err(),
            PlanError::UnknownStage(9)
        ));
        assert!(matches!(
            draft.add_step(1, step(2, &[])).unwrap_err(),
            PlanError::DuplicateStepOrdinal(2)
        ));
        assert_eq!(draft.next_step_ordinal().unwrap(), 4);
    }

    #[test]
    fn test_forward_reference_within_stage_resolves() {
        let mut draft = PlanDraft::new("t", "o");
        let stage = draft.push_stage("Only", ExecutionStrategy::Sequential).unwrap();
        draft.add_step(stage, step(1, &[2])).unwrap();
        draft.add_step(stage, step(2, &[])).unwrap();
        let plan = draft.finalize().unwrap();
        assert_eq!(plan.total_steps(), 2);
    }

    #[test]
    fn test_unresolved_dependency_at_finalize() {
        let mut draft = two_stage_draft();
        draft.add_step(2, step(4, &[7])).unwrap();
        match draft.finalize().unwrap_err() {
            PlanError::UnresolvedDependency { step, missing } => {
                assert_eq!((step, missing), (4, 7));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_cycle_across_stages_detected() {
        let mut draft = PlanDraft::new("t", "o");
        let a = draft.push_stage("A", ExecutionStrategy::Sequential).unwrap();
        let b = draft.push_stage("B", ExecutionStrategy::Sequential).unwrap();
        draft.add_step(a, step(1, &[2])).unwrap();
        draft.add_step(b, step(2, &[1])).unwrap();
        draft.add_step(b, step(3, &[])).unwrap();
        match draft.finalize().unwrap_err() {
            PlanError::CyclicDependency { steps } => assert_eq!(steps, vec![1, 2]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_finalize_totals_and_identity() {
        let plan = two_stage_draft().finalize().unwrap();
        assert!(plan.plan_id().starts_with("plan-"));
        assert_eq!(plan.plan_id().len(), 13);
        assert_eq!(plan.total_steps(), 3);
        assert_eq!(plan.total_estimated_tokens(), 3 * u64::from(DEFAULT_STEP_TOKENS));
        assert_eq!(plan.mode(), PlanningMode::Planning);
        assert!(plan.artifact_path().is_none());
        assert_eq!(plan.step(2).unwrap().depends_on(), &[1]);
    }

    #[test]
    fn test_execution_batches() {
        let mut draft = two_stage_draft();
        draft.add_step(2, step(4, &[2, 3])).unwrap();
        let plan = draft.finalize().unwrap();
        let batches = plan.execution_batches();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].step_ordinals, vec![1]);
        assert_eq!(batches[1].step_ordinals, vec![2, 3]);
        assert_eq!(batches[2].step_ordinals, vec![4]);
        assert_eq!(batches[2].index, 2);
    }

    #[test]
    fn test_mode_transitions_are_monotonic() {
        let mut plan = two_stage_draft().finalize().unwrap();
        plan.advance_mode(PlanningMode::Planning).unwrap();
        plan.advance_mode(PlanningMode::Execution).unwrap();
        let err = plan.advance_mode(PlanningMode::Exploration).unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidModeTransition {
                from: PlanningMode::Execution,
                to: PlanningMode::Exploration
            }
        ));
        assert_eq!(plan.mode(), PlanningMode::Execution);
    }

    #[test]
    fn test_draft_mode_carries_over() {
        let mut draft = two_stage_draft();
        draft.set_mode(PlanningMode::Exploration);
        let mut plan = draft.finalize().unwrap();
        assert_eq!(plan.mode(), PlanningMode::Exploration);
        plan.advance_mode(PlanningMode::Planning).unwrap();
    }

    #[test]
    fn test_persist_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = two_stage_draft().finalize().unwrap();
        let path = plan.persist(&dir.path().join("plans")).unwrap();
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), format!("{}.md", plan.plan_id()));
        assert_eq!(plan.artifact_path(), Some(path.as_path()));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Refactor auth"));
    }
}
