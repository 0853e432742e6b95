//! Plan artifact rendering.
//!
//! The artifact is a pure function of plan state with a fixed field order,
//! so regenerating the same plan produces a diff-friendly document.

use super::model::{ExecutionPlan, Stage, Step};

impl ExecutionPlan {
    /// Render the human-readable review document.
    pub fn to_artifact_text(&self) -> String {
        let mut lines: Vec<String> = vec![
            format!("# {}", self.title()),
            String::new(),
            format!("**Plan ID:** {}", self.plan_id()),
            format!("**Created:** {}", self.created_at().format("%Y-%m-%dT%H:%M:%SZ")),
            format!("**Mode:** {}", self.mode()),
            String::new(),
            "## Objective".to_string(),
            self.objective().to_string(),
            String::new(),
        ];

        if !self.clarifications().is_empty() {
            lines.push("## Clarifications".to_string());
            for response in self.clarifications() {
                lines.push(format!("- **Q:** {}", response.question));
                match response.effective_answer() {
                    Some(answer) if response.skipped => {
                        lines.push(format!("  **A:** {} _(skipped, default)_", answer))
                    }
                    Some(answer) => lines.push(format!("  **A:** {}", answer)),
                    None => lines.push("  **A:** _(skipped)_".to_string()),
                }
            }
            lines.push(String::new());
        }

        lines.push("---".to_string());
        lines.push(String::new());

        for stage in self.stages() {
            render_stage(stage, &mut lines);
        }

        lines.push(format!("**Total Steps:** {}", self.total_steps()));
        lines.push(format!(
            "**Estimated Tokens:** {}",
            group_thousands(self.total_estimated_tokens())
        ));

        lines.join("\n")
    }
}

fn render_stage(stage: &Stage, lines: &mut Vec<String>) {
    lines.push(format!("## Stage {}: {}", stage.ordinal(), stage.name()));
    lines.push(format!("*Strategy: {}*", stage.strategy()));
    if let Some(checkpoint) = stage.checkpoint() {
        lines.push(format!("*Checkpoint: {}*", checkpoint));
    }
    lines.push(String::new());

    for step in stage.steps() {
        render_step(step, lines);
    }

    lines.push("---".to_string());
    lines.push(String::new());
}

fn render_step(step: &Step, lines: &mut Vec<String>) {
    let confidence = step
        .confidence()
        .map(|c| format!(" [{}: {:.0}%]", c.level(), c.score() * 100.0))
        .unwrap_or_default();

    lines.push(format!("### Step {}: {}{}", step.ordinal(), step.title(), confidence));
    lines.push(format!("**Agent:** {}", step.agent()));
    lines.push(format!("**Priority:** {}", step.priority()));
    lines.push(format!(
        "**Estimated Tokens:** {}",
        group_thousands(u64::from(step.estimated_tokens()))
    ));
    lines.push(String::new());
    lines.push(step.description().to_string());
    lines.push(String::new());

    if !step.tools().is_empty() {
        lines.push(format!("**Tools:** {}", step.tools().join(", ")));
    }
    if !step.expected_output().is_empty() {
        lines.push(format!("**Expected Output:** {}", step.expected_output()));
    }
    if !step.depends_on().is_empty() {
        let deps: Vec<String> = step.depends_on().iter().map(u32::to_string).collect();
        lines.push(format!("**Depends on:** Steps {}", deps.join(", ")));
    }
    if let Some(checkpoint) = step.checkpoint() {
        lines.push(format!("**Checkpoint:** {}", checkpoint));
    }
    if let Some(c) = step.confidence() {
        if !c.risks().is_empty() {
            lines.push(format!("**Risks:** {}", c.risks().join("; ")));
        }
    }
    if !step.validation().is_empty() {
        lines.push("**Validation:**".to_string());
        for criterion in step.validation() {
            lines.push(format!("- [ ] {}", criterion));
        }
    }

    lines.push(String::new());
}

/// 1234567 -> "1,234,567"
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
