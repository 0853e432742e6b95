//! Multi-Plan Selector
//!
//! Pure scoring over a candidate set: highest overall score wins, ties go
//! to the higher risk-reward ratio, then to the earlier-declared strategy.
//! Given the same candidates the same plan is always recommended.

use std::cmp::Ordering;

use chrono::Utc;

use super::alternatives::{AlternativePlan, MultiPlanResult};
use super::error::SelectionError;

/// Upper bound on candidates accepted by `select`.
pub const MAX_CANDIDATES: usize = 5;

/// Scores closer than this are treated as equal.
const SCORE_EPSILON: f64 = 1e-9;

/// Pick the recommended candidate.
pub fn select(
    task_summary: impl Into<String>,
    candidates: Vec<AlternativePlan>,
) -> Result<MultiPlanResult, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::EmptyCandidateSet);
    }
    if candidates.len() > MAX_CANDIDATES {
        return Err(SelectionError::TooManyCandidates {
            count: candidates.len(),
            max: MAX_CANDIDATES,
        });
    }

    let mut best = 0;
    for index in 1..candidates.len() {
        if rank(&candidates[index], &candidates[best]) == Ordering::Greater {
            best = index;
        }
    }

    let chosen = &candidates[best];
    let reasoning = build_reasoning(chosen, &candidates);
    let comparison = build_comparison(&candidates);

    tracing::info!(
        strategy = %chosen.strategy,
        score = chosen.overall_score(),
        candidates = candidates.len(),
        "Plan selected"
    );

    Ok(MultiPlanResult {
        task_summary: task_summary.into(),
        recommended_plan: chosen.strategy,
        recommendation_reasoning: reasoning,
        comparison_summary: Some(comparison),
        generated_at: Utc::now(),
        generation_time_ms: None,
        recommended_index: best,
        plans: candidates,
    })
}

/// `Greater` means `a` beats `b`. Equal candidates keep the earlier one.
fn rank(a: &AlternativePlan, b: &AlternativePlan) -> Ordering {
    let (sa, sb) = (a.overall_score(), b.overall_score());
    if (sa - sb).abs() > SCORE_EPSILON {
        return if sa > sb { Ordering::Greater } else { Ordering::Less };
    }

    let (ra, rb) = (a.risk_reward_ratio(), b.risk_reward_ratio());
    let both_infinite = ra.is_infinite() && rb.is_infinite();
    if !both_infinite && (ra - rb).abs() > SCORE_EPSILON {
        return if ra > rb { Ordering::Greater } else { Ordering::Less };
    }

    // Lower rank was declared first
    b.strategy.rank().cmp(&a.strategy.rank())
}

fn build_reasoning(chosen: &AlternativePlan, candidates: &[AlternativePlan]) -> String {
    let p = &chosen.probabilities;
    let mut reasoning = format!(
        "{} has the best overall score ({:.2}) with P(Success)={:.2} and P(Friction)={:.2}.",
        chosen.name,
        chosen.overall_score(),
        p.success(),
        p.friction()
    );

    let tied: Vec<&AlternativePlan> = candidates
        .iter()
        .filter(|c| {
            !std::ptr::eq(*c, chosen)
                && (c.overall_score() - chosen.overall_score()).abs() <= SCORE_EPSILON
        })
        .collect();
    if !tied.is_empty() {
        let names: Vec<&str> = tied.iter().map(|c| c.strategy.as_str()).collect();
        reasoning.push_str(&format!(
            " Tied on score with {}; chosen on risk-reward and declaration order.",
            names.join(", ")
        ));
    }
    if !chosen.best_for.is_empty() {
        reasoning.push_str(&format!(" Best for: {}.", chosen.best_for));
    }
    reasoning
}

fn build_comparison(candidates: &[AlternativePlan]) -> String {
    candidates
        .iter()
        .map(|c| {
            let ratio = c.risk_reward_ratio();
            let ratio = if ratio.is_infinite() {
                "inf".to_string()
            } else {
                format!("{:.2}", ratio)
            };
            format!(
                "- {} ({}): score {:.2}, risk-reward {}",
                c.strategy.letter(),
                c.strategy,
                c.overall_score(),
                ratio
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
