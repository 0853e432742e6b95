//! Intent Routing
//!
//! One-shot branch taken before any tool runs: requests that mention a
//! planning keyword go to up-front plan review, everything else goes
//! straight to the ReAct loop. Keywords match at the start of a word, so
//! "refactoring" hits "refactor" while "explain" does not hit "plan".

use regex::Regex;
use serde::Serialize;

/// Where a request should go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Route {
    /// Plan first; `keyword` is the vocabulary entry that matched
    Planning { keyword: String },
    /// Execute directly
    Direct,
}

/// Keyword-based router.
#[derive(Debug, Clone)]
pub struct IntentRouter {
    pattern: Option<Regex>,
}

impl IntentRouter {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();

        let pattern = if alternatives.is_empty() {
            None
        } else {
            Regex::new(&format!(r"(?i)\b({})", alternatives.join("|"))).ok()
        };
        Self { pattern }
    }

    pub fn route(&self, request: &str) -> Route {
        let keyword = self
            .pattern
            .as_ref()
            .and_then(|p| p.captures(request))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_lowercase());

        match keyword {
            Some(keyword) => {
                tracing::debug!(keyword = %keyword, "Routing request to planning");
                Route::Planning { keyword }
            }
            None => {
                tracing::debug!("Routing request to direct execution");
                Route::Direct
            }
        }
    }
}
