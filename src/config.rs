//! Agent Configuration
//!
//! Plain serde struct with defaults for every field, so a partial TOML
//! document (or none at all) yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Extra safety patterns layered on top of the built-in lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Command prefixes that run without confirmation
    pub extra_safe_prefixes: Vec<String>,
    /// Substrings that mark a command as dangerous
    pub extra_dangerous_patterns: Vec<String>,
}

/// Settings for one orchestrator instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Model turns per request before the loop stops
    pub max_turns: usize,
    /// Attempts per tool call, including the first
    pub max_attempts: u32,
    /// Per-attempt tool timeout; none means no limit
    pub tool_timeout_secs: Option<u64>,
    /// Allow dangerous commands after confirmation
    pub elevated: bool,
    /// Words that route a request to up-front planning
    pub planning_keywords: Vec<String>,
    pub safety: SafetyConfig,
    /// Name used in the system prompt
    pub assistant_name: String,
    /// Characters of tool output fed back to the model
    pub tool_output_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: 5,
            max_attempts: 2,
            tool_timeout_secs: None,
            elevated: false,
            planning_keywords: ["plan", "refactor", "architect", "create", "redesign"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            safety: SafetyConfig::default(),
            assistant_name: "devpilot".to_string(),
            tool_output_limit: 4000,
        }
    }
}

impl AgentConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded agent config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_turns == 0 {
            return Err(ConfigError::Invalid("max_turns must be at least 1".to_string()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".to_string()));
        }
        if self.tool_output_limit == 0 {
            return Err(ConfigError::Invalid("tool_output_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Option<std::time::Duration> {
        self.tool_timeout_secs.map(std::time::Duration::from_secs)
    }
}
