//! Orchestrator Errors
//!
//! Umbrella over the per-module error types. Each variant keeps the
//! original cause so callers can still match on it.

use thiserror::Error;

use devpilot_tools::RegistryError;

use crate::config::ConfigError;
use crate::planning::{PlanError, SelectionError};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
