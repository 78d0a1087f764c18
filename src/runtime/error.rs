//! Runtime error types

use crate::llm::LlmError;
use crate::state_machine::{StepId, TransitionError};
use std::time::Duration;
use thiserror::Error;

/// Failure of a capability provider call.
///
/// Never escapes a step: every step maps it to a documented fallback value.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} did not answer within {after:?}")]
    Timeout {
        provider: &'static str,
        after: Duration,
    },
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Orchestration faults; the only errors a turn can end with
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("turn exceeded the budget of {max} steps")]
    StepBudgetExceeded { max: usize },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("step {step} needs {field} but it is absent")]
    MissingField { step: StepId, field: &'static str },
}

/// Errors surfaced by the conversation manager
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("storage error: {0}")]
    Storage(String),
}
