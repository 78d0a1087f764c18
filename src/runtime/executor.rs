//! Turn engine

use super::error::EngineError;
use super::steps::StepRunner;
use super::traits::Capabilities;
use crate::config::EngineConfig;
use crate::state_machine::{
    next_step, route_entry, ConversationState, Edge, StepId, TransitionError,
};
use std::time::Instant;

/// Everything a completed turn produced
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// State to hand back on the next turn
    pub state: ConversationState,
    pub response: String,
    /// Picture of the selected dish; the caller decides where it goes
    pub image: Option<Vec<u8>>,
    /// Steps executed, in order
    pub trace: Vec<StepId>,
}

/// Drives one turn from entry routing to a terminal step
pub struct TurnEngine {
    runner: StepRunner,
    config: EngineConfig,
}

impl TurnEngine {
    pub fn new(providers: Capabilities, config: EngineConfig) -> Self {
        Self {
            runner: StepRunner::new(providers, config),
            config,
        }
    }

    /// Run one turn: `prior` is the state returned by the previous turn (or
    /// an empty state for a new conversation).
    pub async fn process(
        &self,
        prior: ConversationState,
        message: &str,
    ) -> Result<TurnOutcome, EngineError> {
        let mut state = prior;
        state.begin_turn(message);
        if state.reconcile_phase() {
            tracing::warn!(phase = ?state.phase, "prior state had a stale phase tag");
        }

        let mut step = route_entry(&state);
        let mut trace = Vec::new();
        let mut image = None;

        loop {
            if trace.len() >= self.config.max_steps {
                tracing::error!(max = self.config.max_steps, trace = ?trace, "step budget exceeded");
                return Err(EngineError::StepBudgetExceeded {
                    max: self.config.max_steps,
                });
            }
            trace.push(step);

            let start = Instant::now();
            let output = self.runner.run(step, &state).await?;
            tracing::debug!(
                step = %step,
                duration_ms = %start.elapsed().as_millis(),
                "step finished"
            );

            if output.image.is_some() {
                image = output.image;
            }
            state.apply(output.update);

            match next_step(step, &state, output.intent.as_ref())? {
                Edge::Next(next) => {
                    tracing::debug!(from = %step, to = %next, "transition");
                    step = next;
                }
                Edge::End => break,
            }
        }

        if let Err(violation) = state.validate() {
            tracing::warn!(%violation, "turn ended with an inconsistent state");
            state.reconcile_phase();
        }

        let response = state
            .response
            .clone()
            .ok_or(TransitionError::MissingResponse { step })?;
        tracing::info!(steps = trace.len(), phase = ?state.phase, "turn complete");

        Ok(TurnOutcome {
            state,
            response,
            image,
            trace,
        })
    }
}
