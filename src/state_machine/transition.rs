//! Edge graph between steps
//!
//! `next_step` is pure: given the step that just ran, the state after its
//! update was applied and (for `update_or_select`) the validated intent, it
//! names the following step or ends the turn.

use super::intent::IntentDecision;
use super::router::{route_after_extraction, route_after_identification, route_intent};
use super::state::ConversationState;
use super::step::StepId;
use thiserror::Error;

/// Where control goes after a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Next(StepId),
    /// The turn is complete; the state carries its response
    End,
}

/// Errors that can occur while following the edge graph
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("step {0} requires an intent decision but none was produced")]
    MissingIntent(StepId),
    #[error("step {step} ended the turn without a response")]
    MissingResponse { step: StepId },
}

/// Follow the edge out of `step`
pub fn next_step(
    step: StepId,
    state: &ConversationState,
    intent: Option<&IntentDecision>,
) -> Result<Edge, TransitionError> {
    let edge = match step {
        StepId::IdentifyLanguage => Edge::Next(route_after_identification(state)),
        StepId::Translate => Edge::Next(StepId::ExtractPreferences),
        StepId::ExtractPreferences => Edge::Next(route_after_extraction(state)),
        StepId::Recommend => Edge::Next(StepId::TranslateOptions),
        StepId::UpdateOrSelect => {
            let decision = intent.ok_or(TransitionError::MissingIntent(step))?;
            Edge::Next(route_intent(decision))
        }
        StepId::SelectRecipe => Edge::Next(StepId::GenerateImage),
        StepId::GenerateImage => Edge::Next(StepId::RespondWithRecipe),
        StepId::UpdatePreferences => Edge::Next(StepId::Recommend),
        // Ends this turn only; the next message resumes through entry routing
        StepId::TranslateOptions | StepId::RespondWithRecipe | StepId::CannotHelp => {
            if state.response.as_deref().is_none_or(str::is_empty) {
                return Err(TransitionError::MissingResponse { step });
            }
            Edge::End
        }
    };
    Ok(edge)
}

/// Steps that end a turn
pub fn is_terminal(step: StepId) -> bool {
    matches!(
        step,
        StepId::TranslateOptions | StepId::RespondWithRecipe | StepId::CannotHelp
    )
}
