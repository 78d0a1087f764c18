//! Routing decisions
//!
//! All functions here are pure: they look at the state (or at an already
//! validated intent decision) and name the step that runs next.

use super::intent::IntentDecision;
use super::state::{ConversationState, Phase};
use super::step::StepId;

/// First step of a turn, chosen from the phase tag.
///
/// A tag that disagrees with the fields (a record saved without one, or one
/// edited by hand) loses: routing follows the phase the fields imply.
pub fn route_entry(state: &ConversationState) -> StepId {
    let implied = Phase::implied_by(state);
    if implied != state.phase {
        tracing::warn!(recorded = ?state.phase, implied = ?implied, "phase tag disagrees with fields");
    }
    let step = match implied {
        Phase::AwaitingLanguage => StepId::IdentifyLanguage,
        Phase::OptionsPresented => StepId::UpdateOrSelect,
        Phase::AwaitingRequest => StepId::Translate,
    };
    tracing::debug!(phase = ?state.phase, step = %step, "entry route");
    step
}

/// After identification: unknown language means we cannot help
pub fn route_after_identification(state: &ConversationState) -> StepId {
    if state.language_is_known() {
        StepId::Translate
    } else {
        tracing::info!("language could not be identified");
        StepId::CannotHelp
    }
}

/// After extraction: respect an explicit "no recipe wanted"
pub fn route_after_extraction(state: &ConversationState) -> StepId {
    let declines = state
        .preferences
        .as_ref()
        .is_some_and(|p| p.declines_recipe());
    if declines {
        tracing::info!("request is not about a recipe");
        StepId::CannotHelp
    } else {
        StepId::Recommend
    }
}

/// Follow-up turns: map the validated classifier decision to a step
pub fn route_intent(decision: &IntentDecision) -> StepId {
    match decision {
        IntentDecision::Select { .. } => StepId::SelectRecipe,
        IntentDecision::UpdatePreferences => StepId::UpdatePreferences,
        IntentDecision::UnableToHelp => StepId::CannotHelp,
    }
}
