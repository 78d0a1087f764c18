//! Intent classification results and their validation
//!
//! The classifier is the one place where free-form model output decides
//! control flow. Its answer arrives here as [`RawIntent`] (already parsed
//! against a strict schema at the provider boundary) and leaves as an
//! [`IntentDecision`] that is guaranteed to reference a presented option.

use serde::{Deserialize, Serialize};

/// The three actions a follow-up message can map to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentAction {
    SelectRecipe,
    UpdatePreferences,
    UnableToHelp,
}

/// Classifier answer as parsed from the wire, not yet trusted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RawIntent {
    pub action: IntentAction,
    #[serde(default)]
    pub recipe_selected: Option<String>,
}

impl RawIntent {
    pub fn select(title: impl Into<String>) -> Self {
        Self {
            action: IntentAction::SelectRecipe,
            recipe_selected: Some(title.into()),
        }
    }

    pub fn update_preferences() -> Self {
        Self {
            action: IntentAction::UpdatePreferences,
            recipe_selected: None,
        }
    }

    pub fn unable_to_help() -> Self {
        Self {
            action: IntentAction::UnableToHelp,
            recipe_selected: None,
        }
    }
}

/// Validated routing decision for a follow-up turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentDecision {
    /// Title is exactly one of the presented option titles
    Select { title: String },
    UpdatePreferences,
    UnableToHelp,
}

/// Why a classifier answer was not taken at face value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentRejection {
    /// Provider failed, timed out or produced unparsable output
    NoAnswer,
    /// `select_recipe` without a title
    MissingTitle,
    /// `select_recipe` naming something that was never offered
    UnknownTitle(String),
}

impl IntentDecision {
    pub fn action(&self) -> IntentAction {
        match self {
            IntentDecision::Select { .. } => IntentAction::SelectRecipe,
            IntentDecision::UpdatePreferences => IntentAction::UpdatePreferences,
            IntentDecision::UnableToHelp => IntentAction::UnableToHelp,
        }
    }

    /// Turn an untrusted classifier answer into a decision.
    ///
    /// Anything that cannot be trusted degrades to `UpdatePreferences` so the
    /// conversation keeps moving; the rejection reason is returned for logging.
    pub fn from_classifier(
        raw: Option<RawIntent>,
        titles: &[&str],
    ) -> (Self, Option<IntentRejection>) {
        let Some(raw) = raw else {
            return (
                IntentDecision::UpdatePreferences,
                Some(IntentRejection::NoAnswer),
            );
        };

        match raw.action {
            IntentAction::UpdatePreferences => (IntentDecision::UpdatePreferences, None),
            IntentAction::UnableToHelp => (IntentDecision::UnableToHelp, None),
            IntentAction::SelectRecipe => {
                let Some(candidate) = raw.recipe_selected else {
                    return (
                        IntentDecision::UpdatePreferences,
                        Some(IntentRejection::MissingTitle),
                    );
                };
                let candidate = candidate.trim();
                match titles.iter().find(|title| **title == candidate) {
                    Some(title) => (
                        IntentDecision::Select {
                            title: (*title).to_string(),
                        },
                        None,
                    ),
                    None => (
                        IntentDecision::UpdatePreferences,
                        Some(IntentRejection::UnknownTitle(candidate.to_string())),
                    ),
                }
            }
        }
    }
}
