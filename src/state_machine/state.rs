//! Conversation state types

use crate::config::{MAX_RECIPE_OPTIONS, UNKNOWN_LANGUAGE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Language
// ============================================================================

/// Result of language identification
///
/// Serialized as the bare language name, with the unknown sentinel standing in
/// for [`Language::Unknown`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Language {
    Known(String),
    Unknown,
}

impl Language {
    pub fn known(name: impl Into<String>) -> Self {
        Self::from(name.into())
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Language::Known(_))
    }

    pub fn name(&self) -> &str {
        match self {
            Language::Known(name) => name,
            Language::Unknown => UNKNOWN_LANGUAGE,
        }
    }
}

impl From<String> for Language {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_LANGUAGE) {
            Language::Unknown
        } else {
            Language::Known(trimmed.to_string())
        }
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Preferences and recipes
// ============================================================================

/// Structured description of what the user wants to cook
///
/// Every field is optional so a failed extraction can be represented as the
/// empty record `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    /// Recipe name, ingredients or keywords central to the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_type: Option<String>,
    /// short / moderate / long
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_cooking: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_ingredients: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_ingredients: Option<Vec<String>>,
    /// easy / medium / hard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    /// low / medium / high
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub does_not_need_recipe: Option<bool>,
}

impl Preferences {
    pub fn is_empty(&self) -> bool {
        *self == Preferences::default()
    }

    /// True only when the extractor explicitly flagged the request as not
    /// being about a recipe
    pub fn declines_recipe(&self) -> bool {
        self.does_not_need_recipe == Some(true)
    }
}

/// A candidate recipe produced by the matcher; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(rename = "recipeTitle")]
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub calories: String,
    #[serde(default)]
    pub time_to_prepare: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

// ============================================================================
// Phase
// ============================================================================

/// Where the conversation stands between turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No usable language yet; the next turn starts with identification
    #[default]
    AwaitingLanguage,
    /// Language known, no options presented yet
    AwaitingRequest,
    /// Options were presented; the next message selects or refines
    OptionsPresented,
}

impl Phase {
    /// The phase implied by which fields are present
    pub fn implied_by(state: &ConversationState) -> Self {
        if !state.language_is_known() {
            Phase::AwaitingLanguage
        } else if state.recipe_options.is_some() {
            Phase::OptionsPresented
        } else {
            Phase::AwaitingRequest
        }
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// The single record threaded through every step of every turn
///
/// Absent fields are `None`; a present-but-empty value (for example an empty
/// option list) is distinct from an absent one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationState {
    #[serde(default)]
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub en_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_options: Option<Vec<Recipe>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_recipe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_options: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_produced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Partial update produced by a step; every present field overwrites
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub phase: Option<Phase>,
    pub language: Option<Language>,
    pub en_message: Option<String>,
    pub preferences: Option<Preferences>,
    pub recipe_options: Option<Vec<Recipe>>,
    pub selected_recipe: Option<String>,
    pub selected_description: Option<String>,
    pub translated_options: Option<String>,
    pub image_produced: Option<bool>,
    pub response: Option<String>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StateUpdate::default()
    }
}

/// Broken invariant detected by [`ConversationState::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateViolation {
    #[error("phase {recorded:?} does not match the fields present (implies {implied:?})")]
    PhaseMismatch { recorded: Phase, implied: Phase },
    #[error("selected recipe {0:?} is not one of the presented options")]
    UnknownSelection(String),
    #[error("{0} recipe options exceed the limit")]
    TooManyOptions(usize),
    #[error("duplicate option title {0:?}")]
    DuplicateTitle(String),
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Field-wise overwrite; nothing is ever removed
    pub fn apply(&mut self, update: StateUpdate) {
        let StateUpdate {
            phase,
            language,
            en_message,
            preferences,
            recipe_options,
            selected_recipe,
            selected_description,
            translated_options,
            image_produced,
            response,
        } = update;

        if let Some(phase) = phase {
            self.phase = phase;
        }
        if language.is_some() {
            self.language = language;
        }
        if en_message.is_some() {
            self.en_message = en_message;
        }
        if preferences.is_some() {
            self.preferences = preferences;
        }
        if recipe_options.is_some() {
            self.recipe_options = recipe_options;
        }
        if selected_recipe.is_some() {
            self.selected_recipe = selected_recipe;
        }
        if selected_description.is_some() {
            self.selected_description = selected_description;
        }
        if translated_options.is_some() {
            self.translated_options = translated_options;
        }
        if image_produced.is_some() {
            self.image_produced = image_produced;
        }
        if response.is_some() {
            self.response = response;
        }
    }

    /// Record the new user message at the start of a turn.
    ///
    /// The previous turn's response is dropped so that each completed turn
    /// carries exactly the response it produced. A selection only refers to
    /// the options of the turn that made it, so it goes too.
    pub fn begin_turn(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
        self.response = None;
        self.selected_recipe = None;
        self.selected_description = None;
    }

    pub fn language_is_known(&self) -> bool {
        self.language.as_ref().is_some_and(Language::is_known)
    }

    /// Titles of the presented options, in presentation order
    pub fn option_titles(&self) -> Vec<&str> {
        self.recipe_options
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|r| r.title.as_str())
            .collect()
    }

    /// Look up a presented option by exact title
    pub fn option_by_title(&self, title: &str) -> Option<&Recipe> {
        self.recipe_options
            .as_deref()?
            .iter()
            .find(|r| r.title == title)
    }

    /// Check the invariants that routing relies on
    pub fn validate(&self) -> Result<(), StateViolation> {
        let implied = Phase::implied_by(self);
        if implied != self.phase {
            return Err(StateViolation::PhaseMismatch {
                recorded: self.phase,
                implied,
            });
        }

        if let Some(options) = &self.recipe_options {
            if options.len() > MAX_RECIPE_OPTIONS {
                return Err(StateViolation::TooManyOptions(options.len()));
            }
            let mut seen = HashSet::new();
            for option in options {
                if !seen.insert(option.title.as_str()) {
                    return Err(StateViolation::DuplicateTitle(option.title.clone()));
                }
            }
        }

        if let Some(selected) = &self.selected_recipe {
            if self.option_by_title(selected).is_none() {
                return Err(StateViolation::UnknownSelection(selected.clone()));
            }
        }

        Ok(())
    }

    /// Repair a phase tag that disagrees with the fields, e.g. a record
    /// written before the tag existed. Returns true when something changed.
    pub fn reconcile_phase(&mut self) -> bool {
        let implied = Phase::implied_by(self);
        if implied == self.phase {
            false
        } else {
            self.phase = implied;
            true
        }
    }
}
