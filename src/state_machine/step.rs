//! Named processing steps

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every step a turn can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    IdentifyLanguage,
    /// First half of translate-and-extract
    Translate,
    /// Second half of translate-and-extract
    ExtractPreferences,
    Recommend,
    TranslateOptions,
    UpdateOrSelect,
    SelectRecipe,
    GenerateImage,
    RespondWithRecipe,
    UpdatePreferences,
    CannotHelp,
}

impl StepId {
    pub const ALL: [StepId; 11] = [
        StepId::IdentifyLanguage,
        StepId::Translate,
        StepId::ExtractPreferences,
        StepId::Recommend,
        StepId::TranslateOptions,
        StepId::UpdateOrSelect,
        StepId::SelectRecipe,
        StepId::GenerateImage,
        StepId::RespondWithRecipe,
        StepId::UpdatePreferences,
        StepId::CannotHelp,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StepId::IdentifyLanguage => "identify_language",
            StepId::Translate => "translate",
            StepId::ExtractPreferences => "extract_preferences",
            StepId::Recommend => "recommend",
            StepId::TranslateOptions => "translate_options",
            StepId::UpdateOrSelect => "update_or_select",
            StepId::SelectRecipe => "select_recipe",
            StepId::GenerateImage => "generate_image",
            StepId::RespondWithRecipe => "respond_with_recipe",
            StepId::UpdatePreferences => "update_preferences",
            StepId::CannotHelp => "cannot_help",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
