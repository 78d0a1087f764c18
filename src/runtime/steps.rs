//! Step registry
//!
//! Each step reads the conversation state, calls at most the providers it
//! needs and returns a partial update. Provider failures never leave this
//! module: every call is bounded by the configured timeout and mapped to the
//! documented fallback value.

use super::error::{EngineError, ProviderError};
use super::traits::{Capabilities, IntentRequest, TranslationRequest};
use crate::config::{EngineConfig, MAX_RECIPE_OPTIONS, PIVOT_LANGUAGE};
use crate::state_machine::{
    ConversationState, IntentDecision, Language, Phase, Preferences, Recipe, StateUpdate, StepId,
};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::future::Future;

const UNABLE_TO_HELP: &str =
    "We're currently unable to help with your request, but feel free to ask for recipes!";
const KEEP_FORMATTING: &str = "keep formatting";
const RECIPE_FORMATTING: &str =
    "and turn it into a markdown and transform arrays into bullet points";

/// What a single step produced
#[derive(Debug, Default)]
pub struct StepOutput {
    pub update: StateUpdate,
    /// Set only by `update_or_select`
    pub intent: Option<IntentDecision>,
    /// Set only by `generate_image` when synthesis succeeded
    pub image: Option<Vec<u8>>,
}

impl From<StateUpdate> for StepOutput {
    fn from(update: StateUpdate) -> Self {
        Self {
            update,
            ..Self::default()
        }
    }
}

/// Runs named steps against the capability providers
pub struct StepRunner {
    providers: Capabilities,
    config: EngineConfig,
}

impl StepRunner {
    pub fn new(providers: Capabilities, config: EngineConfig) -> Self {
        Self { providers, config }
    }

    pub async fn run(
        &self,
        step: StepId,
        state: &ConversationState,
    ) -> Result<StepOutput, EngineError> {
        let output = match step {
            StepId::IdentifyLanguage => self.identify_language(state).await?.into(),
            StepId::Translate => self.translate_message(state).await?.into(),
            StepId::ExtractPreferences => self.extract_preferences(state).await?.into(),
            StepId::Recommend => self.recommend(state).await?.into(),
            StepId::TranslateOptions => self.translate_options(state).await?.into(),
            StepId::UpdateOrSelect => self.update_or_select(state).await?,
            StepId::SelectRecipe => select_recipe(state)?.into(),
            StepId::GenerateImage => self.generate_image(state).await?,
            StepId::RespondWithRecipe => self.respond_with_recipe(state).await?.into(),
            StepId::UpdatePreferences => self.update_preferences(state).await?.into(),
            StepId::CannotHelp => self.cannot_help(state).await.into(),
        };
        Ok(output)
    }

    async fn identify_language(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let message = required(state.message.as_deref(), StepId::IdentifyLanguage, "message")?;
        let language = self
            .bounded("language_identifier", self.providers.language.identify(message))
            .await
            .unwrap_or_else(|e| fallback("language_identifier", &e, Language::Unknown));

        let phase = match (&language, &state.recipe_options) {
            (Language::Unknown, _) => Phase::AwaitingLanguage,
            (Language::Known(_), Some(_)) => Phase::OptionsPresented,
            (Language::Known(_), None) => Phase::AwaitingRequest,
        };
        tracing::info!(language = %language, "language identified");

        Ok(StateUpdate {
            phase: Some(phase),
            language: Some(language),
            ..StateUpdate::default()
        })
    }

    async fn translate_message(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let message = required(state.message.as_deref(), StepId::Translate, "message")?;
        let language = known_language(state, StepId::Translate)?;
        let en_message = self
            .translate(message, language, PIVOT_LANGUAGE, KEEP_FORMATTING)
            .await;

        Ok(StateUpdate {
            en_message: Some(en_message),
            ..StateUpdate::default()
        })
    }

    async fn extract_preferences(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let request = state
            .en_message
            .as_deref()
            .or(state.message.as_deref())
            .ok_or(EngineError::MissingField {
                step: StepId::ExtractPreferences,
                field: "en_message",
            })?;

        let preferences = self
            .bounded("preference_extractor", self.providers.extractor.extract(request))
            .await
            .unwrap_or_else(|e| fallback("preference_extractor", &e, Preferences::default()));

        Ok(StateUpdate {
            preferences: Some(preferences),
            ..StateUpdate::default()
        })
    }

    async fn recommend(&self, state: &ConversationState) -> Result<StateUpdate, EngineError> {
        let preferences = state.preferences.as_ref().ok_or(EngineError::MissingField {
            step: StepId::Recommend,
            field: "preferences",
        })?;

        let matches = self
            .bounded("recipe_matcher", self.providers.matcher.find_matches(preferences))
            .await
            .unwrap_or_else(|e| fallback("recipe_matcher", &e, Vec::new()));
        let options = limit_options(matches);
        tracing::info!(count = options.len(), "recipe options found");

        Ok(StateUpdate {
            phase: Some(Phase::OptionsPresented),
            recipe_options: Some(options),
            ..StateUpdate::default()
        })
    }

    async fn translate_options(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let options = state.recipe_options.as_deref().ok_or(EngineError::MissingField {
            step: StepId::TranslateOptions,
            field: "recipe_options",
        })?;
        let language = known_language(state, StepId::TranslateOptions)?;

        let text = format_options(options);
        let translated = self
            .translate(&text, PIVOT_LANGUAGE, language, KEEP_FORMATTING)
            .await;

        Ok(StateUpdate {
            translated_options: Some(translated.clone()),
            response: Some(translated),
            ..StateUpdate::default()
        })
    }

    async fn update_or_select(
        &self,
        state: &ConversationState,
    ) -> Result<StepOutput, EngineError> {
        let message = required(state.message.as_deref(), StepId::UpdateOrSelect, "message")?;
        let language = known_language(state, StepId::UpdateOrSelect)?;
        let titles = state.option_titles();

        let request = IntentRequest {
            language,
            message,
            titles: &titles,
        };
        let raw = self
            .bounded("intent_classifier", self.providers.classifier.classify(&request))
            .await
            .map_err(|e| {
                tracing::warn!(provider = "intent_classifier", error = %e, "provider failed");
            })
            .ok();

        let (decision, rejection) = IntentDecision::from_classifier(raw, &titles);
        if let Some(rejection) = rejection {
            tracing::warn!(?rejection, "classifier answer rejected, updating preferences");
        }
        tracing::info!(action = ?decision.action(), "intent decided");

        let update = StateUpdate {
            selected_recipe: match &decision {
                IntentDecision::Select { title } => Some(title.clone()),
                _ => None,
            },
            ..StateUpdate::default()
        };
        Ok(StepOutput {
            update,
            intent: Some(decision),
            image: None,
        })
    }

    async fn generate_image(&self, state: &ConversationState) -> Result<StepOutput, EngineError> {
        let description = required(
            state.selected_description.as_deref(),
            StepId::GenerateImage,
            "selected_description",
        )?;

        let image = self
            .bounded("image_synthesizer", self.providers.images.synthesize(description))
            .await
            .map_err(|e| {
                tracing::warn!(provider = "image_synthesizer", error = %e, "provider failed");
            })
            .ok()
            .filter(|bytes| !bytes.is_empty());

        Ok(StepOutput {
            update: StateUpdate {
                image_produced: Some(image.is_some()),
                ..StateUpdate::default()
            },
            intent: None,
            image,
        })
    }

    async fn respond_with_recipe(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let description = required(
            state.selected_description.as_deref(),
            StepId::RespondWithRecipe,
            "selected_description",
        )?;
        let language = known_language(state, StepId::RespondWithRecipe)?;

        let mut text = format!("Here are the details for your recipe:\n{description}\n");
        if state.image_produced == Some(true) {
            text.push_str("An image of the dish has been saved.\n");
        }
        let response = self
            .translate(&text, PIVOT_LANGUAGE, language, RECIPE_FORMATTING)
            .await;

        Ok(StateUpdate {
            response: Some(response),
            ..StateUpdate::default()
        })
    }

    async fn update_preferences(
        &self,
        state: &ConversationState,
    ) -> Result<StateUpdate, EngineError> {
        let message = required(state.message.as_deref(), StepId::UpdatePreferences, "message")?;
        let language = known_language(state, StepId::UpdatePreferences)?;

        let en_message = self
            .translate(message, language, PIVOT_LANGUAGE, KEEP_FORMATTING)
            .await;
        let current = state.preferences.clone().unwrap_or_default();
        let suggestions = state.recipe_options.as_deref().unwrap_or_default();

        let preferences = self
            .bounded(
                "preference_updater",
                self.providers.updater.update(&current, &en_message, suggestions),
            )
            .await
            .unwrap_or_else(|e| fallback("preference_updater", &e, current.clone()));

        Ok(StateUpdate {
            en_message: Some(en_message),
            preferences: Some(preferences),
            ..StateUpdate::default()
        })
    }

    async fn cannot_help(&self, state: &ConversationState) -> StateUpdate {
        let language = state
            .language
            .as_ref()
            .filter(|l| l.is_known())
            .map_or(PIVOT_LANGUAGE, Language::name);

        let response = self
            .translate(UNABLE_TO_HELP, PIVOT_LANGUAGE, language, KEEP_FORMATTING)
            .await;
        StateUpdate {
            response: Some(response),
            ..StateUpdate::default()
        }
    }

    /// Translate with the identity short-circuit and the "original text"
    /// fallback
    async fn translate(&self, text: &str, from: &str, to: &str, formatting: &str) -> String {
        let request = TranslationRequest {
            text,
            from,
            to,
            formatting,
        };
        if request.is_identity() {
            return text.to_string();
        }

        self.bounded("translator", self.providers.translator.translate(&request))
            .await
            .ok()
            .filter(|translated| !translated.trim().is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(provider = "translator", from, to, "keeping original text");
                text.to_string()
            })
    }

    async fn bounded<T>(
        &self,
        provider: &'static str,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let after = self.config.provider_timeout;
        tokio::time::timeout(after, call)
            .await
            .unwrap_or_else(|_| Err(ProviderError::Timeout { provider, after }))
    }
}

fn select_recipe(state: &ConversationState) -> Result<StateUpdate, EngineError> {
    let title = required(
        state.selected_recipe.as_deref(),
        StepId::SelectRecipe,
        "selected_recipe",
    )?;
    let recipe = state
        .option_by_title(title)
        .ok_or(EngineError::MissingField {
            step: StepId::SelectRecipe,
            field: "recipe_options",
        })?;
    tracing::info!(title, "recipe selected");

    Ok(StateUpdate {
        selected_description: Some(format_recipe(recipe)),
        ..StateUpdate::default()
    })
}

fn required<'a>(
    value: Option<&'a str>,
    step: StepId,
    field: &'static str,
) -> Result<&'a str, EngineError> {
    value.ok_or(EngineError::MissingField { step, field })
}

fn known_language(state: &ConversationState, step: StepId) -> Result<&str, EngineError> {
    match &state.language {
        Some(Language::Known(name)) => Ok(name.as_str()),
        _ => Err(EngineError::MissingField {
            step,
            field: "language",
        }),
    }
}

fn fallback<T>(provider: &'static str, error: &ProviderError, value: T) -> T {
    tracing::warn!(provider, error = %error, "provider failed, using fallback");
    value
}

/// Enforce the option-list invariants: at most three, unique titles
fn limit_options(matches: Vec<Recipe>) -> Vec<Recipe> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|r| seen.insert(r.title.clone()))
        .take(MAX_RECIPE_OPTIONS)
        .collect()
}

fn format_options(options: &[Recipe]) -> String {
    let mut text = String::from("Here are some recipe options:\n");
    for option in options {
        let _ = writeln!(
            text,
            "- {}: {} Takes {} and has {}",
            option.title, option.short_description, option.time_to_prepare, option.calories
        );
    }
    text.push_str("Choose one of them, or let me know if you want to update your preferences.");
    text
}

fn format_recipe(recipe: &Recipe) -> String {
    let mut text = format!(
        "Recipe Title: {}\n\nShort Description: {}\n\nCalories: {}\n\nTime to Prepare: {}\n\nIngredients:\n",
        recipe.title, recipe.short_description, recipe.calories, recipe.time_to_prepare
    );
    for ingredient in &recipe.ingredients {
        let _ = writeln!(text, "- {ingredient}");
    }
    text.push_str("\nInstructions:\n");
    for (i, step) in recipe.instructions.iter().enumerate() {
        let _ = writeln!(text, "{}. {step}", i + 1);
    }
    text
}
