//! Trait abstractions for capability providers and state storage
//!
//! These traits enable testing the engine with mock implementations.

use super::error::ProviderError;
use crate::db::Database;
use crate::state_machine::{ConversationState, Language, Preferences, RawIntent, Recipe};
use async_trait::async_trait;
use std::sync::Arc;

/// Identifies the language a message is written in
#[async_trait]
pub trait LanguageIdentifier: Send + Sync {
    async fn identify(&self, text: &str) -> Result<Language, ProviderError>;
}

/// Translation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationRequest<'a> {
    pub text: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    /// Free-form formatting instruction, e.g. "keep formatting"
    pub formatting: &'a str,
}

impl TranslationRequest<'_> {
    /// Source and target name the same language
    pub fn is_identity(&self) -> bool {
        self.from.trim().eq_ignore_ascii_case(self.to.trim())
    }
}

/// Translates text between languages
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, request: &TranslationRequest<'_>) -> Result<String, ProviderError>;
}

/// Turns a free-text request into structured preferences
#[async_trait]
pub trait PreferenceExtractor: Send + Sync {
    async fn extract(&self, request: &str) -> Result<Preferences, ProviderError>;
}

/// Revises preferences after the user reacted to suggestions
#[async_trait]
pub trait PreferenceUpdater: Send + Sync {
    async fn update(
        &self,
        current: &Preferences,
        request: &str,
        suggestions: &[Recipe],
    ) -> Result<Preferences, ProviderError>;
}

/// Finds up to three recipes matching the preferences
#[async_trait]
pub trait RecipeMatcher: Send + Sync {
    async fn find_matches(&self, preferences: &Preferences) -> Result<Vec<Recipe>, ProviderError>;
}

/// Produces a picture of the finished dish
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, description: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Input to intent classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentRequest<'a> {
    pub language: &'a str,
    pub message: &'a str,
    pub titles: &'a [&'a str],
}

/// Decides what a follow-up message wants
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, request: &IntentRequest<'_>) -> Result<RawIntent, ProviderError>;
}

/// Every capability the steps call out to
#[derive(Clone)]
pub struct Capabilities {
    pub language: Arc<dyn LanguageIdentifier>,
    pub translator: Arc<dyn Translator>,
    pub extractor: Arc<dyn PreferenceExtractor>,
    pub updater: Arc<dyn PreferenceUpdater>,
    pub matcher: Arc<dyn RecipeMatcher>,
    pub images: Arc<dyn ImageSynthesizer>,
    pub classifier: Arc<dyn IntentClassifier>,
}

impl Capabilities {
    /// Use one object for every capability (handy for mocks)
    pub fn from_single<T>(provider: Arc<T>) -> Self
    where
        T: LanguageIdentifier
            + Translator
            + PreferenceExtractor
            + PreferenceUpdater
            + RecipeMatcher
            + ImageSynthesizer
            + IntentClassifier
            + 'static,
    {
        Self {
            language: provider.clone(),
            translator: provider.clone(),
            extractor: provider.clone(),
            updater: provider.clone(),
            matcher: provider.clone(),
            images: provider.clone(),
            classifier: provider,
        }
    }
}

/// Storage for conversation state between turns
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the state saved for a conversation, if any
    async fn load(&self, conv_id: &str) -> Result<Option<ConversationState>, String>;

    /// Save the state produced by a turn
    async fn save(&self, conv_id: &str, state: &ConversationState) -> Result<(), String>;

    /// Forget a conversation; returns whether anything was stored
    async fn remove(&self, conv_id: &str) -> Result<bool, String>;
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn load(&self, conv_id: &str) -> Result<Option<ConversationState>, String> {
        (**self).load(conv_id).await
    }

    async fn save(&self, conv_id: &str, state: &ConversationState) -> Result<(), String> {
        (**self).save(conv_id, state).await
    }

    async fn remove(&self, conv_id: &str) -> Result<bool, String> {
        (**self).remove(conv_id).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use Database as `ConversationStore`
#[derive(Clone)]
pub struct DatabaseStore {
    db: Database,
}

impl DatabaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationStore for DatabaseStore {
    async fn load(&self, conv_id: &str) -> Result<Option<ConversationState>, String> {
        self.db.load_state(conv_id).map_err(|e| e.to_string())
    }

    async fn save(&self, conv_id: &str, state: &ConversationState) -> Result<(), String> {
        self.db.save_state(conv_id, state).map_err(|e| e.to_string())
    }

    async fn remove(&self, conv_id: &str) -> Result<bool, String> {
        self.db.delete_state(conv_id).map_err(|e| e.to_string())
    }
}
