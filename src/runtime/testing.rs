//! Mock implementations for testing
//!
//! These mocks enable end-to-end turn tests without real I/O.

use super::error::ProviderError;
use super::traits::*;
use crate::llm::{ImageService, LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::state_machine::{ConversationState, Language, Preferences, RawIntent, Recipe};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock Providers
// ============================================================================

/// A recorded provider call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Identify(String),
    Translate {
        text: String,
        from: String,
        to: String,
        formatting: String,
    },
    Extract(String),
    Update {
        request: String,
        suggestions: Vec<String>,
    },
    FindMatches(Preferences),
    Synthesize(String),
    Classify {
        language: String,
        message: String,
        titles: Vec<String>,
    },
}

type Queue<T> = Mutex<VecDeque<Result<T, ProviderError>>>;

fn pop<T>(queue: &Queue<T>, what: &str) -> Result<T, ProviderError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ProviderError::Unavailable(format!("No mock {what} queued"))))
}

/// Every capability behind one object: answers are queued per capability,
/// calls are recorded in order. The translator needs no queue: it prefixes
/// the target language (`"[Spanish] ..."`) unless told to fail.
#[derive(Default)]
pub struct MockProviders {
    languages: Queue<Language>,
    extractions: Queue<Preferences>,
    updates: Queue<Preferences>,
    matches: Queue<Vec<Recipe>>,
    images: Queue<Vec<u8>>,
    intents: Queue<RawIntent>,
    failing_translator: Mutex<bool>,
    classifier_delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<Call>>,
}

#[allow(dead_code)]
impl MockProviders {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_language(&self, language: Language) {
        self.languages.lock().unwrap().push_back(Ok(language));
    }

    pub fn queue_extraction(&self, preferences: Preferences) {
        self.extractions.lock().unwrap().push_back(Ok(preferences));
    }

    pub fn queue_extraction_error(&self, error: ProviderError) {
        self.extractions.lock().unwrap().push_back(Err(error));
    }

    pub fn queue_update(&self, preferences: Preferences) {
        self.updates.lock().unwrap().push_back(Ok(preferences));
    }

    pub fn queue_matches(&self, recipes: Vec<Recipe>) {
        self.matches.lock().unwrap().push_back(Ok(recipes));
    }

    pub fn queue_image(&self, bytes: Vec<u8>) {
        self.images.lock().unwrap().push_back(Ok(bytes));
    }

    pub fn queue_intent(&self, intent: RawIntent) {
        self.intents.lock().unwrap().push_back(Ok(intent));
    }

    pub fn queue_intent_error(&self, error: ProviderError) {
        self.intents.lock().unwrap().push_back(Err(error));
    }

    pub fn fail_translations(&self) {
        *self.failing_translator.lock().unwrap() = true;
    }

    pub fn delay_classifier(&self, delay: Duration) {
        *self.classifier_delay.lock().unwrap() = Some(delay);
    }

    pub fn recorded_calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn translate_calls(&self) -> Vec<Call> {
        self.recorded_calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Translate { .. }))
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl LanguageIdentifier for MockProviders {
    async fn identify(&self, text: &str) -> Result<Language, ProviderError> {
        self.record(Call::Identify(text.to_string()));
        pop(&self.languages, "language")
    }
}

#[async_trait]
impl Translator for MockProviders {
    async fn translate(&self, request: &TranslationRequest<'_>) -> Result<String, ProviderError> {
        self.record(Call::Translate {
            text: request.text.to_string(),
            from: request.from.to_string(),
            to: request.to.to_string(),
            formatting: request.formatting.to_string(),
        });
        if *self.failing_translator.lock().unwrap() {
            return Err(ProviderError::Unavailable("translator down".to_string()));
        }
        Ok(format!("[{}] {}", request.to, request.text))
    }
}

#[async_trait]
impl PreferenceExtractor for MockProviders {
    async fn extract(&self, request: &str) -> Result<Preferences, ProviderError> {
        self.record(Call::Extract(request.to_string()));
        pop(&self.extractions, "extraction")
    }
}

#[async_trait]
impl PreferenceUpdater for MockProviders {
    async fn update(
        &self,
        _current: &Preferences,
        request: &str,
        suggestions: &[Recipe],
    ) -> Result<Preferences, ProviderError> {
        self.record(Call::Update {
            request: request.to_string(),
            suggestions: suggestions.iter().map(|r| r.title.clone()).collect(),
        });
        pop(&self.updates, "update")
    }
}

#[async_trait]
impl RecipeMatcher for MockProviders {
    async fn find_matches(&self, preferences: &Preferences) -> Result<Vec<Recipe>, ProviderError> {
        self.record(Call::FindMatches(preferences.clone()));
        pop(&self.matches, "matches")
    }
}

#[async_trait]
impl ImageSynthesizer for MockProviders {
    async fn synthesize(&self, description: &str) -> Result<Vec<u8>, ProviderError> {
        self.record(Call::Synthesize(description.to_string()));
        pop(&self.images, "image")
    }
}

#[async_trait]
impl IntentClassifier for MockProviders {
    async fn classify(&self, request: &IntentRequest<'_>) -> Result<RawIntent, ProviderError> {
        self.record(Call::Classify {
            language: request.language.to_string(),
            message: request.message.to_string(),
            titles: request.titles.iter().map(ToString::to_string).collect(),
        });
        let delay = *self.classifier_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        pop(&self.intents, "intent")
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Conversation store backed by a map
#[derive(Default)]
pub struct InMemoryStore {
    states: Mutex<HashMap<String, ConversationState>>,
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn load(&self, conv_id: &str) -> Result<Option<ConversationState>, String> {
        Ok(self.states.lock().unwrap().get(conv_id).cloned())
    }

    async fn save(&self, conv_id: &str, state: &ConversationState) -> Result<(), String> {
        self.states
            .lock()
            .unwrap()
            .insert(conv_id.to_string(), state.clone());
        Ok(())
    }

    async fn remove(&self, conv_id: &str) -> Result<bool, String> {
        Ok(self.states.lock().unwrap().remove(conv_id).is_some())
    }
}

// ============================================================================
// Mock LLM Services
// ============================================================================

/// Mock text model that returns queued responses
#[derive(Default)]
pub struct MockLlmService {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

#[allow(dead_code)]
impl MockLlmService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a successful response with the given text
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses.lock().unwrap().push_back(Ok(LlmResponse {
            text: text.into(),
            usage: Usage::default(),
        }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Prompt text of every request, in order
    pub fn recorded_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(LlmRequest::prompt_text)
            .collect()
    }
}

#[async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-text"
    }
}

/// Mock image model that returns queued payloads
#[derive(Default)]
pub struct MockImageService {
    images: Mutex<VecDeque<Result<Vec<u8>, LlmError>>>,
    pub prompts: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl MockImageService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue_image(&self, bytes: Vec<u8>) {
        self.images.lock().unwrap().push_back(Ok(bytes));
    }

    pub fn queue_error(&self, error: LlmError) {
        self.images.lock().unwrap().push_back(Err(error));
    }
}

#[async_trait]
impl ImageService for MockImageService {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.images
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock image queued")))
    }

    fn model_id(&self) -> &str {
        "mock-image"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn recipe(title: &str) -> Recipe {
    Recipe {
        title: title.to_string(),
        short_description: format!("A tasty {title}."),
        calories: "600 kcal".to_string(),
        time_to_prepare: "35 minutes".to_string(),
        ingredients: vec!["chicken".to_string(), "onion".to_string()],
        instructions: vec!["Prepare.".to_string(), "Cook.".to_string()],
    }
}

/// Follow-up state: options presented to an English speaker
pub fn options_presented(titles: &[&str]) -> ConversationState {
    let mut state = ConversationState {
        language: Some(Language::known("English")),
        preferences: Some(Preferences {
            references: Some("chicken".to_string()),
            does_not_need_recipe: Some(false),
            ..Preferences::default()
        }),
        recipe_options: Some(titles.iter().map(|t| recipe(t)).collect()),
        ..ConversationState::default()
    };
    state.reconcile_phase();
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::runtime::{ConversationManager, EngineError, ImageTarget, TurnEngine, TurnOutcome};
    use crate::state_machine::{Phase, StepId};

    const OPTIONS: [&str; 2] = ["Chicken Curry", "Texmex Chicken"];

    fn engine(mock: &Arc<MockProviders>) -> TurnEngine {
        TurnEngine::new(Capabilities::from_single(mock.clone()), EngineConfig::default())
    }

    fn engine_with(mock: &Arc<MockProviders>, config: EngineConfig) -> TurnEngine {
        TurnEngine::new(Capabilities::from_single(mock.clone()), config)
    }

    #[tokio::test]
    async fn test_first_turn_presents_options() {
        let mock = MockProviders::new();
        mock.queue_language(Language::known("English"));
        mock.queue_extraction(Preferences {
            references: Some("chicken".to_string()),
            does_not_need_recipe: Some(false),
            ..Preferences::default()
        });
        mock.queue_matches(vec![recipe("Chicken Curry"), recipe("Texmex Chicken")]);

        let outcome = engine(&mock)
            .process(ConversationState::new(), "I'd like a chicken dinner")
            .await
            .unwrap();

        assert_eq!(
            outcome.trace,
            [
                StepId::IdentifyLanguage,
                StepId::Translate,
                StepId::ExtractPreferences,
                StepId::Recommend,
                StepId::TranslateOptions,
            ]
        );
        assert_eq!(outcome.state.phase, Phase::OptionsPresented);
        assert!(outcome.response.starts_with("Here are some recipe options:"));
        assert!(outcome.response.contains("- Texmex Chicken: A tasty Texmex Chicken."));
        assert_eq!(outcome.state.translated_options.as_deref(), Some(outcome.response.as_str()));
        assert_eq!(outcome.state.en_message.as_deref(), Some("I'd like a chicken dinner"));
        // English to English never reaches the translator
        assert!(mock.translate_calls().is_empty());
        assert!(outcome.state.validate().is_ok());
    }

    #[tokio::test]
    async fn test_texan_option_selects_texmex() {
        let mock = MockProviders::new();
        mock.queue_intent(RawIntent::select("Texmex Chicken"));
        mock.queue_image(vec![0x89, 0x50, 0x4e, 0x47]);

        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "the texan option sounds good")
            .await
            .unwrap();

        assert_eq!(
            outcome.trace,
            [
                StepId::UpdateOrSelect,
                StepId::SelectRecipe,
                StepId::GenerateImage,
                StepId::RespondWithRecipe,
            ]
        );
        assert!(outcome.response.contains("Texmex Chicken"));
        assert!(outcome.response.contains("An image of the dish has been saved."));
        assert_eq!(outcome.state.selected_recipe.as_deref(), Some("Texmex Chicken"));
        assert_eq!(outcome.state.image_produced, Some(true));
        assert_eq!(outcome.image, Some(vec![0x89, 0x50, 0x4e, 0x47]));

        let classify = mock
            .recorded_calls()
            .into_iter()
            .find(|c| matches!(c, Call::Classify { .. }))
            .unwrap();
        assert_eq!(
            classify,
            Call::Classify {
                language: "English".to_string(),
                message: "the texan option sounds good".to_string(),
                titles: vec!["Chicken Curry".to_string(), "Texmex Chicken".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_untagged_prior_state_follows_up() {
        let mock = MockProviders::new();
        mock.queue_intent(RawIntent::select("Texmex Chicken"));
        mock.queue_image(vec![1]);

        let mut record = serde_json::to_value(options_presented(&OPTIONS)).unwrap();
        record.as_object_mut().unwrap().remove("phase");
        let prior: ConversationState = serde_json::from_value(record).unwrap();
        assert_eq!(prior.phase, Phase::AwaitingLanguage);

        let outcome = engine(&mock)
            .process(prior, "the texan option sounds good")
            .await
            .unwrap();
        assert_eq!(outcome.trace[0], StepId::UpdateOrSelect);
        assert_eq!(outcome.state.selected_recipe.as_deref(), Some("Texmex Chicken"));
        assert!(outcome.state.validate().is_ok());
    }

    #[tokio::test]
    async fn test_options_without_language_identify_again() {
        let mock = MockProviders::new();
        mock.queue_language(Language::known("English"));
        mock.queue_extraction(Preferences {
            references: Some("texmex".to_string()),
            does_not_need_recipe: Some(false),
            ..Preferences::default()
        });
        mock.queue_matches(vec![recipe("Texmex Chicken")]);

        let mut prior = options_presented(&OPTIONS);
        prior.language = None;
        assert_eq!(prior.phase, Phase::OptionsPresented);

        let outcome = engine(&mock)
            .process(prior, "the texan option sounds good")
            .await
            .unwrap();
        assert_eq!(outcome.trace[0], StepId::IdentifyLanguage);
        assert!(!outcome.trace.contains(&StepId::UpdateOrSelect));
        assert_eq!(outcome.state.phase, Phase::OptionsPresented);
        assert!(outcome.response.contains("Texmex Chicken"));
        assert!(outcome.state.validate().is_ok());
    }

    #[tokio::test]
    async fn test_less_spice_updates_preferences() {
        let mock = MockProviders::new();
        mock.queue_intent(RawIntent::update_preferences());
        mock.queue_update(Preferences {
            references: Some("mild chicken".to_string()),
            ..Preferences::default()
        });
        mock.queue_matches(vec![recipe("Chicken Korma")]);

        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "I want something with less spice")
            .await
            .unwrap();

        assert_eq!(
            outcome.trace,
            [
                StepId::UpdateOrSelect,
                StepId::UpdatePreferences,
                StepId::Recommend,
                StepId::TranslateOptions,
            ]
        );
        assert!(!outcome.trace.contains(&StepId::SelectRecipe));
        assert_eq!(outcome.state.option_titles(), ["Chicken Korma"]);
        assert_eq!(
            outcome.state.en_message.as_deref(),
            Some("I want something with less spice")
        );
        assert!(mock.recorded_calls().contains(&Call::Update {
            request: "I want something with less spice".to_string(),
            suggestions: vec!["Chicken Curry".to_string(), "Texmex Chicken".to_string()],
        }));
    }

    #[tokio::test]
    async fn test_unknown_language_cannot_help() {
        let mock = MockProviders::new();
        mock.queue_language(Language::Unknown);

        let outcome = engine(&mock)
            .process(ConversationState::new(), "ꦲꦏ꧀ꦱꦫꦗꦮ")
            .await
            .unwrap();

        assert_eq!(outcome.trace, [StepId::IdentifyLanguage, StepId::CannotHelp]);
        assert_eq!(
            outcome.response,
            "We're currently unable to help with your request, but feel free to ask for recipes!"
        );
        assert_eq!(outcome.state.phase, Phase::AwaitingLanguage);
        assert_eq!(mock.recorded_calls(), [Call::Identify("ꦲꦏ꧀ꦱꦫꦗꦮ".to_string())]);
    }

    #[tokio::test]
    async fn test_cannot_help_answers_in_user_language() {
        let mock = MockProviders::new();
        mock.queue_language(Language::known("Spanish"));
        mock.queue_extraction(Preferences {
            references: Some("story".to_string()),
            does_not_need_recipe: Some(true),
            ..Preferences::default()
        });

        let outcome = engine(&mock)
            .process(ConversationState::new(), "Cuéntame un cuento")
            .await
            .unwrap();

        assert_eq!(outcome.trace.last(), Some(&StepId::CannotHelp));
        assert!(outcome.response.starts_with("[Spanish] We're currently unable"));
        assert_eq!(outcome.state.phase, Phase::AwaitingRequest);
    }

    #[tokio::test]
    async fn test_extractor_failure_falls_back_to_empty_preferences() {
        let mock = MockProviders::new();
        mock.queue_language(Language::known("Spanish"));
        mock.queue_extraction_error(ProviderError::malformed("not json"));
        mock.queue_matches(vec![]);

        let outcome = engine(&mock)
            .process(ConversationState::new(), "Quiero pollo")
            .await
            .unwrap();

        assert_eq!(outcome.state.preferences, Some(Preferences::default()));
        assert!(mock
            .recorded_calls()
            .contains(&Call::FindMatches(Preferences::default())));
        assert_eq!(outcome.trace.last(), Some(&StepId::TranslateOptions));
        assert!(!outcome.response.is_empty());
        assert_eq!(outcome.state.recipe_options, Some(vec![]));
    }

    /// Replays a follow-up turn with the given classifier answer
    async fn follow_up(intent: RawIntent) -> (TurnOutcome, Vec<Call>) {
        let mock = MockProviders::new();
        mock.queue_intent(intent);
        mock.queue_update(Preferences {
            references: Some("pasta".to_string()),
            ..Preferences::default()
        });
        mock.queue_matches(vec![recipe("Pasta Primavera")]);
        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "the pizza one")
            .await
            .unwrap();
        (outcome, mock.recorded_calls())
    }

    #[tokio::test]
    async fn test_unknown_title_behaves_like_update() {
        let (rejected, rejected_calls) = follow_up(RawIntent::select("Pizza Margherita")).await;
        let (updated, updated_calls) = follow_up(RawIntent::update_preferences()).await;

        assert_eq!(rejected.trace, updated.trace);
        assert_eq!(rejected.state, updated.state);
        assert_eq!(rejected.response, updated.response);
        assert_eq!(rejected_calls, updated_calls);
        assert_eq!(rejected.state.selected_recipe, None);
    }

    #[tokio::test]
    async fn test_classifier_failure_behaves_like_update() {
        let mock = MockProviders::new();
        mock.queue_intent_error(ProviderError::malformed("```json {oops"));
        mock.queue_update(Preferences::default());
        mock.queue_matches(vec![recipe("Chicken Curry")]);

        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "hmm")
            .await
            .unwrap();
        assert_eq!(outcome.trace[1], StepId::UpdatePreferences);
    }

    #[tokio::test]
    async fn test_unable_to_help_intent() {
        let mock = MockProviders::new();
        mock.queue_intent(RawIntent::unable_to_help());

        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "Could you tell me a story about a chicken?")
            .await
            .unwrap();
        assert_eq!(outcome.trace, [StepId::UpdateOrSelect, StepId::CannotHelp]);
        // Options stay presented; the next message is still a follow-up
        assert_eq!(outcome.state.phase, Phase::OptionsPresented);
    }

    #[tokio::test]
    async fn test_slow_classifier_times_out_into_update() {
        let mock = MockProviders::new();
        mock.delay_classifier(Duration::from_secs(5));
        mock.queue_intent(RawIntent::select("Texmex Chicken"));
        mock.queue_update(Preferences::default());
        mock.queue_matches(vec![recipe("Chicken Curry")]);

        let config = EngineConfig {
            provider_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let outcome = engine_with(&mock, config)
            .process(options_presented(&OPTIONS), "the texmex")
            .await
            .unwrap();
        assert_eq!(outcome.trace[1], StepId::UpdatePreferences);
        assert_eq!(outcome.state.selected_recipe, None);
    }

    #[tokio::test]
    async fn test_step_budget_exceeded() {
        let mock = MockProviders::new();
        mock.queue_language(Language::known("English"));
        mock.queue_extraction(Preferences::default());

        let config = EngineConfig {
            max_steps: 2,
            ..EngineConfig::default()
        };
        let err = engine_with(&mock, config)
            .process(ConversationState::new(), "chicken")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::StepBudgetExceeded { max: 2 }));
    }

    #[tokio::test]
    async fn test_translator_failure_keeps_original_text() {
        let mock = MockProviders::new();
        mock.fail_translations();
        mock.queue_language(Language::known("French"));
        mock.queue_extraction(Preferences::default());
        mock.queue_matches(vec![recipe("Coq au Vin")]);

        let outcome = engine(&mock)
            .process(ConversationState::new(), "Je veux du poulet")
            .await
            .unwrap();
        assert_eq!(outcome.state.en_message.as_deref(), Some("Je veux du poulet"));
        assert!(outcome.response.starts_with("Here are some recipe options:"));
        assert_eq!(mock.translate_calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_image_still_answers() {
        let mock = MockProviders::new();
        mock.queue_intent(RawIntent::select("Chicken Curry"));

        let outcome = engine(&mock)
            .process(options_presented(&OPTIONS), "Chicken Curry please")
            .await
            .unwrap();
        assert_eq!(outcome.state.image_produced, Some(false));
        assert_eq!(outcome.image, None);
        assert!(outcome.response.contains("Chicken Curry"));
        assert!(!outcome.response.contains("image"));
    }

    #[tokio::test]
    async fn test_manager_carries_state_between_turns() {
        let dir = tempfile::tempdir().unwrap();
        let mock = MockProviders::new();
        let store = Arc::new(InMemoryStore::default());
        let manager = ConversationManager::new(
            engine(&mock),
            store.clone(),
            ImageTarget::PerConversation(dir.path().to_path_buf()),
        );

        mock.queue_language(Language::known("Spanish"));
        mock.queue_extraction(Preferences {
            references: Some("pollo".to_string()),
            does_not_need_recipe: Some(false),
            ..Preferences::default()
        });
        mock.queue_matches(vec![recipe("Chicken Curry"), recipe("Texmex Chicken")]);
        let first = manager.send_message("c1", "Quiero pollo").await.unwrap();
        assert_eq!(first.outcome.state.phase, Phase::OptionsPresented);
        assert!(first.outcome.response.starts_with("[Spanish] Here are some recipe options:"));
        assert_eq!(first.image_path, None);

        mock.queue_intent(RawIntent::select("Texmex Chicken"));
        mock.queue_image(vec![1, 2, 3]);
        let second = manager.send_message("c1", "el texano").await.unwrap();
        assert_eq!(second.outcome.trace[0], StepId::UpdateOrSelect);
        let path = second.image_path.unwrap();
        assert_eq!(path, dir.path().join("c1.png"));
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);

        let stored = manager.state("c1").await.unwrap().unwrap();
        assert_eq!(stored.selected_recipe.as_deref(), Some("Texmex Chicken"));
        assert_eq!(stored.response, Some(second.outcome.response));
        // Language was identified once for the whole conversation
        let identifications = mock
            .recorded_calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Identify(_)))
            .count();
        assert_eq!(identifications, 1);

        assert!(manager.reset("c1").await.unwrap());
        assert_eq!(manager.state("c1").await.unwrap(), None);
        assert!(!manager.reset("c1").await.unwrap());
    }

    #[tokio::test]
    async fn test_manager_isolates_conversations() {
        let mock = MockProviders::new();
        let manager = ConversationManager::new(
            engine(&mock),
            Arc::new(InMemoryStore::default()),
            ImageTarget::Discard,
        );

        mock.queue_language(Language::Unknown);
        manager.send_message("a", "???").await.unwrap();

        mock.queue_language(Language::known("English"));
        mock.queue_extraction(Preferences::default());
        mock.queue_matches(vec![recipe("Chicken Curry")]);
        manager.send_message("b", "chicken").await.unwrap();

        let a = manager.state("a").await.unwrap().unwrap();
        let b = manager.state("b").await.unwrap().unwrap();
        assert_eq!(a.phase, Phase::AwaitingLanguage);
        assert_eq!(b.phase, Phase::OptionsPresented);

        // Unknown language is identified again on the next message
        mock.queue_language(Language::known("English"));
        mock.queue_extraction(Preferences::default());
        mock.queue_matches(vec![]);
        let retry = manager.send_message("a", "chicken please").await.unwrap();
        assert_eq!(retry.outcome.trace[0], StepId::IdentifyLanguage);
    }
}
