//! Follow-up intent classification

use super::json::parse_strict;
use crate::llm::{LlmRequest, LlmService};
use crate::runtime::{IntentClassifier, IntentRequest, ProviderError};
use crate::state_machine::RawIntent;
use async_trait::async_trait;
use std::fmt::Write as _;
use std::sync::Arc;

const EXAMPLE_OPTIONS: &str = "```\n- Chicken Curry\n- Chicken with spicy sauce\n- Texmex Chicken\n```";

/// (user message, expected answer)
const EXAMPLES: [(&str, &str); 6] = [
    (
        "I want something with less spice",
        r#"{ "action": "update_preferences" }"#,
    ),
    (
        "Can you suggest other recipes with chicken?",
        r#"{ "action": "update_preferences" }"#,
    ),
    (
        "I would like to try the Spaghetti Bolognese",
        r#"{ "action": "update_preferences" }"#,
    ),
    (
        "I would like to try the Texmex Chicken",
        r#"{ "action": "select_recipe", "recipeSelected": "Texmex Chicken" }"#,
    ),
    (
        "The texan option sounds good",
        r#"{ "action": "select_recipe", "recipeSelected": "Texmex Chicken" }"#,
    ),
    (
        "Could you tell me a story about a chicken?",
        r#"{ "action": "unable_to_help" }"#,
    ),
];

/// Intent classification backed by a text model
pub struct LlmIntentClassifier {
    llm: Arc<dyn LlmService>,
}

impl LlmIntentClassifier {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }
}

fn classify_prompt(request: &IntentRequest<'_>) -> String {
    let mut options = String::new();
    for title in request.titles {
        let _ = writeln!(options, "- {title}");
    }

    let mut prompt = format!(
        "Given the following message in {language}: {message}\n\
         and the recipe options (in English):\n{options}\n\
         return a JSON object with the user's choice.\n\
         If the user has mentioned one of the recipe options and wants to select it, return:\n\
         {{ \"action\": \"select_recipe\", \"recipeSelected\": \"<exact title from the options>\" }}\n\
         If the user wants a different recipe, or if it isn't clear that they chose a recipe, return:\n\
         {{ \"action\": \"update_preferences\" }}\n\
         If the options above don't apply, return:\n\
         {{ \"action\": \"unable_to_help\" }}\n\
         Between \"update_preferences\" and \"select_recipe\", prioritize \"select_recipe\" if the \
         user message indicates a choice.\n\
         Only return one of the three options and no additional text.\n\
         A few examples of expected behavior:\n",
        language = request.language,
        message = request.message,
    );
    for (message, answer) in EXAMPLES {
        let _ = write!(prompt, "\n{EXAMPLE_OPTIONS}\n'{message}' -> {answer}\n");
    }
    prompt
}

#[async_trait]
impl IntentClassifier for LlmIntentClassifier {
    async fn classify(&self, request: &IntentRequest<'_>) -> Result<RawIntent, ProviderError> {
        let response = self
            .llm
            .complete(&LlmRequest::prompt(classify_prompt(request)).with_max_tokens(256))
            .await?;
        let intent: RawIntent = parse_strict(&response.text)?;
        tracing::info!(action = ?intent.action, selected = ?intent.recipe_selected, "Classifier answered");
        Ok(intent)
    }
}
