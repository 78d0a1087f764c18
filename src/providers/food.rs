//! Preference extraction, preference updates and recipe matching

use super::json::parse_strict;
use crate::config::{CORPUS_SEARCH_LIMIT, MAX_RECIPE_OPTIONS};
use crate::db::Database;
use crate::llm::{LlmRequest, LlmService};
use crate::runtime::{PreferenceExtractor, PreferenceUpdater, ProviderError, RecipeMatcher};
use crate::state_machine::{Preferences, Recipe};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;

const ASSISTANT: &str = "You're an assistant chef that helps people find the best recipe given \
their instructions. You figure out if they need a recipe, suggest recipes to them, and once they \
choose one of the selected recipes, you provide them with the full recipe details.";

const PREFERENCES_SCHEMA: &str = r#"{
  "references": { "type": "string", "required": true,
    "description": "A recipe name, ingredients, or keywords that are important according to the user request. This is the most important field and should always be populated" },
  "diet": { "type": "string", "description": "Dietary preferences, e.g. vegetarian, vegan, keto, savory, dessert" },
  "cuisine": { "type": "string", "description": "Preferred cuisine, e.g. Italian, Chinese, Mexican" },
  "mealType": { "type": "string", "description": "breakfast, lunch, dinner, snack or dessert" },
  "timeSpentCooking": { "type": "string", "enum": ["short", "moderate", "long", "N/A"] },
  "includeIngredients": { "type": "array", "items": { "type": "string" }, "description": "Ingredients to include" },
  "excludeIngredients": { "type": "array", "items": { "type": "string" }, "description": "Ingredients to exclude" },
  "complexity": { "type": "string", "enum": ["easy", "medium", "hard", "N/A"] },
  "doesNotNeedRecipe": { "type": "boolean", "required": true, "default": false,
    "description": "Whether the user has NOT requested a recipe. This field has to be present." },
  "caloriesPreference": { "type": "string", "enum": ["low", "medium", "high", "N/A"] }
}"#;

const RECIPE_FORMAT_EXAMPLE: &str = r#"[
  {
    "calories": "500 kcal",
    "timeToPrepare": "30 minutes",
    "shortDescription": "A quick and easy pasta dish with tomatoes and basil.",
    "recipeTitle": "Tomato Basil Pasta",
    "ingredients": ["200g pasta", "2 cups cherry tomatoes", "1/4 cup fresh basil", "2 cloves garlic", "2 tbsp olive oil", "Salt and pepper to taste"],
    "instructions": ["Cook pasta according to package instructions.", "In a pan, heat olive oil and saute garlic.", "Add cherry tomatoes and cook until soft.", "Mix in cooked pasta and fresh basil.", "Season with salt and pepper."]
  }
]"#;

/// Source of candidate recipe documents for the matcher
#[async_trait]
pub trait RecipeSearch: Send + Sync {
    async fn search(&self, queries: &[&str], limit: usize) -> Result<Vec<String>, ProviderError>;
}

#[async_trait]
impl RecipeSearch for Database {
    /// The scan holds the connection lock, so it runs off the async workers
    async fn search(&self, queries: &[&str], limit: usize) -> Result<Vec<String>, ProviderError> {
        let db = self.clone();
        let queries: Vec<String> = queries.iter().map(ToString::to_string).collect();
        let recipes = tokio::task::spawn_blocking(move || {
            let queries: Vec<&str> = queries.iter().map(String::as_str).collect();
            db.search_recipes(&queries, limit)
        })
        .await
        .map_err(|e| ProviderError::Unavailable(format!("corpus search task failed: {e}")))?
        .map_err(|e| ProviderError::Unavailable(e.to_string()))?;
        Ok(recipes.iter().map(crate::db::CorpusRecipe::document).collect())
    }
}

/// Extraction output before it is trusted: the two required fields must be there
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractedPreferences {
    references: String,
    does_not_need_recipe: bool,
    #[serde(flatten)]
    rest: Preferences,
}

impl From<ExtractedPreferences> for Preferences {
    fn from(value: ExtractedPreferences) -> Self {
        Preferences {
            references: Some(value.references),
            does_not_need_recipe: Some(value.does_not_need_recipe),
            ..value.rest
        }
    }
}

/// Food services backed by a text model and the recipe corpus
pub struct LlmFoodService {
    llm: Arc<dyn LlmService>,
    corpus: Arc<dyn RecipeSearch>,
}

impl LlmFoodService {
    pub fn new(llm: Arc<dyn LlmService>, corpus: Arc<dyn RecipeSearch>) -> Self {
        Self { llm, corpus }
    }

    async fn ask(&self, prompt: String) -> Result<String, ProviderError> {
        Ok(self.llm.complete(&LlmRequest::prompt(prompt)).await?.text)
    }
}

/// Free-text constraints searched alongside the references
fn constraint_text(preferences: &Preferences) -> String {
    let include = preferences
        .include_ingredients
        .as_ref()
        .filter(|items| !items.is_empty())
        .map(|items| format!("using {}", items.join(", ")));
    let exclude = preferences
        .exclude_ingredients
        .as_ref()
        .filter(|items| !items.is_empty())
        .map(|items| format!("without {}", items.join(", ")));

    [
        preferences.diet.clone(),
        preferences.cuisine.clone(),
        preferences.meal_type.clone(),
        include,
        exclude,
    ]
    .into_iter()
    .flatten()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join(" ")
}

fn to_json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// At most three options, unique non-empty titles, in the model's order
fn tidy_matches(recipes: Vec<Recipe>) -> Vec<Recipe> {
    let mut seen = HashSet::new();
    recipes
        .into_iter()
        .map(|mut r| {
            // Titles are matched exactly when the user picks one
            r.title = r.title.trim().to_string();
            r
        })
        .filter(|r| !r.title.is_empty())
        .filter(|r| seen.insert(r.title.to_lowercase()))
        .take(MAX_RECIPE_OPTIONS)
        .collect()
}

#[async_trait]
impl PreferenceExtractor for LlmFoodService {
    async fn extract(&self, request: &str) -> Result<Preferences, ProviderError> {
        let prompt = format!(
            "{ASSISTANT}\nBased on the following Schema and Instructions, return the user's \
             preferences JSON. If they don't want a recipe, set doesNotNeedRecipe to true.\n\
             Instructions:\n{request}\nSchema:\n{PREFERENCES_SCHEMA}"
        );
        let answer = self.ask(prompt).await?;
        let extracted: ExtractedPreferences = parse_strict(&answer)?;
        Ok(extracted.into())
    }
}

#[async_trait]
impl PreferenceUpdater for LlmFoodService {
    async fn update(
        &self,
        current: &Preferences,
        request: &str,
        suggestions: &[Recipe],
    ) -> Result<Preferences, ProviderError> {
        let prompt = format!(
            "{ASSISTANT}\nThe user didn't like the previous recipe suggestions:\n{}\n\
             Due to that, they provided updated instructions:\n{request}\n\
             And their initial preferences were:\n{}\n\
             Based on that, return the updated preferences JSON according to the Schema. Make \
             sure to exclude what the user doesn't want and include what they do want. If they \
             want a quicker recipe, a simpler one, or less calories, make sure to change the \
             fields accordingly.\nSchema: {PREFERENCES_SCHEMA}",
            to_json(&suggestions),
            to_json(current),
        );
        let answer = self.ask(prompt).await?;
        parse_strict(&answer)
    }
}

#[async_trait]
impl RecipeMatcher for LlmFoodService {
    async fn find_matches(&self, preferences: &Preferences) -> Result<Vec<Recipe>, ProviderError> {
        let references = preferences.references.as_deref().unwrap_or_default();
        let constraints = constraint_text(preferences);
        let documents = self
            .corpus
            .search(&[references, constraints.as_str()], CORPUS_SEARCH_LIMIT)
            .await?;
        tracing::debug!(documents = documents.len(), "Corpus searched");

        let recommendations = self
            .ask(format!(
                "{ASSISTANT}\n\nBased on the following preferences and search results, find the \
                 three best matching recipes. If a recipe doesn't respect the constraints (e.g. it \
                 includes dairy when it should be dairy free), do not recommend it or suggest \
                 substitutions. Estimate the calories per serving and time to prepare the recipe \
                 to help with the decision. If two or more recipes are very similar, exclude the \
                 duplicates. Consider the ingredients and steps, and include them in the result.\n\n\
                 Preferences:\n{}\n\nSearch Results:\n{}\n\n\
                 Think step by step to ensure the best results.",
                to_json(preferences),
                documents.join("\n\n"),
            ))
            .await?;

        let formatted = self
            .ask(format!(
                "Format the following recipe recommendations into a JSON array. Each \
                 recommendation should have the fields calories, timeToPrepare, \
                 shortDescription, recipeTitle (strings), ingredients and instructions (arrays \
                 of strings).\nExample:\n{RECIPE_FORMAT_EXAMPLE}\nRecipes:\n{recommendations}"
            ))
            .await?;

        let recipes: Vec<Recipe> = parse_strict(&formatted)?;
        Ok(tidy_matches(recipes))
    }
}
