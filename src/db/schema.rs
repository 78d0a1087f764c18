//! Database schema and types

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_updated ON conversations(updated_at DESC);

CREATE TABLE IF NOT EXISTS recipes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    ingredients TEXT NOT NULL,
    steps TEXT NOT NULL
);
";

/// A conversation row with its decoded state
#[derive(Debug, Clone, Serialize)]
pub struct StoredConversation {
    pub id: String,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A recipe as read from a seed file
#[derive(Debug, Clone, Deserialize)]
pub struct SeedRecipe {
    pub title: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
}

/// A recipe in the searchable corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecipe {
    pub id: i64,
    pub title: String,
    pub ingredients: Vec<String>,
    pub steps: Vec<String>,
}

impl CorpusRecipe {
    /// Document text handed to the matcher
    pub fn document(&self) -> String {
        format!(
            "Title: {}\nIngredients: {}\n\nSteps: {}",
            self.title,
            self.ingredients.join(", "),
            self.steps.join(" ")
        )
    }

    /// Lowercased text searched by keyword queries
    pub(super) fn haystack(&self) -> String {
        format!(
            "{} {} {}",
            self.title,
            self.ingredients.join(" "),
            self.steps.join(" ")
        )
        .to_lowercase()
    }
}

/// Split free text into lowercase search terms, dropping short filler words
pub(super) fn search_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !matches!(w.as_str(), "and" | "the" | "with" | "without" | "using" | "for"))
        .collect();
    terms.sort();
    terms.dedup();
    terms
}
