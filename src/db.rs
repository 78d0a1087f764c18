//! Database module
//!
//! Provides persistence for conversation state and the recipe corpus.

mod schema;

pub use schema::*;

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Database lock poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Conversation Operations ====================

    /// Insert or replace the state of a conversation
    pub fn save_state(&self, id: &str, state: &ConversationState) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO conversations (id, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT(id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![id, json, now],
        )?;
        Ok(())
    }

    /// State of a conversation, or `None` if nothing was stored yet
    pub fn load_state(&self, id: &str) -> DbResult<Option<ConversationState>> {
        match self.get_conversation(id) {
            Ok(conv) => Ok(Some(conv.state)),
            Err(DbError::ConversationNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get conversation by ID
    pub fn get_conversation(&self, id: &str) -> DbResult<StoredConversation> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, state, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let (id, state, created_at, updated_at) =
            row.ok_or_else(|| DbError::ConversationNotFound(id.to_string()))?;

        let mut state: ConversationState = serde_json::from_str(&state)?;
        if state.reconcile_phase() {
            tracing::warn!(conv_id = %id, phase = ?state.phase, "Repaired phase of stored state");
        }

        Ok(StoredConversation {
            id,
            state,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }

    /// Delete a conversation; returns whether it existed
    pub fn delete_state(&self, id: &str) -> DbResult<bool> {
        let deleted = self
            .conn()?
            .execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ==================== Recipe Corpus ====================

    /// Add a recipe to the corpus
    pub fn add_recipe(&self, title: &str, ingredients: &[String], steps: &[String]) -> DbResult<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO recipes (title, ingredients, steps) VALUES (?1, ?2, ?3)",
            params![
                title,
                serde_json::to_string(ingredients)?,
                serde_json::to_string(steps)?
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Add many recipes at once; either all are stored or none
    pub fn import_recipes(&self, recipes: &[SeedRecipe]) -> DbResult<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for recipe in recipes {
            tx.execute(
                "INSERT INTO recipes (title, ingredients, steps) VALUES (?1, ?2, ?3)",
                params![
                    recipe.title,
                    serde_json::to_string(&recipe.ingredients)?,
                    serde_json::to_string(&recipe.steps)?
                ],
            )?;
        }
        tx.commit()?;
        Ok(recipes.len())
    }

    pub fn recipe_count(&self) -> DbResult<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Keyword search over the corpus.
    ///
    /// Recipes are ranked by how many distinct terms of all queries they
    /// contain; recipes matching nothing are left out.
    pub fn search_recipes(&self, queries: &[&str], limit: usize) -> DbResult<Vec<CorpusRecipe>> {
        let mut terms: Vec<String> = queries.iter().flat_map(|q| search_terms(q)).collect();
        terms.sort();
        terms.dedup();
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let recipes = self.all_recipes()?;
        let mut scored: Vec<(usize, CorpusRecipe)> = recipes
            .into_iter()
            .filter_map(|recipe| {
                let haystack = recipe.haystack();
                let score = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
                (score > 0).then_some((score, recipe))
            })
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| b_score.cmp(a_score).then(a.id.cmp(&b.id)));
        Ok(scored.into_iter().take(limit).map(|(_, r)| r).collect())
    }

    fn all_recipes(&self) -> DbResult<Vec<CorpusRecipe>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, title, ingredients, steps FROM recipes ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, title, ingredients, steps)| -> DbResult<CorpusRecipe> {
                Ok(CorpusRecipe {
                    id,
                    title,
                    ingredients: serde_json::from_str(&ingredients)?,
                    steps: serde_json::from_str(&steps)?,
                })
            })
            .collect()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
