//! Runtime for executing conversation turns
//!
//! The engine itself is stateless between turns; `ConversationManager` adds
//! the caller side: loading the prior state, serializing turns per
//! conversation, saving the new state and writing the dish image.

mod error;
mod executor;
mod steps;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use error::{EngineError, ProviderError, RuntimeError};
pub use executor::{TurnEngine, TurnOutcome};
pub use traits::*;

use crate::state_machine::ConversationState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Where generated dish images are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    /// `<dir>/<conversation id>.png`
    PerConversation(PathBuf),
    /// Always the same file (the REPL's `results.png`)
    Fixed(PathBuf),
    /// Keep images in memory only
    Discard,
}

impl ImageTarget {
    fn path_for(&self, conv_id: &str) -> Option<PathBuf> {
        match self {
            ImageTarget::PerConversation(dir) => Some(dir.join(format!("{conv_id}.png"))),
            ImageTarget::Fixed(path) => Some(path.clone()),
            ImageTarget::Discard => None,
        }
    }
}

/// Result of a turn run through the manager
#[derive(Debug, Clone)]
pub struct DeliveredTurn {
    pub outcome: TurnOutcome,
    /// Set when an image was produced and written
    pub image_path: Option<PathBuf>,
}

/// Runs turns for many conversations, each with its own isolated state
pub struct ConversationManager {
    engine: TurnEngine,
    store: Arc<dyn ConversationStore>,
    images: ImageTarget,
    /// One lock per conversation so its turns never interleave
    turn_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationManager {
    pub fn new(engine: TurnEngine, store: Arc<dyn ConversationStore>, images: ImageTarget) -> Self {
        Self {
            engine,
            store,
            images,
            turn_locks: RwLock::new(HashMap::new()),
        }
    }

    async fn turn_lock(&self, conv_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.turn_locks.read().await;
            if let Some(lock) = locks.get(conv_id) {
                return lock.clone();
            }
        }
        self.turn_locks
            .write()
            .await
            .entry(conv_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the lock entry once no turn holds or awaits it.
    ///
    /// Handles are only cloned under the map lock, so a count of one here
    /// means the map holds the last reference.
    async fn release_turn_lock(&self, conv_id: &str, lock: Arc<Mutex<()>>) {
        drop(lock);
        let mut locks = self.turn_locks.write().await;
        if locks
            .get(conv_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(conv_id);
        }
    }

    /// Run one turn for `conv_id`, starting a new conversation if nothing is
    /// stored for it
    pub async fn send_message(
        &self,
        conv_id: &str,
        text: &str,
    ) -> Result<DeliveredTurn, RuntimeError> {
        let lock = self.turn_lock(conv_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.run_turn(conv_id, text).await
        };
        self.release_turn_lock(conv_id, lock).await;
        result
    }

    async fn run_turn(&self, conv_id: &str, text: &str) -> Result<DeliveredTurn, RuntimeError> {
        let prior = self
            .store
            .load(conv_id)
            .await
            .map_err(RuntimeError::Storage)?
            .unwrap_or_default();

        tracing::info!(conv_id = %conv_id, phase = ?prior.phase, "Processing message");
        let outcome = self.engine.process(prior, text).await?;

        self.store
            .save(conv_id, &outcome.state)
            .await
            .map_err(RuntimeError::Storage)?;

        let image_path = match &outcome.image {
            Some(bytes) => self.write_image(conv_id, bytes).await,
            None => None,
        };

        Ok(DeliveredTurn {
            outcome,
            image_path,
        })
    }

    /// Store an empty state so the conversation exists before its first turn
    pub async fn start(&self, conv_id: &str) -> Result<ConversationState, RuntimeError> {
        let state = ConversationState::new();
        self.store
            .save(conv_id, &state)
            .await
            .map_err(RuntimeError::Storage)?;
        tracing::info!(conv_id = %conv_id, "Conversation started");
        Ok(state)
    }

    /// Stored state for a conversation
    pub async fn state(&self, conv_id: &str) -> Result<Option<ConversationState>, RuntimeError> {
        self.store.load(conv_id).await.map_err(RuntimeError::Storage)
    }

    /// Forget a conversation; the next message starts over
    pub async fn reset(&self, conv_id: &str) -> Result<bool, RuntimeError> {
        let lock = self.turn_lock(conv_id).await;
        let result = {
            let _guard = lock.lock().await;
            self.store
                .remove(conv_id)
                .await
                .map_err(RuntimeError::Storage)
        };
        self.release_turn_lock(conv_id, lock).await;

        let removed = result?;
        tracing::info!(conv_id = %conv_id, removed, "Conversation reset");
        Ok(removed)
    }

    #[cfg(test)]
    async fn tracked_locks(&self) -> usize {
        self.turn_locks.read().await.len()
    }

    /// A failed write never fails the turn; the response already exists
    async fn write_image(&self, conv_id: &str, bytes: &[u8]) -> Option<PathBuf> {
        let path = self.images.path_for(conv_id)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = %parent.display(), error = %e, "Failed to create image dir");
                return None;
            }
        }
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => {
                tracing::info!(conv_id = %conv_id, path = %path.display(), "Image saved");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to save image");
                None
            }
        }
    }
}
