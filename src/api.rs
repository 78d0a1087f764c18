//! HTTP API
//!
//! One endpoint per turn-level operation, keyed by conversation id.

mod handlers;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::ConversationManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub conversations: Arc<ConversationManager>,
}

impl AppState {
    pub fn new(conversations: Arc<ConversationManager>) -> Self {
        Self { conversations }
    }
}
