//! Capability providers backed by generative models
//!
//! Each provider turns one narrow request into a prompt, sends it through an
//! [`LlmService`]/[`ImageService`] and validates what comes back. Nothing
//! here applies fallbacks: failures are returned as [`ProviderError`]s and the
//! step layer decides what to do with them.
//!
//! [`ProviderError`]: crate::runtime::ProviderError

mod food;
mod images;
mod intent;
mod json;
mod language;

pub use food::{LlmFoodService, RecipeSearch};
pub use images::LlmImageService;
pub use intent::LlmIntentClassifier;
pub use language::LlmLanguageService;

use crate::llm::{ImageService, LlmService};
use crate::runtime::Capabilities;
use std::sync::Arc;

/// Wire every capability to the given models and recipe corpus
pub fn model_capabilities(
    llm: Arc<dyn LlmService>,
    images: Arc<dyn ImageService>,
    corpus: Arc<dyn RecipeSearch>,
) -> Capabilities {
    let language = Arc::new(LlmLanguageService::new(llm.clone()));
    let food = Arc::new(LlmFoodService::new(llm.clone(), corpus));

    Capabilities {
        language: language.clone(),
        translator: language,
        extractor: food.clone(),
        updater: food.clone(),
        matcher: food,
        images: Arc::new(LlmImageService::new(images)),
        classifier: Arc::new(LlmIntentClassifier::new(llm)),
    }
}
