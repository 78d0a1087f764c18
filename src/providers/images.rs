//! Dish image synthesis

use crate::llm::ImageService;
use crate::runtime::{ImageSynthesizer, ProviderError};
use async_trait::async_trait;
use std::sync::Arc;

const PHOTOGRAPHER: &str = "You are a professional food photographer. Generate a high-quality, \
appetizing image of the finished dish described in the recipe. Focus on the dish and only the dish";

/// Image synthesis backed by an image model
pub struct LlmImageService {
    images: Arc<dyn ImageService>,
}

impl LlmImageService {
    pub fn new(images: Arc<dyn ImageService>) -> Self {
        Self { images }
    }
}

fn image_prompt(description: &str) -> String {
    format!("{PHOTOGRAPHER}\nGenerate a detailed image for the following description:\n\n{description}")
}

#[async_trait]
impl ImageSynthesizer for LlmImageService {
    async fn synthesize(&self, description: &str) -> Result<Vec<u8>, ProviderError> {
        let bytes = self.images.generate(&image_prompt(description)).await?;
        if bytes.is_empty() {
            return Err(ProviderError::malformed("empty image payload"));
        }
        Ok(bytes)
    }
}
