//! Google Imagen image generation

use super::gemini::endpoint;
use super::{ImageService, LlmError};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const HTTP_TIMEOUT: Duration = Duration::from_secs(180);

/// Imagen service implementation
pub struct ImagenService {
    client: Client,
    api_key: Option<String>,
    url: String,
    model_id: String,
}

impl ImagenService {
    pub fn new(
        api_key: Option<String>,
        model: &str,
        gateway: Option<&str>,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            url: endpoint(gateway, model, "predict"),
            model_id: model.to_string(),
        })
    }

    fn decode(resp: ImagenResponse) -> Result<Vec<u8>, LlmError> {
        let encoded = resp
            .predictions
            .into_iter()
            .find_map(|p| p.bytes_base64_encoded)
            .ok_or_else(|| LlmError::unknown("No image in response"))?;

        base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| LlmError::unknown(format!("Invalid image payload: {e}")))
    }
}

#[async_trait]
impl ImageService for ImagenService {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>, LlmError> {
        let start = std::time::Instant::now();
        let request = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters { sample_count: 1 },
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-goog-api-key", key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &body));
        }

        let parsed: ImagenResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Failed to parse response: {e}")))?;
        let bytes = Self::decode(parsed)?;

        tracing::info!(
            model = %self.model_id,
            duration_ms = %start.elapsed().as_millis(),
            bytes = bytes.len(),
            "Image generated"
        );
        Ok(bytes)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Debug, Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagenParameters {
    sample_count: u32,
}

#[derive(Debug, Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImagenPrediction {
    bytes_base64_encoded: Option<String>,
}
