//! Strict parsing of structured model output
//!
//! Models wrap JSON in markdown fences more often than not. Everything else
//! about the payload is checked against the target type; unknown or missing
//! required fields are errors, never guesses.

use crate::runtime::ProviderError;
use serde::de::DeserializeOwned;

/// Remove markdown code fences (```` ```json ```` / ```` ``` ````) around a payload
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

/// Parse model output into `T`, after stripping fences
pub fn parse_strict<T: DeserializeOwned>(text: &str) -> Result<T, ProviderError> {
    let payload = strip_fences(text);
    if payload.is_empty() {
        return Err(ProviderError::malformed("empty payload"));
    }
    serde_json::from_str(&payload).map_err(|e| {
        tracing::debug!(error = %e, payload = %payload, "Rejected model output");
        ProviderError::malformed(e.to_string())
    })
}
