//! Language identification and translation

use crate::llm::{LlmRequest, LlmService};
use crate::runtime::{LanguageIdentifier, ProviderError, TranslationRequest, Translator};
use crate::state_machine::Language;
use async_trait::async_trait;
use std::sync::Arc;

/// Longest plausible language name, in words ("Brazilian Portuguese")
const MAX_NAME_WORDS: usize = 3;

/// Language services backed by a text model
pub struct LlmLanguageService {
    llm: Arc<dyn LlmService>,
}

impl LlmLanguageService {
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self { llm }
    }
}

fn identify_prompt(text: &str) -> String {
    format!(
        "Identify the language of the following text. Only return its name. \
         If you can't determine the language, answer N/A.\n{text}"
    )
}

fn translate_prompt(request: &TranslationRequest<'_>) -> String {
    format!(
        "Translate the following text from {} to {}. Provide a single answer with nothing \
         but the message translated and {}.\n{}",
        request.from, request.to, request.formatting, request.text
    )
}

/// Read a language name out of the model answer.
///
/// Anything that is not a short name (an explanation, a sentence) is
/// rejected rather than guessed at.
fn parse_language(answer: &str) -> Result<Language, ProviderError> {
    let name = answer
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .trim_matches(|c: char| matches!(c, '.' | '"' | '*' | '`' | '\''))
        .trim();

    if name.split_whitespace().count() > MAX_NAME_WORDS {
        return Err(ProviderError::malformed(format!(
            "not a language name: {name:?}"
        )));
    }
    Ok(Language::from(name.to_string()))
}

#[async_trait]
impl LanguageIdentifier for LlmLanguageService {
    async fn identify(&self, text: &str) -> Result<Language, ProviderError> {
        let response = self.llm.complete(&LlmRequest::prompt(identify_prompt(text))).await?;
        parse_language(&response.text)
    }
}

#[async_trait]
impl Translator for LlmLanguageService {
    async fn translate(&self, request: &TranslationRequest<'_>) -> Result<String, ProviderError> {
        if request.is_identity() {
            return Ok(request.text.to_string());
        }

        let response = self
            .llm
            .complete(&LlmRequest::prompt(translate_prompt(request)))
            .await?;
        let translated = response.text.trim();
        if translated.is_empty() {
            return Err(ProviderError::malformed("empty translation"));
        }
        tracing::debug!(from = request.from, to = request.to, "Translated text");
        Ok(translated.to_string())
    }
}
