//! services/api/src/adapters/dua_llm.rs
//!
//! This module contains the adapter for the dua-generating LLM.
//! It implements the `DuaGenerationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use dua_companion_core::{
    domain::DuaContent,
    ports::{DuaGenerationService, PortError, PortResult},
};
use serde::Deserialize;

const SYSTEM_INSTRUCTIONS: &str = r#"You are a wise, compassionate spiritual companion.

The user will describe a feeling or situation. Provide the most fitting Dua (supplication) for them.
Prioritize authentic Duas from the Quran or Sunnah if they directly fit. If no specific authentic
text fits perfectly, compose a spiritually profound Dua in the style of the righteous, in
high-quality Classical Arabic.

Respond with a single JSON object with exactly these string fields:
- "arabic": the Arabic text of the Dua with vowel marks (Tashkeel)
- "transliteration": English transliteration
- "translation": a beautiful English translation
- "source": the source, e.g. "Quran 2:201", "Sahih Bukhari", or "Inspirational"
- "guidance": a short, uplifting, comforting message speaking directly to the user's heart
  about why this Dua is for them

Return only the JSON object, nothing else."#;

/// The JSON shape the model is instructed to return.
#[derive(Deserialize)]
struct DuaPayload {
    arabic: String,
    transliteration: String,
    translation: String,
    source: String,
    guidance: String,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `DuaGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiDuaAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiDuaAdapter {
    /// Creates a new `OpenAiDuaAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `DuaGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DuaGenerationService for OpenAiDuaAdapter {
    /// Generates a structured devotional bundle for the user's situation.
    async fn generate_dua(&self, situation: &str) -> PortResult<DuaContent> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("The user is in this situation: \"{}\"", situation))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Dua LLM response contained no text content.".to_string())
            })?;

        let payload: DuaPayload = serde_json::from_str(&content)
            .map_err(|e| PortError::Unexpected(format!("Dua LLM returned invalid JSON: {}", e)))?;

        if payload.arabic.trim().is_empty() {
            return Err(PortError::Unexpected(
                "Dua LLM returned an empty Arabic text.".to_string(),
            ));
        }

        Ok(DuaContent {
            arabic: payload.arabic,
            transliteration: payload.transliteration,
            translation: payload.translation,
            source: payload.source,
            guidance: payload.guidance,
        })
    }
}
