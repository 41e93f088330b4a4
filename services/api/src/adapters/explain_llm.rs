//! services/api/src/adapters/explain_llm.rs
//!
//! This module contains the adapter for the verse-explanation LLM.
//! It implements the `ExplanationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use dua_companion_core::{
    domain::Verse,
    ports::{ExplanationService, PortError, PortResult},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExplanationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiExplanationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiExplanationAdapter {
    /// Creates a new `OpenAiExplanationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `ExplanationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExplanationService for OpenAiExplanationAdapter {
    /// Produces a brief, inspiring explanation of the verse's context or
    /// spiritual benefit to help a student memorize it.
    async fn explain_verse(&self, verse: &Verse) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(
                    "You help students memorize Quranic verses. Provide a brief, inspiring \
                     explanation (max 2-3 sentences) of the context or spiritual benefit of \
                     the verse the user sends.",
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("Verse: {}", verse.translation))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

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
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(PortError::Unexpected(
                "Explanation LLM returned no text.".to_string(),
            ));
        }
        Ok(content.trim().to_string())
    }
}
