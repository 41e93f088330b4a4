//! services/api/src/adapters/coach_llm.rs
//!
//! This module contains the adapter for the memorization-coach LLM.
//! It implements the `CoachService` port from the `core` crate.

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
use dua_companion_core::ports::{CoachService, PortError, PortResult};

const SYSTEM_INSTRUCTIONS: &str =
    "You are HafizAI, a kind, knowledgeable, and encouraging Quran memorization coach. \
     Respond helpfully and briefly.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CoachService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCoachAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCoachAdapter {
    /// Creates a new `OpenAiCoachAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `CoachService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CoachService for OpenAiCoachAdapter {
    /// Answers one student question, anchored to the current session context.
    async fn coach_reply(&self, message: &str, context: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "Context of current session: {}\n\nUser says: \"{}\"",
                    context, message
                ))
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
                "Coach LLM returned no text.".to_string(),
            ));
        }
        Ok(content.trim().to_string())
    }
}
