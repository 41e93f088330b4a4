//! services/api/src/adapters/quiz_llm.rs
//!
//! This module contains the adapter for the quiz-generating LLM.
//! It implements the `QuizGenerationService` port from the `core` crate.

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
    domain::{QuizCard, Verse},
    ports::{PortError, PortResult, QuizGenerationService},
};
use serde::Deserialize;

const SYSTEM_INSTRUCTIONS: &str = r#"You create multiple-choice questions that test memorization
or understanding of a single Quranic verse.

Respond with a single JSON object with exactly these fields:
- "question": the question text (string)
- "options": an array of exactly 4 distinct answer options (strings)
- "correct_index": the index of the correct option, 0 to 3 (integer)

Return only the JSON object, nothing else."#;

#[derive(Deserialize)]
struct QuizPayload {
    question: String,
    options: Vec<String>,
    correct_index: usize,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `QuizGenerationService` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiQuizAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiQuizAdapter {
    /// Creates a new `OpenAiQuizAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// `QuizGenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl QuizGenerationService for OpenAiQuizAdapter {
    /// Generates one multiple-choice card for the given verse.
    async fn generate_quiz(&self, verse: &Verse) -> PortResult<QuizCard> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!(
                    "Verse (Arabic): {}\nTranslation: {}",
                    verse.arabic_text, verse.translation
                ))
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
                PortError::Unexpected("Quiz LLM response contained no text content.".to_string())
            })?;

        let payload: QuizPayload = serde_json::from_str(&content).map_err(|e| {
            PortError::Unexpected(format!("Quiz LLM returned invalid JSON: {}", e))
        })?;

        let card = QuizCard {
            question: payload.question,
            options: payload.options,
            correct_index: payload.correct_index,
        };
        if !card.is_well_formed() {
            return Err(PortError::Unexpected(
                "Quiz LLM returned a card without 4 options and a valid answer index.".to_string(),
            ));
        }
        Ok(card)
    }
}
