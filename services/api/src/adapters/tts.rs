//! services/api/src/adapters/tts.rs
//!
//! This module contains the adapter for the Text-to-Speech recitation service.
//! It implements the `RecitationService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{CreateSpeechRequest, SpeechModel, SpeechResponseFormat, Voice},
    Client,
};
use async_trait::async_trait;
use dua_companion_core::ports::{PortError, PortResult, RecitationService};

/// Sample rate of the raw PCM the speech API returns in `Pcm` format.
pub const RECITATION_SAMPLE_RATE: u32 = 24_000;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `RecitationService` port using the OpenAI TTS API.
#[derive(Clone)]
pub struct OpenAiRecitationAdapter {
    client: Client<OpenAIConfig>,
    model: SpeechModel,
    voice: Voice,
}

impl OpenAiRecitationAdapter {
    /// Creates a new `OpenAiRecitationAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: SpeechModel, voice: Voice) -> Self {
        Self {
            client,
            model,
            voice,
        }
    }
}

//=========================================================================================
// `RecitationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl RecitationService for OpenAiRecitationAdapter {
    /// Generates a slow, melodious recitation of the given text as raw
    /// 16-bit mono PCM at 24 kHz.
    async fn generate_recitation(&self, text: &str) -> PortResult<Vec<u8>> {
        let request = CreateSpeechRequest {
            model: self.model.clone(),
            input: format!(
                "Read this Arabic prayer with proper Tajweed, in a slow, melodious, \
                 and spiritual voice: {}",
                text
            ),
            voice: self.voice.clone(),
            response_format: Some(SpeechResponseFormat::Pcm),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.bytes.to_vec())
    }
}
