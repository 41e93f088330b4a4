//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;

use dua_companion_core::entitlement::AnonymousPolicy;
use dua_companion_core::memorization::EndOfSurahPolicy;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub openai_api_key: Option<String>,
    pub dua_model: String,
    pub quiz_model: String,
    pub explain_model: String,
    pub coach_model: String,
    pub tts_voice: String,
    pub free_generation_limit: u32,
    pub free_audio_limit: u32,
    pub anonymous_policy: AnonymousPolicy,
    pub end_of_surah_policy: EndOfSurahPolicy,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load API Keys (as optional) ---
        let openai_api_key = std::env::var("OPENAI_API_KEY").ok();

        // --- Load Adapter-specific Settings ---
        let dua_model = std::env::var("DUA_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let quiz_model =
            std::env::var("QUIZ_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let explain_model =
            std::env::var("EXPLAIN_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let coach_model =
            std::env::var("COACH_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "onyx".to_string());

        // --- Load Entitlement and Memorization Policies ---
        let free_generation_limit = parse_limit("FREE_GENERATION_LIMIT", 3)?;
        let free_audio_limit = parse_limit("FREE_AUDIO_LIMIT", 1)?;
        let anonymous_policy = parse_anonymous_policy(
            &std::env::var("ANONYMOUS_POLICY").unwrap_or_else(|_| "deny".to_string()),
        )?;
        let end_of_surah_policy = parse_end_of_surah_policy(
            &std::env::var("END_OF_SURAH_POLICY").unwrap_or_else(|_| "stay".to_string()),
        )?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            openai_api_key,
            dua_model,
            quiz_model,
            explain_model,
            coach_model,
            tts_voice,
            free_generation_limit,
            free_audio_limit,
            anonymous_policy,
            end_of_surah_policy,
        })
    }
}

fn parse_limit(var: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u32>()
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

fn parse_anonymous_policy(raw: &str) -> Result<AnonymousPolicy, ConfigError> {
    match raw.to_lowercase().as_str() {
        "deny" => Ok(AnonymousPolicy::Deny),
        "allow_unmetered" => Ok(AnonymousPolicy::AllowUnmetered),
        other => Err(ConfigError::InvalidValue(
            "ANONYMOUS_POLICY".to_string(),
            format!("'{}' is not one of: deny, allow_unmetered", other),
        )),
    }
}

fn parse_end_of_surah_policy(raw: &str) -> Result<EndOfSurahPolicy, ConfigError> {
    match raw.to_lowercase().as_str() {
        "stay" => Ok(EndOfSurahPolicy::Stay),
        "wrap" => Ok(EndOfSurahPolicy::Wrap),
        "mark_complete" => Ok(EndOfSurahPolicy::MarkComplete),
        other => Err(ConfigError::InvalidValue(
            "END_OF_SURAH_POLICY".to_string(),
            format!("'{}' is not one of: stay, wrap, mark_complete", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_policy_parses_known_values() {
        assert_eq!(
            parse_anonymous_policy("deny").unwrap(),
            AnonymousPolicy::Deny
        );
        assert_eq!(
            parse_anonymous_policy("ALLOW_UNMETERED").unwrap(),
            AnonymousPolicy::AllowUnmetered
        );
        assert!(parse_anonymous_policy("maybe").is_err());
    }

    #[test]
    fn end_of_surah_policy_parses_known_values() {
        assert_eq!(
            parse_end_of_surah_policy("stay").unwrap(),
            EndOfSurahPolicy::Stay
        );
        assert_eq!(
            parse_end_of_surah_policy("wrap").unwrap(),
            EndOfSurahPolicy::Wrap
        );
        assert_eq!(
            parse_end_of_surah_policy("mark_complete").unwrap(),
            EndOfSurahPolicy::MarkComplete
        );
        assert!(parse_end_of_surah_policy("loop").is_err());
    }
}
