//! services/api/src/adapters/mod.rs
//!
//! Concrete implementations of the core's service ports.

pub mod coach_llm;
pub mod db;
pub mod dua_llm;
pub mod explain_llm;
pub mod quiz_llm;
pub mod tts;
