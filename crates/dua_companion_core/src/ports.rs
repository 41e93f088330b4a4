//! crates/dua_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or generative-AI APIs.

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    DuaContent, DuaRecord, QuizCard, QuotaKind, UsageCounter, User, UserCredentials, Verse,
    VerseProgress,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Premium Flag ---
    async fn is_premium(&self, user_id: Uuid) -> PortResult<bool>;

    async fn set_premium(&self, user_id: Uuid, premium: bool) -> PortResult<()>;

    // --- Usage Counters ---
    /// Returns the stored counter for the given kind, if one exists.
    /// Callers decide whether the stored day still applies.
    async fn get_usage(&self, user_id: Uuid, kind: QuotaKind) -> PortResult<Option<UsageCounter>>;

    /// Replaces the stored counter for the given kind (last write wins).
    async fn put_usage(
        &self,
        user_id: Uuid,
        kind: QuotaKind,
        counter: UsageCounter,
    ) -> PortResult<()>;

    // --- Saved Dua Records ---
    /// Inserts a record for the owner unless one with identical `arabic`
    /// text already exists, in which case this is a no-op.
    async fn save_dua(&self, owner_id: Uuid, content: &DuaContent) -> PortResult<()>;

    /// Lists the owner's saved records, newest first.
    async fn list_duas(&self, owner_id: Uuid) -> PortResult<Vec<DuaRecord>>;

    async fn clear_duas(&self, owner_id: Uuid) -> PortResult<()>;

    // --- Verse Progress ---
    async fn get_verse_progress(
        &self,
        user_id: Uuid,
        verse_id: &str,
    ) -> PortResult<Option<VerseProgress>>;

    async fn upsert_verse_progress(
        &self,
        user_id: Uuid,
        progress: &VerseProgress,
    ) -> PortResult<()>;

    async fn clear_verse_progress(&self, user_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait DuaGenerationService: Send + Sync {
    /// Generates a devotional bundle for a free-text situation.
    async fn generate_dua(&self, situation: &str) -> PortResult<DuaContent>;
}

#[async_trait]
pub trait RecitationService: Send + Sync {
    /// Generates a spoken recitation of the given text as raw audio samples
    /// (16-bit signed, mono, 24 kHz).
    async fn generate_recitation(&self, text: &str) -> PortResult<Vec<u8>>;
}

#[async_trait]
pub trait QuizGenerationService: Send + Sync {
    /// Generates a multiple-choice card testing recall of the given verse.
    async fn generate_quiz(&self, verse: &Verse) -> PortResult<QuizCard>;
}

#[async_trait]
pub trait ExplanationService: Send + Sync {
    /// Produces a short contextual explanation of the given verse.
    async fn explain_verse(&self, verse: &Verse) -> PortResult<String>;
}

#[async_trait]
pub trait CoachService: Send + Sync {
    /// Answers one free-text question from a memorization student. `context`
    /// describes where the student currently is in their session.
    async fn coach_reply(&self, message: &str, context: &str) -> PortResult<String>;
}

//=========================================================================================
// Clock Port
//=========================================================================================

/// Injected time source so the daily quota rollover is deterministically
/// testable without real wall-clock waiting.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Today's calendar day in the caller's local time zone; quota counters
    /// roll over against this value.
    fn today(&self) -> NaiveDate;
}

/// The production clock, backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
