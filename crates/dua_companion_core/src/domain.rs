//! crates/dua_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization target
//! beyond the wire derives the protocol layer needs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The generated devotional bundle: original-language text, transliteration,
/// translation, source attribution, and a short guidance note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuaContent {
    pub arabic: String,
    pub transliteration: String,
    pub translation: String,
    /// e.g. "Quran 2:201", "Sahih Bukhari", or "Inspirational".
    pub source: String,
    pub guidance: String,
}

/// A persisted `DuaContent`, owned by one user. Immutable once created and
/// deduplicated per owner by exact match on the `arabic` field.
#[derive(Debug, Clone, Serialize)]
pub struct DuaRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub content: DuaContent,
    pub created_at: DateTime<Utc>,
}

/// Which gated action a daily quota applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaKind {
    Generation,
    Audio,
}

impl QuotaKind {
    /// Stable string form used as the storage key for counters.
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaKind::Generation => "generation",
            QuotaKind::Audio => "audio",
        }
    }
}

/// Rolling daily counter for one (user, kind). The count is only meaningful
/// for the stored calendar day; a mismatch with "today" reads as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageCounter {
    pub day: NaiveDate,
    pub count: u32,
}

/// A single verse of static reference data. Read-only to this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verse {
    pub id: String,
    pub verse_number: u32,
    pub arabic_text: String,
    pub translation: String,
}

impl Verse {
    /// The verse's words in display order, used for per-word visibility toggles.
    pub fn words(&self) -> Vec<&str> {
        self.arabic_text.split_whitespace().collect()
    }
}

/// An ordered sequence of verses forming one chapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Surah {
    pub id: String,
    pub english_name: String,
    pub verses: Vec<Verse>,
}

/// Per-user, per-verse scheduling state. Created lazily on the first rating,
/// updated on every rating, deleted only by a full history clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseProgress {
    pub verse_id: String,
    pub next_review: DateTime<Utc>,
    pub interval_days: u32,
    pub ease_factor: f32,
}

impl VerseProgress {
    /// The starting record for a verse that has never been rated.
    pub fn fresh(verse_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            verse_id: verse_id.to_string(),
            next_review: now,
            interval_days: 1,
            ease_factor: 2.5,
        }
    }
}

/// User self-rated recall difficulty for one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Hard,
    Medium,
    Easy,
}

/// A generated multiple-choice card for one verse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizCard {
    pub question: String,
    pub options: Vec<String>,
    pub correct_index: usize,
}

impl QuizCard {
    /// A card is usable when it carries exactly four options and the answer
    /// index points at one of them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == 4 && self.correct_index < self.options.len()
    }
}

/// Represents a user - used throughout the app.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub premium: bool,
}

/// Only used internally for login/signup - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
