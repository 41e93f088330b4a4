//! crates/dua_companion_core/src/memorization.rs
//!
//! Session-local state machine for the memorization mode: reveal level,
//! per-word visibility overrides, quiz/explanation caching, and the rating
//! step that advances the verse cursor.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QuizCard, Rating, Surah, Verse, VerseProgress};
use crate::ports::{ExplanationService, PortError, PortResult, QuizGenerationService};
use crate::srs::ReviewScheduler;

/// Shown when the quiz call fails or returns an unusable card.
pub const QUIZ_FALLBACK: &str =
    "Could not prepare a quiz for this verse right now. Keep reciting and try again.";

/// Shown when the explanation call fails or returns nothing.
pub const EXPLANATION_FALLBACK: &str = "Could not retrieve explanation at this time.";

/// Shown as the coach's reply when the coach call fails.
pub const COACH_FALLBACK: &str = "I apologize, I am unable to connect at the moment.";

/// Visibility tier of the verse text, cycling Full -> Partial -> Hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealLevel {
    Full,
    Partial,
    Hidden,
}

impl RevealLevel {
    /// The next level in the fixed three-step cycle.
    pub fn advance(self) -> Self {
        match self {
            RevealLevel::Full => RevealLevel::Partial,
            RevealLevel::Partial => RevealLevel::Hidden,
            RevealLevel::Hidden => RevealLevel::Full,
        }
    }
}

/// Whether quiz data exists for the current verse and is being shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    None,
    Loaded,
    Active,
}

/// What the cursor does after rating the last verse of the surah.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndOfSurahPolicy {
    /// Cursor remains on the last verse.
    Stay,
    /// Cursor returns to the first verse.
    Wrap,
    /// Cursor remains and the session is flagged complete.
    MarkComplete,
}

#[derive(Debug, thiserror::Error)]
pub enum MemorizationError {
    #[error("word index {index} out of range for verse {verse_id} ({word_count} words)")]
    WordIndexOutOfRange {
        verse_id: String,
        index: usize,
        word_count: usize,
    },
    #[error("surah {0} has no verses")]
    EmptySurah(String),
    #[error("verse {0} is not part of this surah")]
    UnknownVerse(String),
}

/// The result of one rating step.
#[derive(Debug, Clone)]
pub struct RatingOutcome {
    pub progress: VerseProgress,
    /// Whether the cursor moved to a different verse.
    pub advanced: bool,
    /// Whether this rating completed the surah under `MarkComplete`.
    pub surah_completed: bool,
}

/// One user's interactive pass over a surah. All interaction state is local
/// to the session; per-verse progress records live in an external store and
/// are passed in and out of [`MemorizationSession::rate`].
pub struct MemorizationSession {
    surah: Surah,
    cursor: usize,
    reveal: RevealLevel,
    quiz_state: QuizState,
    hidden_words: HashSet<usize>,
    quiz_cache: HashMap<String, QuizCard>,
    explanation_cache: HashMap<String, String>,
    end_policy: EndOfSurahPolicy,
    completed: bool,
}

impl MemorizationSession {
    pub fn new(surah: Surah, end_policy: EndOfSurahPolicy) -> Result<Self, MemorizationError> {
        if surah.verses.is_empty() {
            return Err(MemorizationError::EmptySurah(surah.id));
        }
        Ok(Self {
            surah,
            cursor: 0,
            reveal: RevealLevel::Full,
            quiz_state: QuizState::None,
            hidden_words: HashSet::new(),
            quiz_cache: HashMap::new(),
            explanation_cache: HashMap::new(),
            end_policy,
            completed: false,
        })
    }

    /// Positions the cursor on a specific verse of the surah.
    pub fn seek(&mut self, verse_id: &str) -> Result<(), MemorizationError> {
        let index = self
            .surah
            .verses
            .iter()
            .position(|v| v.id == verse_id)
            .ok_or_else(|| MemorizationError::UnknownVerse(verse_id.to_string()))?;
        if index != self.cursor {
            self.cursor = index;
            self.reset_verse_state();
        }
        Ok(())
    }

    pub fn surah(&self) -> &Surah {
        &self.surah
    }

    pub fn current_verse(&self) -> &Verse {
        &self.surah.verses[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn verse_count(&self) -> usize {
        self.surah.verses.len()
    }

    pub fn reveal_level(&self) -> RevealLevel {
        self.reveal
    }

    pub fn quiz_state(&self) -> QuizState {
        self.quiz_state
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn hidden_words(&self) -> &HashSet<usize> {
        &self.hidden_words
    }

    /// Advances the reveal level one step along the fixed cycle.
    pub fn toggle_reveal(&mut self) -> RevealLevel {
        self.reveal = self.reveal.advance();
        self.reveal
    }

    /// Flips the manual visibility override of a single word. Returns whether
    /// the word is now hidden. The index must address a word of the current
    /// verse; anything else is a caller contract violation.
    pub fn toggle_word(&mut self, index: usize) -> Result<bool, MemorizationError> {
        let word_count = self.current_verse().words().len();
        if index >= word_count {
            return Err(MemorizationError::WordIndexOutOfRange {
                verse_id: self.current_verse().id.clone(),
                index,
                word_count,
            });
        }
        if self.hidden_words.remove(&index) {
            Ok(false)
        } else {
            self.hidden_words.insert(index);
            Ok(true)
        }
    }

    /// The quiz card already cached for the current verse, if any.
    pub fn cached_quiz(&self) -> Option<&QuizCard> {
        self.quiz_cache.get(&self.current_verse().id)
    }

    /// Caches a fetched card for the current verse and activates quiz mode.
    pub fn store_quiz(&mut self, card: QuizCard) {
        self.quiz_cache.insert(self.current_verse().id.clone(), card);
        self.quiz_state = QuizState::Active;
    }

    /// Returns quiz data for the current verse, calling the external service
    /// at most once per verse per session. A failed or malformed response
    /// leaves all session state unchanged.
    pub async fn quiz_for_current(
        &mut self,
        service: &dyn QuizGenerationService,
    ) -> PortResult<QuizCard> {
        if let Some(card) = self.cached_quiz() {
            let card = card.clone();
            self.quiz_state = QuizState::Active;
            return Ok(card);
        }
        let card = service.generate_quiz(self.current_verse()).await?;
        if !card.is_well_formed() {
            return Err(PortError::Unexpected(
                "quiz service returned a malformed card".to_string(),
            ));
        }
        self.store_quiz(card.clone());
        Ok(card)
    }

    /// A one-line description of where the student is, passed to the coach
    /// so its replies stay anchored to the session.
    pub fn coach_context(&self) -> String {
        format!(
            "Memorizing Surah {}, verse {} of {}",
            self.surah.english_name,
            self.current_verse().verse_number,
            self.verse_count()
        )
    }

    /// Leaves quiz mode, keeping the cached card for this session.
    pub fn exit_quiz(&mut self) {
        if self.quiz_state == QuizState::Active {
            self.quiz_state = QuizState::Loaded;
        }
    }

    /// The explanation already cached for the current verse, if any.
    pub fn cached_explanation(&self) -> Option<&str> {
        self.explanation_cache
            .get(&self.current_verse().id)
            .map(String::as_str)
    }

    /// Caches a fetched explanation for the current verse.
    pub fn store_explanation(&mut self, text: String) {
        self.explanation_cache
            .insert(self.current_verse().id.clone(), text);
    }

    /// Returns the explanation for the current verse with the same at-most-one
    /// external call contract as the quiz path. An empty response is a failure.
    pub async fn explanation_for_current(
        &mut self,
        service: &dyn ExplanationService,
    ) -> PortResult<String> {
        if let Some(text) = self.cached_explanation() {
            return Ok(text.to_string());
        }
        let text = service.explain_verse(self.current_verse()).await?;
        if text.trim().is_empty() {
            return Err(PortError::Unexpected(
                "explanation service returned no text".to_string(),
            ));
        }
        self.store_explanation(text.clone());
        Ok(text)
    }

    /// Applies one self-rating: the scheduler computes the updated progress
    /// record from the caller-supplied prior state, then the cursor advances
    /// to the next verse, or follows the end-of-surah policy at the last one.
    pub fn rate(
        &mut self,
        rating: Rating,
        prior: Option<VerseProgress>,
        scheduler: &dyn ReviewScheduler,
        now: DateTime<Utc>,
    ) -> RatingOutcome {
        let verse_id = self.current_verse().id.clone();
        let prior = prior.unwrap_or_else(|| VerseProgress::fresh(&verse_id, now));
        let progress = scheduler.review(&prior, rating, now);

        let mut advanced = false;
        let mut surah_completed = false;
        if self.cursor + 1 < self.surah.verses.len() {
            self.cursor += 1;
            self.reset_verse_state();
            advanced = true;
        } else {
            match self.end_policy {
                EndOfSurahPolicy::Stay => {}
                EndOfSurahPolicy::Wrap => {
                    self.cursor = 0;
                    self.reset_verse_state();
                    advanced = true;
                }
                EndOfSurahPolicy::MarkComplete => {
                    self.completed = true;
                    surah_completed = true;
                }
            }
        }

        RatingOutcome {
            progress,
            advanced,
            surah_completed,
        }
    }

    /// Moves to the next verse, if any. Returns whether the cursor moved.
    pub fn next_verse(&mut self) -> bool {
        if self.cursor + 1 < self.surah.verses.len() {
            self.cursor += 1;
            self.reset_verse_state();
            true
        } else {
            false
        }
    }

    /// Moves to the previous verse, if any. Returns whether the cursor moved.
    pub fn prev_verse(&mut self) -> bool {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.reset_verse_state();
            true
        } else {
            false
        }
    }

    /// Per-verse interaction state resets on navigation; the quiz and
    /// explanation caches survive for the whole session.
    fn reset_verse_state(&mut self) {
        self.reveal = RevealLevel::Full;
        self.quiz_state = QuizState::None;
        self.hidden_words.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srs::StepScheduler;
    use crate::test_support::{CountingExplanationService, CountingQuizService};
    use std::sync::atomic::Ordering;

    fn surah(verse_count: u32) -> Surah {
        Surah {
            id: "al-ikhlas".to_string(),
            english_name: "The Sincerity".to_string(),
            verses: (1..=verse_count)
                .map(|n| Verse {
                    id: format!("al-ikhlas:{n}"),
                    verse_number: n,
                    arabic_text: "قُلْ هُوَ اللَّهُ أَحَدٌ".to_string(),
                    translation: format!("Verse {n}"),
                })
                .collect(),
        }
    }

    fn session(verse_count: u32) -> MemorizationSession {
        MemorizationSession::new(surah(verse_count), EndOfSurahPolicy::Stay).unwrap()
    }

    #[test]
    fn reveal_cycles_through_three_levels() {
        let mut session = session(3);
        assert_eq!(session.reveal_level(), RevealLevel::Full);
        assert_eq!(session.toggle_reveal(), RevealLevel::Partial);
        assert_eq!(session.toggle_reveal(), RevealLevel::Hidden);
        assert_eq!(session.toggle_reveal(), RevealLevel::Full);
    }

    #[test]
    fn word_toggle_flips_single_word() {
        let mut session = session(1);
        assert!(session.toggle_word(2).unwrap());
        assert!(session.hidden_words().contains(&2));
        assert!(!session.toggle_word(2).unwrap());
        assert!(session.hidden_words().is_empty());
    }

    #[test]
    fn word_toggle_rejects_out_of_range_index() {
        let mut session = session(1);
        let err = session.toggle_word(99).unwrap_err();
        assert!(matches!(
            err,
            MemorizationError::WordIndexOutOfRange { index: 99, .. }
        ));
    }

    #[test]
    fn navigation_resets_per_verse_state() {
        let mut session = session(3);
        session.toggle_reveal();
        session.toggle_word(0).unwrap();
        assert!(session.next_verse());
        assert_eq!(session.reveal_level(), RevealLevel::Full);
        assert!(session.hidden_words().is_empty());
        assert_eq!(session.quiz_state(), QuizState::None);
    }

    #[test]
    fn prev_verse_stops_at_first() {
        let mut session = session(2);
        assert!(!session.prev_verse());
        assert!(session.next_verse());
        assert!(session.prev_verse());
        assert_eq!(session.cursor(), 0);
    }

    #[tokio::test]
    async fn quiz_requested_twice_calls_service_once() {
        let service = CountingQuizService::default();
        let mut session = session(2);

        session.quiz_for_current(&service).await.unwrap();
        session.exit_quiz();
        assert_eq!(session.quiz_state(), QuizState::Loaded);
        session.quiz_for_current(&service).await.unwrap();

        assert_eq!(service.call_count(), 1);
        assert_eq!(session.quiz_state(), QuizState::Active);
    }

    #[tokio::test]
    async fn quiz_cache_survives_navigation_away_and_back() {
        let service = CountingQuizService::default();
        let mut session = session(2);

        session.quiz_for_current(&service).await.unwrap();
        session.next_verse();
        session.prev_verse();
        session.quiz_for_current(&service).await.unwrap();

        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn failed_quiz_call_leaves_state_unchanged() {
        let service = CountingQuizService::default();
        service.fail.store(true, Ordering::SeqCst);
        let mut session = session(1);

        assert!(session.quiz_for_current(&service).await.is_err());
        assert_eq!(session.quiz_state(), QuizState::None);
        assert!(session.cached_quiz().is_none());
    }

    #[tokio::test]
    async fn explanation_is_fetched_once_per_verse() {
        let service = CountingExplanationService::default();
        let mut session = session(1);

        let first = session.explanation_for_current(&service).await.unwrap();
        let second = session.explanation_for_current(&service).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rating_advances_cursor_and_resets_state() {
        let mut session = session(3);
        session.toggle_reveal();
        let outcome = session.rate(
            Rating::Medium,
            None,
            &StepScheduler::default(),
            Utc::now(),
        );
        assert!(outcome.advanced);
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.reveal_level(), RevealLevel::Full);
    }

    #[test]
    fn rating_creates_progress_lazily() {
        let mut session = session(2);
        let now = Utc::now();
        let outcome = session.rate(Rating::Easy, None, &StepScheduler::default(), now);
        assert_eq!(outcome.progress.verse_id, "al-ikhlas:1");
        assert!(outcome.progress.next_review > now);
    }

    #[test]
    fn cursor_stays_on_last_verse_under_stay_policy() {
        let mut session = session(5);
        for _ in 0..4 {
            session.next_verse();
        }
        assert_eq!(session.cursor(), 4);
        let outcome = session.rate(Rating::Easy, None, &StepScheduler::default(), Utc::now());
        assert!(!outcome.advanced);
        assert_eq!(session.cursor(), 4);
        assert!(!session.is_completed());
    }

    #[test]
    fn wrap_policy_returns_to_first_verse() {
        let mut session =
            MemorizationSession::new(surah(2), EndOfSurahPolicy::Wrap).unwrap();
        session.next_verse();
        let outcome = session.rate(Rating::Hard, None, &StepScheduler::default(), Utc::now());
        assert!(outcome.advanced);
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn mark_complete_policy_flags_session() {
        let mut session =
            MemorizationSession::new(surah(1), EndOfSurahPolicy::MarkComplete).unwrap();
        let outcome = session.rate(Rating::Easy, None, &StepScheduler::default(), Utc::now());
        assert!(outcome.surah_completed);
        assert!(session.is_completed());
        assert_eq!(session.cursor(), 0);
    }

    #[test]
    fn coach_context_tracks_the_cursor() {
        let mut session = session(3);
        assert_eq!(
            session.coach_context(),
            "Memorizing Surah The Sincerity, verse 1 of 3"
        );
        session.next_verse();
        assert_eq!(
            session.coach_context(),
            "Memorizing Surah The Sincerity, verse 2 of 3"
        );
    }

    #[test]
    fn empty_surah_is_rejected() {
        let empty = Surah {
            id: "empty".to_string(),
            english_name: "Empty".to_string(),
            verses: vec![],
        };
        assert!(matches!(
            MemorizationSession::new(empty, EndOfSurahPolicy::Stay),
            Err(MemorizationError::EmptySurah(_))
        ));
    }

    #[test]
    fn seek_moves_cursor_and_rejects_foreign_verse() {
        let mut session = session(3);
        session.seek("al-ikhlas:3").unwrap();
        assert_eq!(session.cursor(), 2);
        assert!(matches!(
            session.seek("al-fatiha:1"),
            Err(MemorizationError::UnknownVerse(_))
        ));
    }
}
