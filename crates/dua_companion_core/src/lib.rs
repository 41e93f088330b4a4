pub mod domain;
pub mod entitlement;
pub mod memorization;
pub mod ports;
pub mod srs;

#[cfg(test)]
mod test_support;

pub use domain::{
    DuaContent, DuaRecord, QuizCard, QuotaKind, Rating, Surah, UsageCounter, User,
    UserCredentials, Verse, VerseProgress,
};
pub use entitlement::{AnonymousPolicy, EntitlementGate, QuotaDecision, QuotaPolicy};
pub use memorization::{
    EndOfSurahPolicy, MemorizationError, MemorizationSession, QuizState, RatingOutcome,
    RevealLevel, COACH_FALLBACK, EXPLANATION_FALLBACK, QUIZ_FALLBACK,
};
pub use ports::{
    Clock, CoachService, DatabaseService, DuaGenerationService, ExplanationService, PortError,
    PortResult, QuizGenerationService, RecitationService, SystemClock,
};
pub use srs::{ReviewScheduler, StepScheduler};
