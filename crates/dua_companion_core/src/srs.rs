//! crates/dua_companion_core/src/srs.rs
//!
//! The pluggable review scheduler behind the memorization mode.
//!
//! The contract every implementation must honor: a rating always moves
//! `next_review` strictly forward, and for the same starting progress the
//! resulting interval ordering is `easy >= medium >= hard`.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Rating, VerseProgress};

pub trait ReviewScheduler: Send + Sync {
    /// Applies one self-rated review to a progress record.
    fn review(&self, progress: &VerseProgress, rating: Rating, now: DateTime<Utc>)
        -> VerseProgress;
}

/// An SM-2 style step function over (interval, ease):
///
/// - `hard`: interval resets to 1 day, ease drops by 0.2 (floor 1.3)
/// - `medium`: interval grows by a flat 1.2 factor, ease unchanged
/// - `easy`: interval grows by the ease factor, ease rises by 0.1 (cap 3.0)
#[derive(Debug, Clone, Copy)]
pub struct StepScheduler {
    pub min_ease: f32,
    pub max_ease: f32,
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self {
            min_ease: 1.3,
            max_ease: 3.0,
        }
    }
}

impl ReviewScheduler for StepScheduler {
    fn review(
        &self,
        progress: &VerseProgress,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> VerseProgress {
        let interval = progress.interval_days;
        let ease = progress.ease_factor;

        let (interval_days, ease_factor) = match rating {
            Rating::Hard => (1, (ease - 0.2).max(self.min_ease)),
            Rating::Medium => (((interval as f32 * 1.2).round() as u32).max(1), ease),
            Rating::Easy => (
                ((interval as f32 * ease).round() as u32).max(2),
                (ease + 0.1).min(self.max_ease),
            ),
        };

        VerseProgress {
            verse_id: progress.verse_id.clone(),
            next_review: now + Duration::days(i64::from(interval_days)),
            interval_days,
            ease_factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(interval_days: u32, ease_factor: f32) -> VerseProgress {
        VerseProgress {
            verse_id: "al-fatiha:1".to_string(),
            next_review: Utc::now(),
            interval_days,
            ease_factor,
        }
    }

    #[test]
    fn every_rating_moves_next_review_forward() {
        let scheduler = StepScheduler::default();
        let now = Utc::now();
        for rating in [Rating::Hard, Rating::Medium, Rating::Easy] {
            let updated = scheduler.review(&progress(1, 2.5), rating, now);
            assert!(updated.next_review > now, "{rating:?} must schedule ahead");
        }
    }

    #[test]
    fn easy_never_schedules_closer_than_hard() {
        let scheduler = StepScheduler::default();
        let now = Utc::now();
        for (interval, ease) in [(1, 1.3), (1, 2.5), (4, 1.8), (10, 2.5), (30, 3.0)] {
            let start = progress(interval, ease);
            let hard = scheduler.review(&start, Rating::Hard, now);
            let medium = scheduler.review(&start, Rating::Medium, now);
            let easy = scheduler.review(&start, Rating::Easy, now);
            assert!(easy.next_review >= medium.next_review);
            assert!(medium.next_review >= hard.next_review);
        }
    }

    #[test]
    fn hard_resets_interval_and_lowers_ease() {
        let scheduler = StepScheduler::default();
        let updated = scheduler.review(&progress(12, 2.5), Rating::Hard, Utc::now());
        assert_eq!(updated.interval_days, 1);
        assert!((updated.ease_factor - 2.3).abs() < 1e-6);
    }

    #[test]
    fn ease_is_clamped_at_both_ends() {
        let scheduler = StepScheduler::default();
        let now = Utc::now();
        let floor = scheduler.review(&progress(1, 1.3), Rating::Hard, now);
        assert!((floor.ease_factor - 1.3).abs() < 1e-6);
        let cap = scheduler.review(&progress(1, 3.0), Rating::Easy, now);
        assert!((cap.ease_factor - 3.0).abs() < 1e-6);
    }

    #[test]
    fn easy_grows_interval_by_ease() {
        let scheduler = StepScheduler::default();
        let updated = scheduler.review(&progress(10, 2.5), Rating::Easy, Utc::now());
        assert_eq!(updated.interval_days, 25);
    }
}
