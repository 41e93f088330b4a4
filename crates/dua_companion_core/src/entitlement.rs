//! crates/dua_companion_core/src/entitlement.rs
//!
//! The entitlement gate: decides, per request, whether a user may run a gated
//! action (content or audio generation) based on a persisted premium flag and
//! a rolling daily counter per action kind.

use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use crate::domain::{QuotaKind, UsageCounter};
use crate::ports::{Clock, DatabaseService, PortResult};

/// Policy for requests with no authenticated identity.
///
/// One version of the product blocked anonymous use outright, another allowed
/// it without persistence. The choice is an explicit configuration value; the
/// shipped default is `Deny`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousPolicy {
    /// Anonymous requests are refused.
    Deny,
    /// Anonymous requests are allowed but never counted or persisted.
    AllowUnmetered,
}

/// Daily free-tier limits plus the anonymous-use policy.
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub generation_limit: u32,
    pub audio_limit: u32,
    pub anonymous: AnonymousPolicy,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            generation_limit: 3,
            audio_limit: 1,
            anonymous: AnonymousPolicy::Deny,
        }
    }
}

/// The outcome of a quota check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    /// Uses left today before this action runs. For premium users this is the
    /// nominal free limit; it is never decremented for them.
    pub remaining: u32,
    pub premium: bool,
}

/// Gates the content-generation and audio-generation actions behind a daily
/// free quota and a premium override.
pub struct EntitlementGate {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    policy: QuotaPolicy,
}

impl EntitlementGate {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, policy: QuotaPolicy) -> Self {
        Self { db, clock, policy }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    fn limit_for(&self, kind: QuotaKind) -> u32 {
        match kind {
            QuotaKind::Generation => self.policy.generation_limit,
            QuotaKind::Audio => self.policy.audio_limit,
        }
    }

    /// Today's count for the given kind. A counter stored under a different
    /// calendar day reads as zero, and store read failures degrade to zero
    /// rather than blocking the request.
    async fn current_count(&self, user_id: Uuid, kind: QuotaKind) -> u32 {
        match self.db.get_usage(user_id, kind).await {
            Ok(Some(counter)) if counter.day == self.clock.today() => counter.count,
            Ok(_) => 0,
            Err(e) => {
                warn!(%user_id, kind = kind.as_str(), "usage counter read failed, treating as 0: {e}");
                0
            }
        }
    }

    /// Decides whether the identity may run one action of the given kind.
    ///
    /// Premium users are always allowed. Premium-flag read failures fail
    /// closed to the free tier (logged, never surfaced as a hard error).
    pub async fn check_quota(&self, identity: Option<Uuid>, kind: QuotaKind) -> QuotaDecision {
        let limit = self.limit_for(kind);

        let Some(user_id) = identity else {
            return match self.policy.anonymous {
                AnonymousPolicy::Deny => QuotaDecision {
                    allowed: false,
                    remaining: 0,
                    premium: false,
                },
                AnonymousPolicy::AllowUnmetered => QuotaDecision {
                    allowed: true,
                    remaining: limit,
                    premium: false,
                },
            };
        };

        let premium = match self.db.is_premium(user_id).await {
            Ok(premium) => premium,
            Err(e) => {
                warn!(%user_id, "premium flag read failed, falling back to free tier: {e}");
                false
            }
        };

        if premium {
            return QuotaDecision {
                allowed: true,
                remaining: limit,
                premium: true,
            };
        }

        let count = self.current_count(user_id, kind).await;
        QuotaDecision {
            allowed: count < limit,
            remaining: limit.saturating_sub(count),
            premium: false,
        }
    }

    /// Increments today's counter for the given kind. The caller guarantees
    /// this runs at most once per successful generation; there is no internal
    /// deduplication. Anonymous identities are never counted.
    pub async fn record_usage(&self, identity: Option<Uuid>, kind: QuotaKind) -> PortResult<()> {
        let Some(user_id) = identity else {
            return Ok(());
        };

        let count = self.current_count(user_id, kind).await;
        self.db
            .put_usage(
                user_id,
                kind,
                UsageCounter {
                    day: self.clock.today(),
                    count: count + 1,
                },
            )
            .await
    }

    /// Marks the identity as premium. Store failures propagate so the
    /// caller's UI can retry the upgrade.
    pub async fn upgrade(&self, identity: Uuid) -> PortResult<()> {
        self.db.set_premium(identity, true).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DuaContent;
    use crate::ports::DatabaseService;
    use crate::test_support::{FixedClock, MemoryDb};
    use chrono::NaiveDate;

    fn gate(db: Arc<MemoryDb>, day: NaiveDate) -> EntitlementGate {
        EntitlementGate::new(db, Arc::new(FixedClock::on(day)), QuotaPolicy::default())
    }

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn content(arabic: &str) -> DuaContent {
        DuaContent {
            arabic: arabic.to_string(),
            transliteration: "rabbana atina".to_string(),
            translation: "Our Lord, give us good".to_string(),
            source: "Quran 2:201".to_string(),
            guidance: "A dua for all circumstances.".to_string(),
        }
    }

    #[tokio::test]
    async fn full_quota_denies_free_user() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(false).await;
        let today = day("2024-05-01");
        db.set_usage(user, QuotaKind::Generation, today, 3).await;

        let decision = gate(db, today)
            .check_quota(Some(user), QuotaKind::Generation)
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn stale_counter_reads_as_zero() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(false).await;
        db.set_usage(user, QuotaKind::Generation, day("2024-04-30"), 3)
            .await;

        let decision = gate(db, day("2024-05-01"))
            .check_quota(Some(user), QuotaKind::Generation)
            .await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 3);
    }

    #[tokio::test]
    async fn premium_always_allowed() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(true).await;
        let today = day("2024-05-01");
        db.set_usage(user, QuotaKind::Generation, today, 99).await;

        let decision = gate(db, today)
            .check_quota(Some(user), QuotaKind::Generation)
            .await;
        assert!(decision.allowed);
        assert!(decision.premium);
    }

    #[tokio::test]
    async fn premium_read_failure_falls_back_to_free_tier() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(true).await;
        db.fail_premium_reads();
        let today = day("2024-05-01");

        let decision = gate(db.clone(), today)
            .check_quota(Some(user), QuotaKind::Generation)
            .await;
        assert!(!decision.premium);
        assert!(decision.allowed, "free tier still applies on read failure");
        assert_eq!(decision.remaining, 3);
    }

    #[tokio::test]
    async fn record_then_check_decrements_by_one() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(false).await;
        let today = day("2024-05-01");
        db.set_usage(user, QuotaKind::Generation, today, 2).await;
        let gate = gate(db, today);

        gate.record_usage(Some(user), QuotaKind::Generation)
            .await
            .unwrap();
        let decision = gate.check_quota(Some(user), QuotaKind::Generation).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn record_usage_starts_fresh_counter_for_new_day() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(false).await;
        db.set_usage(user, QuotaKind::Audio, day("2024-04-30"), 1).await;
        let gate = gate(db, day("2024-05-01"));

        let before = gate.check_quota(Some(user), QuotaKind::Audio).await;
        assert!(before.allowed);

        gate.record_usage(Some(user), QuotaKind::Audio).await.unwrap();
        let after = gate.check_quota(Some(user), QuotaKind::Audio).await;
        assert!(!after.allowed, "audio limit is 1/day");
        assert_eq!(after.remaining, 0);
    }

    #[tokio::test]
    async fn anonymous_denied_by_default() {
        let db = Arc::new(MemoryDb::default());
        let decision = gate(db, day("2024-05-01"))
            .check_quota(None, QuotaKind::Generation)
            .await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn anonymous_unmetered_policy_allows_without_counting() {
        let db = Arc::new(MemoryDb::default());
        let gate = EntitlementGate::new(
            db.clone(),
            Arc::new(FixedClock::on(day("2024-05-01"))),
            QuotaPolicy {
                anonymous: AnonymousPolicy::AllowUnmetered,
                ..QuotaPolicy::default()
            },
        );

        let decision = gate.check_quota(None, QuotaKind::Generation).await;
        assert!(decision.allowed);
        gate.record_usage(None, QuotaKind::Generation).await.unwrap();
        assert!(db.usage_is_empty().await, "anonymous use is never persisted");
    }

    #[tokio::test]
    async fn upgrade_flips_premium_flag() {
        let db = Arc::new(MemoryDb::default());
        let user = db.add_user(false).await;
        let today = day("2024-05-01");
        db.set_usage(user, QuotaKind::Generation, today, 3).await;
        let gate = gate(db, today);

        assert!(!gate.check_quota(Some(user), QuotaKind::Generation).await.allowed);
        gate.upgrade(user).await.unwrap();
        assert!(gate.check_quota(Some(user), QuotaKind::Generation).await.allowed);
    }

    #[tokio::test]
    async fn saving_identical_dua_twice_stores_one_record() {
        let db = MemoryDb::default();
        let user = db.add_user(false).await;

        db.save_dua(user, &content("اللهم")).await.unwrap();
        db.save_dua(user, &content("اللهم")).await.unwrap();

        let saved = db.list_duas(user).await.unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_check_is_per_owner() {
        let db = MemoryDb::default();
        let a = db.add_user(false).await;
        let b = db.add_user(false).await;

        db.save_dua(a, &content("اللهم")).await.unwrap();
        db.save_dua(b, &content("اللهم")).await.unwrap();

        assert_eq!(db.list_duas(a).await.unwrap().len(), 1);
        assert_eq!(db.list_duas(b).await.unwrap().len(), 1);
    }
}
