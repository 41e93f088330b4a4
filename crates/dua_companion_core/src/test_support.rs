//! crates/dua_companion_core/src/test_support.rs
//!
//! In-memory fakes for the ports, shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use crate::domain::{
    DuaContent, DuaRecord, QuizCard, QuotaKind, UsageCounter, User, UserCredentials, Verse,
    VerseProgress,
};
use crate::ports::{
    Clock, DatabaseService, ExplanationService, PortError, PortResult, QuizGenerationService,
};

/// A clock pinned to noon UTC of a fixed calendar day.
pub struct FixedClock {
    day: NaiveDate,
}

impl FixedClock {
    pub fn on(day: NaiveDate) -> Self {
        Self { day }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.day.and_hms_opt(12, 0, 0).unwrap())
    }

    fn today(&self) -> NaiveDate {
        self.day
    }
}

/// An in-memory `DatabaseService` with switchable premium-read failures.
#[derive(Default)]
pub struct MemoryDb {
    premium: Mutex<HashMap<Uuid, bool>>,
    usage: Mutex<HashMap<(Uuid, QuotaKind), UsageCounter>>,
    duas: Mutex<Vec<DuaRecord>>,
    progress: Mutex<HashMap<(Uuid, String), VerseProgress>>,
    premium_reads_fail: AtomicBool,
}

impl MemoryDb {
    pub async fn add_user(&self, premium: bool) -> Uuid {
        let user_id = Uuid::new_v4();
        self.premium.lock().unwrap().insert(user_id, premium);
        user_id
    }

    pub async fn set_usage(&self, user_id: Uuid, kind: QuotaKind, day: NaiveDate, count: u32) {
        self.usage
            .lock()
            .unwrap()
            .insert((user_id, kind), UsageCounter { day, count });
    }

    pub fn fail_premium_reads(&self) {
        self.premium_reads_fail.store(true, Ordering::SeqCst);
    }

    pub async fn usage_is_empty(&self) -> bool {
        self.usage.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn create_user_with_email(
        &self,
        email: &str,
        _hashed_password: &str,
    ) -> PortResult<User> {
        let user_id = self.add_user(false).await;
        Ok(User {
            user_id,
            email: Some(email.to_string()),
            premium: false,
        })
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        Err(PortError::NotFound(email.to_string()))
    }

    async fn create_auth_session(
        &self,
        _session_id: &str,
        _user_id: Uuid,
        _expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        Err(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        Ok(())
    }

    async fn is_premium(&self, user_id: Uuid) -> PortResult<bool> {
        if self.premium_reads_fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("store unreachable".to_string()));
        }
        Ok(self
            .premium
            .lock()
            .unwrap()
            .get(&user_id)
            .copied()
            .unwrap_or(false))
    }

    async fn set_premium(&self, user_id: Uuid, premium: bool) -> PortResult<()> {
        self.premium.lock().unwrap().insert(user_id, premium);
        Ok(())
    }

    async fn get_usage(&self, user_id: Uuid, kind: QuotaKind) -> PortResult<Option<UsageCounter>> {
        Ok(self.usage.lock().unwrap().get(&(user_id, kind)).copied())
    }

    async fn put_usage(
        &self,
        user_id: Uuid,
        kind: QuotaKind,
        counter: UsageCounter,
    ) -> PortResult<()> {
        self.usage.lock().unwrap().insert((user_id, kind), counter);
        Ok(())
    }

    async fn save_dua(&self, owner_id: Uuid, content: &DuaContent) -> PortResult<()> {
        let mut duas = self.duas.lock().unwrap();
        let duplicate = duas
            .iter()
            .any(|d| d.owner_id == owner_id && d.content.arabic == content.arabic);
        if !duplicate {
            duas.push(DuaRecord {
                id: Uuid::new_v4(),
                owner_id,
                content: content.clone(),
                created_at: Utc::now(),
            });
        }
        Ok(())
    }

    async fn list_duas(&self, owner_id: Uuid) -> PortResult<Vec<DuaRecord>> {
        let mut duas: Vec<DuaRecord> = self
            .duas
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.owner_id == owner_id)
            .cloned()
            .collect();
        duas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(duas)
    }

    async fn clear_duas(&self, owner_id: Uuid) -> PortResult<()> {
        self.duas.lock().unwrap().retain(|d| d.owner_id != owner_id);
        Ok(())
    }

    async fn get_verse_progress(
        &self,
        user_id: Uuid,
        verse_id: &str,
    ) -> PortResult<Option<VerseProgress>> {
        Ok(self
            .progress
            .lock()
            .unwrap()
            .get(&(user_id, verse_id.to_string()))
            .cloned())
    }

    async fn upsert_verse_progress(
        &self,
        user_id: Uuid,
        progress: &VerseProgress,
    ) -> PortResult<()> {
        self.progress
            .lock()
            .unwrap()
            .insert((user_id, progress.verse_id.clone()), progress.clone());
        Ok(())
    }

    async fn clear_verse_progress(&self, user_id: Uuid) -> PortResult<()> {
        self.progress.lock().unwrap().retain(|(u, _), _| *u != user_id);
        Ok(())
    }
}

/// A quiz service that counts its invocations and can be switched to fail.
pub struct CountingQuizService {
    pub calls: AtomicUsize,
    pub fail: AtomicBool,
}

impl Default for CountingQuizService {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        }
    }
}

impl CountingQuizService {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuizGenerationService for CountingQuizService {
    async fn generate_quiz(&self, verse: &Verse) -> PortResult<QuizCard> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("model unavailable".to_string()));
        }
        Ok(QuizCard {
            question: format!("Which verse is number {}?", verse.verse_number),
            options: vec![
                "Option A".to_string(),
                "Option B".to_string(),
                "Option C".to_string(),
                "Option D".to_string(),
            ],
            correct_index: 1,
        })
    }
}

/// An explanation service that counts its invocations.
#[derive(Default)]
pub struct CountingExplanationService {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ExplanationService for CountingExplanationService {
    async fn explain_verse(&self, verse: &Verse) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("Context for verse {}.", verse.verse_number))
    }
}
