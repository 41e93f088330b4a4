//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use dua_companion_core::domain::{
    DuaContent, DuaRecord, QuotaKind, UsageCounter, User, UserCredentials, VerseProgress,
};
use dua_companion_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
    premium: bool,
}

impl UserRow {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: Some(self.email),
            premium: self.premium,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

impl CredentialsRow {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct DuaRow {
    id: Uuid,
    owner_id: Uuid,
    arabic: String,
    transliteration: String,
    translation: String,
    source: String,
    guidance: String,
    created_at: DateTime<Utc>,
}

impl DuaRow {
    fn to_domain(self) -> DuaRecord {
        DuaRecord {
            id: self.id,
            owner_id: self.owner_id,
            content: DuaContent {
                arabic: self.arabic,
                transliteration: self.transliteration,
                translation: self.translation,
                source: self.source,
                guidance: self.guidance,
            },
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct UsageRow {
    day: NaiveDate,
    count: i32,
}

impl UsageRow {
    fn to_domain(self) -> UsageCounter {
        UsageCounter {
            day: self.day,
            count: self.count.max(0) as u32,
        }
    }
}

#[derive(FromRow)]
struct ProgressRow {
    verse_id: String,
    next_review: DateTime<Utc>,
    interval_days: i32,
    ease_factor: f32,
}

impl ProgressRow {
    fn to_domain(self) -> VerseProgress {
        VerseProgress {
            verse_id: self.verse_id,
            next_review: self.next_review,
            interval_days: self.interval_days.max(0) as u32,
            ease_factor: self.ease_factor,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3)
             RETURNING user_id, email, premium",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => unexpected(e),
        })?;
        Ok(row.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let row: (Uuid,) = sqlx::query_as(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => unexpected(e),
        })?;
        Ok(row.0)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn is_premium(&self, user_id: Uuid) -> PortResult<bool> {
        let row: (bool,) = sqlx::query_as("SELECT premium FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("User {} not found", user_id))
                }
                _ => unexpected(e),
            })?;
        Ok(row.0)
    }

    async fn set_premium(&self, user_id: Uuid, premium: bool) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET premium = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(premium)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn get_usage(&self, user_id: Uuid, kind: QuotaKind) -> PortResult<Option<UsageCounter>> {
        let row = sqlx::query_as::<_, UsageRow>(
            "SELECT day, count FROM usage_counters WHERE user_id = $1 AND kind = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.map(UsageRow::to_domain))
    }

    async fn put_usage(
        &self,
        user_id: Uuid,
        kind: QuotaKind,
        counter: UsageCounter,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO usage_counters (user_id, kind, day, count) VALUES ($1, $2, $3, $4)
             ON CONFLICT (user_id, kind)
             DO UPDATE SET day = EXCLUDED.day, count = EXCLUDED.count",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(counter.day)
        .bind(counter.count as i32)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn save_dua(&self, owner_id: Uuid, content: &DuaContent) -> PortResult<()> {
        // The unique index on (owner_id, arabic) makes the duplicate save a no-op.
        sqlx::query(
            "INSERT INTO dua_records (id, owner_id, arabic, transliteration, translation, source, guidance)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (owner_id, arabic) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&content.arabic)
        .bind(&content.transliteration)
        .bind(&content.translation)
        .bind(&content.source)
        .bind(&content.guidance)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_duas(&self, owner_id: Uuid) -> PortResult<Vec<DuaRecord>> {
        let rows = sqlx::query_as::<_, DuaRow>(
            "SELECT id, owner_id, arabic, transliteration, translation, source, guidance, created_at
             FROM dua_records WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(DuaRow::to_domain).collect())
    }

    async fn clear_duas(&self, owner_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM dua_records WHERE owner_id = $1")
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn get_verse_progress(
        &self,
        user_id: Uuid,
        verse_id: &str,
    ) -> PortResult<Option<VerseProgress>> {
        let row = sqlx::query_as::<_, ProgressRow>(
            "SELECT verse_id, next_review, interval_days, ease_factor
             FROM verse_progress WHERE user_id = $1 AND verse_id = $2",
        )
        .bind(user_id)
        .bind(verse_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.map(ProgressRow::to_domain))
    }

    async fn upsert_verse_progress(
        &self,
        user_id: Uuid,
        progress: &VerseProgress,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO verse_progress (user_id, verse_id, next_review, interval_days, ease_factor)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, verse_id)
             DO UPDATE SET next_review = EXCLUDED.next_review,
                           interval_days = EXCLUDED.interval_days,
                           ease_factor = EXCLUDED.ease_factor",
        )
        .bind(user_id)
        .bind(&progress.verse_id)
        .bind(progress.next_review)
        .bind(progress.interval_days as i32)
        .bind(progress.ease_factor)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn clear_verse_progress(&self, user_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM verse_progress WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
