//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use std::sync::Arc;

use dua_companion_core::domain::Surah;
use dua_companion_core::entitlement::EntitlementGate;
use dua_companion_core::memorization::{MemorizationError, MemorizationSession};
use dua_companion_core::ports::{
    Clock, CoachService, DatabaseService, DuaGenerationService, ExplanationService,
    QuizGenerationService, RecitationService,
};
use dua_companion_core::srs::ReviewScheduler;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub gate: Arc<EntitlementGate>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn ReviewScheduler>,
    pub dua_adapter: Arc<dyn DuaGenerationService>,
    pub recitation_adapter: Arc<dyn RecitationService>,
    pub quiz_adapter: Arc<dyn QuizGenerationService>,
    pub explanation_adapter: Arc<dyn ExplanationService>,
    pub coach_adapter: Arc<dyn CoachService>,
    pub surahs: Arc<Vec<Surah>>,
}

impl AppState {
    /// Looks up a surah from the static catalogue.
    pub fn find_surah(&self, surah_id: &str) -> Option<&Surah> {
        self.surahs.iter().find(|s| s.id == surah_id)
    }
}

//=========================================================================================
// SessionState (Specific to One WebSocket Connection)
//=========================================================================================

/// The state for a single, active memorization WebSocket connection.
pub struct SessionState {
    pub user_id: Uuid,
    pub session: MemorizationSession,
    /// Guards the in-flight quiz/explanation task for the current verse.
    /// Replaced whenever the cursor moves, which orphans stale results.
    pub cancellation_token: CancellationToken,
}

impl SessionState {
    /// Creates session state for one user over one surah.
    pub fn new(
        app_state: &AppState,
        user_id: Uuid,
        surah: Surah,
    ) -> Result<Self, MemorizationError> {
        let session = MemorizationSession::new(surah, app_state.config.end_of_surah_policy)?;
        Ok(Self {
            user_id,
            session,
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Cancels any in-flight verse task and installs a fresh token.
    /// Called on every cursor move so stale completions become no-ops.
    pub fn rotate_token(&mut self) -> CancellationToken {
        self.cancellation_token.cancel();
        self.cancellation_token = CancellationToken::new();
        self.cancellation_token.clone()
    }
}
