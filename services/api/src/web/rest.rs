//! services/api/src/web/rest.rs
//!
//! REST endpoints: dua generation and history, recitation audio, entitlement
//! status and upgrade, and the static surah catalogue.

use std::io::Cursor;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use dua_companion_core::domain::{DuaContent, QuotaKind, Surah};

use crate::adapters::tts::RECITATION_SAMPLE_RATE;
use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::middleware::MaybeUser;
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Documentation
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        generate_dua_handler,
        list_duas_handler,
        clear_history_handler,
        recite_handler,
        entitlements_handler,
        upgrade_handler,
        list_surahs_handler,
        get_surah_handler,
    ),
    components(schemas(
        SignupRequest,
        LoginRequest,
        AuthResponse,
        GenerateDuaRequest,
        DuaResponse,
        SavedDua,
        ReciteRequest,
        EntitlementsResponse,
    )),
    info(
        title = "Dua Companion API",
        description = "Personalized dua generation, recitation audio, and Quran memorization.",
        version = "0.1.0"
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct GenerateDuaRequest {
    /// Free-text description of the user's situation.
    pub situation: String,
}

#[derive(Serialize, ToSchema)]
pub struct DuaResponse {
    pub arabic: String,
    pub transliteration: String,
    pub translation: String,
    pub source: String,
    pub guidance: String,
    /// Free-tier generations left today, after this one. Premium users always
    /// see the full nominal limit.
    pub remaining: u32,
}

#[derive(Serialize, ToSchema)]
pub struct SavedDua {
    pub id: Uuid,
    pub arabic: String,
    pub transliteration: String,
    pub translation: String,
    pub source: String,
    pub guidance: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct ReciteRequest {
    /// The Arabic text to recite.
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct EntitlementsResponse {
    pub premium: bool,
    pub generations_remaining: u32,
    pub recitations_remaining: u32,
}

//=========================================================================================
// Dua Endpoints
//=========================================================================================

/// POST /duas - Generate a personalized dua for a described situation
#[utoipa::path(
    post,
    path = "/duas",
    request_body = GenerateDuaRequest,
    responses(
        (status = 200, description = "Dua generated", body = DuaResponse),
        (status = 429, description = "Daily free quota exhausted"),
        (status = 502, description = "Generation service failed")
    )
)]
pub async fn generate_dua_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
    Json(req): Json<GenerateDuaRequest>,
) -> Result<Json<DuaResponse>, (StatusCode, String)> {
    let decision = state.gate.check_quota(user_id, QuotaKind::Generation).await;
    if !decision.allowed {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Daily dua limit reached. Upgrade to premium for unlimited duas.".to_string(),
        ));
    }

    let content = state
        .dua_adapter
        .generate_dua(&req.situation)
        .await
        .map_err(|e| {
            error!("Dua generation failed: {:?}", e);
            (
                StatusCode::BAD_GATEWAY,
                "Could not generate a dua right now".to_string(),
            )
        })?;

    if let Some(user_id) = user_id {
        if let Err(e) = state.gate.record_usage(Some(user_id), QuotaKind::Generation).await {
            warn!(%user_id, "failed to record generation usage: {e}");
        }
        // History write failures never cost the user their generated content.
        if let Err(e) = state.db.save_dua(user_id, &content).await {
            warn!(%user_id, "failed to save dua to history: {e}");
        }
    }

    let remaining = if decision.premium {
        decision.remaining
    } else {
        decision.remaining.saturating_sub(1)
    };

    Ok(Json(dua_response(content, remaining)))
}

fn dua_response(content: DuaContent, remaining: u32) -> DuaResponse {
    DuaResponse {
        arabic: content.arabic,
        transliteration: content.transliteration,
        translation: content.translation,
        source: content.source,
        guidance: content.guidance,
        remaining,
    }
}

/// GET /duas - List the authenticated user's saved duas, newest first
#[utoipa::path(
    get,
    path = "/duas",
    responses(
        (status = 200, description = "Saved duas", body = [SavedDua]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_duas_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
) -> Result<Json<Vec<SavedDua>>, StatusCode> {
    let user_id = user_id.ok_or(StatusCode::UNAUTHORIZED)?;

    // A broken history store degrades to an empty list, not an error page.
    let records = match state.db.list_duas(user_id).await {
        Ok(records) => records,
        Err(e) => {
            warn!(%user_id, "failed to list saved duas, returning empty history: {e}");
            Vec::new()
        }
    };

    let duas = records
        .into_iter()
        .map(|r| SavedDua {
            id: r.id,
            arabic: r.content.arabic,
            transliteration: r.content.transliteration,
            translation: r.content.translation,
            source: r.content.source,
            guidance: r.content.guidance,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(duas))
}

/// DELETE /duas - Clear the user's saved duas and memorization progress
#[utoipa::path(
    delete,
    path = "/duas",
    responses(
        (status = 204, description = "History cleared"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Failed to clear history")
    )
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
) -> Result<StatusCode, (StatusCode, String)> {
    let user_id = user_id.ok_or((
        StatusCode::UNAUTHORIZED,
        "Sign in to manage your history".to_string(),
    ))?;

    state.db.clear_duas(user_id).await.map_err(|e| {
        error!(%user_id, "failed to clear dua history: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear history".to_string(),
        )
    })?;

    state.db.clear_verse_progress(user_id).await.map_err(|e| {
        error!(%user_id, "failed to clear verse progress: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to clear history".to_string(),
        )
    })?;

    info!(%user_id, "cleared dua history and verse progress");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /duas/recite - Generate a spoken recitation of Arabic text as WAV audio
#[utoipa::path(
    post,
    path = "/duas/recite",
    request_body = ReciteRequest,
    responses(
        (status = 200, description = "WAV audio of the recitation", content_type = "audio/wav"),
        (status = 429, description = "Daily recitation quota exhausted"),
        (status = 502, description = "Recitation service failed")
    )
)]
pub async fn recite_handler(
    State(state): State<Arc<AppState>>,
    Extension(MaybeUser(user_id)): Extension<MaybeUser>,
    Json(req): Json<ReciteRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let decision = state.gate.check_quota(user_id, QuotaKind::Audio).await;
    if !decision.allowed {
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            "Daily recitation limit reached. Upgrade to premium for unlimited audio.".to_string(),
        ));
    }

    let pcm = state
        .recitation_adapter
        .generate_recitation(&req.text)
        .await
        .map_err(|e| {
            error!("Recitation generation failed: {:?}", e);
            (
                StatusCode::BAD_GATEWAY,
                "Could not generate recitation audio right now".to_string(),
            )
        })?;

    let wav = pcm_to_wav(&pcm).map_err(|e| {
        error!("Failed to encode recitation WAV: {e}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode audio".to_string(),
        )
    })?;

    if user_id.is_some() {
        if let Err(e) = state.gate.record_usage(user_id, QuotaKind::Audio).await {
            warn!("failed to record recitation usage: {e}");
        }
    }

    Ok((
        [(header::CONTENT_TYPE, "audio/wav")],
        Bytes::from(wav),
    ))
}

/// Wraps raw 16-bit mono PCM samples in a WAV container.
fn pcm_to_wav(pcm: &[u8]) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RECITATION_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for chunk in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

//=========================================================================================
// Entitlement Endpoints
//=========================================================================================

/// GET /entitlements - Report premium status and today's remaining free uses
#[utoipa::path(
    get,
    path = "/entitlements",
    responses(
        (status = 200, description = "Current entitlement state", body = EntitlementsResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn entitlements_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Json<EntitlementsResponse> {
    let generation = state
        .gate
        .check_quota(Some(user_id), QuotaKind::Generation)
        .await;
    let audio = state.gate.check_quota(Some(user_id), QuotaKind::Audio).await;

    Json(EntitlementsResponse {
        premium: generation.premium,
        generations_remaining: generation.remaining,
        recitations_remaining: audio.remaining,
    })
}

/// POST /entitlements/upgrade - Flip the user to premium
#[utoipa::path(
    post,
    path = "/entitlements/upgrade",
    responses(
        (status = 200, description = "User upgraded to premium"),
        (status = 401, description = "Not authenticated"),
        (status = 502, description = "Failed to persist the upgrade")
    )
)]
pub async fn upgrade_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.gate.upgrade(user_id).await.map_err(|e| {
        error!(%user_id, "failed to persist premium upgrade: {e}");
        (
            StatusCode::BAD_GATEWAY,
            "Could not complete the upgrade".to_string(),
        )
    })?;

    info!(%user_id, "user upgraded to premium");
    Ok(StatusCode::OK)
}

//=========================================================================================
// Surah Catalogue Endpoints
//=========================================================================================

/// GET /surahs - List the memorization catalogue
#[utoipa::path(
    get,
    path = "/surahs",
    responses(
        (status = 200, description = "Available surahs")
    )
)]
pub async fn list_surahs_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Surah>> {
    Json(state.surahs.as_ref().clone())
}

/// GET /surahs/{id} - Fetch one surah with its verses
#[utoipa::path(
    get,
    path = "/surahs/{id}",
    params(("id" = String, Path, description = "Surah identifier, e.g. al-fatiha")),
    responses(
        (status = 200, description = "The surah"),
        (status = 404, description = "Unknown surah")
    )
)]
pub async fn get_surah_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Surah>, (StatusCode, String)> {
    state
        .find_surah(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Unknown surah: {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_to_wav_wraps_samples_in_a_riff_container() {
        // 4 samples of silence.
        let pcm = [0u8; 8];
        let wav = pcm_to_wav(&pcm).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte canonical header plus the sample payload.
        assert_eq!(wav.len(), 44 + pcm.len());
    }

    #[test]
    fn pcm_to_wav_drops_trailing_odd_byte() {
        let pcm = [0u8; 5];
        let wav = pcm_to_wav(&pcm).unwrap();
        assert_eq!(wav.len(), 44 + 4);
    }
}
