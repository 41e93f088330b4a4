//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        coach_llm::OpenAiCoachAdapter, db::DbAdapter, dua_llm::OpenAiDuaAdapter,
        explain_llm::OpenAiExplanationAdapter, quiz_llm::OpenAiQuizAdapter,
        tts::OpenAiRecitationAdapter,
    },
    config::Config,
    error::ApiError,
    seed,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        memorize_handler,
        middleware::{optional_auth, require_auth},
        rest::{
            clear_history_handler, entitlements_handler, generate_dua_handler, get_surah_handler,
            list_duas_handler, list_surahs_handler, recite_handler, upgrade_handler, ApiDoc,
        },
        state::AppState,
    },
};
use async_openai::{
    config::OpenAIConfig,
    types::{SpeechModel, Voice},
    Client,
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use dua_companion_core::entitlement::{EntitlementGate, QuotaPolicy};
use dua_companion_core::ports::SystemClock;
use dua_companion_core::srs::StepScheduler;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);

    let dua_adapter = Arc::new(OpenAiDuaAdapter::new(
        openai_client.clone(),
        config.dua_model.clone(),
    ));
    let quiz_adapter = Arc::new(OpenAiQuizAdapter::new(
        openai_client.clone(),
        config.quiz_model.clone(),
    ));
    let explanation_adapter = Arc::new(OpenAiExplanationAdapter::new(
        openai_client.clone(),
        config.explain_model.clone(),
    ));
    let coach_adapter = Arc::new(OpenAiCoachAdapter::new(
        openai_client.clone(),
        config.coach_model.clone(),
    ));

    let tts_voice = match config.tts_voice.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "onyx" => Voice::Onyx,
        "nova" => Voice::Nova,
        "shimmer" => Voice::Shimmer,
        _ => {
            return Err(ApiError::Internal(format!(
                "Invalid TTS voice specified in config: '{}'",
                config.tts_voice
            )))
        }
    };
    let recitation_adapter = Arc::new(OpenAiRecitationAdapter::new(
        openai_client.clone(),
        SpeechModel::Tts1Hd,
        tts_voice,
    ));

    // --- 4. Build the Entitlement Gate, Scheduler, and Surah Catalogue ---
    let clock = Arc::new(SystemClock);
    let gate = Arc::new(EntitlementGate::new(
        db_adapter.clone(),
        clock.clone(),
        QuotaPolicy {
            generation_limit: config.free_generation_limit,
            audio_limit: config.free_audio_limit,
            anonymous: config.anonymous_policy,
        },
    ));
    let surahs = Arc::new(
        seed::load_surahs()
            .map_err(|e| ApiError::Internal(format!("Invalid embedded surah catalogue: {e}")))?,
    );
    info!("Loaded {} surahs into the memorization catalogue.", surahs.len());

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        gate,
        clock,
        scheduler: Arc::new(StepScheduler::default()),
        dua_adapter,
        recitation_adapter,
        quiz_adapter,
        explanation_adapter,
        coach_adapter,
        surahs,
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().map_err(
            |e| ApiError::Internal(format!("Invalid CORS origin: {e}")),
        )?)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/surahs", get(list_surahs_handler))
        .route("/surahs/{id}", get(get_surah_handler));

    // Routes open to anonymous callers; the entitlement gate applies the
    // configured anonymous policy.
    let metered_routes = Router::new()
        .route(
            "/duas",
            post(generate_dua_handler)
                .get(list_duas_handler)
                .delete(clear_history_handler),
        )
        .route("/duas/recite", post(recite_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/entitlements", get(entitlements_handler))
        .route("/entitlements/upgrade", post(upgrade_handler))
        .route("/memorize", get(memorize_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(metered_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
