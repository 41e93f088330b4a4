//! services/api/src/web/memorize.rs
//!
//! The entry point and control loop for a memorization WebSocket connection.
//! Verse navigation, reveal toggling, and rating are handled inline; quiz and
//! explanation generation run as cancellable background tasks so a cursor move
//! can orphan an in-flight call.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use dua_companion_core::domain::{Rating, Verse};
use dua_companion_core::memorization::{COACH_FALLBACK, EXPLANATION_FALLBACK, QUIZ_FALLBACK};

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::{AppState, SessionState},
};

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn memorize_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user_id))
}

async fn send(ws_sender: &WsSender, msg: &ServerMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        error!("Failed to serialize server message");
        return false;
    };
    ws_sender
        .lock()
        .await
        .send(Message::Text(json.into()))
        .await
        .is_ok()
}

fn verse_changed(session: &SessionState) -> ServerMessage {
    ServerMessage::VerseChanged {
        verse: session.session.current_verse().clone(),
        verse_index: session.session.cursor(),
        verse_count: session.session.verse_count(),
        reveal_level: session.session.reveal_level(),
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user_id: Uuid) {
    info!("New memorization WebSocket connection for user: {}", user_id);

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    // --- 1. Initialization Phase ---
    let session_state_lock: Arc<Mutex<SessionState>>;
    if let Some(Ok(Message::Text(init_json))) = receiver.next().await {
        match serde_json::from_str::<ClientMessage>(&init_json) {
            Ok(ClientMessage::Init {
                surah_id,
                start_verse,
            }) => {
                let Some(surah) = app_state.find_surah(&surah_id).cloned() else {
                    error!("Unknown surah requested: {}", surah_id);
                    let _ = send(
                        &ws_sender,
                        &ServerMessage::Error {
                            message: format!("Unknown surah: {surah_id}"),
                        },
                    )
                    .await;
                    return;
                };

                let mut state = match SessionState::new(&app_state, user_id, surah) {
                    Ok(state) => state,
                    Err(e) => {
                        error!("Failed to initialize memorization session: {:?}", e);
                        let _ = send(
                            &ws_sender,
                            &ServerMessage::Error {
                                message: "Failed to start memorization session.".to_string(),
                            },
                        )
                        .await;
                        return;
                    }
                };

                if let Some(verse_id) = start_verse {
                    if let Err(e) = state.session.seek(&verse_id) {
                        error!("Failed to seek to start verse: {:?}", e);
                        let _ = send(
                            &ws_sender,
                            &ServerMessage::Error {
                                message: format!("Unknown verse: {verse_id}"),
                            },
                        )
                        .await;
                        return;
                    }
                }

                let init_msg = ServerMessage::SessionInitialized {
                    surah_id,
                    verse: state.session.current_verse().clone(),
                    verse_index: state.session.cursor(),
                    verse_count: state.session.verse_count(),
                };
                session_state_lock = Arc::new(Mutex::new(state));
                if !send(&ws_sender, &init_msg).await {
                    error!("Failed to send session initialized message.");
                    return;
                }
            }
            _ => {
                error!("First message was not a valid Init message.");
                return;
            }
        }
    } else {
        error!("Client disconnected before sending Init message.");
        return;
    }

    // --- 2. Main Message Loop ---
    loop {
        if let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    handle_text_message(
                        text.to_string(),
                        &app_state,
                        &session_state_lock,
                        &ws_sender,
                    )
                    .await;
                }
                Message::Close(_) => {
                    info!("Client sent close message.");
                    break;
                }
                _ => {}
            }
        } else {
            info!("Client disconnected.");
            break;
        }
    }

    // --- 3. Cleanup ---
    session_state_lock.lock().await.rotate_token();
    info!("Memorization WebSocket connection closed.");
}

/// Dispatches one decoded `ClientMessage`.
async fn handle_text_message(
    text: String,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
            return;
        }
    };

    match client_msg {
        ClientMessage::Init { .. } => {
            warn!("Received subsequent Init message, which is ignored.");
        }
        ClientMessage::ToggleReveal => {
            let reveal_level = session_state_lock.lock().await.session.toggle_reveal();
            send(ws_sender, &ServerMessage::RevealChanged { reveal_level }).await;
        }
        ClientMessage::ToggleWord { index } => {
            let result = session_state_lock.lock().await.session.toggle_word(index);
            match result {
                Ok(hidden) => {
                    send(ws_sender, &ServerMessage::WordToggled { index, hidden }).await;
                }
                Err(e) => {
                    warn!("Rejected word toggle: {}", e);
                    send(
                        ws_sender,
                        &ServerMessage::Error {
                            message: e.to_string(),
                        },
                    )
                    .await;
                }
            }
        }
        ClientMessage::RequestQuiz => {
            spawn_quiz_task(app_state, session_state_lock, ws_sender).await;
        }
        ClientMessage::ExitQuiz => {
            session_state_lock.lock().await.session.exit_quiz();
            send(ws_sender, &ServerMessage::QuizClosed).await;
        }
        ClientMessage::RequestExplanation => {
            spawn_explanation_task(app_state, session_state_lock, ws_sender).await;
        }
        ClientMessage::CoachMessage { message } => {
            if message.trim().is_empty() {
                warn!("Ignoring empty coach message.");
                return;
            }
            spawn_coach_task(message, app_state, session_state_lock, ws_sender).await;
        }
        ClientMessage::Rate { rating } => {
            handle_rate(rating, app_state, session_state_lock, ws_sender).await;
        }
        ClientMessage::NextVerse => {
            let mut session = session_state_lock.lock().await;
            if session.session.next_verse() {
                session.rotate_token();
                let msg = verse_changed(&session);
                drop(session);
                send(ws_sender, &msg).await;
            }
        }
        ClientMessage::PrevVerse => {
            let mut session = session_state_lock.lock().await;
            if session.session.prev_verse() {
                session.rotate_token();
                let msg = verse_changed(&session);
                drop(session);
                send(ws_sender, &msg).await;
            }
        }
    }
}

/// Applies a self-rating: loads the prior progress record, runs the review
/// step, persists the result, and reports the cursor movement.
async fn handle_rate(
    rating: Rating,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let mut session = session_state_lock.lock().await;
    let user_id = session.user_id;
    let verse_id = session.session.current_verse().id.clone();

    // A progress read failure degrades to a fresh record rather than
    // blocking the rating.
    let prior = match app_state.db.get_verse_progress(user_id, &verse_id).await {
        Ok(prior) => prior,
        Err(e) => {
            warn!(%user_id, %verse_id, "failed to load verse progress, treating as fresh: {e}");
            None
        }
    };

    let outcome = session.session.rate(
        rating,
        prior,
        app_state.scheduler.as_ref(),
        app_state.clock.now(),
    );

    if let Err(e) = app_state
        .db
        .upsert_verse_progress(user_id, &outcome.progress)
        .await
    {
        error!(%user_id, %verse_id, "failed to persist verse progress: {e}");
    }

    if outcome.advanced || outcome.surah_completed {
        session.rotate_token();
    }

    let progress_msg = ServerMessage::ProgressUpdated {
        progress: outcome.progress,
        advanced: outcome.advanced,
    };
    let follow_up = if outcome.surah_completed {
        Some(ServerMessage::SurahComplete)
    } else if outcome.advanced {
        Some(verse_changed(&session))
    } else {
        None
    };
    drop(session);

    send(ws_sender, &progress_msg).await;
    if let Some(msg) = follow_up {
        send(ws_sender, &msg).await;
    }
}

/// Serves the quiz for the current verse, calling the external service at most
/// once per verse per session. The call runs in a background task tied to the
/// session's cancellation token; moving the cursor mid-flight orphans it.
async fn spawn_quiz_task(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let (verse, token) = {
        let mut session = session_state_lock.lock().await;
        if let Some(card) = session.session.cached_quiz() {
            let card = card.clone();
            session.session.store_quiz(card.clone());
            drop(session);
            send(ws_sender, &ServerMessage::QuizReady { card }).await;
            return;
        }
        (
            session.session.current_verse().clone(),
            session.cancellation_token.clone(),
        )
    };

    let app_state = app_state.clone();
    let session_state_lock = session_state_lock.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(async move {
        let result = tokio::select! {
            _ = token.cancelled() => {
                info!(verse_id = %verse.id, "quiz task cancelled by cursor move");
                return;
            }
            result = app_state.quiz_adapter.generate_quiz(&verse) => result,
        };

        let card = match result {
            Ok(card) if card.is_well_formed() => card,
            Ok(_) => {
                warn!(verse_id = %verse.id, "quiz service returned a malformed card");
                send_fallback(&ws_sender, QUIZ_FALLBACK).await;
                return;
            }
            Err(e) => {
                error!(verse_id = %verse.id, "quiz generation failed: {e}");
                send_fallback(&ws_sender, QUIZ_FALLBACK).await;
                return;
            }
        };

        let mut session = session_state_lock.lock().await;
        // The cursor may have raced past the token rotation.
        if session.session.current_verse().id != verse.id {
            return;
        }
        session.session.store_quiz(card.clone());
        drop(session);
        send(&ws_sender, &ServerMessage::QuizReady { card }).await;
    });
}

/// Serves the explanation for the current verse with the same caching and
/// cancellation contract as the quiz path.
async fn spawn_explanation_task(
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let (verse, token) = {
        let session = session_state_lock.lock().await;
        if let Some(text) = session.session.cached_explanation() {
            let text = text.to_string();
            drop(session);
            send(ws_sender, &ServerMessage::ExplanationReady { text }).await;
            return;
        }
        (
            session.session.current_verse().clone(),
            session.cancellation_token.clone(),
        )
    };

    let app_state = app_state.clone();
    let session_state_lock = session_state_lock.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(async move {
        let result = tokio::select! {
            _ = token.cancelled() => {
                info!(verse_id = %verse.id, "explanation task cancelled by cursor move");
                return;
            }
            result = explain_nonempty(&app_state, &verse) => result,
        };

        let text = match result {
            Ok(text) => text,
            Err(e) => {
                error!(verse_id = %verse.id, "explanation failed: {e}");
                send_fallback(&ws_sender, EXPLANATION_FALLBACK).await;
                return;
            }
        };

        let mut session = session_state_lock.lock().await;
        if session.session.current_verse().id != verse.id {
            return;
        }
        session.session.store_explanation(text.clone());
        drop(session);
        send(&ws_sender, &ServerMessage::ExplanationReady { text }).await;
    });
}

/// Answers one coach question in the background. Replies are not cached and
/// not tied to the cursor token: a chat answer is still worth delivering
/// after the student moves to another verse.
async fn spawn_coach_task(
    message: String,
    app_state: &Arc<AppState>,
    session_state_lock: &Arc<Mutex<SessionState>>,
    ws_sender: &WsSender,
) {
    let context = session_state_lock.lock().await.session.coach_context();

    let app_state = app_state.clone();
    let ws_sender = ws_sender.clone();
    tokio::spawn(async move {
        let text = match app_state.coach_adapter.coach_reply(&message, &context).await {
            Ok(text) => text,
            Err(e) => {
                error!("coach reply failed: {e}");
                COACH_FALLBACK.to_string()
            }
        };
        send(&ws_sender, &ServerMessage::CoachReply { text }).await;
    });
}

async fn explain_nonempty(
    app_state: &Arc<AppState>,
    verse: &Verse,
) -> dua_companion_core::ports::PortResult<String> {
    let text = app_state.explanation_adapter.explain_verse(verse).await?;
    if text.trim().is_empty() {
        return Err(dua_companion_core::ports::PortError::Unexpected(
            "explanation service returned no text".to_string(),
        ));
    }
    Ok(text)
}

async fn send_fallback(ws_sender: &WsSender, message: &str) {
    send(
        ws_sender,
        &ServerMessage::Fallback {
            message: message.to_string(),
        },
    )
    .await;
}
