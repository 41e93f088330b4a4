//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for the memorization mode.

use dua_companion_core::domain::{QuizCard, Rating, Verse, VerseProgress};
use dua_companion_core::memorization::RevealLevel;
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a memorization session. Must be the first message sent on the
    /// connection. `start_verse` optionally positions the cursor.
    Init {
        surah_id: String,
        start_verse: Option<String>,
    },

    /// Advances the reveal level one step along the Full -> Partial -> Hidden cycle.
    ToggleReveal,

    /// Flips the manual visibility override of one word of the current verse.
    ToggleWord { index: usize },

    /// Requests quiz data for the current verse. Served from the session
    /// cache when the verse was quizzed before.
    RequestQuiz,

    /// Leaves quiz mode without discarding the cached card.
    ExitQuiz,

    /// Requests a short explanation of the current verse.
    RequestExplanation,

    /// Sends one free-text question to the memorization coach.
    CoachMessage { message: String },

    /// Applies a self-rating to the current verse and advances the cursor.
    Rate { rating: Rating },

    /// Moves the cursor forward without rating.
    NextVerse,

    /// Moves the cursor backward.
    PrevVerse,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms successful session initialization.
    SessionInitialized {
        surah_id: String,
        verse: Verse,
        verse_index: usize,
        verse_count: usize,
    },

    /// The cursor moved to a different verse; per-verse state was reset.
    VerseChanged {
        verse: Verse,
        verse_index: usize,
        verse_count: usize,
        reveal_level: RevealLevel,
    },

    /// The reveal level advanced.
    RevealChanged { reveal_level: RevealLevel },

    /// A single word's manual visibility override flipped.
    WordToggled { index: usize, hidden: bool },

    /// Quiz data for the current verse is ready.
    QuizReady { card: QuizCard },

    /// Quiz mode was left; the card stays cached for this session.
    QuizClosed,

    /// An explanation of the current verse is ready.
    ExplanationReady { text: String },

    /// The coach answered. On a failed coach call this carries the static
    /// apology text instead.
    CoachReply { text: String },

    /// An external call failed; the client should show this static message
    /// and keep its current state.
    Fallback { message: String },

    /// A rating was applied and the updated progress record persisted.
    ProgressUpdated {
        progress: VerseProgress,
        advanced: bool,
    },

    /// The last verse was rated under the mark-complete policy.
    SurahComplete,

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_deserialize_from_tagged_json() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"init","surah_id":"al-fatiha","start_verse":null}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::Init { surah_id, .. } if surah_id == "al-fatiha"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"rate","rating":"easy"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Rate {
                rating: Rating::Easy
            }
        ));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"toggle_word","index":3}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ToggleWord { index: 3 }));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"coach_message","message":"How do I keep going?"}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::CoachMessage { .. }));
    }

    #[test]
    fn server_messages_serialize_with_type_tag() {
        let json = serde_json::to_string(&ServerMessage::RevealChanged {
            reveal_level: RevealLevel::Partial,
        })
        .unwrap();
        assert!(json.contains(r#""type":"reveal_changed""#));
        assert!(json.contains(r#""reveal_level":"partial""#));
    }
}
