//! Turn-taking state machine states and the shared session state.
//!
//! [`TurnState`] drives the controller. Presentation reads it, together with
//! the live transcript and a snapshot of the conversation log, through
//! [`SharedState`].
//!
//! [`SharedState`] is a type alias for `Arc<Mutex<SessionState>>`, cheap to
//! clone and safe to share across threads. Only the controller writes it.

use std::sync::{Arc, Mutex};

use crate::conversation::LogSnapshot;

// ---------------------------------------------------------------------------
// TurnState
// ---------------------------------------------------------------------------

/// States of the turn controller.
///
/// ```text
/// Idle ──start──▶ Listening ──delta──▶ Debouncing ──silence──▶ Sending
///                    ▲   ▲                 │ (delta restarts timer)   │
///                    │   └──empty utterance┘                          │
///                    │                                  ┌── reply ────┤
///                    │                                  ▼             │ rate-limit
///                    └──────── playback complete ── Speaking          ▼
///                    └──────── failure / 2nd rate-limit ──────── Backoff ──delay──▶ Sending
/// Listening / Debouncing ──stop──▶ Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TurnState {
    /// Capture is off; waiting for an explicit start.
    #[default]
    Idle,

    /// Capture is on and the transcript is empty or unchanged.
    Listening,

    /// A transcript update arrived; waiting for the silence threshold.
    Debouncing,

    /// A message is in flight to the chat endpoint.
    Sending,

    /// The reply is playing on the output sink.
    Speaking,

    /// Rate-limited; holding the message for one delayed retry.
    Backoff,
}

impl TurnState {
    /// `true` while a message is on its way to the chat endpoint or waiting
    /// for its retry. Presentation shows a loading indicator.
    ///
    /// ```
    /// use speakflow::turn::TurnState;
    ///
    /// assert!(TurnState::Sending.is_loading());
    /// assert!(TurnState::Backoff.is_loading());
    /// assert!(!TurnState::Listening.is_loading());
    /// ```
    pub fn is_loading(&self) -> bool {
        matches!(self, TurnState::Sending | TurnState::Backoff)
    }

    /// `true` while the capture source should be running.
    pub fn is_listening(&self) -> bool {
        matches!(self, TurnState::Listening | TurnState::Debouncing)
    }

    /// A short human-readable label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            TurnState::Idle => "Tap to speak",
            TurnState::Listening => "Listening...",
            TurnState::Debouncing => "Listening...",
            TurnState::Sending => "Thinking...",
            TurnState::Speaking => "Speaking...",
            TurnState::Backoff => "Waiting to retry...",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Everything presentation needs about the running session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current controller state.
    pub state: TurnState,

    /// In-progress utterance as last reported by the capture source.
    pub transcript: String,

    /// Mirrors [`TurnState::is_loading`].
    pub loading: bool,

    /// Read-only view of the conversation log.
    pub log: LogSnapshot,

    /// Set when the session ended on an invariant violation.
    pub fatal_error: Option<String>,
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionState`].
///
/// Lock for a short critical section; do **not** hold the lock across
/// `.await` points.
pub type SharedState = Arc<Mutex<SessionState>>;

/// Construct a new [`SharedState`] wrapping a default [`SessionState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::default()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_idle() {
        assert_eq!(TurnState::default(), TurnState::Idle);
    }

    #[test]
    fn only_sending_and_backoff_are_loading() {
        let loading: Vec<TurnState> = [
            TurnState::Idle,
            TurnState::Listening,
            TurnState::Debouncing,
            TurnState::Sending,
            TurnState::Speaking,
            TurnState::Backoff,
        ]
        .into_iter()
        .filter(TurnState::is_loading)
        .collect();
        assert_eq!(loading, [TurnState::Sending, TurnState::Backoff]);
    }

    #[test]
    fn listening_states() {
        assert!(TurnState::Listening.is_listening());
        assert!(TurnState::Debouncing.is_listening());
        assert!(!TurnState::Speaking.is_listening());
        assert!(!TurnState::Idle.is_listening());
    }

    #[test]
    fn labels() {
        assert_eq!(TurnState::Idle.label(), "Tap to speak");
        assert_eq!(TurnState::Debouncing.label(), "Listening...");
        assert_eq!(TurnState::Sending.label(), "Thinking...");
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn shared_state_can_be_cloned_and_mutated() {
        let state = new_shared_state();
        let state2 = Arc::clone(&state);

        state.lock().unwrap().state = TurnState::Listening;
        assert_eq!(state2.lock().unwrap().state, TurnState::Listening);
        assert!(state2.lock().unwrap().log.is_empty());
    }
}
