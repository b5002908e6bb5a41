//! Turn-taking controller for SpeakFlow.
//!
//! This module decides when the session is listening, when an utterance is
//! finished, when a message is in flight, when the reply is playing, and how
//! to back off after a rate-limit.
//!
//! # Architecture
//!
//! ```text
//! CaptureSource ──TranscriptDelta──┐
//! OutputSink ───PlaybackComplete───┤
//! operator ──Start/Stop/Toggle─────┤ (mpsc)
//!                                  ▼
//!                      TurnController::run()   ← async tokio task
//!                        │  ├─ silence / backoff Timers ──┐
//!                        │  └─ spawned ChatTransport::send ┤ (internal channel)
//!                        │                                 ▼
//!                        ├─▶ ConversationLog               handled in order
//!                        └─▶ SharedState (Arc<Mutex<SessionState>>) ← read by presentation
//! ```

pub mod controller;
pub mod event;
pub mod state;
pub(crate) mod timer;


// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::{ControllerError, TurnController};
pub use event::ControllerEvent;
pub use state::{new_shared_state, SessionState, SharedState, TurnState};
