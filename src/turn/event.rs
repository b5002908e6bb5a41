//! Events processed by the turn controller.

use crate::chat::ChatError;
use crate::speech::DeviceError;

/// Operator commands and device notifications delivered to
/// [`TurnController::run`](super::TurnController::run).
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Operator: start listening (`Idle → Listening`).
    Start,
    /// Operator: stop whatever is happening and go `Idle`.
    Stop,
    /// Operator: the single microphone button. Stops while listening,
    /// starts while idle, ignored otherwise.
    Toggle,
    /// Capture source: cumulative transcript of the current utterance.
    TranscriptDelta(String),
    /// Capture source: the recognizer considers the utterance final.
    /// Informational only; the silence threshold decides when to send.
    FinalUtterance,
    /// Output sink: the current utterance finished playing.
    PlaybackComplete,
    /// Either device failed.
    DeviceError(DeviceError),
    /// End the session.
    Shutdown,
}

/// Events the controller schedules for itself.
#[derive(Debug)]
pub(crate) enum Internal {
    SilenceElapsed(u64),
    BackoffElapsed(u64),
    Reply {
        request: u64,
        result: Result<String, ChatError>,
    },
}
