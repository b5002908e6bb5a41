//! Capability traits for the speech devices the turn controller owns.
//!
//! Commands flow controller → device through these traits. Device
//! notifications (transcript updates, playback completion, failures) flow
//! back as [`ControllerEvent`]s on the sender each device is built with.
//!
//! [`ControllerEvent`]: crate::turn::ControllerEvent

use thiserror::Error;

/// Failures reported by a speech device.
///
/// The controller treats both like a failed transport call: the failure is
/// logged as a System turn and the session degrades to `Idle`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("speech capture failed: {0}")]
    Capture(String),

    #[error("speech playback failed: {0}")]
    Playback(String),
}

/// Continuous speech-to-text source.
///
/// While active it emits `ControllerEvent::TranscriptDelta` carrying the
/// cumulative transcript of the current utterance.
pub trait CaptureSource: Send {
    fn start(&mut self, locale: &str) -> Result<(), DeviceError>;

    fn stop(&mut self) -> Result<(), DeviceError>;

    fn is_active(&self) -> bool;
}

/// Text-to-speech sink playing one utterance at a time.
///
/// Emits `ControllerEvent::PlaybackComplete` when an utterance finishes on
/// its own. A cancelled utterance emits nothing.
pub trait OutputSink: Send {
    /// Start speaking `text`. Any utterance still playing is cancelled first.
    fn speak(&mut self, text: &str, locale: &str) -> Result<(), DeviceError>;

    fn cancel(&mut self) -> Result<(), DeviceError>;

    fn is_speaking(&self) -> bool;
}
