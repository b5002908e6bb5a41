//! Recording test doubles for [`CaptureSource`] and [`OutputSink`].
//!
//! Both doubles share one [`DeviceProbe`] so tests can inspect the exact
//! command sequence and catch capture and playback ever overlapping.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::device::{CaptureSource, DeviceError, OutputSink};
use crate::turn::ControllerEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CaptureStart(String),
    CaptureStop,
    Speak(String),
    CancelSpeech,
}

#[derive(Debug, Default)]
pub struct ProbeState {
    pub capture_active: bool,
    pub speaking: bool,
    pub overlapped: bool,
    pub calls: Vec<DeviceCall>,
    pub fail_capture_start: bool,
    pub fail_speak: bool,
}

impl ProbeState {
    fn check_overlap(&mut self) {
        if self.capture_active && self.speaking {
            self.overlapped = true;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceProbe(Arc<Mutex<ProbeState>>);

impl DeviceProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn devices(&self) -> (MockCapture, MockSink) {
        (MockCapture(self.clone()), MockSink(self.clone()))
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut ProbeState) -> R) -> R {
        f(&mut self.0.lock().unwrap())
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.with(|s| s.calls.clone())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.with(|s| {
            s.calls
                .iter()
                .filter_map(|c| match c {
                    DeviceCall::Speak(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn capture_starts(&self) -> usize {
        self.with(|s| {
            s.calls
                .iter()
                .filter(|c| matches!(c, DeviceCall::CaptureStart(_)))
                .count()
        })
    }

    pub fn capture_active(&self) -> bool {
        self.with(|s| s.capture_active)
    }

    pub fn speaking(&self) -> bool {
        self.with(|s| s.speaking)
    }

    pub fn overlapped(&self) -> bool {
        self.with(|s| s.overlapped)
    }

    /// Finish the current utterance the way a real sink would: clear the
    /// speaking flag, then notify the controller.
    pub async fn finish_playback(&self, events: &mpsc::Sender<ControllerEvent>) {
        let was_speaking = self.with(|s| std::mem::replace(&mut s.speaking, false));
        if was_speaking {
            events.send(ControllerEvent::PlaybackComplete).await.unwrap();
        }
    }
}

pub struct MockCapture(DeviceProbe);

impl CaptureSource for MockCapture {
    fn start(&mut self, locale: &str) -> Result<(), DeviceError> {
        self.0.with(|s| {
            s.calls.push(DeviceCall::CaptureStart(locale.to_string()));
            if s.fail_capture_start {
                return Err(DeviceError::Capture("microphone unavailable".into()));
            }
            s.capture_active = true;
            s.check_overlap();
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.0.with(|s| {
            s.calls.push(DeviceCall::CaptureStop);
            s.capture_active = false;
        });
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.0.capture_active()
    }
}

pub struct MockSink(DeviceProbe);

impl OutputSink for MockSink {
    fn speak(&mut self, text: &str, _locale: &str) -> Result<(), DeviceError> {
        self.0.with(|s| {
            s.calls.push(DeviceCall::Speak(text.to_string()));
            if s.fail_speak {
                return Err(DeviceError::Playback("audio device lost".into()));
            }
            s.speaking = true;
            s.check_overlap();
            Ok(())
        })
    }

    fn cancel(&mut self) -> Result<(), DeviceError> {
        self.0.with(|s| {
            s.calls.push(DeviceCall::CancelSpeech);
            s.speaking = false;
        });
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.0.speaking()
    }
}
