//! Terminal [`OutputSink`] that simulates speech playback.
//!
//! The reply text itself is printed by the presenter from the conversation
//! log; this sink only holds the "speaker" for as long as reading the reply
//! aloud would take, then reports [`ControllerEvent::PlaybackComplete`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::speech::{DeviceError, OutputSink};
use crate::turn::ControllerEvent;

const MIN_PLAYBACK: Duration = Duration::from_millis(400);

/// How long `text` takes to read aloud at `words_per_minute`.
///
/// ```
/// use std::time::Duration;
/// use speakflow::console::estimate_duration;
///
/// assert_eq!(estimate_duration("one two three four", 120), Duration::from_secs(2));
/// ```
pub fn estimate_duration(text: &str, words_per_minute: u32) -> Duration {
    let words = text.split_whitespace().count() as u64;
    let wpm = u64::from(words_per_minute.max(1));
    Duration::from_millis(words * 60_000 / wpm).max(MIN_PLAYBACK)
}

pub struct ConsoleSink {
    events: mpsc::Sender<ControllerEvent>,
    words_per_minute: u32,
    speaking: Arc<AtomicBool>,
    /// Bumped on every speak/cancel so a finished task from an earlier
    /// utterance cannot report completion for the current one.
    generation: Arc<AtomicU64>,
    playback: Option<JoinHandle<()>>,
}

impl ConsoleSink {
    pub fn new(events: mpsc::Sender<ControllerEvent>, words_per_minute: u32) -> Self {
        Self {
            events,
            words_per_minute,
            speaking: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            playback: None,
        }
    }
}

impl OutputSink for ConsoleSink {
    fn speak(&mut self, text: &str, locale: &str) -> Result<(), DeviceError> {
        let handle = Handle::try_current().map_err(|e| DeviceError::Playback(e.to_string()))?;
        self.cancel()?;

        let duration = estimate_duration(text, self.words_per_minute);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("console: speaking {} chars ({locale}) for {duration:?}", text.len());

        let speaking = Arc::clone(&self.speaking);
        let current = Arc::clone(&self.generation);
        let events = self.events.clone();

        speaking.store(true, Ordering::SeqCst);
        self.playback = Some(handle.spawn(async move {
            tokio::time::sleep(duration).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            speaking.store(false, Ordering::SeqCst);
            let _ = events.send(ControllerEvent::PlaybackComplete).await;
        }));
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), DeviceError> {
        if let Some(task) = self.playback.take() {
            task.abort();
            self.generation.fetch_add(1, Ordering::SeqCst);
            log::debug!("console: playback cancelled");
        }
        self.speaking.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}

impl Drop for ConsoleSink {
    fn drop(&mut self) {
        if let Some(task) = self.playback.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_scales_with_word_count() {
        assert_eq!(estimate_duration("a b c", 60), Duration::from_secs(3));
        assert_eq!(estimate_duration("", 170), MIN_PLAYBACK);
        assert_eq!(estimate_duration("word", 0), Duration::from_secs(60));
    }

    #[test]
    fn speak_without_runtime_is_a_playback_error() {
        let (tx, _rx) = mpsc::channel(4);
        let mut sink = ConsoleSink::new(tx, 170);
        assert!(matches!(
            sink.speak("hello", "en-US"),
            Err(DeviceError::Playback(_))
        ));
        assert!(!sink.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_estimated_duration() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ConsoleSink::new(tx, 60);

        sink.speak("one two", "en-US").unwrap();
        assert!(sink.is_speaking());

        tokio::time::sleep(Duration::from_millis(1_900)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(rx.recv().await, Some(ControllerEvent::PlaybackComplete));
        assert!(!sink.is_speaking());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_completion() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ConsoleSink::new(tx, 60);

        sink.speak("one two", "en-US").unwrap();
        sink.cancel().unwrap();
        assert!(!sink.is_speaking());

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn speaking_again_replaces_previous_utterance() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut sink = ConsoleSink::new(tx, 60);

        sink.speak("one", "en-US").unwrap();
        sink.speak("one two three", "en-US").unwrap();

        tokio::time::sleep(Duration::from_millis(2_000)).await;
        assert!(rx.try_recv().is_err(), "first utterance must not complete");
        assert!(sink.is_speaking());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(rx.recv().await, Some(ControllerEvent::PlaybackComplete));
    }
}
