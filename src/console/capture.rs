//! Stdin-backed [`CaptureSource`].
//!
//! A dedicated OS thread reads lines from the terminal. Slash commands are
//! forwarded as operator events; any other line counts as recognised speech
//! and extends the cumulative transcript of the current utterance, which is
//! sent as [`ControllerEvent::TranscriptDelta`] while capture is active.
//!
//! Reading from stdin blocks and cannot be interrupted, so the thread lives
//! until end of input or process exit. Dropping [`ConsoleCapture`] sets a
//! stop flag that makes the thread discard further input.

use std::io::{self, BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::speech::{CaptureSource, DeviceError};
use crate::turn::ControllerEvent;

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// One line of terminal input, interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// An operator command.
    Command(ControllerEvent),
    /// Recognised speech.
    Speech(String),
    /// An unknown slash command.
    Unknown(String),
}

/// Interpret one line of input.
///
/// An empty line acts as the microphone button.
///
/// ```
/// use speakflow::console::{parse_line, ConsoleInput};
/// use speakflow::turn::ControllerEvent;
///
/// assert_eq!(parse_line("/quit"), ConsoleInput::Command(ControllerEvent::Shutdown));
/// assert_eq!(parse_line(""), ConsoleInput::Command(ControllerEvent::Toggle));
/// assert_eq!(parse_line("hi there"), ConsoleInput::Speech("hi there".into()));
/// ```
pub fn parse_line(line: &str) -> ConsoleInput {
    let trimmed = line.trim();
    match trimmed {
        "" | "/toggle" => ConsoleInput::Command(ControllerEvent::Toggle),
        "/start" => ConsoleInput::Command(ControllerEvent::Start),
        "/stop" => ConsoleInput::Command(ControllerEvent::Stop),
        "/quit" | "/exit" => ConsoleInput::Command(ControllerEvent::Shutdown),
        cmd if cmd.starts_with('/') => ConsoleInput::Unknown(cmd.to_string()),
        speech => ConsoleInput::Speech(speech.to_string()),
    }
}

// ---------------------------------------------------------------------------
// ConsoleCapture
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Shared {
    active: AtomicBool,
    stopped: AtomicBool,
    transcript: Mutex<String>,
}

impl Shared {
    /// Append `speech` to the current utterance and return the new
    /// cumulative transcript, or `None` when capture is off.
    fn extend(&self, speech: &str) -> Option<String> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }
        let mut transcript = match self.transcript.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !transcript.is_empty() {
            transcript.push(' ');
        }
        transcript.push_str(speech);
        Some(transcript.clone())
    }

    fn reset(&self) {
        match self.transcript.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

/// Terminal stand-in for a speech recogniser.
pub struct ConsoleCapture {
    shared: Arc<Shared>,
    _thread: std::thread::JoinHandle<()>,
}

impl ConsoleCapture {
    /// Start reading lines from stdin, forwarding events on `events`.
    pub fn spawn(events: mpsc::Sender<ControllerEvent>) -> io::Result<Self> {
        Self::from_reader(BufReader::new(io::stdin()), events)
    }

    /// Like [`spawn`](Self::spawn) but reading from any line source.
    pub fn from_reader<R>(reader: R, events: mpsc::Sender<ControllerEvent>) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);

        let thread = std::thread::Builder::new()
            .name("console-capture".into())
            .spawn(move || pump(reader, &events, &thread_shared))?;

        Ok(Self {
            shared,
            _thread: thread,
        })
    }
}

/// Forward every line of `reader` until end of input, a send failure or the
/// stop flag. End of input ends the session.
fn pump<R: BufRead>(reader: R, events: &mpsc::Sender<ControllerEvent>, shared: &Shared) {
    for line in reader.lines() {
        if shared.stopped.load(Ordering::SeqCst) {
            return;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("console: failed to read input: {e}");
                let _ = events.blocking_send(ControllerEvent::DeviceError(DeviceError::Capture(
                    e.to_string(),
                )));
                return;
            }
        };

        let event = match parse_line(&line) {
            ConsoleInput::Command(event) => event,
            ConsoleInput::Speech(speech) => match shared.extend(&speech) {
                Some(transcript) => ControllerEvent::TranscriptDelta(transcript),
                None => {
                    log::info!("console: not listening; press Enter or type /start first");
                    continue;
                }
            },
            ConsoleInput::Unknown(cmd) => {
                log::warn!("console: unknown command {cmd} (try /start, /stop, /toggle, /quit)");
                continue;
            }
        };

        // blocking_send is safe to call from non-async threads.
        if events.blocking_send(event).is_err() {
            return;
        }
    }

    if !shared.stopped.load(Ordering::SeqCst) {
        log::info!("console: end of input");
        let _ = events.blocking_send(ControllerEvent::Shutdown);
    }
}

impl CaptureSource for ConsoleCapture {
    fn start(&mut self, locale: &str) -> Result<(), DeviceError> {
        if self.shared.stopped.load(Ordering::SeqCst) {
            return Err(DeviceError::Capture("console input closed".into()));
        }
        self.shared.reset();
        self.shared.active.store(true, Ordering::SeqCst);
        log::debug!("console: capture started ({locale})");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.reset();
        log::debug!("console: capture stopped");
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }
}

impl Drop for ConsoleCapture {
    fn drop(&mut self) {
        self.shared.stopped.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
