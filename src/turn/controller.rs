//! Turn controller — decides when the session listens, sends, speaks and
//! backs off.
//!
//! [`TurnController`] owns the conversation log, both speech devices and the
//! [`SharedState`], and responds to [`ControllerEvent`]s received over a
//! `tokio::sync::mpsc` channel.
//!
//! # Event flow
//!
//! ```text
//! TranscriptDelta ──▶ buffer, (re)arm silence timer            [Debouncing]
//! SilenceElapsed  ──▶ stop capture, trim buffer
//!                       ├─ empty → restart capture             [Listening]
//!                       └─ log User turn, spawn transport.send [Sending]
//! Reply Ok        ──▶ log Assistant turn, sink.speak           [Speaking]
//! Reply 429       ──▶ notice, arm backoff timer                [Backoff]
//!                       └─ BackoffElapsed → resend once        [Sending]
//! Reply Err       ──▶ log System turn, restart capture         [Listening]
//! PlaybackComplete──▶ restart capture                          [Listening]
//! ```
//!
//! Events are handled one at a time and every handler runs to completion;
//! the only concurrent work is the spawned transport call and the timers,
//! which report back through an internal channel.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::chat::{ChatError, ChatTransport};
use crate::config::ConversationConfig;
use crate::conversation::{Author, ConversationLog, LogError};
use crate::speech::{CaptureSource, DeviceError, OutputSink};

use super::event::{ControllerEvent, Internal};
use super::state::{SessionState, SharedState, TurnState};
use super::timer::Timer;

// ---------------------------------------------------------------------------
// ControllerError
// ---------------------------------------------------------------------------

/// Errors that end the session.
///
/// Transport and device failures never surface here; they become System
/// turns in the log. Only a broken log invariant is fatal.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("conversation log invariant violated: {0}")]
    InvariantViolation(#[from] LogError),
}

// ---------------------------------------------------------------------------
// In-flight bookkeeping
// ---------------------------------------------------------------------------

/// The one transport call allowed in flight.
struct Request {
    id: u64,
    message: String,
    retried: bool,
    /// Stop was issued after dispatch; the outcome is logged but drives no
    /// transition.
    detached: bool,
}

enum Flow {
    Continue,
    Shutdown,
}

enum Event {
    External(ControllerEvent),
    Internal(Internal),
}

// ---------------------------------------------------------------------------
// TurnController
// ---------------------------------------------------------------------------

/// Drives the listen → send → speak loop of one conversation session.
///
/// Create with [`TurnController::new`], then call [`run`](Self::run) inside
/// a tokio task.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use speakflow::chat::{ChatTransport, HttpChatTransport};
/// use speakflow::config::AppConfig;
/// use speakflow::console::{ConsoleCapture, ConsoleSink};
/// use speakflow::turn::{new_shared_state, ControllerEvent, TurnController};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = AppConfig::default();
/// let (events_tx, events_rx) = tokio::sync::mpsc::channel(64);
///
/// let transport: Arc<dyn ChatTransport> =
///     Arc::new(HttpChatTransport::from_config(&config.chat));
/// let capture = ConsoleCapture::spawn(events_tx.clone())?;
/// let sink = ConsoleSink::new(events_tx.clone(), config.console.words_per_minute);
///
/// let controller = TurnController::new(
///     config.conversation.clone(),
///     transport,
///     Box::new(capture),
///     Box::new(sink),
///     new_shared_state(),
/// );
/// events_tx.send(ControllerEvent::Start).await?;
/// controller.run(events_rx).await?;
/// # Ok(())
/// # }
/// ```
pub struct TurnController {
    config: ConversationConfig,
    transport: Arc<dyn ChatTransport>,
    capture: Box<dyn CaptureSource>,
    sink: Box<dyn OutputSink>,
    shared: SharedState,

    log: ConversationLog,
    state: TurnState,
    buffer: String,

    silence: Timer,
    backoff: Timer,
    in_flight: Option<Request>,
    /// Message held in `Backoff` for its single retry.
    retry: Option<String>,
    /// Utterance finalized while a detached call was still outstanding.
    queued: Option<String>,
    next_request: u64,

    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
}

impl TurnController {
    /// Create a controller for a new session.
    ///
    /// * `config`    — silence threshold, backoff delay, locale.
    /// * `transport` — chat endpoint (e.g. `HttpChatTransport`).
    /// * `capture`   — speech-to-text source, exclusively owned from now on.
    /// * `sink`      — text-to-speech sink, exclusively owned from now on.
    /// * `shared`    — state published for presentation after every event.
    pub fn new(
        config: ConversationConfig,
        transport: Arc<dyn ChatTransport>,
        capture: Box<dyn CaptureSource>,
        sink: Box<dyn OutputSink>,
        shared: SharedState,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            capture,
            sink,
            shared,
            log: ConversationLog::new(),
            state: TurnState::Idle,
            buffer: String::new(),
            silence: Timer::new("silence"),
            backoff: Timer::new("backoff"),
            in_flight: None,
            retry: None,
            queued: None,
            next_request: 0,
            internal_tx,
            internal_rx,
        }
    }

    /// Continue an existing conversation instead of starting empty.
    pub fn with_log(mut self, log: ConversationLog) -> Self {
        self.log = log;
        self
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until [`ControllerEvent::Shutdown`] arrives or `events` is closed.
    ///
    /// Devices are stopped and timers cancelled before returning. The only
    /// error is an invariant violation, which is also published as
    /// `SessionState::fatal_error`.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ControllerEvent>,
    ) -> Result<(), ControllerError> {
        self.publish();

        let outcome = loop {
            let event = tokio::select! {
                biased;
                Some(internal) = self.internal_rx.recv() => Event::Internal(internal),
                external = events.recv() => match external {
                    Some(event) => Event::External(event),
                    None => {
                        log::info!("turn: event channel closed");
                        break Ok(());
                    }
                },
            };

            match self.handle(event) {
                Ok(Flow::Continue) => self.publish(),
                Ok(Flow::Shutdown) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        self.release_devices();
        self.set_state(TurnState::Idle);
        if let Err(e) = &outcome {
            log::error!("turn: session halted: {e}");
            self.with_shared(|st| st.fatal_error = Some(e.to_string()));
        }
        self.publish();

        log::info!("turn: controller shutting down");
        outcome
    }

    fn handle(&mut self, event: Event) -> Result<Flow, ControllerError> {
        match event {
            Event::External(ControllerEvent::Start) => self.handle_start()?,
            Event::External(ControllerEvent::Stop) => self.handle_stop()?,
            Event::External(ControllerEvent::Toggle) => {
                if self.state.is_listening() {
                    self.handle_stop()?;
                } else if self.state == TurnState::Idle {
                    self.handle_start()?;
                } else {
                    log::debug!("turn: toggle ignored while {:?}", self.state);
                }
            }
            Event::External(ControllerEvent::TranscriptDelta(text)) => self.handle_delta(text),
            Event::External(ControllerEvent::FinalUtterance) => {
                log::debug!("turn: recognizer marked utterance final");
            }
            Event::External(ControllerEvent::PlaybackComplete) => self.handle_playback_complete()?,
            Event::External(ControllerEvent::DeviceError(e)) => self.device_failed(e)?,
            Event::External(ControllerEvent::Shutdown) => {
                log::info!("turn: shutdown requested");
                return Ok(Flow::Shutdown);
            }
            Event::Internal(Internal::SilenceElapsed(id)) => self.handle_silence(id)?,
            Event::Internal(Internal::BackoffElapsed(id)) => self.handle_backoff_elapsed(id)?,
            Event::Internal(Internal::Reply { request, result }) => {
                self.handle_reply(request, result)?
            }
        }
        Ok(Flow::Continue)
    }

    // -----------------------------------------------------------------------
    // Operator commands
    // -----------------------------------------------------------------------

    fn handle_start(&mut self) -> Result<(), ControllerError> {
        if self.state != TurnState::Idle {
            log::debug!("turn: start ignored while {:?}", self.state);
            return Ok(());
        }
        self.listen()
    }

    fn handle_stop(&mut self) -> Result<(), ControllerError> {
        match self.state {
            TurnState::Idle => {
                log::debug!("turn: already idle");
                return Ok(());
            }
            TurnState::Listening | TurnState::Debouncing => {}
            TurnState::Sending => {
                if let Some(request) = self.in_flight.as_mut() {
                    log::info!("turn: stopped while sending; reply will not be spoken");
                    request.detached = true;
                }
                if let Some(message) = self.queued.take() {
                    self.record(
                        Author::System,
                        format!("Stopped before sending \"{message}\"."),
                    )?;
                }
            }
            TurnState::Speaking => {}
            TurnState::Backoff => {
                if let Some(message) = self.retry.take() {
                    self.record(
                        Author::System,
                        format!("Retry cancelled; \"{message}\" was not sent."),
                    )?;
                }
            }
        }

        self.release_devices();
        self.buffer.clear();
        self.set_state(TurnState::Idle);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Capture
    // -----------------------------------------------------------------------

    fn handle_delta(&mut self, text: String) {
        if text == self.buffer {
            return;
        }
        self.buffer = text;

        match self.state {
            TurnState::Listening | TurnState::Debouncing if !self.buffer.is_empty() => {
                self.silence.arm(
                    self.config.silence_threshold(),
                    &self.internal_tx,
                    Internal::SilenceElapsed,
                );
                self.set_state(TurnState::Debouncing);
            }
            TurnState::Debouncing => {
                self.silence.cancel();
                self.set_state(TurnState::Listening);
            }
            _ => log::trace!("turn: transcript buffered while {:?}", self.state),
        }
    }

    fn handle_silence(&mut self, id: u64) -> Result<(), ControllerError> {
        if !self.silence.is_current(id) || self.state != TurnState::Debouncing {
            log::trace!("turn: stale silence timer #{id}");
            return Ok(());
        }
        self.silence.clear();

        if self.capture.is_active() {
            if let Err(e) = self.capture.stop() {
                return self.device_failed(e);
            }
        }

        let message = self.buffer.trim().to_string();
        self.buffer.clear();

        if message.is_empty() {
            log::debug!("turn: empty utterance suppressed");
            return self.listen();
        }

        if self.in_flight.is_some() {
            log::debug!("turn: waiting for detached request before sending");
            self.queued = Some(message);
            self.set_state(TurnState::Sending);
            return Ok(());
        }

        self.record(Author::User, message.clone())?;
        self.dispatch(message, false);
        Ok(())
    }

    /// Enter `Listening`, starting capture unless it is already running.
    fn listen(&mut self) -> Result<(), ControllerError> {
        if self.sink.is_speaking() {
            if let Err(e) = self.sink.cancel() {
                return self.device_failed(e);
            }
        }

        if self.capture.is_active() {
            log::debug!("turn: capture already active, not restarting");
            self.set_state(TurnState::Listening);
            if !self.buffer.is_empty() {
                self.silence.arm(
                    self.config.silence_threshold(),
                    &self.internal_tx,
                    Internal::SilenceElapsed,
                );
                self.set_state(TurnState::Debouncing);
            }
            return Ok(());
        }

        self.buffer.clear();
        match self.capture.start(&self.config.locale) {
            Ok(()) => {
                self.set_state(TurnState::Listening);
                Ok(())
            }
            Err(e) => self.device_failed(e),
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, message: String, retried: bool) {
        let id = self.next_request;
        self.next_request += 1;

        log::debug!("turn: dispatching request #{id} (retry={retried})");

        let transport = Arc::clone(&self.transport);
        let tx = self.internal_tx.clone();
        let outgoing = message.clone();
        tokio::spawn(async move {
            let result = transport.send(&outgoing).await;
            let _ = tx.send(Internal::Reply {
                request: id,
                result,
            });
        });

        self.in_flight = Some(Request {
            id,
            message,
            retried,
            detached: false,
        });
        self.set_state(TurnState::Sending);
    }

    fn handle_reply(
        &mut self,
        id: u64,
        result: Result<String, ChatError>,
    ) -> Result<(), ControllerError> {
        let request = match self.in_flight.take() {
            Some(request) if request.id == id => request,
            other => {
                log::warn!("turn: reply for unknown request #{id}");
                self.in_flight = other;
                return Ok(());
            }
        };

        if request.detached {
            self.record_detached(&request, result)?;
            if let Some(message) = self.queued.take() {
                self.record(Author::User, message.clone())?;
                self.dispatch(message, false);
            }
            return Ok(());
        }

        match result {
            Ok(reply) => {
                self.record(Author::Assistant, reply.clone())?;
                self.speak(&reply)
            }
            Err(e) if e.is_rate_limited() && !request.retried => {
                log::warn!(
                    "turn: rate limited, retrying in {}s",
                    self.config.backoff_secs
                );
                self.record(
                    Author::System,
                    format!(
                        "Quota exceeded. Retrying in {} seconds...",
                        self.config.backoff_secs
                    ),
                )?;
                self.retry = Some(request.message);
                self.backoff.arm(
                    self.config.backoff_delay(),
                    &self.internal_tx,
                    Internal::BackoffElapsed,
                );
                self.set_state(TurnState::Backoff);
                Ok(())
            }
            Err(e) if e.is_rate_limited() => {
                log::warn!("turn: rate limited again, giving up on this message");
                self.record(
                    Author::System,
                    format!(
                        "Quota still exceeded; \"{}\" was not sent. Please try again later.",
                        request.message
                    ),
                )?;
                self.listen()
            }
            Err(e) => {
                log::warn!("turn: chat request failed: {e}");
                self.record(
                    Author::System,
                    format!("Failed to fetch response ({e}). Please try again."),
                )?;
                self.listen()
            }
        }
    }

    /// Log the outcome of a request issued before a stop. Nothing is
    /// spoken, retried or re-armed.
    fn record_detached(
        &mut self,
        request: &Request,
        result: Result<String, ChatError>,
    ) -> Result<(), ControllerError> {
        match result {
            Ok(reply) => {
                self.record(Author::Assistant, reply)?;
            }
            Err(e) => {
                self.record(
                    Author::System,
                    format!("\"{}\" was not answered ({e}).", request.message),
                )?;
            }
        }
        Ok(())
    }

    fn handle_backoff_elapsed(&mut self, id: u64) -> Result<(), ControllerError> {
        if !self.backoff.is_current(id) || self.state != TurnState::Backoff {
            log::trace!("turn: stale backoff timer #{id}");
            return Ok(());
        }
        self.backoff.clear();

        if let Some(message) = self.retry.take() {
            log::info!("turn: retrying after backoff");
            self.dispatch(message, true);
        } else {
            self.listen()?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    fn speak(&mut self, reply: &str) -> Result<(), ControllerError> {
        if self.capture.is_active() {
            if let Err(e) = self.capture.stop() {
                return self.device_failed(e);
            }
        }
        if self.sink.is_speaking() {
            if let Err(e) = self.sink.cancel() {
                return self.device_failed(e);
            }
        }

        match self.sink.speak(reply, &self.config.locale) {
            Ok(()) => {
                self.set_state(TurnState::Speaking);
                Ok(())
            }
            Err(e) => self.device_failed(e),
        }
    }

    fn handle_playback_complete(&mut self) -> Result<(), ControllerError> {
        if self.state != TurnState::Speaking {
            log::trace!("turn: playback completion ignored while {:?}", self.state);
            return Ok(());
        }
        if self.config.auto_resume {
            self.listen()
        } else {
            self.set_state(TurnState::Idle);
            Ok(())
        }
    }

    // -----------------------------------------------------------------------
    // Failures and teardown
    // -----------------------------------------------------------------------

    /// Degrade to `Idle` with a System turn describing the device failure.
    fn device_failed(&mut self, error: DeviceError) -> Result<(), ControllerError> {
        log::error!("turn: {error}");

        if let Some(request) = self.in_flight.as_mut() {
            request.detached = true;
        }
        self.retry = None;
        self.queued = None;
        self.release_devices();
        self.buffer.clear();
        self.set_state(TurnState::Idle);

        self.record(Author::System, format!("Speech device error: {error}"))?;
        Ok(())
    }

    /// Cancel timers and stop both devices, ignoring device errors.
    fn release_devices(&mut self) {
        self.silence.cancel();
        self.backoff.cancel();

        if self.capture.is_active() {
            if let Err(e) = self.capture.stop() {
                log::warn!("turn: failed to stop capture: {e}");
            }
        }
        if self.sink.is_speaking() {
            if let Err(e) = self.sink.cancel() {
                log::warn!("turn: failed to cancel playback: {e}");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn set_state(&mut self, next: TurnState) {
        let previous = self.state;
        if previous == TurnState::Debouncing && next != TurnState::Debouncing {
            self.silence.cancel();
        }
        if previous == TurnState::Backoff && next != TurnState::Backoff {
            self.backoff.cancel();
        }
        if previous != next {
            log::debug!("turn: {previous:?} → {next:?}");
        }
        self.state = next;
    }

    fn record(&mut self, author: Author, text: String) -> Result<(), ControllerError> {
        self.log.record(author, text)?;
        Ok(())
    }

    fn publish(&self) {
        let state = self.state;
        let transcript = self.buffer.clone();
        let log = self.log.snapshot();
        self.with_shared(move |st| {
            st.state = state;
            st.loading = state.is_loading();
            st.transcript = transcript;
            st.log = log;
        });
    }

    fn with_shared(&self, f: impl FnOnce(&mut SessionState)) {
        let mut guard = match self.shared.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut *guard);
    }
}
