//! Prints the session to the terminal by polling [`SharedState`].
//!
//! New turns are printed once each, in log order; state changes print a
//! short status line. Assistant turns are decorated, all others are shown
//! verbatim.

use std::time::Duration;

use chrono::Local;
use tokio::sync::oneshot;

use super::render::render_ansi;
use crate::conversation::{Author, Turn};
use crate::decorate::decorate;
use crate::turn::{SessionState, SharedState, TurnState};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Format one turn as a terminal line.
pub fn format_turn(turn: &Turn, show_timestamps: bool) -> String {
    let body = match turn.author() {
        Author::Assistant => render_ansi(&decorate(turn.text())),
        Author::User | Author::System => turn.text().to_string(),
    };
    let label = turn.author().label();

    if show_timestamps {
        let at = turn.created_at().with_timezone(&Local).format("%H:%M:%S");
        format!("[{at}] {label}: {body}")
    } else {
        format!("{label}: {body}")
    }
}

#[derive(Debug)]
pub struct Presenter {
    show_timestamps: bool,
    printed: usize,
    last_state: Option<TurnState>,
    fatal_shown: bool,
}

impl Presenter {
    pub fn new(show_timestamps: bool) -> Self {
        Self {
            show_timestamps,
            printed: 0,
            last_state: None,
            fatal_shown: false,
        }
    }

    /// Lines to print for everything that changed since the last call.
    pub fn render_updates(&mut self, session: &SessionState) -> Vec<String> {
        let mut lines = Vec::new();

        let turns = session.log.turns();
        for turn in turns.get(self.printed..).unwrap_or_default() {
            lines.push(format_turn(turn, self.show_timestamps));
        }
        self.printed = self.printed.max(turns.len());

        if self.last_state != Some(session.state) {
            self.last_state = Some(session.state);
            lines.push(format!("· {}", session.state.label()));
        }

        if let Some(error) = &session.fatal_error {
            if !self.fatal_shown {
                self.fatal_shown = true;
                lines.push(format!("!! session ended: {error}"));
            }
        }

        lines
    }

    fn print_updates(&mut self, shared: &SharedState) {
        // Copy out under the lock; the log snapshot is reference-counted.
        let session = match shared.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for line in self.render_updates(&session) {
            println!("{line}");
        }
    }

    /// Poll `shared` until `stop` fires or its sender is dropped, then print
    /// whatever is left.
    pub async fn run(mut self, shared: SharedState, mut stop: oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.print_updates(&shared),
                _ = &mut stop => break,
            }
        }
        self.print_updates(&shared);
        log::debug!("console: presenter stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
