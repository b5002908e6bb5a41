//! Terminal adapters for running a session without speech hardware.
//!
//! * [`ConsoleCapture`] — stdin lines become transcript updates; `/start`,
//!   `/stop`, `/toggle` (or an empty line) and `/quit` are operator commands.
//! * [`ConsoleSink`] — holds the "speaker" for the time the reply would take
//!   to read aloud, then reports playback completion.
//! * [`Presenter`] — prints new turns and status changes from
//!   [`SharedState`](crate::turn::SharedState).
//! * [`render_ansi`] — ANSI rendering of decorated assistant replies.

pub mod capture;
pub mod presenter;
pub mod render;
pub mod sink;

pub use capture::{parse_line, ConsoleCapture, ConsoleInput};
pub use presenter::{format_turn, Presenter};
pub use render::render_ansi;
pub use sink::{estimate_duration, ConsoleSink};
