//! Conversation log: the ordered, append-only record of exchanged turns.
//!
//! * [`Turn`] / [`TurnId`] / [`Author`] — one message and who produced it.
//! * [`ConversationLog`] — owned by the turn controller, append-only.
//! * [`LogSnapshot`] — read-only view handed to presentation.
//! * [`LogError`] — invariant violations detected on append.

pub mod store;
pub mod turn;

pub use store::{ConversationLog, LogError, LogSnapshot};
pub use turn::{Author, Turn, TurnId};
