//! SpeakFlow — a hands-free conversational client.
//!
//! The [`turn`] controller listens, sends each finished utterance to a
//! [`chat`] endpoint, speaks the reply and records everything in the
//! [`conversation`] log.

pub mod chat;
pub mod config;
pub mod console;
pub mod conversation;
pub mod decorate;
pub mod speech;
pub mod turn;
