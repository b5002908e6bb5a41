//! Chat transport: the single request/response call to the remote
//! conversational endpoint.
//!
//! This module provides:
//! * [`ChatTransport`] — async trait the turn controller sends messages through.
//! * [`HttpChatTransport`] — relay or OpenAI-compatible REST implementation.
//! * [`ChatHistory`] — rolling window of exchanges for stateless APIs.
//! * [`ChatError`] — failure modes; rate-limits are distinguishable.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use speakflow::chat::{ChatTransport, HttpChatTransport};
//! use speakflow::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let transport = HttpChatTransport::from_config(&config.chat);
//!
//!     match transport.send("hi there").await {
//!         Ok(reply) => println!("{reply}"),
//!         Err(e) if e.is_rate_limited() => eprintln!("slow down: {e}"),
//!         Err(e) => eprintln!("failed: {e}"),
//!     }
//! }
//! ```

pub mod history;
pub mod transport;

pub use history::{ChatHistory, ChatMessage};
pub use transport::{ChatError, ChatTransport, HttpChatTransport};
