//! Rolling window of previous exchanges for stateless chat APIs.
//!
//! The relay backend keeps its own conversation state, but OpenAI-compatible
//! endpoints are stateless: [`ChatHistory`] keeps the last *N* user/assistant
//! exchanges so each request can carry them as context. The window is cleared
//! when the conversation has been quiet for longer than `silence_reset`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::HistoryConfig;

/// One message in OpenAI chat-completions format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChatHistory
// ---------------------------------------------------------------------------

/// Keeps the most recent exchanges, oldest first.
///
/// # Example
/// ```rust
/// use speakflow::chat::ChatHistory;
///
/// let mut history = ChatHistory::with_capacity(2, 300);
/// history.push_exchange("hi", "Hello!");
/// let messages = history.messages("You are helpful.", "how are you?");
/// assert_eq!(messages.len(), 4);
/// ```
pub struct ChatHistory {
    exchanges: VecDeque<(String, String)>,
    max_exchanges: usize,
    last_activity: Instant,
    silence_reset: Duration,
}

impl ChatHistory {
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::with_capacity(config.window_size, config.reset_silence_secs)
    }

    pub fn with_capacity(max_exchanges: usize, silence_reset_secs: u64) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(max_exchanges + 1),
            max_exchanges,
            last_activity: Instant::now(),
            silence_reset: Duration::from_secs(silence_reset_secs),
        }
    }

    /// Record a completed exchange, dropping the oldest ones beyond the
    /// window. A long silence since the last exchange clears the window
    /// first.
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        if self.last_activity.elapsed() > self.silence_reset {
            log::debug!("chat: history idle for too long, starting fresh");
            self.exchanges.clear();
        }

        self.exchanges.push_back((user.into(), assistant.into()));
        while self.exchanges.len() > self.max_exchanges {
            self.exchanges.pop_front();
        }

        self.last_activity = Instant::now();
    }

    pub fn reset(&mut self) {
        self.exchanges.clear();
    }

    /// Build the message list for a new request: system prompt, the retained
    /// exchanges, then `next` as the final user message.
    pub fn messages(&self, system_prompt: &str, next: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.exchanges.len() * 2 + 2);
        if !system_prompt.is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        if self.last_activity.elapsed() <= self.silence_reset {
            for (user, assistant) in &self.exchanges {
                messages.push(ChatMessage::user(user.clone()));
                messages.push(ChatMessage::assistant(assistant.clone()));
            }
        }
        messages.push(ChatMessage::user(next));
        messages
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
