//! Append-only conversation log.
//!
//! [`ConversationLog`] is owned by the turn controller. Presentation code only
//! ever sees a [`LogSnapshot`], which shares the underlying storage until the
//! next append (copy-on-write through `Arc::make_mut`).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::turn::{Author, Turn, TurnId};

// ---------------------------------------------------------------------------
// LogError
// ---------------------------------------------------------------------------

/// Invariant violations detected on append. Never expected in correct
/// operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LogError {
    /// The turn's timestamp precedes the last entry's.
    #[error("turn {id} created at {created_at} precedes last entry at {last}")]
    OutOfOrder {
        id: TurnId,
        created_at: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    /// The turn's id was already issued in this log.
    #[error("turn id {0} is already in the log")]
    DuplicateId(TurnId),
}

// ---------------------------------------------------------------------------
// LogSnapshot
// ---------------------------------------------------------------------------

/// Immutable, ordered view of the log at one point in time.
#[derive(Debug, Clone, Default)]
pub struct LogSnapshot(Arc<Vec<Turn>>);

impl LogSnapshot {
    pub fn turns(&self) -> &[Turn] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.0.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a LogSnapshot {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// ConversationLog
// ---------------------------------------------------------------------------

/// Ordered record of exchanged turns. Insertion order is conversational
/// order; there is no delete or update.
///
/// # Example
/// ```rust
/// use speakflow::conversation::{Author, ConversationLog};
///
/// let mut log = ConversationLog::new();
/// log.record(Author::User, "hi there").unwrap();
/// log.record(Author::Assistant, "Hello!").unwrap();
///
/// let snapshot = log.snapshot();
/// assert_eq!(snapshot.len(), 2);
/// assert_eq!(snapshot.turns()[0].author(), Author::User);
/// ```
#[derive(Debug, Default)]
pub struct ConversationLog {
    turns: Arc<Vec<Turn>>,
    next_id: u64,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a turn stamped with the current time, clamped so it never
    /// precedes the last entry. The turn is not appended.
    pub fn next_turn(&mut self, author: Author, text: impl Into<String>) -> Turn {
        let now = Utc::now();
        let created_at = match self.turns.last() {
            Some(last) if last.created_at() > now => last.created_at(),
            _ => now,
        };
        let id = TurnId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        Turn::new(id, author, text, created_at)
    }

    /// Append `turn`, rejecting it if it would break timestamp ordering or
    /// reuse an id.
    pub fn append(&mut self, turn: Turn) -> Result<TurnId, LogError> {
        if let Some(last) = self.turns.last() {
            if turn.created_at() < last.created_at() {
                return Err(LogError::OutOfOrder {
                    id: turn.id(),
                    created_at: turn.created_at(),
                    last: last.created_at(),
                });
            }
        }
        if self.turns.iter().any(|t| t.id() == turn.id()) {
            return Err(LogError::DuplicateId(turn.id()));
        }

        let id = turn.id();
        self.next_id = self.next_id.max(id.get().saturating_add(1));
        Arc::make_mut(&mut self.turns).push(turn);
        Ok(id)
    }

    /// Mint and append in one step.
    pub fn record(&mut self, author: Author, text: impl Into<String>) -> Result<TurnId, LogError> {
        let turn = self.next_turn(author, text);
        self.append(turn)
    }

    pub fn snapshot(&self) -> LogSnapshot {
        LogSnapshot(Arc::clone(&self.turns))
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
