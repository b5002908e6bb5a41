//! A single exchanged message.

use chrono::{DateTime, Utc};

// ---------------------------------------------------------------------------
// TurnId
// ---------------------------------------------------------------------------

/// Identifier of a [`Turn`], unique within one [`ConversationLog`].
///
/// Ids are minted from a per-log counter, never from the clock, so two turns
/// created in the same instant still get distinct ids.
///
/// [`ConversationLog`]: crate::conversation::ConversationLog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(u64);

impl TurnId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TurnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Author {
    /// The speaker, as transcribed by the capture source.
    User,
    /// The remote chat service.
    Assistant,
    /// Status and error notices produced by the controller itself.
    System,
}

impl Author {
    /// A short label suitable for transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            Author::User => "You",
            Author::Assistant => "Assistant",
            Author::System => "System",
        }
    }
}

// ---------------------------------------------------------------------------
// Turn
// ---------------------------------------------------------------------------

/// One entry of the conversation log. Immutable once created.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    id: TurnId,
    author: Author,
    text: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        id: TurnId,
        author: Author,
        text: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            text: text.into(),
            created_at,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn author(&self) -> Author {
        self.author
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_return_constructor_values() {
        let at = Utc::now();
        let turn = Turn::new(TurnId::new(7), Author::Assistant, "hello", at);

        assert_eq!(turn.id().get(), 7);
        assert_eq!(turn.author(), Author::Assistant);
        assert_eq!(turn.text(), "hello");
        assert_eq!(turn.created_at(), at);
    }

    #[test]
    fn turn_id_display() {
        assert_eq!(TurnId::new(3).to_string(), "#3");
    }

    #[test]
    fn author_labels() {
        assert_eq!(Author::User.label(), "You");
        assert_eq!(Author::Assistant.label(), "Assistant");
        assert_eq!(Author::System.label(), "System");
    }
}
