//! Agent-owned task content: inbox messages and the remotely mirrored kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// One inbox entry.
///
/// `id` is derived from sender and content, so the same message fetched
/// twice keeps its identity even when its `received_at` differs. Repeats of
/// an identical message are told apart by their ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxMessage {
    #[serde(default)]
    pub id: String,
    pub sender: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
}

impl InboxMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self {
            id: String::new(),
            sender: sender.into(),
            content: content.into(),
            received_at: Utc::now(),
        };
        message.id = message.derived_id(0);
        message
    }

    /// Id of the `nth` (0-based) occurrence of this sender/content pair.
    pub fn derived_id(&self, nth: usize) -> String {
        let key = format!("{}\u{1f}{}\u{1f}{nth}", self.sender, self.content);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }
}

/// Kinds of agent content mirrored from a tool server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Notepad,
    Todo,
    Inbox,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [ContentKind::Notepad, ContentKind::Todo, ContentKind::Inbox];

    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Notepad => "notepad",
            ContentKind::Todo => "todo",
            ContentKind::Inbox => "inbox",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshly fetched content for one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteContent {
    Notepad(String),
    Todo(Vec<String>),
    Inbox(Vec<InboxMessage>),
}

impl RemoteContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            RemoteContent::Notepad(_) => ContentKind::Notepad,
            RemoteContent::Todo(_) => ContentKind::Todo,
            RemoteContent::Inbox(_) => ContentKind::Inbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn id_ignores_arrival_time() {
        let first = InboxMessage::new("Bob", "ping");
        let mut later = InboxMessage::new("Bob", "ping");
        later.received_at = first.received_at + Duration::minutes(5);

        assert_eq!(first.id, later.id);
        assert_ne!(first.id, InboxMessage::new("Bob", "pong").id);
        assert_ne!(first.id, InboxMessage::new("Ann", "ping").id);
        assert_ne!(first.derived_id(0), first.derived_id(1));
    }
}
