//! Chat transcript

use serde::{Deserialize, Serialize};

/// Who said it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The human
    User,
    /// The companion
    Assistant,
}

/// One transcript entry, serialized as `{"role": ..., "content": ...}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistoryEntry {
    /// Speaker
    pub role: ChatRole,
    /// What was said
    pub content: String,
}

impl ChatHistoryEntry {
    /// User entry
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    /// Assistant entry
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered transcript of completed and in-flight turns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatHistory {
    entries: Vec<ChatHistoryEntry>,
}

impl ChatHistory {
    /// Empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user entry, returning its index
    pub fn push_user(&mut self, content: impl Into<String>) -> usize {
        self.entries.push(ChatHistoryEntry::user(content));
        self.entries.len() - 1
    }

    /// Append an assistant entry
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.entries.push(ChatHistoryEntry::assistant(content));
    }

    /// Remove the user entry at `index` if it is still the last entry
    ///
    /// Returns whether an entry was removed.
    pub fn rollback_user(&mut self, index: usize) -> bool {
        let is_trailing_user = self.entries.len() == index + 1
            && self
                .entries
                .last()
                .is_some_and(|e| e.role == ChatRole::User);
        if is_trailing_user {
            self.entries.pop();
        }
        is_trailing_user
    }

    /// All entries, oldest first
    #[must_use]
    pub fn entries(&self) -> &[ChatHistoryEntry] {
        &self.entries
    }

    /// Most recent entry
    #[must_use]
    pub fn last(&self) -> Option<&ChatHistoryEntry> {
        self.entries.last()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the transcript is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
