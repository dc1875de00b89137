//! Append-only conversation log scoped to one subtask.
//!
//! Appending returns a new log sharing the previous prefix; existing handles
//! never observe later messages. Each subtask starts from
//! [`ConversationLog::seeded`], so nothing leaks between subtasks.

use std::sync::Arc;

use super::message::{ChatMessage, user_message};

/// Ordered, immutable sequence of role-tagged messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationLog {
    messages: Arc<[ChatMessage]>,
}

impl ConversationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a log seeded with the user's question and the subtask.
    #[must_use]
    pub fn seeded(question: &str, subtask: &str) -> Self {
        Self::new().append(user_message(&format!(
            "<question>{question}</question>\n\n<subtask>{subtask}</subtask>"
        )))
    }

    /// Returns a new log with `message` appended.
    #[must_use]
    pub fn append(&self, message: ChatMessage) -> Self {
        self.extend(std::iter::once(message))
    }

    /// Returns a new log with all `messages` appended in order.
    #[must_use]
    pub fn extend(&self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        let combined: Vec<ChatMessage> = self
            .messages
            .iter()
            .cloned()
            .chain(messages)
            .collect();
        Self {
            messages: Arc::from(combined),
        }
    }

    /// Messages in insertion order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the log has no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
