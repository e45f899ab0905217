//! Role-tagged messages and the append-only conversation log sent to the model.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(s)
    }
}

/// One utterance in the conversation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueMessage {
    role: Role,
    content: String,
}

impl DialogueMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered conversation history, seeded with the system prompt.
///
/// Insertion order is conversational order; entries are never removed or reordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueLog {
    messages: Vec<DialogueMessage>,
}

impl DialogueLog {
    pub fn new(seed: DialogueMessage) -> Self {
        Self { messages: vec![seed] }
    }

    pub fn push(&mut self, message: DialogueMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[DialogueMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&DialogueMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }
}
