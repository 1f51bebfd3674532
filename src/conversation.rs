use std::{collections::HashMap, fmt::Display, hash::Hasher};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use twox_hash::XxHash64;

/// A [Conversation] is the transcript of a workflow run.
///
/// Messages are only ever appended: every step of a workflow pushes its output at the end,
/// so the order of [Conversation::history] is the order in which the messages were produced.
/// There is intentionally no API to delete, update or reorder a message.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    history: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the conversation history.
    pub fn add(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(Message {
            role,
            content: Content::Text(content.into()),
            timestamp: Local::now().timestamp(),
        });
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.history.last()
    }

    /// Search for messages whose content contains `keyword`.
    pub fn search(&self, keyword: &str) -> Vec<&Message> {
        self.history
            .iter()
            .filter(|message| message.content.to_string().contains(keyword))
            .collect()
    }

    /// Count the number of messages by role
    pub fn count_messages_by_role(&self) -> HashMap<String, usize> {
        let mut count = HashMap::new();
        for message in &self.history {
            *count.entry(message.role.to_string()).or_insert(0) += 1;
        }
        count
    }

    /// Convert the conversation history to a JSON string.
    pub fn to_json(&self) -> Result<String, ConversationError> {
        Ok(serde_json::to_string(&self.history)?)
    }

    /// All message contents joined by a single space, in order.
    pub fn joined_content(&self) -> String {
        self.history
            .iter()
            .map(|message| message.content.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A stable fingerprint over roles and contents. Timestamps are not part of it,
    /// so two runs fed with the same inputs produce the same fingerprint.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for message in &self.history {
            hasher.write(message.role.to_string().as_bytes());
            hasher.write_u8(0);
            hasher.write(message.content.to_string().as_bytes());
            hasher.write_u8(0xff);
        }
        hasher.finish()
    }
}

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A [Message] consists of a [Role] and a [Content].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Content,
    /// Unix timestamp (seconds) at which the message was appended.
    pub timestamp: i64,
}

/// A [Role] identifies the sender of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    System,
    Human,
    Assistant(String),
}

impl Role {
    pub fn assistant(name: impl Into<String>) -> Self {
        Role::Assistant(name.into())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Content {
    Text(String),
}

impl Content {
    pub fn as_str(&self) -> &str {
        match self {
            Content::Text(text) => text,
        }
    }
}

impl Display for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for message in &self.history {
            writeln!(f, "{}: {}", message.role, message.content)?;
        }
        Ok(())
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "System"),
            Role::Human => write!(f, "Human"),
            Role::Assistant(name) => write!(f, "{name}(Assistant)"),
        }
    }
}

impl Display for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Content::Text(text) => f.pad(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Conversation {
        let mut conversation = Conversation::new();
        conversation.add(Role::Human, "What happened in Berlin today?");
        conversation.add(Role::assistant("Summarizer"), "A summary of Berlin news.");
        conversation.add(Role::assistant("Reviewer"), "Looks good.");
        conversation
    }

    #[test]
    fn add_appends_in_order() {
        let conversation = sample();
        assert_eq!(conversation.len(), 3);
        assert_eq!(
            conversation.last().map(|m| m.content.as_str()),
            Some("Looks good.")
        );
        assert_eq!(conversation.history()[0].role, Role::Human);
    }

    #[test]
    fn search_and_count() {
        let conversation = sample();
        assert_eq!(conversation.search("Berlin").len(), 2);

        let counts = conversation.count_messages_by_role();
        assert_eq!(counts.get("Human"), Some(&1));
        assert_eq!(counts.get("Reviewer(Assistant)"), Some(&1));
    }

    #[test]
    fn display_renders_transcript() {
        let rendered = sample().to_string();
        assert!(rendered.starts_with("Human: What happened in Berlin today?\n"));
        assert!(rendered.contains("Summarizer(Assistant): A summary of Berlin news.\n"));
    }

    #[test]
    fn fingerprint_ignores_timestamps() {
        let first = sample();
        let mut second = sample();
        assert_eq!(first.fingerprint(), second.fingerprint());

        second.add(Role::System, "extra");
        assert_ne!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn json_round_trip_keeps_roles() {
        let json = sample().to_json().unwrap();
        let history: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(history[1].role, Role::assistant("Summarizer"));
    }
}
