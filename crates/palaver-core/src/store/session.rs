//! Session and message data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::upload::UploadedDocument;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Returns the wire-format role string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// Streaming lifecycle state of a session.
///
/// Live state only: a restored session always comes back `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Responding,
}

/// One turn in a conversation.
///
/// Assistant messages grow in place while a stream is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Model id that produced (or will produce) this message.
    pub model: String,
    /// Whether the message is currently in an editable state.
    /// Forced back to false on restore.
    #[serde(default)]
    pub is_edit: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            role,
            content: content.into(),
            model: model.into(),
            is_edit: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user-authored message.
    pub fn user(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(Role::User, content, model)
    }

    /// Creates an assistant message (seeded by the first stream delta).
    pub fn assistant(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, model)
    }

    /// Refreshes the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A document attached to a workspace session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub document_id: String,
    pub url: String,
}

impl From<UploadedDocument> for FileRef {
    fn from(doc: UploadedDocument) -> Self {
        Self {
            name: doc.name,
            document_id: doc.document_id,
            url: doc.url,
        }
    }
}

/// One chat conversation and its configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Empty until auto-generated or user-set.
    #[serde(default)]
    pub title: String,
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub chain_of_thought: bool,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub state: SessionState,
    #[serde(default)]
    pub has_document: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh idle session with no messages.
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            title: String::new(),
            model: model.into(),
            system_prompt: system_prompt.into(),
            chain_of_thought: false,
            messages: Vec::new(),
            state: SessionState::Idle,
            has_document: false,
            namespace_id: None,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes the update timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Resets live-only fields after a restore from disk.
    ///
    /// In-flight and edit state never survive a reload.
    pub fn reset_live_state(&mut self) {
        self.state = SessionState::Idle;
        for message in &mut self.messages {
            message.is_edit = false;
        }
    }
}

/// Generates a unique id for sessions and messages.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_untitled() {
        let session = Session::new("gpt-4o-mini", "");
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.title.is_empty());
        assert!(session.messages.is_empty());
        assert!(!session.has_document);
    }

    #[test]
    fn test_reset_live_state() {
        let mut session = Session::new("gpt-4o-mini", "");
        session.state = SessionState::Responding;
        let mut message = Message::user("hello", "gpt-4o-mini");
        message.is_edit = true;
        session.messages.push(message);

        session.reset_live_state();
        assert_eq!(session.state, SessionState::Idle);
        assert!(!session.messages[0].is_edit);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        assert_eq!(Role::User.as_str(), "user");
    }
}
