//! Message domain types.
//!
//! These are the value objects that flow between the orchestrator and the
//! model backends: a user turn goes in, an assistant turn comes back.

use chrono::{DateTime, Utc};
use mime_guess::mime::Mime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier that scopes chat memory, retrieval and history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions
    System,
    /// Tool execution result
    Tool,
}

/// A binary attachment supplied with a user turn (typically an image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Parsed `type/subtype` string, e.g. `image/png`.
    pub mime_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(skip)]
    pub data: Vec<u8>,
}

/// The mime type of an attachment could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid media type '{0}'")]
pub struct InvalidMediaType(pub String);

impl MediaAttachment {
    /// Build an attachment, rejecting mime types that do not parse as `type/subtype`.
    pub fn new(
        mime_type: &str,
        filename: Option<String>,
        data: Vec<u8>,
    ) -> std::result::Result<Self, InvalidMediaType> {
        let parsed: Mime = mime_type
            .trim()
            .parse()
            .map_err(|_| InvalidMediaType(mime_type.to_string()))?;
        Ok(Self {
            mime_type: parsed.essence_str().to_string(),
            filename,
            data,
        })
    }

    /// Guess the mime type from the file name when the client sent none.
    pub fn from_filename(
        filename: &str,
        data: Vec<u8>,
    ) -> std::result::Result<Self, InvalidMediaType> {
        let guessed = mime_guess::from_path(filename).first_or_octet_stream();
        Self::new(guessed.essence_str(), Some(filename.to_string()), data)
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Attachments carried alongside the text (user messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media: Vec<MediaAttachment>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            media: Vec::new(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a user message that carries the text and every attachment together.
    pub fn user_with_media(content: impl Into<String>, media: Vec<MediaAttachment>) -> Self {
        let mut msg = Self::user(content);
        msg.media = media;
        msg
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as JSON string
    pub arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello there");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello there");
        assert!(msg.media.is_empty());
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn user_with_media_keeps_text_and_all_attachments() {
        let a = MediaAttachment::new("image/png", Some("a.png".into()), vec![1, 2]).unwrap();
        let b = MediaAttachment::new("image/jpeg", None, vec![3]).unwrap();
        let msg = Message::user_with_media("describe these", vec![a, b]);
        assert_eq!(msg.content, "describe these");
        assert_eq!(msg.media.len(), 2);
        assert_eq!(msg.media[1].mime_type, "image/jpeg");
    }

    #[test]
    fn invalid_mime_type_rejected() {
        let err = MediaAttachment::new("not a mime", None, vec![]).unwrap_err();
        assert_eq!(err.0, "not a mime");
    }

    #[test]
    fn mime_parameters_are_stripped() {
        let m = MediaAttachment::new("image/png; charset=binary", None, vec![]).unwrap();
        assert_eq!(m.mime_type, "image/png");
        assert!(m.is_image());
    }

    #[test]
    fn mime_guessed_from_filename() {
        let m = MediaAttachment::from_filename("cat.jpg", vec![0xff]).unwrap();
        assert_eq!(m.mime_type, "image/jpeg");
        assert_eq!(m.filename.as_deref(), Some("cat.jpg"));
    }

    #[test]
    fn conversation_id_serializes_as_plain_string() {
        let id = ConversationId::from("c1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"c1\"");
        assert!(ConversationId::from("   ").is_blank());
    }

    #[test]
    fn tool_result_links_call_id() {
        let msg = Message::tool_result("call_7", "sunny");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_7"));
    }
}
