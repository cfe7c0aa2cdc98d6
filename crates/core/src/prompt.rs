//! The final prompt handed to a backend for one turn.

use std::sync::Arc;
use crate::message::{MediaAttachment, Message};
use crate::provider::ToolDefinition;
use crate::tool::Tool;

/// System text, user text, attachments and the bound tool for one request.
#[derive(Clone)]
pub struct AssembledPrompt {
    pub system: String,
    pub user_text: String,
    pub media: Vec<MediaAttachment>,
    pub tool: Option<Arc<dyn Tool>>,
}

impl AssembledPrompt {
    /// The single user message: text plus every attachment.
    pub fn user_message(&self) -> Message {
        if self.media.is_empty() {
            Message::user(self.user_text.clone())
        } else {
            Message::user_with_media(self.user_text.clone(), self.media.clone())
        }
    }

    /// `[system, ...history, user]`.
    pub fn to_messages(&self, history: Vec<Message>) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.system.clone()));
        messages.extend(history);
        messages.push(self.user_message());
        messages
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool.iter().map(|t| t.to_definition()).collect()
    }
}

impl std::fmt::Debug for AssembledPrompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssembledPrompt")
            .field("system", &self.system)
            .field("user_text", &self.user_text)
            .field("media", &self.media.len())
            .field("tool", &self.tool.as_ref().map(|t| t.name().to_string()))
            .finish()
    }
}
