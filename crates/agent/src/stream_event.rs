//! Events sent to clients while a streamed answer is produced.
//!
//! The gateway forwards these over SSE, using [`ChatStreamEvent::event_type`]
//! as the event name and the JSON form as the data:
//! - `chunk`: the next text delta
//! - `done`: the answer is complete and the turn has been recorded
//! - `error`: the backend failed; nothing was recorded

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    Chunk { content: String },

    Done { conversation_id: String },

    Error { message: String },
}

impl ChatStreamEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }
}
