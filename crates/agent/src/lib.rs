//! The chat turn pipeline for Parley.
//!
//! A turn runs in a fixed order:
//!
//! 1. **Resolve** the backend for the requested (provider, model)
//! 2. **Pick** the system prompt and its bound tool from the catalog
//! 3. **Retrieve** context passages for the conversation
//! 4. **Assemble** the prompt
//! 5. **Invoke** the backend, streamed or buffered
//! 6. **Record** the (user, assistant) pair in the history store
//!
//! Steps 2 and 3 degrade instead of failing. Only steps 1 and 5 can fail
//! the turn.

pub mod assembler;
pub mod conversations;
pub mod degrade;
pub mod ingest;
pub mod orchestrator;
pub mod prompt;
pub mod retriever;
pub mod stream_event;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{PromptAssembler, augment_user_text};
pub use conversations::{ConversationError, ConversationService, DeleteReport};
pub use degrade::Degradation;
pub use ingest::DocumentIngestor;
pub use orchestrator::{ChatOrchestrator, ChatOutcome, ChatRequest, ChatStream, DEFAULT_SYSTEM_PROMPT};
pub use prompt::{PromptCatalog, PromptError, PromptInfo, StaticPromptCatalog, SystemPromptBinding};
pub use retriever::ContextRetriever;
pub use stream_event::ChatStreamEvent;
