//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley chat orchestrator.
//! This crate has **no framework dependencies**. It defines the domain model
//! that every other crate implements against.
//!
//! ## Layout
//!
//! Every external collaborator of the orchestrator is a trait here:
//! - [`Provider`] for model backends
//! - [`VectorIndex`] and [`Embedder`] for similarity search
//! - [`HistoryStore`] for durable chat rows
//! - [`ChatMemory`] for the per-conversation message window
//! - [`Tool`] for callable capabilities
//!
//! Implementations live in their respective crates, so tests can swap any of
//! them for a stub.

pub mod error;
pub mod history;
pub mod memory;
pub mod message;
pub mod prompt;
pub mod provider;
pub mod retrieval;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{BackendLookupError, ChatError, Error, MemoryError, ProviderError, Result, ToolError};
pub use history::{ChatTurn, ConversationSummary, HistoryStore, TurnRole};
pub use memory::ChatMemory;
pub use message::{ConversationId, MediaAttachment, Message, Role};
pub use prompt::AssembledPrompt;
pub use provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use retrieval::{Document, Embedder, RetrievedPassage, SearchRequest, VectorIndex};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult};
