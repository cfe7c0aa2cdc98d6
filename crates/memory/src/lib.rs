//! Storage implementations for Parley: chat history, chat memory and
//! the vector index used for retrieval.

pub mod chunker;
pub mod in_memory;
pub mod noop;
pub mod vector;
pub mod window;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunker::split_into_chunks;
pub use in_memory::InMemoryHistoryStore;
pub use noop::NoopVectorIndex;
pub use vector::{InMemoryVectorIndex, cosine_similarity};
pub use window::WindowChatMemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteHistoryStore;
