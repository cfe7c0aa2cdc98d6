//! Model backends for Parley.
//!
//! All providers implement the `parley_core::Provider` trait. The registry
//! maps each configured (provider, model) pair to a [`BackendHandle`].

pub mod embedder;
pub mod handle;
pub mod openai_compat;
pub mod registry;

pub use embedder::ProviderEmbedder;
pub use handle::{BackendHandle, MAX_TOOL_ROUNDS, TextStream};
pub use openai_compat::OpenAiCompatProvider;
pub use registry::{BackendInfo, BackendRegistry, ProviderKind, build_from_config};
