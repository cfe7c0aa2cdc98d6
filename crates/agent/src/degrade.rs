//! Recoverable failures in the chat pipeline and the single policy applied
//! to them: log at `warn!` and continue with the fallback value.

use parley_core::message::ConversationId;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Degradation {
    #[error("system prompt unavailable: {0}")]
    Prompt(String),

    #[error("tool '{0}' is not registered")]
    Tool(String),

    #[error("context retrieval failed: {0}")]
    Retrieval(String),
}

impl Degradation {
    pub fn step(&self) -> &'static str {
        match self {
            Self::Prompt(_) => "prompt",
            Self::Tool(_) => "tool",
            Self::Retrieval(_) => "retrieval",
        }
    }
}

/// Unwrap a step result, or log the degradation and use `fallback`.
pub fn or_fallback<T>(
    result: Result<T, Degradation>,
    conversation_id: &ConversationId,
    fallback: impl FnOnce() -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(degradation) => {
            warn!(
                conversation_id = %conversation_id,
                step = degradation.step(),
                reason = %degradation,
                "Continuing with fallback"
            );
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_passes_through() {
        let id = ConversationId::from("c1");
        assert_eq!(or_fallback(Ok(3), &id, || 0), 3);
    }

    #[test]
    fn error_uses_fallback() {
        let id = ConversationId::from("c1");
        let value = or_fallback(Err(Degradation::Retrieval("index down".into())), &id, Vec::<u8>::new);
        assert!(value.is_empty());
    }

    #[test]
    fn step_names() {
        assert_eq!(Degradation::Prompt("x".into()).step(), "prompt");
        assert_eq!(Degradation::Tool("x".into()).step(), "tool");
        assert_eq!(Degradation::Retrieval("x".into()).step(), "retrieval");
    }
}
