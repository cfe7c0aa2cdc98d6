//! System prompt catalog.
//!
//! A request may name a system prompt by id. The catalog turns that id into
//! prompt text and, optionally, the id of the one tool the prompt binds.

use async_trait::async_trait;
use parley_config::PromptConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

/// Prompt text plus the tool it binds, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPromptBinding {
    pub text: String,
    pub tool_id: Option<String>,
}

impl SystemPromptBinding {
    /// A binding with no tool.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_id: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("system prompt '{0}' not found")]
    NotFound(String),

    #[error("system prompt '{0}' has no content")]
    Empty(String),
}

/// Listing row for `/v1/prompts`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub id: String,
    pub name: String,
    pub tool: Option<String>,
}

#[async_trait]
pub trait PromptCatalog: Send + Sync {
    async fn resolve(&self, id: &str) -> Result<SystemPromptBinding, PromptError>;

    fn list(&self) -> Vec<PromptInfo>;
}

#[derive(Debug, Clone)]
struct PromptEntry {
    name: String,
    content: String,
    tool: Option<String>,
}

/// Catalog loaded once from `[[prompts]]` config entries.
#[derive(Debug, Clone, Default)]
pub struct StaticPromptCatalog {
    entries: BTreeMap<String, PromptEntry>,
}

impl StaticPromptCatalog {
    pub fn from_config(prompts: &[PromptConfig]) -> Self {
        let entries: BTreeMap<String, PromptEntry> = prompts
            .iter()
            .map(|p| {
                (
                    p.id.clone(),
                    PromptEntry {
                        name: p.name.clone(),
                        content: p.content.clone(),
                        tool: p.tool.clone().filter(|t| !t.trim().is_empty()),
                    },
                )
            })
            .collect();
        info!(prompts = entries.len(), "Prompt catalog loaded");
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PromptCatalog for StaticPromptCatalog {
    async fn resolve(&self, id: &str) -> Result<SystemPromptBinding, PromptError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| PromptError::NotFound(id.to_string()))?;
        if entry.content.trim().is_empty() {
            return Err(PromptError::Empty(id.to_string()));
        }
        Ok(SystemPromptBinding {
            text: entry.content.clone(),
            tool_id: entry.tool.clone(),
        })
    }

    fn list(&self) -> Vec<PromptInfo> {
        self.entries
            .iter()
            .map(|(id, e)| PromptInfo {
                id: id.clone(),
                name: e.name.clone(),
                tool: e.tool.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticPromptCatalog {
        StaticPromptCatalog::from_config(&[
            PromptConfig {
                id: "barista".into(),
                name: "Barista".into(),
                content: "You take coffee orders.".into(),
                tool: Some("coffee_order".into()),
            },
            PromptConfig {
                id: "blank".into(),
                name: "Blank".into(),
                content: "   ".into(),
                tool: None,
            },
            PromptConfig {
                id: "terse".into(),
                name: "Terse".into(),
                content: "Answer in one line.".into(),
                tool: Some(String::new()),
            },
        ])
    }

    #[tokio::test]
    async fn resolves_text_and_tool() {
        let binding = catalog().resolve("barista").await.unwrap();
        assert_eq!(binding.text, "You take coffee orders.");
        assert_eq!(binding.tool_id.as_deref(), Some("coffee_order"));
    }

    #[tokio::test]
    async fn empty_tool_id_means_no_tool() {
        let binding = catalog().resolve("terse").await.unwrap();
        assert_eq!(binding.tool_id, None);
    }

    #[tokio::test]
    async fn missing_and_blank_prompts_are_errors() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve("nope").await.unwrap_err(),
            PromptError::NotFound("nope".into())
        );
        assert_eq!(
            catalog.resolve("blank").await.unwrap_err(),
            PromptError::Empty("blank".into())
        );
    }

    #[test]
    fn list_is_sorted_by_id() {
        let ids: Vec<String> = catalog().list().into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["barista", "blank", "terse"]);
    }
}
