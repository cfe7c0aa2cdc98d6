//! Prompt assembly: system text, context-augmented user text, media and the
//! bound tool, combined into one [`AssembledPrompt`].
//!
//! With retrieved passages the user text becomes:
//!
//! ```text
//! <CONTEXT_HEADER>
//! [Passage 1]
//! <text, cut to the passage limit>
//!
//! [Passage 2]
//! ...
//! <CONTEXT_TRAILER><original text>
//! ```
//!
//! Without passages the user text is the original, untouched.

use parley_core::message::{ConversationId, MediaAttachment};
use parley_core::prompt::AssembledPrompt;
use parley_core::retrieval::RetrievedPassage;
use parley_core::tool::ToolRegistry;
use std::sync::Arc;
use tracing::debug;

use crate::degrade::{self, Degradation};

pub const CONTEXT_HEADER: &str = "Answer the user's question using the following reference passages:\n\n";
pub const CONTEXT_TRAILER: &str = "Based on the passages above, answer the user's question:\n";
/// Cap on a passage body. The `...` marker is added on top, like the label.
pub const MAX_PASSAGE_CHARS: usize = 1000;

pub struct PromptAssembler {
    tools: Arc<ToolRegistry>,
    max_passage_chars: usize,
}

impl PromptAssembler {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            max_passage_chars: MAX_PASSAGE_CHARS,
        }
    }

    pub fn with_max_passage_chars(mut self, max: usize) -> Self {
        self.max_passage_chars = max;
        self
    }

    pub fn assemble(
        &self,
        conversation_id: &ConversationId,
        system_text: String,
        user_text: &str,
        passages: &[RetrievedPassage],
        media: Vec<MediaAttachment>,
        tool_id: Option<&str>,
    ) -> AssembledPrompt {
        let tool = tool_id.and_then(|id| {
            let resolved = self
                .tools
                .resolve(id)
                .ok_or_else(|| Degradation::Tool(id.to_string()))
                .map(Some);
            degrade::or_fallback(resolved, conversation_id, || None)
        });

        debug!(
            conversation_id = %conversation_id,
            passages = passages.len(),
            media = media.len(),
            tool = tool.as_ref().map(|t| t.name()).unwrap_or("none"),
            "Prompt assembled"
        );

        AssembledPrompt {
            system: system_text,
            user_text: augment_user_text(user_text, passages, self.max_passage_chars),
            media,
            tool,
        }
    }
}

/// Prefix `text` with labeled passage blocks. Returns `text` unchanged when
/// there are no passages.
pub fn augment_user_text(text: &str, passages: &[RetrievedPassage], max_chars: usize) -> String {
    if passages.is_empty() {
        return text.to_string();
    }

    let mut out = String::from(CONTEXT_HEADER);
    for (i, passage) in passages.iter().enumerate() {
        out.push_str(&format!("[Passage {}]\n", i + 1));
        out.push_str(&truncate_chars(&passage.text, max_chars));
        out.push_str("\n\n");
    }
    out.push_str(CONTEXT_TRAILER);
    out.push_str(text);
    out
}

/// First `max` characters of `text`, with `...` appended when cut. A cut
/// result is therefore `max + 3` characters long.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::message::Role;

    fn passage(text: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            text: text.into(),
            score,
            source: None,
        }
    }

    fn assembler() -> PromptAssembler {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(parley_tools::WeatherLookupTool));
        PromptAssembler::new(Arc::new(tools))
    }

    #[test]
    fn no_passages_leaves_text_byte_identical() {
        let text = "  What's the weather?\n";
        assert_eq!(augment_user_text(text, &[], MAX_PASSAGE_CHARS), text);
    }

    #[test]
    fn passages_are_labeled_in_order_then_original_text() {
        let out = augment_user_text(
            "Q?",
            &[passage("first", 0.9), passage("second", 0.5)],
            MAX_PASSAGE_CHARS,
        );
        let expected = format!(
            "{CONTEXT_HEADER}[Passage 1]\nfirst\n\n[Passage 2]\nsecond\n\n{CONTEXT_TRAILER}Q?"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn long_passages_are_cut_with_ellipsis() {
        let long = "é".repeat(1500);
        let out = augment_user_text("Q", &[passage(&long, 0.8)], MAX_PASSAGE_CHARS);
        let body = out
            .strip_prefix(CONTEXT_HEADER)
            .and_then(|s| s.strip_prefix("[Passage 1]\n"))
            .and_then(|s| s.split("\n\n").next())
            .unwrap();
        assert_eq!(body.chars().count(), MAX_PASSAGE_CHARS + 3);
        assert!(body.ends_with("é..."));
    }

    #[test]
    fn passage_at_exact_limit_is_not_marked() {
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("abcd", 3), "abc...");
    }

    #[test]
    fn media_goes_into_the_single_user_message() {
        let png = MediaAttachment::new("image/png", Some("a.png".into()), vec![1, 2]).unwrap();
        let jpg = MediaAttachment::new("image/jpeg", Some("b.jpg".into()), vec![3]).unwrap();
        let prompt = assembler().assemble(
            &ConversationId::from("c1"),
            "sys".into(),
            "describe these",
            &[],
            vec![png, jpg],
            None,
        );
        let messages = prompt.to_messages(vec![]);
        let users: Vec<_> = messages.iter().filter(|m| m.role == Role::User).collect();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].content, "describe these");
        assert_eq!(users[0].media.len(), 2);
    }

    #[test]
    fn known_tool_is_bound_and_unknown_is_dropped() {
        let id = ConversationId::from("c1");
        let bound = assembler().assemble(&id, "s".into(), "q", &[], vec![], Some("weather_lookup"));
        assert_eq!(bound.tool.map(|t| t.name().to_string()).as_deref(), Some("weather_lookup"));

        let dropped = assembler().assemble(&id, "s".into(), "q", &[], vec![], Some("database_tools"));
        assert!(dropped.tool.is_none());
    }
}
