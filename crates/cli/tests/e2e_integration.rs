//! End-to-end tests for the Parley chat pipeline.
//!
//! These wire the real registry, retriever, assembler, tool registry and
//! history store together around a scripted provider, and check what the
//! model receives and what ends up in history.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use parley_agent::assembler::{CONTEXT_HEADER, CONTEXT_TRAILER};
use parley_agent::{
    ChatOrchestrator, ChatOutcome, ChatRequest, ContextRetriever, ConversationService,
    DocumentIngestor, StaticPromptCatalog,
};
use parley_config::PromptConfig;
use parley_core::error::{ChatError, MemoryError, ProviderError};
use parley_core::history::{HistoryStore, TurnRole};
use parley_core::message::{ConversationId, MediaAttachment, Message, MessageToolCall, Role};
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse};
use parley_core::retrieval::Embedder;
use parley_memory::{InMemoryHistoryStore, InMemoryVectorIndex, WindowChatMemory};
use parley_providers::{BackendRegistry, ProviderKind};

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted responses in sequence and records every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().rev().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn text(response: &str) -> Self {
        Self::new(vec![text_response(response)])
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: None,
        model: "qwen3:14b".into(),
        metadata: serde_json::Map::new(),
    }
}

fn tool_response(name: &str, arguments: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: "call_1".into(),
        name: name.into(),
        arguments: arguments.to_string(),
    }];
    ProviderResponse {
        message,
        usage: None,
        model: "qwen3:14b".into(),
        metadata: serde_json::Map::new(),
    }
}

/// One dimension per keyword.
struct KeywordEmbedder;

#[async_trait::async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, MemoryError> {
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                ["espresso", "terrace", "parking"]
                    .iter()
                    .map(|k| if t.contains(k) { 1.0 } else { 0.0 })
                    .collect()
            })
            .collect())
    }
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    orchestrator: ChatOrchestrator,
    provider: Arc<ScriptedProvider>,
    history: Arc<InMemoryHistoryStore>,
    conversations: ConversationService,
    ingestor: DocumentIngestor,
}

fn harness(provider: ScriptedProvider) -> Harness {
    let provider = Arc::new(provider);
    let memory = Arc::new(WindowChatMemory::new(20));
    let mut backends = BackendRegistry::new();
    backends.register_provider(
        ProviderKind::Ollama,
        provider.clone(),
        &["qwen3:14b".to_string()],
        memory.clone(),
        |h| h,
    );

    let prompts = StaticPromptCatalog::from_config(&[PromptConfig {
        id: "barista".into(),
        name: "Barista".into(),
        content: "You take coffee orders.".into(),
        tool: Some("coffee_order".into()),
    }]);

    let index = Arc::new(InMemoryVectorIndex::new(Arc::new(KeywordEmbedder)));
    let history = Arc::new(InMemoryHistoryStore::new());
    let orchestrator = ChatOrchestrator::new(
        Arc::new(backends),
        Arc::new(prompts),
        Arc::new(ContextRetriever::new(index.clone())),
        Arc::new(parley_tools::default_registry()),
        history.clone(),
    );

    Harness {
        orchestrator,
        provider,
        conversations: ConversationService::new(history.clone()).with_chat_memory(memory),
        history,
        ingestor: DocumentIngestor::new(index).with_chunk_chars(40),
    }
}

fn request(text: &str, conversation: &str) -> ChatRequest {
    ChatRequest::new(text, ConversationId::from(conversation), "ollama", "qwen3:14b")
}

fn last_user_message(request: &ProviderRequest) -> Message {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .cloned()
        .unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn plain_buffered_turn_records_two_rows() {
    let h = harness(ScriptedProvider::text("Sunny, 21°C."));
    let outcome = h
        .orchestrator
        .execute(request("What's the weather?", "c1"))
        .await
        .unwrap();
    assert!(matches!(outcome, ChatOutcome::Complete(ref t) if t == "Sunny, 21°C."));

    // Nothing ingested: the user text reaches the model unchanged.
    let sent = h.provider.requests();
    assert_eq!(last_user_message(&sent[0]).content, "What's the weather?");

    let turns = h.history.turns_for(&ConversationId::from("c1")).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[0].content, "What's the weather?");
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert_eq!(turns[1].content, "Sunny, 21°C.");
}

#[tokio::test]
async fn ingested_document_grounds_the_prompt_of_its_conversation_only() {
    let h = harness(ScriptedProvider::new(vec![
        text_response("Yes, until 10pm."),
        text_response("I don't know."),
    ]));
    h.ingestor
        .ingest(
            &ConversationId::from("c1"),
            Some("faq.md".into()),
            "The terrace is open until 10pm.\n\nParking is free on Sundays.",
        )
        .await
        .unwrap();

    h.orchestrator
        .execute(request("Is the terrace open late?", "c1"))
        .await
        .unwrap();
    h.orchestrator
        .execute(request("Is the terrace open late?", "c2"))
        .await
        .unwrap();

    let sent = h.provider.requests();
    let grounded = last_user_message(&sent[0]).content;
    assert!(grounded.starts_with(CONTEXT_HEADER));
    assert!(grounded.contains("[Passage 1]\nThe terrace is open until 10pm."));
    assert!(!grounded.contains("Parking"));
    assert!(grounded.ends_with(&format!("{CONTEXT_TRAILER}Is the terrace open late?")));

    // Another conversation sees none of c1's passages.
    assert_eq!(last_user_message(&sent[1]).content, "Is the terrace open late?");

    // History stores the raw question, not the augmented one.
    let turns = h.history.turns_for(&ConversationId::from("c1")).await.unwrap();
    assert_eq!(turns[0].content, "Is the terrace open late?");
}

#[tokio::test]
async fn bound_tool_runs_before_the_final_answer() {
    let h = harness(ScriptedProvider::new(vec![
        tool_response(
            "coffee_order",
            serde_json::json!({"action": "order", "item": "latte", "quantity": 2}),
        ),
        text_response("Two lattes are on their way."),
    ]));

    let outcome = h
        .orchestrator
        .execute(request("Two lattes please", "c1").with_system_prompt("barista"))
        .await
        .unwrap();
    assert!(matches!(outcome, ChatOutcome::Complete(ref t) if t == "Two lattes are on their way."));

    let sent = h.provider.requests();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].messages[0].content, "You take coffee orders.");
    assert_eq!(sent[0].tools.len(), 1);
    assert_eq!(sent[0].tools[0].name, "coffee_order");

    let tool_result = sent[1]
        .messages
        .iter()
        .find(|m| m.role == Role::Tool)
        .unwrap();
    assert!(tool_result.content.contains("Order #1 placed: 2 x latte"));
}

#[tokio::test]
async fn unknown_system_prompt_falls_back_to_default() {
    let h = harness(ScriptedProvider::text("ok"));
    h.orchestrator
        .execute(request("hi", "c1").with_system_prompt("pirate"))
        .await
        .unwrap();

    let sent = h.provider.requests();
    assert_eq!(sent[0].messages[0].content, parley_agent::DEFAULT_SYSTEM_PROMPT);
    assert!(sent[0].tools.is_empty());
}

#[tokio::test]
async fn media_travels_in_a_single_user_message() {
    let h = harness(ScriptedProvider::text("A cat."));
    let image = MediaAttachment::new("image/png", Some("cat.png".into()), vec![1, 2, 3]).unwrap();
    h.orchestrator
        .execute(request("What is this?", "c1").with_media(vec![image]))
        .await
        .unwrap();

    let sent = h.provider.requests();
    let users: Vec<&Message> = sent[0].messages.iter().filter(|m| m.role == Role::User).collect();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].content, "What is this?");
    assert_eq!(users[0].media.len(), 1);
    assert_eq!(users[0].media[0].mime_type, "image/png");
}

#[tokio::test]
async fn streamed_turn_then_delete_clears_history() {
    let h = harness(ScriptedProvider::text("Streaming works."));
    let outcome = h
        .orchestrator
        .execute(request("stream please", "c1").streamed(true))
        .await
        .unwrap();
    let ChatOutcome::Streamed(stream) = outcome else {
        panic!("expected a stream");
    };
    let text: String = stream
        .map(|item| item.unwrap())
        .collect::<Vec<_>>()
        .await
        .concat();
    assert_eq!(text, "Streaming works.");

    let id = ConversationId::from("c1");
    let turns = h.history.turns_for(&id).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].content, text);

    h.conversations.create("c1", "Streaming", None).await.unwrap();
    let report = h.conversations.delete("c1").await.unwrap();
    assert!(report.summary_removed);
    assert_eq!(report.turns_removed, 2);
    assert!(report.memory_cleared);
    assert!(h.conversations.history("c1").await.unwrap().is_empty());
}

#[tokio::test]
async fn deleted_conversation_is_not_replayed_to_the_model() {
    let h = harness(ScriptedProvider::new(vec![
        text_response("ok"),
        text_response("Nothing to recall."),
    ]));
    h.orchestrator.execute(request("secret", "c1")).await.unwrap();
    h.conversations.delete("c1").await.unwrap();
    h.orchestrator.execute(request("what did I say?", "c1")).await.unwrap();

    let sent = h.provider.requests();
    let contents: Vec<&str> = sent[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec![parley_agent::DEFAULT_SYSTEM_PROMPT, "what did I say?"]);
}

#[tokio::test]
async fn unknown_backend_is_a_configuration_error() {
    let h = harness(ScriptedProvider::text("unused"));
    let err = h
        .orchestrator
        .execute(ChatRequest::new("hi", ConversationId::from("c1"), "openai", "gpt-4o"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::UnknownBackend(_)));
    assert!(h.provider.requests().is_empty());
    assert_eq!(h.history.turn_count().await, 0);
}

#[tokio::test]
async fn provider_failure_writes_no_history() {
    let h = harness(ScriptedProvider::new(vec![]));
    let err = h
        .orchestrator
        .execute(request("hi", "c1"))
        .await
        .unwrap_err();
    assert!(matches!(err, ChatError::Backend(_)));
    assert_eq!(h.history.turn_count().await, 0);
}
