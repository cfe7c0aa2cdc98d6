//! A ready-to-use backend: one provider, one model, shared chat memory.
//!
//! The handle owns the request loop. It replays the conversation window,
//! runs bound-tool calls until the model produces a plain answer, and only
//! then appends the exchange to chat memory.

use parley_core::error::ProviderError;
use parley_core::memory::ChatMemory;
use parley_core::message::{ConversationId, Message, MessageToolCall};
use parley_core::prompt::AssembledPrompt;
use parley_core::provider::{Provider, ProviderRequest, ProviderResponse, StreamChunk};
use parley_core::tool::Tool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::registry::ProviderKind;

/// Upper bound on model → tool → model round trips in one turn.
pub const MAX_TOOL_ROUNDS: usize = 5;

/// Text deltas of a streamed answer. Ends after the last delta or the first error.
pub type TextStream = mpsc::Receiver<Result<String, ProviderError>>;

#[derive(Clone)]
pub struct BackendHandle {
    kind: ProviderKind,
    model: String,
    provider: Arc<dyn Provider>,
    memory: Arc<dyn ChatMemory>,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl BackendHandle {
    pub fn new(
        kind: ProviderKind,
        model: impl Into<String>,
        provider: Arc<dyn Provider>,
        memory: Arc<dyn ChatMemory>,
    ) -> Self {
        Self {
            kind,
            model: model.into(),
            provider,
            memory,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, messages: Vec<Message>, prompt: &AssembledPrompt, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: prompt.tool_definitions(),
            stream,
        }
    }

    async fn initial_messages(&self, conversation_id: &ConversationId, prompt: &AssembledPrompt) -> Vec<Message> {
        let history = match self.memory.load(conversation_id).await {
            Ok(history) => history,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Chat memory unavailable, sending without history");
                Vec::new()
            }
        };
        prompt.to_messages(history)
    }

    async fn remember(&self, conversation_id: &ConversationId, prompt: &AssembledPrompt, answer: &str) {
        let exchange = vec![prompt.user_message(), Message::assistant(answer)];
        if let Err(e) = self.memory.append(conversation_id, exchange).await {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to update chat memory");
        }
    }

    /// Buffered invocation: returns the answer text of every round, concatenated.
    pub async fn call(
        &self,
        conversation_id: &ConversationId,
        prompt: &AssembledPrompt,
    ) -> Result<String, ProviderError> {
        let mut messages = self.initial_messages(conversation_id, prompt).await;
        let mut answer = String::new();
        let mut round = 0;

        loop {
            let response: ProviderResponse = self
                .provider
                .complete(self.request(messages.clone(), prompt, false))
                .await?;
            answer.push_str(&response.message.content);

            let pending = response.message.tool_calls.clone();
            if pending.is_empty() || round == MAX_TOOL_ROUNDS {
                if !pending.is_empty() {
                    warn!(model = %self.model, "Tool round limit reached, returning partial answer");
                }
                self.remember(conversation_id, prompt, &answer).await;
                return Ok(answer);
            }

            round += 1;
            messages.push(response.message);
            messages.extend(run_tool_calls(prompt.tool.as_ref(), &pending).await);
        }
    }

    /// Streamed invocation.
    ///
    /// The first provider request is made before returning, so connection and
    /// auth failures surface as `Err`. Later failures arrive as an `Err` item.
    /// Dropping the receiver stops the producer; chat memory is then left alone.
    pub async fn stream(
        &self,
        conversation_id: &ConversationId,
        prompt: AssembledPrompt,
    ) -> Result<TextStream, ProviderError> {
        let messages = self.initial_messages(conversation_id, &prompt).await;
        let first = self.provider.stream(self.request(messages.clone(), &prompt, true)).await?;

        let (tx, rx) = mpsc::channel(64);
        let handle = self.clone();
        let conversation_id = conversation_id.clone();

        tokio::spawn(async move {
            handle.drive_stream(conversation_id, prompt, messages, first, tx).await;
        });

        Ok(rx)
    }

    async fn drive_stream(
        self,
        conversation_id: ConversationId,
        prompt: AssembledPrompt,
        mut messages: Vec<Message>,
        mut upstream: mpsc::Receiver<Result<StreamChunk, ProviderError>>,
        tx: mpsc::Sender<Result<String, ProviderError>>,
    ) {
        let mut answer = String::new();
        let mut round = 0;
        loop {
            let mut round_text = String::new();
            let mut pending: Vec<MessageToolCall> = Vec::new();
            let mut finished = false;

            while let Some(item) = upstream.recv().await {
                match item {
                    Ok(chunk) => {
                        if let Some(delta) = chunk.content.filter(|c| !c.is_empty()) {
                            round_text.push_str(&delta);
                            answer.push_str(&delta);
                            if tx.send(Ok(delta)).await.is_err() {
                                debug!(conversation_id = %conversation_id, "Stream consumer went away");
                                return;
                            }
                        }
                        if chunk.done {
                            pending = chunk.tool_calls;
                            finished = true;
                            break;
                        }
                    }
                    Err(e) => {
                        fail(&tx, &conversation_id, e).await;
                        return;
                    }
                }
            }

            if !finished {
                let e = ProviderError::StreamInterrupted("upstream closed before the final chunk".into());
                fail(&tx, &conversation_id, e).await;
                return;
            }

            if pending.is_empty() || round == MAX_TOOL_ROUNDS {
                self.remember(&conversation_id, &prompt, &answer).await;
                info!(conversation_id = %conversation_id, model = %self.model, rounds = round + 1, "Stream complete");
                return;
            }

            round += 1;
            let mut assistant = Message::assistant(round_text);
            assistant.tool_calls = pending.clone();
            messages.push(assistant);
            messages.extend(run_tool_calls(prompt.tool.as_ref(), &pending).await);

            upstream = match self.provider.stream(self.request(messages.clone(), &prompt, true)).await {
                Ok(rx) => rx,
                Err(e) => {
                    fail(&tx, &conversation_id, e).await;
                    return;
                }
            };
        }
    }
}

/// Deliver the terminal error. Chat memory is not touched.
async fn fail(
    tx: &mpsc::Sender<Result<String, ProviderError>>,
    conversation_id: &ConversationId,
    error: ProviderError,
) {
    warn!(conversation_id = %conversation_id, error = %error, "Backend stream failed");
    if tx.send(Err(error)).await.is_err() {
        debug!(conversation_id = %conversation_id, "Stream consumer went away before the error");
    }
}

/// Execute the requested calls against the bound tool.
///
/// Failures are reported back to the model as the tool's output.
async fn run_tool_calls(tool: Option<&Arc<dyn Tool>>, calls: &[MessageToolCall]) -> Vec<Message> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let output = match tool {
            Some(tool) if tool.name() == call.name => {
                match serde_json::from_str::<serde_json::Value>(&call.arguments) {
                    Ok(arguments) => match tool.execute(arguments).await {
                        Ok(result) => {
                            debug!(tool = %call.name, success = result.success, "Tool executed");
                            result.output
                        }
                        Err(e) => {
                            warn!(tool = %call.name, error = %e, "Tool execution failed");
                            format!("Error: {e}")
                        }
                    },
                    Err(e) => format!("Error: invalid arguments for '{}': {e}", call.name),
                }
            }
            _ => {
                warn!(tool = %call.name, "Model requested a tool that is not bound");
                format!("Error: tool '{}' is not available", call.name)
            }
        };
        results.push(Message::tool_result(call.id.clone(), output));
    }
    results
}
