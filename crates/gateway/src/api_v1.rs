//! HTTP API v1.
//!
//! Endpoints:
//!
//! - `POST   /v1/chat`                          chat turn (multipart form; SSE when `isStream=true`)
//! - `GET    /v1/conversations`                 list conversation summaries
//! - `POST   /v1/conversations`                 create a summary
//! - `PUT    /v1/conversations/{id}`            update title / tag
//! - `DELETE /v1/conversations/{id}`            delete summary, turns and chat memory
//! - `GET    /v1/conversations/{id}/turns`      recorded turns, oldest first
//! - `POST   /v1/conversations/{id}/documents`  ingest a document for retrieval
//! - `GET    /v1/models`                        registered backends
//! - `GET    /v1/tools`                         registered tools
//! - `GET    /v1/prompts`                       system prompt catalog

use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event as SseEvent, Sse},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};

use parley_agent::{
    ChatOrchestrator, ChatOutcome, ChatRequest, ChatStream, ChatStreamEvent, ConversationError,
    ConversationService, DeleteReport, DocumentIngestor, PromptCatalog, PromptInfo,
};
use parley_core::error::{ChatError, MemoryError};
use parley_core::history::{ChatTurn, ConversationSummary};
use parley_core::message::{ConversationId, MediaAttachment};
use parley_core::tool::ToolRegistry;
use parley_providers::{BackendInfo, BackendRegistry};

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API. Built once by [`crate::build_state`].
pub struct ApiV1State {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub conversations: ConversationService,
    pub ingestor: Arc<DocumentIngestor>,
    pub backends: Arc<BackendRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub prompts: Arc<dyn PromptCatalog>,
    /// Used when a chat request names no provider.
    pub default_provider: String,
    /// Used when a chat request names no model.
    pub default_model: String,
}

pub type SharedApiState = Arc<ApiV1State>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/chat", post(chat_handler))
        .route(
            "/conversations",
            get(list_conversations_handler).post(create_conversation_handler),
        )
        .route(
            "/conversations/{id}",
            put(update_conversation_handler).delete(delete_conversation_handler),
        )
        .route("/conversations/{id}/turns", get(list_turns_handler))
        .route("/conversations/{id}/documents", post(ingest_document_handler))
        .route("/models", get(list_models_handler))
        .route("/tools", get(list_tools_handler))
        .route("/prompts", get(list_prompts_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn chat_error(e: ChatError) -> ApiError {
    let status = match &e {
        ChatError::UnknownBackend(_) => StatusCode::BAD_REQUEST,
        ChatError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, e.to_string())
}

fn conversation_error(e: ConversationError) -> ApiError {
    let status = match &e {
        ConversationError::Validation(_) | ConversationError::Storage(MemoryError::Validation(_)) => {
            StatusCode::BAD_REQUEST
        }
        ConversationError::NotFound(_) => StatusCode::NOT_FOUND,
        ConversationError::Storage(_) | ConversationError::Delete { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error(status, e.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateConversationRequest {
    #[serde(default)]
    chat_id: String,
    #[serde(default)]
    chat_title: String,
    #[serde(default)]
    chat_tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateConversationRequest {
    #[serde(default)]
    chat_title: String,
    #[serde(default)]
    chat_tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TurnListResponse {
    pub conversation_id: String,
    pub turns: Vec<ChatTurn>,
}

#[derive(Debug, Deserialize)]
struct IngestDocumentRequest {
    #[serde(default)]
    source: Option<String>,
    content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestDocumentResponse {
    pub conversation_id: String,
    pub chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct ModelListResponse {
    pub models: Vec<BackendInfo>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolDto {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolDto>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct PromptListResponse {
    pub prompts: Vec<PromptInfo>,
}

// ── Chat ──────────────────────────────────────────────────────────────────

/// Form fields of `POST /v1/chat`.
#[derive(Debug, Default)]
struct ChatForm {
    prompt: Option<String>,
    chat_id: Option<String>,
    is_stream: bool,
    provider: Option<String>,
    model: Option<String>,
    system_prompt_id: Option<String>,
    files: Vec<MediaAttachment>,
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_chat_form(mut multipart: Multipart) -> Result<ChatForm, ApiError> {
    let mut form = ChatForm::default();
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        api_error(StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let filename = field.file_name().map(str::to_string);
                let declared = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(bad_form)?.to_vec();
                if data.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
                    continue;
                }
                let attachment = match declared {
                    Some(mime) => MediaAttachment::new(&mime, filename, data),
                    None => MediaAttachment::from_filename(filename.as_deref().unwrap_or_default(), data),
                }
                .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                form.files.push(attachment);
            }
            other => {
                let value = field.text().await.map_err(bad_form)?;
                match other {
                    // The raw text is kept verbatim.
                    "prompt" => form.prompt = Some(value),
                    "chatId" => form.chat_id = non_blank(value),
                    "isStream" => form.is_stream = value.trim().eq_ignore_ascii_case("true"),
                    "modelProvider" => form.provider = non_blank(value),
                    "modelName" => form.model = non_blank(value),
                    "systemPromptId" => form.system_prompt_id = non_blank(value),
                    _ => warn!(field = %other, "Ignoring unknown chat form field"),
                }
            }
        }
    }
    Ok(form)
}

/// `POST /v1/chat`
async fn chat_handler(
    State(state): State<SharedApiState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_chat_form(multipart).await?;

    let text = form
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "prompt must not be blank"))?;
    let conversation_id = form.chat_id.map(ConversationId).unwrap_or_default();

    info!(
        conversation_id = %conversation_id,
        stream = form.is_stream,
        files = form.files.len(),
        "v1/chat request"
    );

    let mut request = ChatRequest::new(
        text,
        conversation_id.clone(),
        form.provider.unwrap_or_else(|| state.default_provider.clone()),
        form.model.unwrap_or_else(|| state.default_model.clone()),
    )
    .streamed(form.is_stream)
    .with_media(form.files);
    if let Some(id) = form.system_prompt_id {
        request = request.with_system_prompt(id);
    }

    match state.orchestrator.execute(request).await.map_err(chat_error)? {
        ChatOutcome::Complete(content) => Ok(Json(ChatResponse {
            conversation_id: conversation_id.to_string(),
            content,
        })
        .into_response()),
        ChatOutcome::Streamed(stream) => Ok(sse_response(conversation_id, stream).into_response()),
    }
}

/// `chunk` per delta, then `done`; or `error` as the last event.
fn sse_response(
    conversation_id: ConversationId,
    stream: ChatStream,
) -> Sse<impl futures::Stream<Item = Result<SseEvent, Infallible>>> {
    let done = ChatStreamEvent::Done {
        conversation_id: conversation_id.to_string(),
    };

    let events = stream
        .map(|item| match item {
            Ok(content) => ChatStreamEvent::Chunk { content },
            Err(e) => ChatStreamEvent::Error {
                message: e.to_string(),
            },
        })
        .chain(futures::stream::iter([done]))
        .scan(false, |failed, event| {
            let next = if *failed {
                None
            } else {
                *failed = matches!(event, ChatStreamEvent::Error { .. });
                Some(event)
            };
            futures::future::ready(next)
        })
        .map(|event| {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Ok(SseEvent::default().event(event.event_type()).data(data))
        });

    Sse::new(events)
}

// ── Conversations ─────────────────────────────────────────────────────────

async fn list_conversations_handler(
    State(state): State<SharedApiState>,
) -> Result<Json<ConversationListResponse>, ApiError> {
    let conversations = state.conversations.list().await.map_err(conversation_error)?;
    Ok(Json(ConversationListResponse { conversations }))
}

async fn create_conversation_handler(
    State(state): State<SharedApiState>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ConversationSummary>), ApiError> {
    let summary = state
        .conversations
        .create(&payload.chat_id, &payload.chat_title, payload.chat_tag)
        .await
        .map_err(conversation_error)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

async fn update_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateConversationRequest>,
) -> Result<Json<ConversationSummary>, ApiError> {
    let summary = state
        .conversations
        .update(&id, &payload.chat_title, payload.chat_tag)
        .await
        .map_err(conversation_error)?;
    Ok(Json(summary))
}

async fn delete_conversation_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteReport>, ApiError> {
    let report = state
        .conversations
        .delete(&id)
        .await
        .map_err(conversation_error)?;
    Ok(Json(report))
}

async fn list_turns_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> Result<Json<TurnListResponse>, ApiError> {
    let turns = state
        .conversations
        .history(&id)
        .await
        .map_err(conversation_error)?;
    Ok(Json(TurnListResponse {
        conversation_id: id,
        turns,
    }))
}

async fn ingest_document_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(payload): Json<IngestDocumentRequest>,
) -> Result<(StatusCode, Json<IngestDocumentResponse>), ApiError> {
    let conversation_id = ConversationId(id);
    let chunks = state
        .ingestor
        .ingest(&conversation_id, payload.source, &payload.content)
        .await
        .map_err(|e| match e {
            MemoryError::Validation(m) => api_error(StatusCode::BAD_REQUEST, m),
            other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        })?;
    Ok((
        StatusCode::CREATED,
        Json(IngestDocumentResponse {
            conversation_id: conversation_id.to_string(),
            chunks,
        }),
    ))
}

// ── Catalogs ──────────────────────────────────────────────────────────────

async fn list_models_handler(State(state): State<SharedApiState>) -> Json<ModelListResponse> {
    let models = state.backends.list();
    let count = models.len();
    Json(ModelListResponse { models, count })
}

async fn list_tools_handler(State(state): State<SharedApiState>) -> Json<ToolListResponse> {
    let defs = state.tools.definitions();
    let count = defs.len();

    Json(ToolListResponse {
        tools: defs
            .into_iter()
            .map(|d| ToolDto {
                name: d.name,
                description: d.description,
                parameters: d.parameters,
            })
            .collect(),
        count,
    })
}

async fn list_prompts_handler(State(state): State<SharedApiState>) -> Json<PromptListResponse> {
    Json(PromptListResponse {
        prompts: state.prompts.list(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────
