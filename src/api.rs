//! HTTP surface for DocuSmart.
//!
//! - `POST /documents?filename=<name>` – Upload raw document bytes; extract, chunk, embed, and
//!   store them. Returns the document id, counters, and the raw text used for summaries.
//! - `POST /ask` – Answer a question from the stored chunks.
//! - `POST /summarize` – Map-reduce summary of supplied text.
//! - `POST /translate` – Translate text into a target language code.
//! - `POST /images?filename=<name>` – Extract embedded images from an uploaded PDF.
//! - `GET /languages` – Supported translation targets.
//! - `GET /metrics` – Usage counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! The HTTP surface shares the same pipeline with the MCP server and the CLI.

use crate::loader::{EncodedImage, LoaderError};
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    AnswerError, DocumentApi, ProcessingError, SUPPORTED_LANGUAGES, SummarizeError,
    TranslateError, language_name,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/documents", post(ingest_document::<S>))
        .route("/ask", post(ask_question::<S>))
        .route("/summarize", post(summarize_text::<S>))
        .route("/translate", post(translate_text::<S>))
        .route("/images", post(extract_images::<S>))
        .route("/languages", get(get_languages))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

/// Query string shared by the upload endpoints.
#[derive(Deserialize)]
struct UploadQuery {
    /// Original filename; its extension selects the format (PDF when absent).
    #[serde(default)]
    filename: Option<String>,
}

/// Success response for `POST /documents`.
#[derive(Serialize)]
struct IngestResponse {
    document_id: String,
    format: crate::loader::DocumentFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    segments: usize,
    chunks: usize,
    inserted: usize,
    skipped_duplicates: usize,
    replaced: usize,
    raw_text: String,
}

/// Ingest an uploaded document.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<IngestResponse>, AppError>
where
    S: DocumentApi,
{
    if body.is_empty() {
        return Err(AppError::bad_request("request body must contain the document bytes"));
    }
    let outcome = service.ingest(body.to_vec(), query.filename).await?;
    tracing::info!(
        document_id = %outcome.document_id,
        chunks = outcome.chunks.len(),
        inserted = outcome.inserted,
        "Ingest request completed"
    );
    Ok(Json(IngestResponse {
        document_id: outcome.document_id,
        format: outcome.format,
        filename: outcome.filename,
        segments: outcome.segment_count,
        chunks: outcome.chunks.len(),
        inserted: outcome.inserted,
        skipped_duplicates: outcome.skipped_duplicates,
        replaced: outcome.replaced,
        raw_text: outcome.raw_text,
    }))
}

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceView>,
}

#[derive(Serialize)]
struct SourceView {
    document_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    segment: usize,
    score: f32,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError>
where
    S: DocumentApi,
{
    if request.question.trim().is_empty() {
        return Err(AppError::bad_request("question must not be empty"));
    }
    let answer = service.ask(request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.answer,
        sources: answer
            .sources
            .into_iter()
            .map(|hit| SourceView {
                document_id: hit.document_id,
                source: hit.source,
                segment: hit.chunk.segment,
                score: hit.score,
            })
            .collect(),
    }))
}

#[derive(Deserialize)]
struct SummarizeRequest {
    text: String,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
}

async fn summarize_text<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: DocumentApi,
{
    let summary = service.summarize(request.text).await?;
    Ok(Json(SummarizeResponse { summary }))
}

#[derive(Deserialize)]
struct TranslateRequest {
    text: String,
    target_lang: String,
}

async fn translate_text<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<crate::processing::Translation>, AppError>
where
    S: DocumentApi,
{
    let translation = service
        .translate(request.text, request.target_lang)
        .await?;
    Ok(Json(translation))
}

#[derive(Serialize)]
struct ImagesResponse {
    images: Vec<EncodedImage>,
}

async fn extract_images<S>(
    State(service): State<Arc<S>>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<ImagesResponse>, AppError>
where
    S: DocumentApi,
{
    let images = service.extract_images(body.to_vec(), query.filename).await?;
    Ok(Json(ImagesResponse {
        images: images.into_iter().map(EncodedImage::from).collect(),
    }))
}

#[derive(Serialize)]
struct LanguageView {
    code: &'static str,
    name: &'static str,
}

#[derive(Serialize)]
struct LanguagesResponse {
    languages: Vec<LanguageView>,
}

async fn get_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: SUPPORTED_LANGUAGES
            .into_iter()
            .map(|code| LanguageView {
                code,
                name: language_name(code).unwrap_or(code),
            })
            .collect(),
    })
}

/// Return the usage counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/documents?filename=<name>",
                description: "Upload raw PDF, .txt, or .docx bytes. The document is split into 800-character chunks with 150 characters of overlap, embedded, and stored.",
                request_example: None,
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/ask",
                description: "Answer a question from the three most similar stored chunks.",
                request_example: Some(json!({ "question": "What does page two say?" })),
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Map-reduce summary of the supplied text. Empty text returns an empty summary.",
                request_example: Some(json!({ "text": "Document contents" })),
            },
            CommandDescriptor {
                name: "translate",
                method: "POST",
                path: "/translate",
                description: "Translate text into a target language code such as fr, en, es, de, or it.",
                request_example: Some(json!({ "text": "Hello", "target_lang": "fr" })),
            },
            CommandDescriptor {
                name: "images",
                method: "POST",
                path: "/images?filename=<name>.pdf",
                description: "Extract embedded images from raw PDF bytes as base64 data.",
                request_example: None,
            },
            CommandDescriptor {
                name: "languages",
                method: "GET",
                path: "/languages",
                description: "List the supported translation targets.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return usage counters: documents, chunks, questions, summaries, translations, and tokens.",
                request_example: None,
            },
        ],
    })
}

/// Error response carrying a status and a plain-text message.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, self.message).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(error: ProcessingError) -> Self {
        let status = match error {
            ProcessingError::Loader(LoaderError::UnsupportedFormat(_)) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ProcessingError::Loader(LoaderError::Extraction { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<AnswerError> for AppError {
    fn from(error: AnswerError) -> Self {
        Self::internal(error)
    }
}

impl From<SummarizeError> for AppError {
    fn from(error: SummarizeError) -> Self {
        Self::internal(error)
    }
}

impl From<TranslateError> for AppError {
    fn from(error: TranslateError) -> Self {
        match error {
            TranslateError::EmptyLanguage | TranslateError::UnsupportedLanguage(_) => {
                Self::bad_request(error.to_string())
            }
            TranslateError::Generation(_) => Self::internal(error),
        }
    }
}
