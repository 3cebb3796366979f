//! Document service coordinating loading, chunking, embedding, storage, and generation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{
    config::{Config, LanguagePolicy, ReingestPolicy},
    embedding::{EmbeddingClient, embedding_client_for},
    generation::{CompletionRequest, GenerationClient, TokenUsage, generation_client_for},
    loader::{
        DocumentFormat, ExtractedImage, LoadedDocument, LoaderError, extract_pdf_images,
        load_document,
    },
    metrics::{MetricsSnapshot, UsageMetrics},
    processing::{
        chunking::{TokenCounter, build_token_counter, chunk_segments},
        prompts::{join_context, question_prompt, translation_prompt},
        summarize::summarize_text,
        translate::resolve_language,
        types::{
            Answer, AnswerError, HealthSnapshot, ProcessedDocument, ProcessingError,
            ServiceInitError, SummarizeError, TranslateError, Translation,
        },
    },
    store::{EmbeddingRecord, ScoredChunk, StoreHandle},
};

/// Number of chunks placed in the question prompt.
pub const RETRIEVAL_TOP_K: usize = 3;

/// Per-service knobs resolved from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Expected embedding vector length.
    pub embedding_dimension: usize,
    /// Model answering questions and writing summaries.
    pub generation_model: String,
    /// Model used for translation.
    pub translation_model: String,
    /// Behavior when a document is ingested again.
    pub reingest_policy: ReingestPolicy,
    /// Validation applied to translation target codes.
    pub language_policy: LanguagePolicy,
}

impl ServiceSettings {
    /// Copy the relevant fields out of `config`.
    pub fn from_config(config: &Config) -> Self {
        Self {
            embedding_dimension: config.embedding_dimension,
            generation_model: config.generation_model.clone(),
            translation_model: config.translation_model.clone(),
            reingest_policy: config.reingest_policy,
            language_policy: config.language_policy,
        }
    }
}

/// Runs every pipeline operation against an explicitly supplied store.
///
/// The service owns the provider clients and the usage counters so the HTTP surface, the MCP
/// server, and the CLI share one set of components. It holds no store of its own; callers open a
/// [`StoreHandle`] and pass it in, or bind one with [`Workspace`].
pub struct DocumentService {
    embedding: Arc<dyn EmbeddingClient>,
    generation: Arc<dyn GenerationClient>,
    settings: ServiceSettings,
    token_counter: TokenCounter,
    metrics: Arc<UsageMetrics>,
    store_writes: Mutex<()>,
}

impl DocumentService {
    /// Assemble a service from already-built clients.
    pub fn from_parts(
        embedding: Arc<dyn EmbeddingClient>,
        generation: Arc<dyn GenerationClient>,
        settings: ServiceSettings,
    ) -> Self {
        let token_counter = build_token_counter(&settings.generation_model);
        Self {
            embedding,
            generation,
            settings,
            token_counter,
            metrics: Arc::new(UsageMetrics::new()),
            store_writes: Mutex::new(()),
        }
    }

    /// Build providers from `config`.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        tracing::info!("Initializing provider clients");
        let embedding = embedding_client_for(config)?;
        let generation = generation_client_for(config)?;
        tracing::info!(
            embedding = config.embedding_provider.label(),
            generation = config.generation_provider.label(),
            "Provider clients initialized"
        );
        Ok(Self::from_parts(
            embedding,
            generation,
            ServiceSettings::from_config(config),
        ))
    }

    /// Settings in effect.
    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Load a document without indexing it.
    pub async fn read_document(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<LoadedDocument, ProcessingError> {
        // Reject unsupported names before handing work to the blocking pool.
        DocumentFormat::from_filename(filename.as_deref())?;
        tokio::task::spawn_blocking(move || load_document(&bytes, filename.as_deref()))
            .await
            .map_err(|error| ProcessingError::Task(error.to_string()))?
            .map_err(ProcessingError::from)
    }

    /// Load, chunk, embed, and store a document.
    ///
    /// Embeddings are computed before the store is touched, so a provider failure leaves any
    /// earlier copy of the document in place. The reingest check and the writes that follow run
    /// under one lock, so concurrent uploads through this service see each other's records.
    pub async fn ingest(
        &self,
        store: &StoreHandle,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<ProcessedDocument, ProcessingError> {
        let document = self.read_document(bytes, filename).await?;
        let chunked = chunk_segments(&document.segments);
        tracing::info!(
            document_id = %document.document_id,
            format = %document.format,
            segments = document.segments.len(),
            chunks = chunked.chunks.len(),
            store = %store.describe(),
            "Processing document"
        );

        let mut outcome = ProcessedDocument {
            document_id: document.document_id,
            format: document.format,
            filename: document.filename,
            raw_text: chunked.raw_text,
            segment_count: document.segments.len(),
            chunks: chunked.chunks,
            inserted: 0,
            skipped_duplicates: 0,
            replaced: 0,
        };

        let policy = self.settings.reingest_policy;
        if policy == ReingestPolicy::Skip && self.skip_stored(store, &mut outcome).await? {
            return Ok(outcome);
        }

        let records = self.embed_records(&outcome).await?;

        let _writes = self.store_writes.lock().await;
        match policy {
            ReingestPolicy::Duplicate => {}
            ReingestPolicy::Skip => {
                if self.skip_stored(store, &mut outcome).await? {
                    return Ok(outcome);
                }
            }
            ReingestPolicy::Replace => {
                outcome.replaced = store.delete_document(&outcome.document_id).await?;
                if outcome.replaced > 0 {
                    tracing::debug!(
                        document_id = %outcome.document_id,
                        removed = outcome.replaced,
                        "Removed previous records"
                    );
                }
            }
        }

        if records.is_empty() {
            tracing::warn!(document_id = %outcome.document_id, "Document produced no text");
            self.metrics.record_document(0);
            return Ok(outcome);
        }

        outcome.inserted = store.insert(records).await?;
        self.metrics.record_document(outcome.inserted as u64);
        tracing::info!(
            document_id = %outcome.document_id,
            inserted = outcome.inserted,
            replaced = outcome.replaced,
            "Document indexed"
        );
        Ok(outcome)
    }

    /// Mark `outcome` skipped when its document is already stored.
    async fn skip_stored(
        &self,
        store: &StoreHandle,
        outcome: &mut ProcessedDocument,
    ) -> Result<bool, ProcessingError> {
        if !store.contains_document(&outcome.document_id).await? {
            return Ok(false);
        }
        outcome.skipped_duplicates = outcome.chunks.len();
        tracing::info!(
            document_id = %outcome.document_id,
            "Document already stored; skipping"
        );
        Ok(true)
    }

    /// Embed every chunk and check the vectors before anything is written.
    async fn embed_records(
        &self,
        outcome: &ProcessedDocument,
    ) -> Result<Vec<EmbeddingRecord>, ProcessingError> {
        if outcome.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = outcome
            .chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect();
        let vectors = self.embedding.generate_embeddings(texts).await?;
        if vectors.len() != outcome.chunks.len() {
            return Err(ProcessingError::Embedding(
                crate::embedding::EmbeddingClientError::InvalidResponse(format!(
                    "expected {} vectors, got {}",
                    outcome.chunks.len(),
                    vectors.len()
                )),
            ));
        }
        let expected = self.settings.embedding_dimension;
        if let Some(actual) = vectors
            .iter()
            .map(Vec::len)
            .find(|&actual| actual != expected)
        {
            return Err(ProcessingError::DimensionMismatch { expected, actual });
        }

        let ingested_at = current_timestamp_rfc3339();
        Ok(outcome
            .chunks
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord {
                id: Uuid::new_v4().to_string(),
                document_id: outcome.document_id.clone(),
                source: outcome.filename.clone(),
                chunk,
                vector,
                ingested_at: ingested_at.clone(),
            })
            .collect())
    }

    /// Return the `limit` stored chunks most similar to `question`, best first.
    pub async fn retrieve(
        &self,
        store: &StoreHandle,
        question: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, AnswerError> {
        let mut vectors = self
            .embedding
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(AnswerError::EmptyEmbedding)?;

        let expected = self.settings.embedding_dimension;
        let actual = vector.len();
        if actual != expected {
            return Err(AnswerError::DimensionMismatch { expected, actual });
        }

        let hits = store.search(&vector, limit).await?;
        tracing::debug!(hits = hits.len(), limit, "Retrieved context");
        Ok(hits)
    }

    /// Answer `question` from the top [`RETRIEVAL_TOP_K`] stored chunks.
    pub async fn ask(&self, store: &StoreHandle, question: &str) -> Result<Answer, AnswerError> {
        let sources = self.retrieve(store, question, RETRIEVAL_TOP_K).await?;
        let prompt = question_prompt(&join_context(&sources), question);
        let completion = self
            .generation
            .complete(CompletionRequest::deterministic(
                self.settings.generation_model.clone(),
                prompt,
            ))
            .await?;

        let usage = completion.usage.unwrap_or_default();
        self.metrics
            .record_question(&self.settings.generation_model, usage);
        tracing::info!(
            sources = sources.len(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Question answered"
        );
        Ok(Answer {
            answer: completion.text.trim().to_string(),
            sources,
        })
    }

    /// Map-reduce summary of `text`; blank input yields an empty summary without a model call.
    pub async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let outcome = summarize_text(
            self.generation.as_ref(),
            &self.settings.generation_model,
            &self.token_counter,
            text,
        )
        .await?;
        if outcome.calls > 0 {
            self.metrics
                .record_summary(&self.settings.generation_model, outcome.usage);
            tracing::info!(
                calls = outcome.calls,
                prompt_tokens = outcome.usage.prompt_tokens,
                completion_tokens = outcome.usage.completion_tokens,
                "Summary generated"
            );
        }
        Ok(outcome.summary)
    }

    /// Translate `text` into `target_lang`.
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
    ) -> Result<Translation, TranslateError> {
        let language = resolve_language(target_lang, self.settings.language_policy)?;
        let completion = self
            .generation
            .complete(CompletionRequest::deterministic(
                self.settings.translation_model.clone(),
                translation_prompt(text, &language),
            ))
            .await?;

        let usage: TokenUsage = completion.usage.unwrap_or_default();
        self.metrics
            .record_translation(&self.settings.translation_model, usage);
        tracing::info!(
            language = %language,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Translation generated"
        );
        Ok(Translation {
            translation: completion.text.trim().to_string(),
            target_lang: language,
        })
    }

    /// Extract embedded images from a PDF; other formats are rejected.
    pub async fn extract_images(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<Vec<ExtractedImage>, ProcessingError> {
        let format = DocumentFormat::from_filename(filename.as_deref())?;
        if format != DocumentFormat::Pdf {
            return Err(LoaderError::UnsupportedFormat(format.suffix().to_string()).into());
        }
        let images = tokio::task::spawn_blocking(move || extract_pdf_images(&bytes))
            .await
            .map_err(|error| ProcessingError::Task(error.to_string()))??;
        tracing::info!(images = images.len(), "Images extracted");
        Ok(images)
    }

    /// Probe `store` for the health resource.
    pub async fn health(&self, store: &StoreHandle) -> HealthSnapshot {
        let description = store.describe();
        match store.count().await {
            Ok(records) => HealthSnapshot {
                store: description,
                reachable: true,
                records: Some(records),
                error: None,
            },
            Err(error) => {
                tracing::warn!(error = %error, "Store health probe failed");
                HealthSnapshot {
                    store: description,
                    reachable: false,
                    records: None,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    /// Return the current usage counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Abstraction over the pipeline used by external surfaces (HTTP, MCP, CLI).
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Load, chunk, embed, and store a document.
    async fn ingest(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<ProcessedDocument, ProcessingError>;

    /// Load a document without storing it.
    async fn read_document(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<LoadedDocument, ProcessingError>;

    /// Answer a question from stored chunks.
    async fn ask(&self, question: String) -> Result<Answer, AnswerError>;

    /// Summarize raw text.
    async fn summarize(&self, text: String) -> Result<String, SummarizeError>;

    /// Translate text into the target language.
    async fn translate(
        &self,
        text: String,
        target_lang: String,
    ) -> Result<Translation, TranslateError>;

    /// Extract embedded images from a PDF.
    async fn extract_images(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<Vec<ExtractedImage>, ProcessingError>;

    /// Probe the bound store.
    async fn health(&self) -> HealthSnapshot;

    /// Retrieve the current usage counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// A [`DocumentService`] bound to one opened store.
pub struct Workspace {
    service: DocumentService,
    store: StoreHandle,
}

impl Workspace {
    /// Bind `service` to `store`.
    pub fn new(service: DocumentService, store: StoreHandle) -> Self {
        Self { service, store }
    }

    /// The bound store.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// The underlying service.
    pub fn service(&self) -> &DocumentService {
        &self.service
    }
}

#[async_trait]
impl DocumentApi for Workspace {
    async fn ingest(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<ProcessedDocument, ProcessingError> {
        self.service.ingest(&self.store, bytes, filename).await
    }

    async fn read_document(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<LoadedDocument, ProcessingError> {
        self.service.read_document(bytes, filename).await
    }

    async fn ask(&self, question: String) -> Result<Answer, AnswerError> {
        self.service.ask(&self.store, &question).await
    }

    async fn summarize(&self, text: String) -> Result<String, SummarizeError> {
        self.service.summarize(&text).await
    }

    async fn translate(
        &self,
        text: String,
        target_lang: String,
    ) -> Result<Translation, TranslateError> {
        self.service.translate(&text, &target_lang).await
    }

    async fn extract_images(
        &self,
        bytes: Vec<u8>,
        filename: Option<String>,
    ) -> Result<Vec<ExtractedImage>, ProcessingError> {
        self.service.extract_images(bytes, filename).await
    }

    async fn health(&self) -> HealthSnapshot {
        self.service.health(&self.store).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.service.metrics_snapshot()
    }
}
