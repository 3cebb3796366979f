//! Usage counters and cost estimates for the generation provider.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::generation::TokenUsage;

/// Hosted model price in micro-dollars per thousand tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPrice {
    /// Price of one thousand prompt tokens.
    pub prompt_micros_per_1k: u64,
    /// Price of one thousand completion tokens.
    pub completion_micros_per_1k: u64,
}

impl ModelPrice {
    /// Cost of `usage` in nano-dollars, which keeps sub-cent requests exact.
    pub fn cost_nanos(self, usage: TokenUsage) -> u64 {
        usage.prompt_tokens.saturating_mul(self.prompt_micros_per_1k)
            + usage
                .completion_tokens
                .saturating_mul(self.completion_micros_per_1k)
    }
}

/// OpenAI list prices by model prefix. Ordered so longer prefixes win.
const PRICES: &[(&str, ModelPrice)] = &[
    ("gpt-3.5-turbo-instruct", price(1_500, 2_000)),
    ("gpt-3.5-turbo-16k", price(3_000, 4_000)),
    ("gpt-3.5-turbo", price(1_500, 2_000)),
    ("gpt-4o-mini", price(150, 600)),
    ("gpt-4o", price(5_000, 15_000)),
    ("gpt-4-turbo", price(10_000, 30_000)),
    ("gpt-4-32k", price(60_000, 120_000)),
    ("gpt-4", price(30_000, 60_000)),
    ("text-davinci-003", price(20_000, 20_000)),
];

const fn price(prompt_micros_per_1k: u64, completion_micros_per_1k: u64) -> ModelPrice {
    ModelPrice {
        prompt_micros_per_1k,
        completion_micros_per_1k,
    }
}

/// Price for `model`, or `None` for models without a list price such as local Ollama models.
pub fn price_for(model: &str) -> Option<ModelPrice> {
    PRICES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, price)| *price)
}

/// Thread-safe counters describing pipeline activity since startup.
#[derive(Default)]
pub struct UsageMetrics {
    documents_ingested: AtomicU64,
    chunks_indexed: AtomicU64,
    last_chunk_count: AtomicU64,
    questions_answered: AtomicU64,
    summaries_generated: AtomicU64,
    translations_generated: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    cost_nanos: AtomicU64,
}

impl UsageMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested document and the number of chunks written for it.
    pub fn record_document(&self, chunk_count: u64) {
        self.documents_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(chunk_count, Ordering::Relaxed);
        self.last_chunk_count.store(chunk_count, Ordering::Relaxed);
    }

    /// Record an answered question generated by `model`.
    pub fn record_question(&self, model: &str, usage: TokenUsage) {
        self.questions_answered.fetch_add(1, Ordering::Relaxed);
        self.record_usage(model, usage);
    }

    /// Record a summary generated by `model`.
    pub fn record_summary(&self, model: &str, usage: TokenUsage) {
        self.summaries_generated.fetch_add(1, Ordering::Relaxed);
        self.record_usage(model, usage);
    }

    /// Record a translation generated by `model`.
    pub fn record_translation(&self, model: &str, usage: TokenUsage) {
        self.translations_generated.fetch_add(1, Ordering::Relaxed);
        self.record_usage(model, usage);
    }

    fn record_usage(&self, model: &str, usage: TokenUsage) {
        self.prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
        let cost = price_for(model).map_or(0, |price| price.cost_nanos(usage));
        self.cost_nanos.fetch_add(cost, Ordering::Relaxed);
        tracing::debug!(
            model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = nanos_to_usd(cost),
            "Generation usage recorded"
        );
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_ingested: self.documents_ingested.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            last_chunk_count: self.last_chunk_count.load(Ordering::Relaxed),
            questions_answered: self.questions_answered.load(Ordering::Relaxed),
            summaries_generated: self.summaries_generated.load(Ordering::Relaxed),
            translations_generated: self.translations_generated.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            estimated_cost_usd: nanos_to_usd(self.cost_nanos.load(Ordering::Relaxed)),
        }
    }
}

fn nanos_to_usd(nanos: u64) -> f64 {
    nanos as f64 / 1_000_000_000.0
}

/// Immutable view of usage counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Documents ingested since startup.
    pub documents_ingested: u64,
    /// Chunks written across all ingested documents.
    pub chunks_indexed: u64,
    /// Chunks written for the most recent document.
    pub last_chunk_count: u64,
    /// Questions answered.
    pub questions_answered: u64,
    /// Summaries produced.
    pub summaries_generated: u64,
    /// Translations produced.
    pub translations_generated: u64,
    /// Prompt tokens reported by the generation provider.
    pub prompt_tokens: u64,
    /// Completion tokens reported by the generation provider.
    pub completion_tokens: u64,
    /// Dollars spent at list price; models without a known price add nothing.
    pub estimated_cost_usd: f64,
}
