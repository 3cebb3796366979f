//! Map-reduce summarization.
//!
//! The text is partitioned into token-bounded spans and each span is summarized (map). While the
//! partial summaries together exceed the budget they are grouped into batches that fit and each
//! batch is summarized again (collapse). One last call combines what remains (reduce). Every call
//! uses the same prompt at temperature zero.

use crate::generation::{CompletionRequest, GenerationClient, TokenUsage};

use super::{
    chunking::{TokenCounter, partition_for_summary},
    prompts::summary_prompt,
    types::SummarizeError,
};

/// Token budget for one map span and for the combined input of one collapse or reduce call.
pub const SUMMARY_TOKEN_BUDGET: usize = 3000;

const MAX_COLLAPSE_ROUNDS: usize = 8;

/// Result of one summarization run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryOutcome {
    /// Trimmed final summary; empty when the input was blank.
    pub summary: String,
    /// Number of model calls issued.
    pub calls: usize,
    /// Accumulated provider-reported usage.
    pub usage: TokenUsage,
}

/// Summarize `text` with the default token budget.
pub async fn summarize_text(
    client: &dyn GenerationClient,
    model: &str,
    counter: &TokenCounter,
    text: &str,
) -> Result<SummaryOutcome, SummarizeError> {
    summarize_with_budget(client, model, counter, text, SUMMARY_TOKEN_BUDGET).await
}

pub(crate) async fn summarize_with_budget(
    client: &dyn GenerationClient,
    model: &str,
    counter: &TokenCounter,
    text: &str,
    budget: usize,
) -> Result<SummaryOutcome, SummarizeError> {
    let mut outcome = SummaryOutcome::default();
    if text.trim().is_empty() {
        return Ok(outcome);
    }

    let spans = partition_for_summary(text, budget, counter.clone())?;
    tracing::debug!(spans = spans.len(), budget, "Summarizing partitions");

    let mut summaries = Vec::with_capacity(spans.len());
    for span in &spans {
        summaries.push(summarize_once(client, model, span, &mut outcome).await?);
    }

    let mut rounds = 0;
    while summaries.len() > 1 && counter(&summaries.join("\n\n")) > budget {
        if rounds == MAX_COLLAPSE_ROUNDS {
            tracing::warn!(
                summaries = summaries.len(),
                "Partial summaries still exceed the budget; reducing anyway"
            );
            break;
        }
        rounds += 1;

        let batches = group_within_budget(&summaries, counter, budget);
        tracing::debug!(round = rounds, batches = batches.len(), "Collapsing summaries");
        let mut collapsed = Vec::with_capacity(batches.len());
        for batch in batches {
            collapsed.push(summarize_once(client, model, &batch, &mut outcome).await?);
        }
        summaries = collapsed;
    }

    outcome.summary = summarize_once(client, model, &summaries.join("\n\n"), &mut outcome).await?;
    Ok(outcome)
}

async fn summarize_once(
    client: &dyn GenerationClient,
    model: &str,
    text: &str,
    outcome: &mut SummaryOutcome,
) -> Result<String, SummarizeError> {
    let completion = client
        .complete(CompletionRequest::deterministic(model, summary_prompt(text)))
        .await?;
    outcome.calls += 1;
    if let Some(usage) = completion.usage {
        outcome.usage += usage;
    }
    Ok(completion.text.trim().to_string())
}

/// Greedily pack consecutive summaries into `\n\n`-joined batches of at most `budget` tokens.
/// A single summary over budget forms its own batch.
fn group_within_budget(summaries: &[String], counter: &TokenCounter, budget: usize) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for summary in summaries {
        current.push(summary);
        if current.len() > 1 && counter(&current.join("\n\n")) > budget {
            current.pop();
            batches.push(current.join("\n\n"));
            current = vec![summary.as_str()];
        }
    }
    if !current.is_empty() {
        batches.push(current.join("\n\n"));
    }
    batches
}
