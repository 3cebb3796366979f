//! Handler for the metrics tool.

use std::sync::Arc;

use crate::processing::DocumentApi;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde_json::json;

/// Handle the `metrics` tool, returning the current usage counters.
pub(crate) async fn handle_metrics(
    api: &Arc<dyn DocumentApi>,
) -> Result<CallToolResult, McpError> {
    let snapshot = api.metrics_snapshot();
    Ok(CallToolResult::structured(json!({
        "documentsIngested": snapshot.documents_ingested,
        "chunksIndexed": snapshot.chunks_indexed,
        "lastChunkCount": snapshot.last_chunk_count,
        "questionsAnswered": snapshot.questions_answered,
        "summariesGenerated": snapshot.summaries_generated,
        "translationsGenerated": snapshot.translations_generated,
        "promptTokens": snapshot.prompt_tokens,
        "completionTokens": snapshot.completion_tokens,
        "estimatedCostUsd": snapshot.estimated_cost_usd,
    })))
}
