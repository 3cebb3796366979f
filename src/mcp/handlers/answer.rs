//! MCP handler for question answering.

use std::sync::Arc;

use crate::processing::DocumentApi;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Value, json};

use super::parse_arguments;

/// Arguments accepted by the `ask` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct AskToolRequest {
    /// Question answered from the ingested documents.
    pub(crate) question: String,
}

/// Handle the `ask` tool: retrieve the closest chunks and generate a grounded answer.
pub(crate) async fn handle_ask(
    api: &Arc<dyn DocumentApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: AskToolRequest = parse_arguments(arguments)?;
    if args.question.trim().is_empty() {
        return Err(McpError::invalid_params("`question` must not be empty", None));
    }

    let answer = api
        .ask(args.question)
        .await
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;

    let sources: Vec<Value> = answer
        .sources
        .iter()
        .map(|hit| {
            json!({
                "documentId": hit.document_id,
                "source": hit.source,
                "segment": hit.chunk.segment,
                "score": hit.score,
                "text": hit.chunk.text,
            })
        })
        .collect();

    Ok(CallToolResult::structured(json!({
        "answer": answer.answer,
        "sources": sources,
    })))
}
