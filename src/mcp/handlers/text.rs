//! MCP handlers for summarization and translation.

use std::sync::Arc;

use crate::processing::{DocumentApi, TranslateError};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{parse_arguments, processing_error, read_document_file};

/// Arguments accepted by the `summarize` tool. Exactly one field must be set.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct SummarizeToolRequest {
    /// Raw text to summarize.
    #[serde(default)]
    pub(crate) text: Option<String>,
    /// Path to a document whose extracted text is summarized.
    #[serde(default)]
    pub(crate) path: Option<String>,
}

/// Arguments accepted by the `translate` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct TranslateToolRequest {
    /// Text to translate.
    pub(crate) text: String,
    /// Target language code such as `fr` or `de`.
    pub(crate) target_lang: String,
}

/// Handle the `summarize` tool for inline text or a document on disk.
pub(crate) async fn handle_summarize(
    api: &Arc<dyn DocumentApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: SummarizeToolRequest = parse_arguments(arguments)?;
    let text = match (args.text, args.path) {
        (Some(text), None) => text,
        (None, Some(path)) => {
            let (bytes, filename) = read_document_file(&path).await?;
            api.read_document(bytes, filename)
                .await
                .map_err(processing_error)?
                .raw_text()
        }
        _ => {
            return Err(McpError::invalid_params(
                "Provide exactly one of `text` or `path`",
                None,
            ));
        }
    };

    let summary = api
        .summarize(text)
        .await
        .map_err(|err| McpError::internal_error(err.to_string(), None))?;

    Ok(CallToolResult::structured(json!({ "summary": summary })))
}

/// Handle the `translate` tool.
pub(crate) async fn handle_translate(
    api: &Arc<dyn DocumentApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: TranslateToolRequest = parse_arguments(arguments)?;

    let translation = api
        .translate(args.text, args.target_lang)
        .await
        .map_err(|err| match err {
            TranslateError::EmptyLanguage | TranslateError::UnsupportedLanguage(_) => {
                McpError::invalid_params(err.to_string(), None)
            }
            TranslateError::Generation(_) => McpError::internal_error(err.to_string(), None),
        })?;

    Ok(CallToolResult::structured(json!({
        "translation": translation.translation,
        "targetLang": translation.target_lang,
    })))
}
