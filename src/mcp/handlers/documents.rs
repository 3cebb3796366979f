//! MCP handlers for document ingestion and image extraction.

use std::sync::Arc;

use crate::{loader::EncodedImage, processing::DocumentApi};
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, JsonObject},
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{parse_arguments, processing_error, read_document_file};

/// Arguments accepted by tools that operate on a file.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub(crate) struct PathToolRequest {
    /// Path to a .pdf, .txt, or .docx file readable by the server.
    pub(crate) path: String,
}

/// Handle the `ingest` tool by loading, chunking, embedding, and storing a file.
pub(crate) async fn handle_ingest(
    api: &Arc<dyn DocumentApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: PathToolRequest = parse_arguments(arguments)?;
    let (bytes, filename) = read_document_file(&args.path).await?;

    let processed = api
        .ingest(bytes, filename)
        .await
        .map_err(processing_error)?;

    Ok(CallToolResult::structured(json!({
        "status": "ok",
        "documentId": processed.document_id,
        "format": processed.format,
        "filename": processed.filename,
        "segments": processed.segment_count,
        "chunks": processed.chunks.len(),
        "inserted": processed.inserted,
        "skippedDuplicates": processed.skipped_duplicates,
        "replaced": processed.replaced,
    })))
}

/// Handle the `extract-images` tool, returning every image base64-encoded.
pub(crate) async fn handle_extract_images(
    api: &Arc<dyn DocumentApi>,
    arguments: Option<JsonObject>,
) -> Result<CallToolResult, McpError> {
    let args: PathToolRequest = parse_arguments(arguments)?;
    let (bytes, filename) = read_document_file(&args.path).await?;

    let images = api
        .extract_images(bytes, filename)
        .await
        .map_err(processing_error)?;
    let images: Vec<EncodedImage> = images.into_iter().map(EncodedImage::from).collect();

    Ok(CallToolResult::structured(json!({
        "count": images.len(),
        "images": images,
    })))
}
