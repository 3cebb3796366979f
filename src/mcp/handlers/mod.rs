//! Tool handlers for the MCP server.

use std::path::Path;

use rmcp::{ErrorData as McpError, model::JsonObject};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{loader::LoaderError, processing::ProcessingError};

pub(crate) mod answer;
pub(crate) mod documents;
pub(crate) mod metrics;
pub(crate) mod text;

/// Parse structured arguments supplied to a tool invocation.
pub(crate) fn parse_arguments<T: DeserializeOwned>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let value = arguments
        .map(Value::Object)
        .unwrap_or_else(|| Value::Object(JsonObject::new()));
    parse_arguments_value(value)
}

/// Deserialize arguments represented as a JSON value into the target type.
pub(crate) fn parse_arguments_value<T: DeserializeOwned>(value: Value) -> Result<T, McpError> {
    serde_json::from_value(value)
        .map_err(|err| McpError::invalid_params(format!("Invalid arguments: {err}"), None))
}

/// Read a document from disk, returning its bytes and file name.
pub(crate) async fn read_document_file(
    path: &str,
) -> Result<(Vec<u8>, Option<String>), McpError> {
    if path.trim().is_empty() {
        return Err(McpError::invalid_params("`path` must not be empty", None));
    }
    let bytes = tokio::fs::read(path).await.map_err(|err| {
        McpError::invalid_params(format!("Failed to read {path}: {err}"), None)
    })?;
    let filename = Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Ok((bytes, filename))
}

/// Map pipeline failures onto MCP errors: bad input is the caller's fault, the rest is ours.
pub(crate) fn processing_error(err: ProcessingError) -> McpError {
    match err {
        ProcessingError::Loader(
            LoaderError::UnsupportedFormat(_) | LoaderError::Extraction { .. },
        ) => McpError::invalid_params(err.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Probe {
        text: String,
    }

    #[test]
    fn missing_arguments_parse_as_empty_object() {
        let err = parse_arguments::<Probe>(None).expect_err("text is required");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut arguments = JsonObject::new();
        arguments.insert("text".into(), Value::String("hi".into()));
        arguments.insert("extra".into(), Value::Bool(true));
        let err = parse_arguments::<Probe>(Some(arguments)).expect_err("extra field");
        assert!(err.message.contains("Invalid arguments"));
    }

    #[test]
    fn unsupported_format_is_invalid_params() {
        let err = processing_error(ProcessingError::Loader(LoaderError::UnsupportedFormat(
            ".xlsx".into(),
        )));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[test]
    fn task_failure_is_internal() {
        let err = processing_error(ProcessingError::Task("join".into()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }

    #[tokio::test]
    async fn reads_file_name_from_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").expect("write");
        let (bytes, filename) = read_document_file(path.to_str().expect("utf8"))
            .await
            .expect("read");
        assert_eq!(bytes, b"hello");
        assert_eq!(filename.as_deref(), Some("notes.txt"));
    }

    #[tokio::test]
    async fn missing_file_is_invalid_params() {
        let err = read_document_file("/definitely/not/here.pdf")
            .await
            .expect_err("missing");
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }
}
