//! Formatting helpers shared across MCP handlers and resources.

use crate::processing::{SUPPORTED_LANGUAGES, language_name};
use rmcp::model::ResourceContents;
use serde::Serialize;
use serde_json::{Value, json};

pub(crate) const APPLICATION_JSON: &str = "application/json";

/// Serialize a value to JSON, falling back to compact formatting on error.
pub(crate) fn serialize_json<T: Serialize>(value: &T, context_uri: &str) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        tracing::warn!(uri = context_uri, %error, "Failed to serialize JSON prettily");
        serde_json::to_string(value).unwrap_or_else(|_| "{}".into())
    })
}

/// Build JSON resource contents for MCP resource responses.
pub(crate) fn json_resource_contents(uri: &str, text: String) -> ResourceContents {
    ResourceContents::TextResourceContents {
        uri: uri.to_string(),
        mime_type: Some(APPLICATION_JSON.into()),
        text,
        meta: None,
    }
}

/// Supported translation targets with display names.
pub(crate) fn languages_payload() -> Value {
    let languages: Vec<Value> = SUPPORTED_LANGUAGES
        .into_iter()
        .map(|code| json!({ "code": code, "name": language_name(code) }))
        .collect();
    json!({ "languages": languages })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn languages_payload_lists_codes_in_order() {
        let payload = languages_payload();
        let codes: Vec<&str> = payload["languages"]
            .as_array()
            .expect("array")
            .iter()
            .map(|entry| entry["code"].as_str().expect("code"))
            .collect();
        assert_eq!(codes, ["fr", "en", "es", "de", "it"]);
        assert_eq!(payload["languages"][0]["name"], "French");
    }

    #[test]
    fn resource_contents_carry_json_mime_type() {
        let contents = json_resource_contents("mcp://languages", "{}".into());
        match contents {
            ResourceContents::TextResourceContents { uri, mime_type, .. } => {
                assert_eq!(uri, "mcp://languages");
                assert_eq!(mime_type.as_deref(), Some(APPLICATION_JSON));
            }
            other => panic!("unexpected contents: {other:?}"),
        }
    }
}
