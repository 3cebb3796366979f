//! JSON schema builders for MCP tools.

use schemars::{JsonSchema, schema_for};
use serde_json::{Map, Value};

/// Derive the input schema for a tool from its argument type.
pub(crate) fn input_schema<T: JsonSchema>() -> Map<String, Value> {
    let root = schema_for!(T);
    match serde_json::to_value(root) {
        Ok(Value::Object(mut schema)) => {
            schema.remove("$schema");
            schema.remove("title");
            schema
        }
        _ => empty_object_schema(),
    }
}

/// Schema for tools that take no arguments.
pub(crate) fn empty_object_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".into(), Value::String("object".into()));
    schema.insert("properties".into(), Value::Object(Map::new()));
    schema.insert("additionalProperties".into(), Value::Bool(false));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::handlers::{documents::PathToolRequest, text::TranslateToolRequest};

    #[test]
    fn derived_schema_lists_required_fields() {
        let schema = input_schema::<TranslateToolRequest>();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["additionalProperties"], false);
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("required list")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"text"));
        assert!(required.contains(&"target_lang"));
        assert!(!schema.contains_key("$schema"));
    }

    #[test]
    fn path_schema_describes_property() {
        let schema = input_schema::<PathToolRequest>();
        assert_eq!(schema["properties"]["path"]["type"], "string");
        assert!(schema["properties"]["path"]["description"].is_string());
    }

    #[test]
    fn empty_schema_rejects_extra_properties() {
        let schema = empty_object_schema();
        assert_eq!(schema["additionalProperties"], false);
        assert!(schema["properties"].as_object().expect("map").is_empty());
    }
}
