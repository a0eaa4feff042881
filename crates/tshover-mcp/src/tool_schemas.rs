use std::borrow::Cow;
use std::sync::Arc;

use rmcp::model::{JsonObject, Tool};
use serde_json::json;

pub(crate) fn tool_hover_at_position() -> Tool {
    Tool::new(
        Cow::Borrowed("hover_at_position"),
        Cow::Borrowed(
            "Plain-text hover (type signature and docs) at a 0-based line/character in a TypeScript or JavaScript file.",
        ),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {
                "file": { "type": "string", "description": "Absolute path or path relative to the workspace root." },
                "line": { "type": "integer", "minimum": 0 },
                "character": { "type": "integer", "minimum": 0 }
            },
            "required": ["file", "line", "character"],
            "additionalProperties": false
        }))),
    )
}

pub(crate) fn tool_hover_at_symbol() -> Tool {
    Tool::new(
        Cow::Borrowed("hover_at_symbol"),
        Cow::Borrowed(
            "Plain-text hover for a named symbol in a file, taken at its definition when one is known.",
        ),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {
                "file": { "type": "string", "description": "Absolute path or path relative to the workspace root." },
                "symbol": { "type": "string", "minLength": 1 }
            },
            "required": ["file", "symbol"],
            "additionalProperties": false
        }))),
    )
}

pub(crate) fn tool_public_type_shape() -> Tool {
    Tool::new(
        Cow::Borrowed("public_type_shape"),
        Cow::Borrowed(
            "The declaration of a named type, interface, class or function without documentation prose.",
        ),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {
                "file": { "type": "string", "description": "Absolute path or path relative to the workspace root." },
                "symbol": { "type": "string", "minLength": 1 }
            },
            "required": ["file", "symbol"],
            "additionalProperties": false
        }))),
    )
}

pub(crate) fn tool_get_current_config() -> Tool {
    Tool::new(
        Cow::Borrowed("get_current_config"),
        Cow::Borrowed(
            "Show the effective tshover configuration: workspace root, language server command, cache and timeouts.",
        ),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))),
    )
}

pub(crate) fn tool_clear_hover_cache() -> Tool {
    Tool::new(
        Cow::Borrowed("clear_hover_cache"),
        Cow::Borrowed("Drop every cached hover result."),
        Arc::new(schema(json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }))),
    )
}

fn schema(value: serde_json::Value) -> JsonObject {
    #[expect(clippy::expect_used)]
    serde_json::from_value(value).expect("tool schema should deserialize")
}
