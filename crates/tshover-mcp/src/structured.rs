use serde_json::{Value, json};

pub(crate) const STRUCTURED_SCHEMA_VERSION: u32 = 1;

pub(crate) fn structured_ok(tool: &str, input: Value) -> Value {
    json!({
        "schema_version": STRUCTURED_SCHEMA_VERSION,
        "ok": true,
        "tool": tool,
        "input": input,
        "warnings": []
    })
}

pub(crate) fn structured_error(
    tool: &str,
    input: Option<Value>,
    kind: &str,
    message: &str,
) -> Value {
    json!({
        "schema_version": STRUCTURED_SCHEMA_VERSION,
        "ok": false,
        "tool": tool,
        "input": input,
        "error": {
            "kind": kind,
            "message": message
        },
        "warnings": []
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_carries_kind_and_input() {
        let v = structured_error(
            "hover_at_symbol",
            Some(json!({ "symbol": "User" })),
            "symbol_not_found",
            "symbol \"User\" not found",
        );
        assert_eq!(v["ok"], json!(false));
        assert_eq!(v["error"]["kind"], json!("symbol_not_found"));
        assert_eq!(v["input"]["symbol"], json!("User"));
        assert_eq!(v["schema_version"], json!(STRUCTURED_SCHEMA_VERSION));
    }
}
