use serde_json::Value;
use tshover_engine::HoverFragment;

/// Parse a `textDocument/hover` result into fragments.
///
/// `Hover.contents` may be a plain string, a `MarkedString` (`{language, value}`), a
/// `MarkupContent` (`{kind, value}`) or an array of strings and `MarkedString`s.
/// A `null` result yields no fragments.
pub fn parse_hover(value: &Value) -> Vec<HoverFragment> {
    let Some(contents) = value.get("contents") else {
        return Vec::new();
    };
    match contents {
        Value::Array(items) => items.iter().filter_map(parse_content_item).collect(),
        other => parse_content_item(other).into_iter().collect(),
    }
}

fn parse_content_item(item: &Value) -> Option<HoverFragment> {
    match item {
        Value::String(s) => Some(HoverFragment::Markdown(s.clone())),
        Value::Object(obj) => {
            let value = obj.get("value").and_then(|v| v.as_str())?.to_string();
            if let Some(language) = obj.get("language").and_then(|v| v.as_str()) {
                return Some(HoverFragment::Code {
                    language: language.to_string(),
                    value,
                });
            }
            match obj.get("kind").and_then(|v| v.as_str()) {
                Some("plaintext") => Some(HoverFragment::PlainText(value)),
                _ => Some(HoverFragment::Markdown(value)),
            }
        }
        _ => None,
    }
}
