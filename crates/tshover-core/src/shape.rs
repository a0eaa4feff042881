//! Pull the structural declaration out of normalized hover text.
//!
//! This is a line-oriented heuristic, not a parser: it looks for the first line that
//! starts a declaration and copies lines until the braces balance (or a simple
//! `type X = Y` alias ends on its own line). Braces inside string literals or comments
//! are counted like any other brace.

use std::sync::LazyLock;

use regex::Regex;

static DECLARATION_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(type|interface|class|function|const|let|var|enum)\s+|^\(")
        .expect("valid declaration regex")
});

static DOC_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(Example|Usage|Note|See|Returns|Param|Description):")
        .expect("valid doc section regex")
});

static TYPE_ALIAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^type\s+\w+\s*=\s*[^{]+$").expect("valid type alias regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShapeState {
    Seeking,
    InDeclaration,
}

/// Extract only the declaration from hover text, dropping documentation prose.
///
/// Falls back to the first non-blank, non-tag line when no declaration start is found,
/// and to the input itself when there is nothing else to return.
pub fn extract_type_shape(hover_text: &str) -> String {
    let lines: Vec<&str> = hover_text.split('\n').collect();
    let mut result: Vec<&str> = Vec::new();
    let mut state = ShapeState::Seeking;
    let mut brace_depth: i64 = 0;

    for line in &lines {
        let trimmed = line.trim();

        if state == ShapeState::Seeking {
            if trimmed.is_empty() || is_doc_tag(trimmed) || DOC_SECTION.is_match(trimmed) {
                continue;
            }
            if !DECLARATION_START.is_match(trimmed) {
                continue;
            }
            state = ShapeState::InDeclaration;
        }

        result.push(line);
        brace_depth += line.matches('{').count() as i64;
        brace_depth -= line.matches('}').count() as i64;

        if brace_depth <= 0 {
            let joined = result.join("\n");
            if joined.contains('{') && joined.contains('}') {
                break;
            }
            if TYPE_ALIAS.is_match(trimmed) {
                break;
            }
        }
    }

    if !result.is_empty() {
        return result.join("\n").trim().to_string();
    }

    // JSDoc continuation lines (` * ...`) are treated like tags here.
    lines
        .iter()
        .map(|l| l.trim())
        .find(|t| !t.is_empty() && !is_doc_tag(t) && !t.starts_with('*'))
        .map(str::to_string)
        .unwrap_or_else(|| hover_text.to_string())
}

fn is_doc_tag(trimmed: &str) -> bool {
    trimmed.starts_with('@')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn braced_declaration_stops_at_balanced_close() {
        let hover = "interface Foo {\n  x: number\n}\n\nDocs about Foo";
        assert_eq!(extract_type_shape(hover), "interface Foo {\n  x: number\n}");
    }

    #[test]
    fn simple_alias_stops_on_its_own_line() {
        let hover = "type ID = string\n\n@deprecated use X";
        assert_eq!(extract_type_shape(hover), "type ID = string");
    }

    #[test]
    fn nested_braces_are_tracked() {
        let hover = "type Config = {\n  nested: { a: number };\n  b: string\n}\nmore prose";
        assert_eq!(
            extract_type_shape(hover),
            "type Config = {\n  nested: { a: number };\n  b: string\n}"
        );
    }

    #[test]
    fn leading_tags_and_doc_sections_are_skipped() {
        let hover = "\n@example foo()\nExample: bar\nnote: lowercase header\nclass Widget {\n  render(): void\n}\ntrailing";
        assert_eq!(
            extract_type_shape(hover),
            "class Widget {\n  render(): void\n}"
        );
    }

    #[test]
    fn parenthesized_signature_starts_a_declaration() {
        let hover = "(method) Workflow.run(): Promise<void>";
        assert_eq!(extract_type_shape(hover), "(method) Workflow.run(): Promise<void>");
    }

    #[test]
    fn single_line_braced_alias_completes_immediately() {
        let hover = "type ExtractStepAction<T> = T extends { action: infer A } ? A : never\n\nprose";
        assert_eq!(
            extract_type_shape(hover),
            "type ExtractStepAction<T> = T extends { action: infer A } ? A : never"
        );
    }

    #[test]
    fn falls_back_to_first_plain_line() {
        let hover = "@deprecated\n * continuation\n  A plain description\nmore";
        assert_eq!(extract_type_shape(hover), "A plain description");
    }

    #[test]
    fn returns_input_when_nothing_usable() {
        assert_eq!(extract_type_shape(""), "");
        assert_eq!(extract_type_shape("@only\n@tags"), "@only\n@tags");
    }
}
