//! Reduce rich hover markup to plain text.
//!
//! Language servers answer hover requests with markdown aimed at an editor popup:
//! fenced signatures, inline code, emphasis, links and the occasional placeholder
//! while the server is still loading. Tool callers want the words without the markup.

use std::sync::LazyLock;

use regex::Regex;

static FENCED_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```\w*\n?(.*?)```").expect("valid fenced code regex"));

static INLINE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid inline code regex"));

static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"));

static ITALIC_STAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid italic regex"));

static ITALIC_UNDERSCORE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([^_]+)_").expect("valid underscore regex"));

// Images go first so the `!` does not survive as a stray character in front of the alt text.
static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]+\)").expect("valid image regex"));

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link regex"));

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").expect("valid heading regex"));

static LOADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(loading\.\.\.\)\s*").expect("valid loading regex"));

static EXTRA_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank line regex"));

/// Join hover fragments with a blank line between them and strip the markup.
pub fn normalize_hover_parts<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\n\n");
    strip_markdown(&joined)
}

/// Strip markdown formatting, keeping only the plain content.
///
/// Nested or doubled markers (`__init__`, `**a*b**`) unwrap one layer per pass, so
/// passes repeat until the text stops changing. Every pass that changes the text
/// shortens it, which bounds the loop.
pub fn strip_markdown(text: &str) -> String {
    let mut current = strip_once(text);
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let text = FENCED_CODE.replace_all(text, "${1}");
    let text = INLINE_CODE.replace_all(&text, "${1}");
    let text = BOLD.replace_all(&text, "${1}");
    let text = ITALIC_STAR.replace_all(&text, "${1}");
    let text = ITALIC_UNDERSCORE.replace_all(&text, "${1}");
    let text = IMAGE.replace_all(&text, "${1}");
    let text = LINK.replace_all(&text, "${1}");
    let text = HEADING.replace_all(&text, "");
    let text = LOADING.replace_all(&text, "");
    let text = EXTRA_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}
