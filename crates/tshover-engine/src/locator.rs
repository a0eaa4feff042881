use std::path::Path;

use regex::Regex;
use tracing::debug;
use tshover_core::text::line_column_at;

use crate::error::HoverError;
use crate::provider::GuardedProvider;
use crate::types::{Position, SymbolTreeNode};

/// Find a position for `symbol` in `file`.
///
/// The provider's symbol outline is searched first; when it is absent or has no node of
/// that name, the file text is scanned for a whole-word occurrence that is not preceded
/// by a comment marker on its line. `Ok(None)` means neither found anything.
pub async fn locate_symbol(
    provider: GuardedProvider<'_>,
    file: &Path,
    symbol: &str,
) -> Result<Option<Position>, HoverError> {
    if symbol.trim().is_empty() {
        return Ok(None);
    }

    if let Some(tree) = provider.document_symbols(file).await?
        && let Some(node) = find_symbol_in_tree(&tree, symbol)
    {
        debug!(
            "located {symbol} via document symbols at {}:{}",
            node.selection_position.line, node.selection_position.character
        );
        return Ok(Some(node.selection_position));
    }

    let text = provider.full_text(file).await?;
    let found = find_symbol_in_text(&text, symbol);
    match found {
        Some(pos) => debug!(
            "located {symbol} via text scan at {}:{}",
            pos.line, pos.character
        ),
        None => debug!("{symbol} not found in {}", file.display()),
    }
    Ok(found)
}

/// Pre-order search (parent before children, siblings in order) for an exact name match.
pub fn find_symbol_in_tree<'a>(
    nodes: &'a [SymbolTreeNode],
    name: &str,
) -> Option<&'a SymbolTreeNode> {
    for node in nodes {
        if node.name == name {
            return Some(node);
        }
        if let Some(found) = find_symbol_in_tree(&node.children, name) {
            return Some(found);
        }
    }
    None
}

/// First whole-word occurrence of `name` whose line prefix holds no `//` or `*`.
///
/// Only the text before the match on the same line is inspected, so occurrences inside
/// string literals or in the body of a multi-line comment that lacks a leading `*` are
/// still accepted.
pub fn find_symbol_in_text(text: &str, name: &str) -> Option<Position> {
    if name.is_empty() {
        return None;
    }
    let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(name))).ok()?;

    for m in pattern.find_iter(text) {
        let line_start = text[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let before = &text[line_start..m.start()];
        if before.contains("//") || before.contains('*') {
            continue;
        }

        let at = line_column_at(text, m.start());
        return Some(Position::new(at.line, at.character));
    }
    None
}
