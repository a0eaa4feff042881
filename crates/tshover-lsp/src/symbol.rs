use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::debug;
use tshover_engine::{DefinitionCandidate, Position, SourceRange, SymbolTreeNode};

use crate::lsp::{
    LspDocumentSymbol, LspLocation, LspLocationLink, LspPosition, LspRange, LspSymbolInformation,
    uri_to_path,
};

impl From<LspPosition> for Position {
    fn from(p: LspPosition) -> Self {
        Position::new(p.line, p.character)
    }
}

impl From<Position> for LspPosition {
    fn from(p: Position) -> Self {
        LspPosition {
            line: p.line,
            character: p.character,
        }
    }
}

impl From<LspRange> for SourceRange {
    fn from(r: LspRange) -> Self {
        SourceRange::new(r.start.into(), r.end.into())
    }
}

/// Parse a `textDocument/documentSymbol` result.
///
/// `null` means the server has no outline for the file. Hierarchical `DocumentSymbol[]`
/// keeps its tree; flat `SymbolInformation[]` becomes a list of leaves.
pub fn parse_document_symbols(value: Value) -> Result<Option<Vec<SymbolTreeNode>>> {
    if value.is_null() {
        return Ok(None);
    }

    let Some(arr) = value.as_array() else {
        return Err(anyhow!("documentSymbol response is not an array"));
    };
    if arr.is_empty() {
        return Ok(Some(Vec::new()));
    }

    // DocumentSymbol carries a selectionRange; SymbolInformation carries a location.
    if arr[0].get("selectionRange").is_some() {
        let roots: Vec<LspDocumentSymbol> =
            serde_json::from_value(value).context("failed to parse DocumentSymbol[]")?;
        return Ok(Some(roots.into_iter().map(to_tree_node).collect()));
    }

    let infos: Vec<LspSymbolInformation> =
        serde_json::from_value(value).context("failed to parse SymbolInformation[]")?;
    Ok(Some(
        infos
            .into_iter()
            .map(|i| SymbolTreeNode {
                name: i.name,
                selection_position: i.location.range.start.into(),
                declaration_span: i.location.range.into(),
                children: Vec::new(),
            })
            .collect(),
    ))
}

fn to_tree_node(sym: LspDocumentSymbol) -> SymbolTreeNode {
    SymbolTreeNode {
        name: sym.name,
        selection_position: sym.selection_range.start.into(),
        declaration_span: sym.range.into(),
        children: sym.children.into_iter().map(to_tree_node).collect(),
    }
}

/// Parse a `textDocument/definition` result into candidates, in server order.
///
/// Accepts `null`, a single `Location`, `Location[]` and `LocationLink[]`. Targets outside
/// the local file system are skipped.
pub fn parse_definitions(value: Value) -> Result<Vec<DefinitionCandidate>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        Value::Object(_) => vec![value],
        _ => return Err(anyhow!("definition response is neither array nor object")),
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match to_candidate(&item)? {
            Some(candidate) => out.push(candidate),
            None => debug!("skipping definition outside the file system: {item}"),
        }
    }
    Ok(out)
}

fn to_candidate(value: &Value) -> Result<Option<DefinitionCandidate>> {
    if value.get("targetUri").is_some() {
        let link: LspLocationLink =
            serde_json::from_value(value.clone()).context("failed to parse LocationLink")?;
        let Ok(file) = uri_to_path(&link.target_uri) else {
            return Ok(None);
        };
        return Ok(Some(DefinitionCandidate::Link {
            file,
            target_range: link.target_range.into(),
            target_selection_range: link.target_selection_range.map(Into::into),
        }));
    }

    if value.get("uri").is_some() {
        let loc: LspLocation =
            serde_json::from_value(value.clone()).context("failed to parse Location")?;
        let Ok(file) = uri_to_path(&loc.uri) else {
            return Ok(None);
        };
        return Ok(Some(DefinitionCandidate::Location {
            file,
            range: loc.range.into(),
        }));
    }

    Err(anyhow!("unknown location shape"))
}
