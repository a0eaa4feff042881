use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Opaque per-file edit counter owned by the editing environment.
///
/// Only ever compared for equality; the engine never interprets its value.
pub type DocumentVersion = i32;

/// Zero-based line and UTF-16 character offset within a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    pub start: Position,
    pub end: Position,
}

impl SourceRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A position inside a specific file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourcePosition {
    pub file: PathBuf,
    pub line: u32,
    pub character: u32,
}

impl SourcePosition {
    pub fn new(file: impl Into<PathBuf>, position: Position) -> Self {
        Self {
            file: file.into(),
            line: position.line,
            character: position.character,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.character)
    }
}

/// Where a definition lookup landed, always pointing at the symbol's name token.
pub type DefinitionTarget = SourcePosition;

/// One piece of hover content as returned by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoverFragment {
    PlainText(String),
    Markdown(String),
    /// A code snippet tagged with its language (LSP `MarkedString`).
    Code { language: String, value: String },
}

impl HoverFragment {
    pub fn value(&self) -> &str {
        match self {
            HoverFragment::PlainText(s) | HoverFragment::Markdown(s) => s,
            HoverFragment::Code { value, .. } => value,
        }
    }
}

/// A node of a file's structural outline. Children are owned; there are no parent links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolTreeNode {
    pub name: String,
    /// Start of the symbol's name token.
    pub selection_position: Position,
    /// The whole declaration, including body and doc comment where the provider reports it.
    pub declaration_span: SourceRange,
    pub children: Vec<SymbolTreeNode>,
}

/// A definition result in one of the two shapes providers use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionCandidate {
    /// A resolved occurrence (LSP `Location`).
    Location { file: PathBuf, range: SourceRange },
    /// A link carrying the full declaration plus an optional narrower name range
    /// (LSP `LocationLink`).
    Link {
        file: PathBuf,
        target_range: SourceRange,
        target_selection_range: Option<SourceRange>,
    },
}

impl DefinitionCandidate {
    /// Normalize to the position hover should be requested at.
    ///
    /// Links prefer the name sub-range so hover lands on the identifier rather than on
    /// the start of the whole statement (which may be a doc comment or a keyword).
    pub fn target(&self) -> DefinitionTarget {
        match self {
            DefinitionCandidate::Location { file, range } => {
                SourcePosition::new(file.clone(), range.start)
            }
            DefinitionCandidate::Link {
                file,
                target_range,
                target_selection_range,
            } => {
                let range = target_selection_range.as_ref().unwrap_or(target_range);
                SourcePosition::new(file.clone(), range.start)
            }
        }
    }
}
