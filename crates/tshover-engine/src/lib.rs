//! Hover resolution over an external language intelligence provider.
//!
//! The engine answers "what is the type or documentation of this symbol?" by asking a
//! [`HoverProvider`] for hover text, document symbols and definitions, then normalizing
//! and caching the answer per document version.

mod cache;
mod definition;
mod engine;
mod error;
mod locator;
mod provider;
mod types;

pub use cache::{CacheKey, CacheStats, HoverCache};
pub use definition::resolve_definition;
pub use engine::{EngineOptions, HoverEngine};
pub use error::HoverError;
pub use locator::{find_symbol_in_text, find_symbol_in_tree, locate_symbol};
pub use provider::{GuardedProvider, HoverProvider};
pub use types::{
    DefinitionCandidate, DefinitionTarget, DocumentVersion, HoverFragment, Position,
    SourcePosition, SourceRange, SymbolTreeNode,
};
