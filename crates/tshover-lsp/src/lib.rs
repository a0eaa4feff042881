//! Language Server Protocol provider for the hover engine.

mod adapter;
mod client;
mod hover;
mod lsp;
mod symbol;
mod typescript;

pub use adapter::{LspAdapter, adapter_from_command, adapter_from_name, resolve_adapter};
pub use client::{TsLspClient, language_id_for_path};
pub use hover::parse_hover;
pub use lsp::{LspClient, LspClientOptions, LspPosition, LspRange, path_to_uri, uri_to_path};
pub use symbol::{parse_definitions, parse_document_symbols};
pub use typescript::preflight_language_server;
