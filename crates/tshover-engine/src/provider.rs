use std::future::Future;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::error::HoverError;
use crate::types::{DefinitionCandidate, DocumentVersion, HoverFragment, Position, SymbolTreeNode};

/// The language intelligence the engine consumes.
///
/// Implementations talk to a language server (see `tshover-lsp`) or, in tests, serve
/// canned answers. Empty results are `Ok`; `Err` means the provider itself failed.
#[async_trait]
pub trait HoverProvider: Send + Sync {
    /// Hover fragments at a position; empty when there is nothing to show.
    async fn hover(&self, file: &Path, position: Position) -> Result<Vec<HoverFragment>>;

    /// The file's symbol outline, or `None` when the provider has no outline for it.
    async fn document_symbols(&self, file: &Path) -> Result<Option<Vec<SymbolTreeNode>>>;

    /// Definition candidates in provider order; may be empty.
    async fn definition(&self, file: &Path, position: Position)
    -> Result<Vec<DefinitionCandidate>>;

    /// Current edit version of the file as seen by the provider.
    async fn document_version(&self, file: &Path) -> Result<DocumentVersion>;

    /// Full text of the file as seen by the provider.
    async fn full_text(&self, file: &Path) -> Result<String>;
}

/// Wraps a provider so every call is bounded by an optional timeout and provider
/// failures surface as [`HoverError`].
#[derive(Clone, Copy)]
pub struct GuardedProvider<'a> {
    provider: &'a dyn HoverProvider,
    timeout: Option<Duration>,
}

impl<'a> GuardedProvider<'a> {
    pub fn new(provider: &'a dyn HoverProvider, timeout: Option<Duration>) -> Self {
        Self { provider, timeout }
    }

    pub async fn hover(
        &self,
        file: &Path,
        position: Position,
    ) -> Result<Vec<HoverFragment>, HoverError> {
        self.call("hover", self.provider.hover(file, position)).await
    }

    pub async fn document_symbols(
        &self,
        file: &Path,
    ) -> Result<Option<Vec<SymbolTreeNode>>, HoverError> {
        self.call("document_symbols", self.provider.document_symbols(file)).await
    }

    pub async fn definition(
        &self,
        file: &Path,
        position: Position,
    ) -> Result<Vec<DefinitionCandidate>, HoverError> {
        self.call("definition", self.provider.definition(file, position)).await
    }

    pub async fn document_version(&self, file: &Path) -> Result<DocumentVersion, HoverError> {
        self.call("document_version", self.provider.document_version(file)).await
    }

    pub async fn full_text(&self, file: &Path) -> Result<String, HoverError> {
        self.call("full_text", self.provider.full_text(file)).await
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T, HoverError> {
        let Some(limit) = self.timeout else {
            return fut.await.map_err(HoverError::from);
        };

        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(HoverError::from),
            Err(_) => {
                debug!("provider call {operation} exceeded {}ms", limit.as_millis());
                Err(HoverError::ProviderTimeout {
                    operation,
                    timeout: limit,
                })
            }
        }
    }
}
