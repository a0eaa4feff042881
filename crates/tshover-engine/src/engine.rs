use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tshover_core::config::TshoverConfig;
use tshover_core::markdown::normalize_hover_parts;
use tshover_core::shape::extract_type_shape;

use crate::cache::{CacheKey, HoverCache};
use crate::definition::resolve_definition;
use crate::error::HoverError;
use crate::locator::locate_symbol;
use crate::provider::{GuardedProvider, HoverProvider};
use crate::types::Position;

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Upper bound for each provider call. `None` waits indefinitely.
    pub provider_timeout: Option<Duration>,
    /// Result cache bound; `0` keeps every entry.
    pub cache_max_entries: usize,
}

impl EngineOptions {
    pub fn from_config(config: &TshoverConfig) -> Self {
        Self {
            provider_timeout: tshover_core::config::provider_timeout(config),
            cache_max_entries: tshover_core::config::cache_max_entries(config),
        }
    }
}

/// Composes symbol location, definition chasing, caching and normalization into the
/// three hover queries.
pub struct HoverEngine {
    provider: Arc<dyn HoverProvider>,
    cache: HoverCache,
    options: EngineOptions,
}

impl HoverEngine {
    pub fn new(provider: Arc<dyn HoverProvider>, options: EngineOptions) -> Self {
        let cache = HoverCache::with_max_entries(options.cache_max_entries);
        Self {
            provider,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn cache(&self) -> &HoverCache {
        &self.cache
    }

    /// Drop every cached hover result. Returns how many entries were removed.
    pub async fn clear_cache(&self) -> usize {
        self.cache.clear().await
    }

    /// Plain-text hover at a zero-based position; empty when the provider has nothing.
    pub async fn hover_at_position(
        &self,
        file: &Path,
        line: u32,
        character: u32,
    ) -> Result<String, HoverError> {
        let provider = self.guarded();
        let version = provider.document_version(file).await?;
        let key = CacheKey::new(file, version, line, character);

        if let Some(text) = self.cache.lookup(&key).await {
            debug!("hover cache hit {}:{line}:{character}@{version}", file.display());
            return Ok(text);
        }

        let fragments = provider
            .hover(file, Position::new(line, character))
            .await?;
        if fragments.is_empty() {
            debug!("no hover at {}:{line}:{character}", file.display());
            return Ok(String::new());
        }

        let text = normalize_hover_parts(fragments.iter().map(|f| f.value()));
        self.cache.store(key, version, text.clone()).await;
        Ok(text)
    }

    /// Hover for a named symbol, taken at its definition when the provider knows one.
    pub async fn hover_at_symbol(&self, file: &Path, symbol: &str) -> Result<String, HoverError> {
        let provider = self.guarded();
        let Some(located) = locate_symbol(provider, file, symbol).await? else {
            return Err(HoverError::SymbolNotFound {
                file: file.to_path_buf(),
                symbol: symbol.to_string(),
            });
        };

        match resolve_definition(provider, file, located).await? {
            Some(target) => {
                debug!(
                    "{symbol} defined at {}:{}:{}",
                    target.file.display(),
                    target.line,
                    target.character
                );
                self.hover_at_position(&target.file, target.line, target.character).await
            }
            None => self.hover_at_position(file, located.line, located.character).await,
        }
    }

    /// The structural declaration of a symbol with documentation prose removed.
    pub async fn public_type_shape(
        &self,
        file: &Path,
        symbol: &str,
    ) -> Result<String, HoverError> {
        let hover = self.hover_at_symbol(file, symbol).await?;
        Ok(extract_type_shape(&hover))
    }

    fn guarded(&self) -> GuardedProvider<'_> {
        GuardedProvider::new(self.provider.as_ref(), self.options.provider_timeout)
    }
}
