use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::time::Duration;
use tracing::{debug, info};
use tshover_core::config::ResolvedServerConfig;
use tshover_core::hashing::sha256_hex;
use tshover_engine::{
    DefinitionCandidate, DocumentVersion, HoverFragment, HoverProvider, Position, SymbolTreeNode,
};

use crate::adapter::resolve_adapter;
use crate::hover::parse_hover;
use crate::lsp::{LspClient, LspClientOptions};
use crate::symbol::{parse_definitions, parse_document_symbols};

const DEFAULT_LANGUAGE_ID: &str = "typescript";

/// A TypeScript language server session that keeps opened files in sync with disk.
pub struct TsLspClient {
    lsp: LspClient,
    open_files: Mutex<HashMap<PathBuf, OpenFileState>>,
    language_id: String,
    warmup_delay: Duration,
}

#[derive(Debug, Clone)]
struct OpenFileState {
    version: DocumentVersion,
    last_sha256: String,
}

/// A file as the server currently sees it.
#[derive(Debug)]
struct SyncedFile {
    path: PathBuf,
    version: DocumentVersion,
    text: String,
}

impl TsLspClient {
    pub async fn start(server: &ResolvedServerConfig) -> Result<Self> {
        if server.command.trim().is_empty() {
            return Err(anyhow!("language server command must not be empty"));
        }
        let adapter = resolve_adapter(server.adapter.as_deref(), &server.command)?;

        info!(
            "starting language server: {} {} (adapter={})",
            server.command,
            server.args.join(" "),
            adapter.name()
        );
        let lsp = LspClient::start(LspClientOptions {
            command: server.command.clone(),
            args: server.args.clone(),
            cwd: server.root_dir.clone(),
            adapter,
            initialize_timeout: server.initialize_timeout,
            request_timeout: server.request_timeout,
            initialize_options: server.initialize_options.clone(),
            workspace_configuration: server.workspace_configuration.clone(),
        })
        .await?;

        Ok(Self {
            lsp,
            open_files: Mutex::new(HashMap::new()),
            language_id: server
                .language_id
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE_ID.to_string()),
            warmup_delay: server.warmup_delay,
        })
    }

    pub async fn shutdown(self) -> Result<()> {
        self.lsp.shutdown().await
    }

    async fn open_or_sync(&self, file_path: &Path) -> Result<SyncedFile> {
        let abs = file_path
            .canonicalize()
            .with_context(|| format!("failed to canonicalize file path: {file_path:?}"))?;
        let content = fs::read(&abs)
            .await
            .with_context(|| format!("failed to read file: {abs:?}"))?;
        let hash = sha256_hex(&content);
        let text = String::from_utf8(content).context("file is not valid UTF-8")?;

        let mut open = self.open_files.lock().await;
        let version = match open.get_mut(&abs) {
            None => {
                let language_id = language_id_for_path(&abs, &self.language_id);
                debug!("didOpen {:?} languageId={language_id}", abs);
                self.lsp.did_open(&abs, language_id, 1, text.clone()).await?;
                open.insert(
                    abs.clone(),
                    OpenFileState {
                        version: 1,
                        last_sha256: hash,
                    },
                );
                if !self.warmup_delay.is_zero() {
                    tokio::time::sleep(self.warmup_delay).await;
                }
                1
            }
            Some(state) => {
                if state.last_sha256 != hash {
                    state.version += 1;
                    state.last_sha256 = hash;
                    debug!("didChange {:?} version={}", abs, state.version);
                    self.lsp.did_change(&abs, state.version, text.clone()).await?;
                }
                state.version
            }
        };

        Ok(SyncedFile {
            path: abs,
            version,
            text,
        })
    }

    async fn document_symbols_with_retry(
        &self,
        file_path: &Path,
    ) -> Result<Option<Vec<SymbolTreeNode>>> {
        const ATTEMPTS: u64 = 3;
        let mut last: Option<Vec<SymbolTreeNode>> = None;
        for attempt in 1..=ATTEMPTS {
            let value = self.lsp.document_symbols(file_path).await?;
            match parse_document_symbols(value)? {
                Some(nodes) if !nodes.is_empty() => return Ok(Some(nodes)),
                other => last = other,
            }
            // Freshly opened projects can answer with an empty outline until indexed.
            if attempt < ATTEMPTS {
                tokio::time::sleep(Duration::from_millis(200 * attempt)).await;
            }
        }
        Ok(last)
    }
}

#[async_trait]
impl HoverProvider for TsLspClient {
    async fn hover(&self, file: &Path, position: Position) -> Result<Vec<HoverFragment>> {
        let synced = self.open_or_sync(file).await?;
        let value = self.lsp.hover(&synced.path, position.into()).await?;
        Ok(parse_hover(&value))
    }

    async fn document_symbols(&self, file: &Path) -> Result<Option<Vec<SymbolTreeNode>>> {
        let synced = self.open_or_sync(file).await?;
        self.document_symbols_with_retry(&synced.path).await
    }

    async fn definition(&self, file: &Path, position: Position) -> Result<Vec<DefinitionCandidate>> {
        let synced = self.open_or_sync(file).await?;
        let value = self.lsp.definition(&synced.path, position.into()).await?;
        parse_definitions(value)
    }

    async fn document_version(&self, file: &Path) -> Result<DocumentVersion> {
        Ok(self.open_or_sync(file).await?.version)
    }

    async fn full_text(&self, file: &Path) -> Result<String> {
        Ok(self.open_or_sync(file).await?.text)
    }
}

/// The `languageId` to announce for a file, by extension.
pub fn language_id_for_path<'a>(path: &Path, fallback: &'a str) -> &'a str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("ts" | "mts" | "cts") => "typescript",
        Some("tsx") => "typescriptreact",
        Some("js" | "mjs" | "cjs") => "javascript",
        Some("jsx") => "javascriptreact",
        _ => fallback,
    }
}
