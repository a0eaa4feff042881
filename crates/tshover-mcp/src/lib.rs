//! MCP tool server over stdio exposing hover lookups for TypeScript workspaces.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::ErrorData as McpError;
use rmcp::ServiceExt;
use rmcp::handler::server::ServerHandler;
use rmcp::model::CallToolRequestParam;
use rmcp::model::CallToolResult;
use rmcp::model::Content;
use rmcp::model::JsonObject;
use rmcp::model::ListToolsResult;
use rmcp::model::PaginatedRequestParam;
use rmcp::model::ServerCapabilities;
use rmcp::model::ServerInfo;
use rmcp::model::Tool;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use tracing::info;
use tshover_core::config::{LoadedConfig, ResolvedServerConfig, TshoverConfig};
use tshover_engine::{EngineOptions, HoverEngine, HoverError, HoverProvider};
use tshover_lsp::TsLspClient;

mod handlers;
mod structured;
mod tool_schemas;
mod tools;

use structured::{structured_error, structured_ok};

fn mcp_error_kind_name(code: i32) -> &'static str {
    match code {
        -32002 => "resource_not_found",
        -32600 => "invalid_request",
        -32601 => "method_not_found",
        -32602 => "invalid_params",
        -32603 => "internal_error",
        -32700 => "parse_error",
        _ => "mcp_error",
    }
}

fn tshover_error_kind_from_data(data: Option<&Value>) -> Option<&str> {
    data.and_then(|d| d.get("tshover_error"))
        .and_then(|e| e.get("kind"))
        .and_then(|k| k.as_str())
}

fn error_data(kind: &str) -> Option<Value> {
    Some(json!({ "tshover_error": { "kind": kind } }))
}

fn hover_error_to_mcp(err: HoverError) -> McpError {
    let data = error_data(err.kind());
    match err {
        HoverError::SymbolNotFound { .. } => McpError::invalid_params(err.to_string(), data),
        other => McpError::internal_error(format!("{other:#}"), data),
    }
}

fn error_next_steps(tool: &str, err: &McpError) -> Vec<Value> {
    let message = err.message.as_ref();
    let kind = tshover_error_kind_from_data(err.data.as_ref());
    let mut steps = Vec::new();

    if tool != "get_current_config" {
        steps.push(json!({
            "kind": "tool",
            "tool": "get_current_config",
            "arguments": {},
            "message": "Confirm the effective workspace root, language server command and timeouts."
        }));
    }

    match kind {
        Some("symbol_not_found") => {
            steps.push(json!({
                "kind": "tool",
                "tool": "hover_at_position",
                "message": "Check the symbol spelling (names match exactly), or hover a known 0-based line/character instead."
            }));
        }
        Some("outside_allowed_roots") => {
            steps.push(json!({
                "kind": "config",
                "message": "Pass a `file` under the workspace root, or start tshover with `--workspace-root` pointing at the project."
            }));
        }
        Some("timeout") => {
            steps.push(json!({
                "kind": "config",
                "message": "Increase `engine.provider_timeout_ms` or `server.request_timeout_ms`; large projects can take a while on first load."
            }));
        }
        _ => {}
    }

    if message.contains("failed to spawn LSP server:")
        || message.contains("failed to initialize LSP server")
    {
        steps.push(json!({
            "kind": "command",
            "command": "tshover doctor --workspace-root .",
            "message": "Run doctor to confirm the resolved server command is installed and runnable."
        }));
        steps.push(json!({
            "kind": "config",
            "message": "Set `server.command` (or TSHOVER_TSSERVER_COMMAND) to a working typescript-language-server."
        }));
    }

    steps
}

fn mcp_error_to_call_tool_result(
    tool: &str,
    input: Option<Value>,
    err: McpError,
) -> CallToolResult {
    let code = err.code.0;
    let kind = tshover_error_kind_from_data(err.data.as_ref())
        .unwrap_or_else(|| mcp_error_kind_name(code))
        .to_string();
    let message = err.message.to_string();
    let next_steps = error_next_steps(tool, &err);

    let mut structured = structured_error(tool, input, &kind, &message);
    if let Some(obj) = structured.as_object_mut() {
        obj.insert("mcp_error_code".to_string(), json!(code));
        if !next_steps.is_empty() {
            obj.insert("next_steps".to_string(), Value::Array(next_steps));
        }
    }

    CallToolResult {
        // Short text fallback for clients that ignore structuredContent.
        content: vec![Content::text(message)],
        structured_content: Some(structured),
        is_error: Some(true),
        meta: None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct McpOptions {
    pub config_path: Option<PathBuf>,
    pub workspace_root: Option<PathBuf>,
    /// Start the language server before serving instead of on the first tool call.
    pub warmup: bool,
}

pub async fn run_stdio_with_options(options: McpOptions) -> Result<()> {
    let loaded = tshover_core::config::load_config(
        options.config_path.as_deref(),
        options.workspace_root.as_deref(),
    )?;
    let service = TshoverMcpServer::new(loaded);
    if options.warmup {
        info!("warmup: starting language server");
        service
            .engine()
            .await
            .map_err(|e| anyhow::anyhow!(e.message.to_string()))?;
    }

    let running = service
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await?;
    running.waiting().await?;
    Ok(())
}

#[derive(Clone)]
pub struct TshoverMcpServer {
    tools: Arc<Vec<Tool>>,
    state: Arc<TshoverState>,
}

struct TshoverState {
    workspace_root: PathBuf,
    allowed_roots: Vec<PathBuf>,
    config: TshoverConfig,
    config_source: tshover_core::config::ConfigSource,
    server: ResolvedServerConfig,
    engine_options: EngineOptions,
    no_hover_placeholder: String,
    no_type_placeholder: String,
    engine: OnceCell<Arc<HoverEngine>>,
}

impl TshoverMcpServer {
    /// A server whose language server is started lazily on first use.
    pub fn new(loaded: LoadedConfig) -> Self {
        Self::build(loaded, OnceCell::new())
    }

    /// A server backed by an already running provider.
    pub fn with_provider(loaded: LoadedConfig, provider: Arc<dyn HoverProvider>) -> Self {
        let options = EngineOptions::from_config(&loaded.config);
        let engine = Arc::new(HoverEngine::new(provider, options));
        Self::build(loaded, OnceCell::new_with(Some(engine)))
    }

    fn build(loaded: LoadedConfig, engine: OnceCell<Arc<HoverEngine>>) -> Self {
        let LoadedConfig {
            config,
            workspace_root,
            source,
        } = loaded;
        let server = tshover_core::config::resolved_server(&config, &workspace_root);
        let allowed_roots = compute_allowed_roots(&workspace_root, &server);

        Self {
            tools: Arc::new(tools::all_tools()),
            state: Arc::new(TshoverState {
                allowed_roots,
                engine_options: EngineOptions::from_config(&config),
                no_hover_placeholder: tshover_core::config::no_hover_placeholder(&config),
                no_type_placeholder: tshover_core::config::no_type_placeholder(&config),
                workspace_root,
                config,
                config_source: source,
                server,
                engine,
            }),
        }
    }

    async fn engine(&self) -> Result<Arc<HoverEngine>, McpError> {
        self.state
            .engine
            .get_or_try_init(|| async {
                let client = TsLspClient::start(&self.state.server)
                    .await
                    .map_err(|e| McpError::internal_error(format!("{e:#}"), error_data("lsp_error")))?;
                let provider: Arc<dyn HoverProvider> = Arc::new(client);
                Ok::<_, McpError>(Arc::new(HoverEngine::new(
                    provider,
                    self.state.engine_options.clone(),
                )))
            })
            .await
            .cloned()
    }

    fn resolve_file(&self, file: &str) -> Result<PathBuf, McpError> {
        if file.trim().is_empty() {
            return Err(McpError::invalid_params(
                "file must not be empty",
                error_data("invalid_params"),
            ));
        }
        canonicalize_within(
            &self.state.workspace_root,
            &self.state.allowed_roots,
            Path::new(file),
        )
        .map_err(|e| {
            let message = format!("{e:#}");
            let kind = if message.contains("outside allowed roots") {
                "outside_allowed_roots"
            } else {
                "invalid_params"
            };
            McpError::invalid_params(message, error_data(kind))
        })
    }
}

impl ServerHandler for TshoverMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Hover text, symbol hovers and declaration shapes from a TypeScript language server. Lines and characters are 0-based."
                    .to_string(),
            ),
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.tools.clone();
        async move {
            Ok(ListToolsResult {
                tools: (*tools).clone(),
                next_cursor: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: rmcp::service::RequestContext<rmcp::service::RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let tool = request.name.to_string();
        let input = request.arguments.clone().map(Value::Object);

        let result = match tool.as_str() {
            "hover_at_position" => match parse_arguments(request.arguments) {
                Ok(args) => self.hover_at_position(args).await,
                Err(err) => Err(err),
            },
            "hover_at_symbol" => match parse_arguments(request.arguments) {
                Ok(args) => self.hover_at_symbol(args).await,
                Err(err) => Err(err),
            },
            "public_type_shape" => match parse_arguments(request.arguments) {
                Ok(args) => self.public_type_shape(args).await,
                Err(err) => Err(err),
            },
            "get_current_config" => self.get_current_config().await,
            "clear_hover_cache" => self.clear_hover_cache().await,
            other => Err(McpError::invalid_params(
                format!("unknown tool: {other}"),
                error_data("invalid_params"),
            )),
        };

        match result {
            Ok(r) => Ok(r),
            Err(err) => Ok(mcp_error_to_call_tool_result(&tool, input, err)),
        }
    }
}

fn compute_allowed_roots(workspace_root: &Path, server: &ResolvedServerConfig) -> Vec<PathBuf> {
    let mut out = Vec::<PathBuf>::new();
    for root in [workspace_root.to_path_buf(), server.root_dir.clone()] {
        let canon = root.canonicalize().unwrap_or(root);
        if !out.contains(&canon) {
            out.push(canon);
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct HoverAtPositionArgs {
    #[serde(alias = "file_path")]
    file: String,
    line: u32,
    character: u32,
}

#[derive(Debug, Deserialize)]
struct SymbolArgs {
    #[serde(alias = "file_path")]
    file: String,
    #[serde(alias = "symbol_name")]
    symbol: String,
}

fn parse_arguments<T: for<'de> Deserialize<'de>>(
    arguments: Option<JsonObject>,
) -> Result<T, McpError> {
    let arguments = arguments.unwrap_or_default();
    serde_json::from_value::<T>(Value::Object(arguments.into_iter().collect()))
        .map_err(|e| McpError::invalid_params(e.to_string(), error_data("invalid_params")))
}

fn canonicalize_within(
    workspace_root: &Path,
    allowed_roots: &[PathBuf],
    file_path: &Path,
) -> anyhow::Result<PathBuf> {
    let combined = if file_path.is_absolute() {
        file_path.to_path_buf()
    } else {
        workspace_root.join(file_path)
    };

    let file = combined
        .canonicalize()
        .with_context(|| format!("failed to canonicalize file path: {combined:?}"))?;

    if !allowed_roots.iter().any(|root| file.starts_with(root)) {
        return Err(anyhow::anyhow!(
            "file is outside allowed roots (workspace_root={:?}, file={:?})",
            workspace_root,
            file,
        ));
    }
    Ok(file)
}
