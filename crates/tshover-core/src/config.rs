use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 4096;
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_INITIALIZE_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_NO_HOVER_PLACEHOLDER: &str = "(no hover info)";
pub const DEFAULT_NO_TYPE_PLACEHOLDER: &str = "(no type info)";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct TshoverConfig {
    #[serde(default)]
    #[serde(alias = "workspaceRoot")]
    pub workspace_root: Option<PathBuf>,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
    #[serde(default)]
    pub engine: Option<EngineConfig>,
    #[serde(default)]
    pub mcp: Option<McpConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Command to start the language server. Defaults to `typescript-language-server`.
    #[serde(default)]
    pub command: Option<String>,
    /// Arguments passed to the server. Defaults to `["--stdio"]` for the default command.
    #[serde(default)]
    pub args: Option<Vec<String>>,
    /// languageId sent with didOpen when the file extension does not imply one.
    #[serde(default)]
    #[serde(alias = "languageId")]
    pub language_id: Option<String>,
    /// Protocol adapter (`default` or `tsserver`). Detected from the command when omitted.
    #[serde(default)]
    pub adapter: Option<String>,
    /// Optional root directory for the server (absolute or relative to `workspace_root`).
    #[serde(default)]
    #[serde(alias = "rootDir")]
    pub root_dir: Option<PathBuf>,
    #[serde(default)]
    pub initialize_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    /// Delay after the first didOpen of a file, for servers that index lazily.
    #[serde(default)]
    pub warmup_delay_ms: Option<u64>,
    /// Optional `initializationOptions` passed to the `initialize` request.
    #[serde(default)]
    #[serde(alias = "initializeOptions")]
    pub initialize_options: Option<JsonValue>,
    /// Optional responses for server-initiated `workspace/configuration` requests, keyed by section.
    #[serde(default)]
    #[serde(alias = "workspaceConfiguration")]
    pub workspace_configuration: Option<HashMap<String, JsonValue>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Upper bound on cached hover results. `0` keeps every entry.
    #[serde(default)]
    #[serde(alias = "maxEntries")]
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Per provider call timeout. `0` disables the engine-level timeout.
    #[serde(default)]
    #[serde(alias = "providerTimeoutMs")]
    pub provider_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct McpConfig {
    #[serde(default)]
    #[serde(alias = "noHoverPlaceholder")]
    pub no_hover_placeholder: Option<String>,
    #[serde(default)]
    #[serde(alias = "noTypePlaceholder")]
    pub no_type_placeholder: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: TshoverConfig,
    pub workspace_root: PathBuf,
    pub source: ConfigSource,
}

#[derive(Debug, Clone)]
pub enum ConfigSource {
    None,
    Path(PathBuf),
    Env(PathBuf),
    Workspace(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ResolvedServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub language_id: Option<String>,
    pub adapter: Option<String>,
    pub root_dir: PathBuf,
    pub initialize_timeout: Duration,
    pub request_timeout: Duration,
    pub warmup_delay: Duration,
    pub initialize_options: Option<JsonValue>,
    pub workspace_configuration: HashMap<String, JsonValue>,
}

pub fn load_config(
    cli_config_path: Option<&Path>,
    cli_workspace_root: Option<&Path>,
) -> Result<LoadedConfig> {
    if let Some(path) = cli_config_path {
        let config = read_config_file(path)?;
        let workspace_root =
            resolve_workspace_root(cli_workspace_root, config.workspace_root.as_deref())?;
        return Ok(LoadedConfig {
            config,
            workspace_root,
            source: ConfigSource::Path(path.to_path_buf()),
        });
    }

    if let Ok(path) = std::env::var("TSHOVER_CONFIG_PATH")
        && !path.trim().is_empty()
    {
        let path = PathBuf::from(path);
        let config = read_config_file(&path)?;
        let workspace_root =
            resolve_workspace_root(cli_workspace_root, config.workspace_root.as_deref())?;
        return Ok(LoadedConfig {
            config,
            workspace_root,
            source: ConfigSource::Env(path),
        });
    }

    let fallback_root = cli_workspace_root
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let workspace_root = fallback_root
        .canonicalize()
        .unwrap_or(fallback_root.clone());

    for candidate in workspace_config_candidates(&workspace_root) {
        if candidate.exists() {
            let config = read_config_file(&candidate)?;
            let effective_root =
                resolve_workspace_root(Some(&workspace_root), config.workspace_root.as_deref())?;
            return Ok(LoadedConfig {
                config,
                workspace_root: effective_root,
                source: ConfigSource::Workspace(candidate),
            });
        }
    }

    Ok(LoadedConfig {
        config: TshoverConfig::default(),
        workspace_root,
        source: ConfigSource::None,
    })
}

fn resolve_workspace_root(cli: Option<&Path>, from_config: Option<&Path>) -> Result<PathBuf> {
    if let Some(cli) = cli {
        return cli
            .canonicalize()
            .with_context(|| format!("failed to canonicalize workspace_root: {cli:?}"));
    }
    if let Some(cfg) = from_config {
        return cfg
            .canonicalize()
            .with_context(|| format!("failed to canonicalize workspace_root: {cfg:?}"));
    }
    let cwd = std::env::current_dir().context("failed to get current_dir")?;
    Ok(cwd.canonicalize().unwrap_or(cwd))
}

fn workspace_config_candidates(workspace_root: &Path) -> Vec<PathBuf> {
    vec![
        workspace_root.join(".tshover").join("config.toml"),
        workspace_root.join(".tshover").join("config.json"),
        workspace_root.join("tshover.toml"),
        workspace_root.join("tshover.json"),
    ]
}

fn read_config_file(path: &Path) -> Result<TshoverConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read config file: {path:?}"))?;
    let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");

    if ext.eq_ignore_ascii_case("toml") {
        let s = String::from_utf8(bytes).context("config file is not valid UTF-8")?;
        let cfg: TshoverConfig = toml::from_str(&s).context("failed to parse TOML config")?;
        return Ok(cfg);
    }
    if ext.eq_ignore_ascii_case("json") {
        let cfg: TshoverConfig =
            serde_json::from_slice(&bytes).context("failed to parse JSON config")?;
        return Ok(cfg);
    }

    Err(anyhow!(
        "unsupported config extension (expected .toml or .json): {path:?}"
    ))
}

/// Resolve the language server settings, falling back to `typescript-language-server --stdio`.
///
/// `TSHOVER_TSSERVER_COMMAND` replaces the default command but never an explicit one.
pub fn resolved_server(config: &TshoverConfig, workspace_root: &Path) -> ResolvedServerConfig {
    let server = config.server.clone().unwrap_or_default();

    let explicit_command = non_empty(server.command.clone());
    let command = explicit_command.clone().unwrap_or_else(default_server_command);

    let args = match server.args.clone() {
        Some(args) => args,
        None if explicit_command.is_none() => vec!["--stdio".to_string()],
        None => Vec::new(),
    };

    ResolvedServerConfig {
        command,
        args,
        language_id: non_empty(server.language_id.clone()),
        adapter: non_empty(server.adapter.clone()),
        root_dir: resolve_root_dir(workspace_root, server.root_dir.as_deref()),
        initialize_timeout: Duration::from_millis(
            server
                .initialize_timeout_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_INITIALIZE_TIMEOUT_MS),
        ),
        request_timeout: Duration::from_millis(
            server
                .request_timeout_ms
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        ),
        warmup_delay: Duration::from_millis(server.warmup_delay_ms.unwrap_or(0)),
        initialize_options: server.initialize_options.clone(),
        workspace_configuration: server
            .workspace_configuration
            .clone()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| {
                let key = k.trim().to_string();
                if key.is_empty() { None } else { Some((key, v)) }
            })
            .collect(),
    }
}

pub fn cache_max_entries(config: &TshoverConfig) -> usize {
    config
        .cache
        .as_ref()
        .and_then(|c| c.max_entries)
        .unwrap_or(DEFAULT_CACHE_MAX_ENTRIES)
}

/// `None` means provider calls are never cut short by the engine.
pub fn provider_timeout(config: &TshoverConfig) -> Option<Duration> {
    let ms = config
        .engine
        .as_ref()
        .and_then(|e| e.provider_timeout_ms)
        .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_MS);
    if ms == 0 {
        None
    } else {
        Some(Duration::from_millis(ms))
    }
}

pub fn no_hover_placeholder(config: &TshoverConfig) -> String {
    config
        .mcp
        .as_ref()
        .and_then(|m| non_empty(m.no_hover_placeholder.clone()))
        .unwrap_or_else(|| DEFAULT_NO_HOVER_PLACEHOLDER.to_string())
}

pub fn no_type_placeholder(config: &TshoverConfig) -> String {
    config
        .mcp
        .as_ref()
        .and_then(|m| non_empty(m.no_type_placeholder.clone()))
        .unwrap_or_else(|| DEFAULT_NO_TYPE_PLACEHOLDER.to_string())
}

fn default_server_command() -> String {
    if let Ok(value) = std::env::var("TSHOVER_TSSERVER_COMMAND")
        && !value.trim().is_empty()
    {
        return value.trim().to_string();
    }
    "typescript-language-server".to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn resolve_root_dir(workspace_root: &Path, root_dir: Option<&Path>) -> PathBuf {
    let resolved = match root_dir {
        None => workspace_root.to_path_buf(),
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => workspace_root.join(p),
    };
    resolved.canonicalize().unwrap_or(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_typescript_language_server_over_stdio() {
        let root = tempfile::tempdir().unwrap();
        let server = resolved_server(&TshoverConfig::default(), root.path());
        if std::env::var("TSHOVER_TSSERVER_COMMAND").is_err() {
            assert_eq!(server.command, "typescript-language-server");
        }
        assert_eq!(server.args, vec!["--stdio".to_string()]);
        assert_eq!(
            server.request_timeout,
            Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS)
        );
        assert!(server.warmup_delay.is_zero());
    }

    #[test]
    fn explicit_command_does_not_inherit_default_args() {
        let toml = r#"
[server]
command = "vtsls"
"#;
        let config: TshoverConfig = toml::from_str(toml).unwrap();
        let root = tempfile::tempdir().unwrap();
        let server = resolved_server(&config, root.path());
        assert_eq!(server.command, "vtsls");
        assert!(server.args.is_empty());
    }

    #[test]
    fn toml_parses_all_sections() {
        let toml = r#"
[server]
command = "typescript-language-server"
args = ["--stdio", "--log-level", "4"]
language_id = "typescript"
request_timeout_ms = 5000
initialize_options = { preferences = { includeInlayParameterNameHints = "none" } }

[server.workspace_configuration]
formattingOptions = { tabSize = 2, insertSpaces = true }

[cache]
max_entries = 16

[engine]
provider_timeout_ms = 0

[mcp]
no_hover_placeholder = "nothing here"
"#;
        let config: TshoverConfig = toml::from_str(toml).unwrap();
        let root = tempfile::tempdir().unwrap();
        let server = resolved_server(&config, root.path());
        assert_eq!(server.args.len(), 3);
        assert_eq!(server.language_id.as_deref(), Some("typescript"));
        assert_eq!(server.request_timeout, Duration::from_millis(5000));
        assert!(server.workspace_configuration.contains_key("formattingOptions"));
        assert!(server.initialize_options.is_some());

        assert_eq!(cache_max_entries(&config), 16);
        assert_eq!(provider_timeout(&config), None);
        assert_eq!(no_hover_placeholder(&config), "nothing here");
        assert_eq!(no_type_placeholder(&config), DEFAULT_NO_TYPE_PLACEHOLDER);
    }

    #[test]
    fn json_accepts_camel_case_aliases() {
        let json = r#"
{
  "server": { "languageId": "javascript", "rootDir": "web" },
  "cache": { "maxEntries": 0 },
  "engine": { "providerTimeoutMs": 1500 }
}
"#;
        let config: TshoverConfig = serde_json::from_str(json).unwrap();
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("web")).unwrap();
        let server = resolved_server(&config, root.path());
        assert_eq!(server.language_id.as_deref(), Some("javascript"));
        assert!(server.root_dir.ends_with("web"));
        assert_eq!(cache_max_entries(&config), 0);
        assert_eq!(provider_timeout(&config), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn load_config_finds_workspace_file() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join(".tshover")).unwrap();
        std::fs::write(
            root.path().join(".tshover").join("config.toml"),
            "[cache]\nmax_entries = 8\n",
        )
        .unwrap();

        let loaded = load_config(None, Some(root.path())).unwrap();
        assert!(matches!(loaded.source, ConfigSource::Workspace(_)));
        assert_eq!(cache_max_entries(&loaded.config), 8);
        assert_eq!(
            loaded.workspace_root,
            root.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn load_config_rejects_unknown_extension() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("tshover.yaml");
        std::fs::write(&path, "cache: {}\n").unwrap();
        let err = load_config(Some(&path), Some(root.path())).unwrap_err();
        assert!(err.to_string().contains("unsupported config extension"));
    }
}
