use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};
use tshover_core::config::ConfigSource;

use crate::{TshoverMcpServer, structured_ok};

fn config_source_json(source: &ConfigSource) -> Value {
    match source {
        ConfigSource::None => json!({ "kind": "none" }),
        ConfigSource::Path(p) => json!({ "kind": "path", "path": p.to_string_lossy() }),
        ConfigSource::Env(p) => json!({ "kind": "env", "path": p.to_string_lossy() }),
        ConfigSource::Workspace(p) => json!({ "kind": "workspace", "path": p.to_string_lossy() }),
    }
}

impl TshoverMcpServer {
    pub(crate) async fn get_current_config(&self) -> Result<CallToolResult, McpError> {
        let state = &self.state;
        let server = &state.server;

        let cache = match state.engine.get() {
            Some(engine) => {
                let stats = engine.cache().stats().await;
                json!({
                    "max_entries": state.engine_options.cache_max_entries,
                    "entries": stats.entries,
                    "hits": stats.hits,
                    "misses": stats.misses,
                })
            }
            None => json!({ "max_entries": state.engine_options.cache_max_entries }),
        };

        let mut structured_content = structured_ok("get_current_config", json!({}));
        if let Some(obj) = structured_content.as_object_mut() {
            obj.insert(
                "workspace_root".to_string(),
                Value::String(state.workspace_root.to_string_lossy().to_string()),
            );
            obj.insert(
                "allowed_roots".to_string(),
                json!(
                    state
                        .allowed_roots
                        .iter()
                        .map(|p| p.to_string_lossy().to_string())
                        .collect::<Vec<_>>()
                ),
            );
            obj.insert("config_source".to_string(), config_source_json(&state.config_source));
            obj.insert(
                "server".to_string(),
                json!({
                    "command": server.command,
                    "args": server.args,
                    "language_id": server.language_id,
                    "adapter": server.adapter,
                    "root_dir": server.root_dir.to_string_lossy(),
                    "initialize_timeout_ms": server.initialize_timeout.as_millis() as u64,
                    "request_timeout_ms": server.request_timeout.as_millis() as u64,
                    "warmup_delay_ms": server.warmup_delay.as_millis() as u64,
                    "has_initialize_options": server.initialize_options.is_some(),
                    "workspace_configuration_keys": server.workspace_configuration.keys().cloned().collect::<Vec<_>>(),
                    "running": state.engine.initialized(),
                }),
            );
            obj.insert(
                "engine".to_string(),
                json!({
                    "provider_timeout_ms": state
                        .engine_options
                        .provider_timeout
                        .map(|d| d.as_millis() as u64),
                }),
            );
            obj.insert("cache".to_string(), cache);
            obj.insert(
                "placeholders".to_string(),
                json!({
                    "no_hover": state.no_hover_placeholder,
                    "no_type": state.no_type_placeholder,
                }),
            );
            obj.insert(
                "config".to_string(),
                serde_json::to_value(&state.config).unwrap_or(Value::Null),
            );
        }

        Ok(CallToolResult {
            content: vec![Content::text(format!(
                "workspace_root={} server={} {}",
                state.workspace_root.display(),
                server.command,
                server.args.join(" ")
            ))],
            structured_content: Some(structured_content),
            is_error: Some(false),
            meta: None,
        })
    }

    pub(crate) async fn clear_hover_cache(&self) -> Result<CallToolResult, McpError> {
        // Nothing is cached before the engine has started.
        let dropped = match self.state.engine.get() {
            Some(engine) => engine.clear_cache().await,
            None => 0,
        };

        let mut structured_content = structured_ok("clear_hover_cache", json!({}));
        if let Some(obj) = structured_content.as_object_mut() {
            obj.insert("dropped".to_string(), json!(dropped));
        }

        Ok(CallToolResult {
            content: vec![Content::text(format!("Dropped {dropped} cached hover results."))],
            structured_content: Some(structured_content),
            is_error: Some(false),
            meta: None,
        })
    }
}
