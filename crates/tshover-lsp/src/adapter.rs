use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceFolder {
    pub uri: String,
    pub name: String,
}

/// Per-server quirks in how server-initiated messages must be answered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LspAdapter {
    #[default]
    Default,
    TsServerProtocol,
}

impl LspAdapter {
    pub fn name(&self) -> &'static str {
        match self {
            LspAdapter::Default => "default",
            LspAdapter::TsServerProtocol => "tsserver",
        }
    }

    /// Result for a server→client request, or `None` when the method is unknown.
    pub fn server_request_result(
        &self,
        method: &str,
        params: Option<&Value>,
        workspace_folders: &[WorkspaceFolder],
        workspace_configuration: &HashMap<String, Value>,
    ) -> Option<Value> {
        if let LspAdapter::TsServerProtocol = self
            && let Some(result) = tsserver_request_result(method, params)
        {
            return Some(result);
        }

        match method {
            "workspace/configuration" => Some(configuration_items(params, workspace_configuration)),
            "workspace/workspaceFolders" => Some(json!(workspace_folders)),
            "client/registerCapability"
            | "client/unregisterCapability"
            | "window/workDoneProgress/create"
            | "window/showMessageRequest" => Some(Value::Null),
            _ => None,
        }
    }

    /// A message to send back for a server notification, if the protocol expects one.
    pub fn server_notification_response(
        &self,
        method: &str,
        params: Option<&Value>,
    ) -> Option<Value> {
        match self {
            LspAdapter::Default => None,
            LspAdapter::TsServerProtocol => tsserver_notification_response(method, params),
        }
    }
}

pub fn adapter_from_name(name: &str) -> Option<LspAdapter> {
    let normalized = name.trim().to_ascii_lowercase().replace(['-', '_'], "");
    match normalized.as_str() {
        "" | "default" | "none" => Some(LspAdapter::Default),
        "tsserver" | "typescript" | "typescriptlanguageserver" | "vtsls" => {
            Some(LspAdapter::TsServerProtocol)
        }
        _ => None,
    }
}

pub fn adapter_from_command(command: &str) -> Option<LspAdapter> {
    let c = command.trim().to_ascii_lowercase();
    if c.contains("typescript-language-server") || c.contains("vtsls") {
        return Some(LspAdapter::TsServerProtocol);
    }
    None
}

/// Configured name wins; otherwise guess from the command, falling back to the default adapter.
pub fn resolve_adapter(name: Option<&str>, command: &str) -> anyhow::Result<LspAdapter> {
    match name {
        Some(name) => adapter_from_name(name)
            .ok_or_else(|| anyhow::anyhow!("unknown LSP adapter: {name}")),
        None => Ok(adapter_from_command(command).unwrap_or_default()),
    }
}

fn configuration_items(
    params: Option<&Value>,
    workspace_configuration: &HashMap<String, Value>,
) -> Value {
    let items = params
        .and_then(|p| p.get("items"))
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();

    Value::Array(
        items
            .iter()
            .map(|item| {
                item.get("section")
                    .and_then(|s| s.as_str())
                    .and_then(|section| workspace_configuration.get(section))
                    .cloned()
                    .unwrap_or(Value::Null)
            })
            .collect(),
    )
}

fn tsserver_request_result(method: &str, params: Option<&Value>) -> Option<Value> {
    if method != "tsserver/request" {
        return None;
    }

    let id = params
        .and_then(|p| p.as_array())
        .and_then(|arr| arr.first().cloned())
        .unwrap_or(json!(0));
    Some(json!([id, {}]))
}

fn tsserver_notification_response(method: &str, params: Option<&Value>) -> Option<Value> {
    if method != "tsserver/request" {
        return None;
    }

    let arr = params.and_then(|p| p.as_array())?;
    let id = arr.first().cloned()?;

    Some(json!({
        "jsonrpc": "2.0",
        "method": "tsserver/response",
        "params": [id, null]
    }))
}
