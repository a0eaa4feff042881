use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, oneshot};
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};
use url::Url;

use crate::adapter::{LspAdapter, WorkspaceFolder};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspPosition {
    pub line: u32,
    pub character: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspRange {
    pub start: LspPosition,
    pub end: LspPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspLocation {
    pub uri: String,
    pub range: LspRange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspLocationLink {
    pub target_uri: String,
    pub target_range: LspRange,
    #[serde(default)]
    pub target_selection_range: Option<LspRange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspSymbolInformation {
    pub name: String,
    pub kind: u32,
    pub location: LspLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LspDocumentSymbol {
    pub name: String,
    pub kind: u32,
    pub range: LspRange,
    pub selection_range: LspRange,
    #[serde(default)]
    pub children: Vec<LspDocumentSymbol>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspTextDocumentItem {
    uri: String,
    language_id: String,
    version: i32,
    text: String,
}

#[derive(Debug, Clone, Serialize)]
struct LspTextDocumentIdentifier {
    uri: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspVersionedTextDocumentIdentifier {
    uri: String,
    version: i32,
}

#[derive(Debug, Clone, Serialize)]
struct LspTextDocumentContentChangeEvent {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspDidOpenTextDocumentParams {
    text_document: LspTextDocumentItem,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspDidChangeTextDocumentParams {
    text_document: LspVersionedTextDocumentIdentifier,
    content_changes: Vec<LspTextDocumentContentChangeEvent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspTextDocumentPositionParams {
    text_document: LspTextDocumentIdentifier,
    position: LspPosition,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LspDocumentSymbolParams {
    text_document: LspTextDocumentIdentifier,
}

#[derive(Debug, Clone)]
pub struct LspClientOptions {
    pub command: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub adapter: LspAdapter,
    pub initialize_timeout: Duration,
    pub request_timeout: Duration,
    pub initialize_options: Option<Value>,
    pub workspace_configuration: HashMap<String, Value>,
}

#[derive(Debug)]
struct LspState {
    next_id: i64,
    pending: HashMap<i64, oneshot::Sender<Value>>,
}

/// Removes its request id from the pending table when dropped, including when the
/// awaiting future is cancelled before a response arrives.
struct PendingRequest {
    state: Arc<Mutex<LspState>>,
    id: i64,
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        let id = self.id;
        if let Ok(mut state) = self.state.try_lock() {
            state.pending.remove(&id);
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = self.state.clone();
            handle.spawn(async move {
                state.lock().await.pending.remove(&id);
            });
        }
    }
}

/// Everything the stdout reader needs to answer server-initiated messages.
struct ServerRequestContext {
    stdin: Arc<Mutex<ChildStdin>>,
    adapter: LspAdapter,
    workspace_folders: Vec<WorkspaceFolder>,
    workspace_configuration: HashMap<String, Value>,
}

pub struct LspClient {
    stdin: Arc<Mutex<ChildStdin>>,
    state: Arc<Mutex<LspState>>,
    child: Child,
    root_uri: String,
    initialize_options: Option<Value>,
    default_request_timeout: Duration,
}

impl LspClient {
    pub async fn start(options: LspClientOptions) -> Result<Self> {
        let mut command = Command::new(&options.command);
        command
            .args(&options.args)
            .current_dir(&options.cwd)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn LSP server: {}", options.command))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("failed to capture LSP stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("failed to capture LSP stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("failed to capture LSP stderr"))?;

        let root_uri = Url::from_directory_path(&options.cwd)
            .map_err(|_| anyhow!("failed to build rootUri for {:?}", options.cwd))?
            .to_string();

        let client = Self {
            stdin: Arc::new(Mutex::new(stdin)),
            state: Arc::new(Mutex::new(LspState {
                next_id: 1,
                pending: HashMap::new(),
            })),
            child,
            root_uri: root_uri.clone(),
            initialize_options: options.initialize_options,
            default_request_timeout: options.request_timeout,
        };

        let context = ServerRequestContext {
            stdin: client.stdin.clone(),
            adapter: options.adapter,
            workspace_folders: vec![WorkspaceFolder {
                uri: root_uri,
                name: "workspace".to_string(),
            }],
            workspace_configuration: options.workspace_configuration,
        };
        client.spawn_stdout_reader(stdout, context);
        spawn_stderr_logger(stderr);

        client
            .initialize(options.initialize_timeout)
            .await
            .context("failed to initialize LSP server")?;

        Ok(client)
    }

    pub async fn did_open(
        &self,
        path: &Path,
        language_id: &str,
        version: i32,
        text: String,
    ) -> Result<()> {
        let uri = path_to_uri(path)?;
        let params = LspDidOpenTextDocumentParams {
            text_document: LspTextDocumentItem {
                uri,
                language_id: language_id.to_string(),
                version,
                text,
            },
        };
        self.send_notification("textDocument/didOpen", &params).await
    }

    pub async fn did_change(&self, path: &Path, version: i32, text: String) -> Result<()> {
        let uri = path_to_uri(path)?;
        let params = LspDidChangeTextDocumentParams {
            text_document: LspVersionedTextDocumentIdentifier { uri, version },
            content_changes: vec![LspTextDocumentContentChangeEvent { text }],
        };
        self.send_notification("textDocument/didChange", &params).await
    }

    pub async fn hover(&self, path: &Path, position: LspPosition) -> Result<Value> {
        let params = position_params(path, position)?;
        self.send_request("textDocument/hover", &params, None).await
    }

    pub async fn definition(&self, path: &Path, position: LspPosition) -> Result<Value> {
        let params = position_params(path, position)?;
        self.send_request("textDocument/definition", &params, None).await
    }

    pub async fn document_symbols(&self, path: &Path) -> Result<Value> {
        let uri = path_to_uri(path)?;
        let params = LspDocumentSymbolParams {
            text_document: LspTextDocumentIdentifier { uri },
        };
        self.send_request("textDocument/documentSymbol", &params, None).await
    }

    pub async fn send_request<T: Serialize>(
        &self,
        method: &str,
        params: &T,
        request_timeout: Option<Duration>,
    ) -> Result<Value> {
        let (id, rx) = {
            let mut state = self.state.lock().await;
            let id = state.next_id;
            state.next_id += 1;
            let (tx, rx) = oneshot::channel();
            state.pending.insert(id, tx);
            (id, rx)
        };
        let _pending = PendingRequest {
            state: self.state.clone(),
            id,
        };

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        write_message(&self.stdin, &request).await?;

        let wait = request_timeout.unwrap_or(self.default_request_timeout);
        let response_value = match timeout(wait, rx).await {
            Ok(received) => received.map_err(|_| anyhow!("LSP response channel closed: {method}"))?,
            Err(_) => {
                return Err(anyhow!(
                    "LSP request timed out after {}ms: {method}",
                    wait.as_millis()
                ));
            }
        };

        if let Some(error) = response_value.get("error") {
            return Err(anyhow!("LSP error for {method}: {error}"));
        }

        Ok(response_value.get("result").cloned().unwrap_or(Value::Null))
    }

    pub async fn send_notification<T: Serialize>(&self, method: &str, params: &T) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        write_message(&self.stdin, &notification).await
    }

    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self
            .send_request("shutdown", &Value::Null, Some(Duration::from_secs(2)))
            .await;
        let _ = self.send_notification("exit", &Value::Null).await;

        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
        Ok(())
    }

    async fn initialize(&self, initialize_timeout: Duration) -> Result<()> {
        let mut params = json!({
            "processId": std::process::id(),
            "rootUri": self.root_uri,
            "capabilities": client_capabilities(),
            "workspaceFolders": [
                { "uri": self.root_uri, "name": "workspace" }
            ]
        });
        if let Some(options) = &self.initialize_options {
            params["initializationOptions"] = options.clone();
        }

        let _ = self
            .send_request("initialize", &params, Some(initialize_timeout))
            .await?;
        self.send_notification("initialized", &json!({})).await?;
        Ok(())
    }

    fn spawn_stdout_reader(&self, stdout: ChildStdout, context: ServerRequestContext) {
        let pending = self.state.clone();
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            loop {
                match read_lsp_message(&mut reader).await {
                    Ok(Some(message)) => {
                        handle_lsp_message(message, &pending, &context).await;
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!("failed to read LSP message: {err:#}");
                        break;
                    }
                }
            }
            // Dropping the senders fails every outstanding request.
            pending.lock().await.pending.clear();
        });
    }
}

fn client_capabilities() -> Value {
    json!({
        "textDocument": {
            "synchronization": { "didSave": false, "dynamicRegistration": false },
            "hover": {
                "contentFormat": ["markdown", "plaintext"]
            },
            "definition": { "linkSupport": true },
            "documentSymbol": {
                "hierarchicalDocumentSymbolSupport": true
            }
        },
        "workspace": {
            "configuration": true,
            "workspaceFolders": true
        },
        "window": {
            "workDoneProgress": true
        }
    })
}

fn position_params(path: &Path, position: LspPosition) -> Result<LspTextDocumentPositionParams> {
    Ok(LspTextDocumentPositionParams {
        text_document: LspTextDocumentIdentifier {
            uri: path_to_uri(path)?,
        },
        position,
    })
}

async fn handle_lsp_message(
    message: Value,
    state: &Arc<Mutex<LspState>>,
    context: &ServerRequestContext,
) {
    if let Some(method) = message.get("method").and_then(|m| m.as_str()) {
        let params = message.get("params");
        match message.get("id") {
            Some(id) => answer_server_request(context, id.clone(), method, params).await,
            None => {
                if let Some(reply) = context.adapter.server_notification_response(method, params)
                    && let Err(err) = write_message(&context.stdin, &reply).await
                {
                    warn!("failed to answer {method} notification: {err:#}");
                }
                if method == "window/logMessage"
                    && let Some(text) = params.and_then(|p| p.get("message")).and_then(|m| m.as_str())
                {
                    debug!(target: "lsp.log", "{text}");
                }
            }
        }
        return;
    }

    let id = match message.get("id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };

    if let Some(id) = id {
        let tx = {
            let mut guard = state.lock().await;
            guard.pending.remove(&id)
        };
        if let Some(tx) = tx {
            let _ = tx.send(message);
        } else {
            debug!("received response for unknown id: {id}");
        }
    }
}

async fn answer_server_request(
    context: &ServerRequestContext,
    id: Value,
    method: &str,
    params: Option<&Value>,
) {
    let reply = match context.adapter.server_request_result(
        method,
        params,
        &context.workspace_folders,
        &context.workspace_configuration,
    ) {
        Some(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        None => {
            debug!("unhandled server request: {method}");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": -32601, "message": format!("method not found: {method}") }
            })
        }
    };
    if let Err(err) = write_message(&context.stdin, &reply).await {
        warn!("failed to answer {method} request: {err:#}");
    }
}

fn encode_frame(value: &Value) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(value)?;
    let mut frame = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// The write runs on its own task so a cancelled caller never leaves half a frame on stdin.
async fn write_message(stdin: &Arc<Mutex<ChildStdin>>, value: &Value) -> Result<()> {
    let frame = encode_frame(value)?;
    let stdin = stdin.clone();
    tokio::spawn(async move {
        let mut stdin = stdin.lock().await;
        stdin.write_all(&frame).await?;
        stdin.flush().await
    })
    .await
    .context("LSP writer task failed")??;
    Ok(())
}

async fn read_lsp_message<R>(reader: &mut BufReader<R>) -> Result<Option<Value>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut content_length: Option<usize> = None;

    loop {
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(None);
        }

        let line_trimmed = line.trim_end_matches(['\r', '\n']);
        if line_trimmed.is_empty() {
            break;
        }

        if let Some((name, value)) = line_trimmed.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse::<usize>().ok();
        }
    }

    let Some(len) = content_length else {
        return Err(anyhow!("missing Content-Length header"));
    };

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    let value: Value = serde_json::from_slice(&buf)?;
    Ok(Some(value))
}

fn spawn_stderr_logger(stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => debug!(target: "lsp.stderr", "{}", line.trim_end()),
                Err(_) => break,
            }
        }
    });
}

pub fn path_to_uri(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map_err(|_| anyhow!("failed to convert path to file URI: {path:?}"))
        .map(|u| u.to_string())
}

pub fn uri_to_path(uri: &str) -> Result<PathBuf> {
    let url = Url::parse(uri).with_context(|| format!("invalid URI: {uri}"))?;
    if url.scheme() != "file" {
        return Err(anyhow!("unsupported URI scheme: {}", url.scheme()));
    }
    url.to_file_path()
        .map_err(|_| anyhow!("failed to convert URI to path: {uri}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_framed_messages_in_sequence() {
        let first = br#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let second = br#"{"jsonrpc":"2.0","method":"window/logMessage","params":{"type":3,"message":"ready"}}"#;
        let mut raw = Vec::new();
        raw.extend_from_slice(format!("Content-Length: {}\r\n\r\n", first.len()).as_bytes());
        raw.extend_from_slice(first);
        raw.extend_from_slice(
            format!(
                "content-length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n",
                second.len()
            )
            .as_bytes(),
        );
        raw.extend_from_slice(second);

        let mut reader = BufReader::new(raw.as_slice());
        let a = read_lsp_message(&mut reader).await.unwrap().unwrap();
        let b = read_lsp_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(a["id"], json!(1));
        assert_eq!(b["method"], json!("window/logMessage"));
        assert!(read_lsp_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn encoded_frames_read_back() {
        let value = json!({"jsonrpc": "2.0", "id": 7, "method": "textDocument/hover", "params": {"note": "héllo"}});
        let frame = encode_frame(&value).unwrap();
        let mut reader = BufReader::new(frame.as_slice());
        assert_eq!(read_lsp_message(&mut reader).await.unwrap(), Some(value));
        assert!(read_lsp_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn dropped_request_leaves_no_pending_entry() {
        let state = Arc::new(Mutex::new(LspState {
            next_id: 2,
            pending: HashMap::new(),
        }));
        let (tx, _rx) = oneshot::channel();
        state.lock().await.pending.insert(1, tx);

        let pending = PendingRequest {
            state: state.clone(),
            id: 1,
        };
        drop(pending);

        assert!(state.lock().await.pending.is_empty());
    }

    #[tokio::test]
    async fn cancelled_wait_releases_pending_entry() {
        let state = Arc::new(Mutex::new(LspState {
            next_id: 2,
            pending: HashMap::new(),
        }));
        let waiting = {
            let state = state.clone();
            async move {
                let (tx, rx) = oneshot::channel();
                state.lock().await.pending.insert(1, tx);
                let _pending = PendingRequest { state, id: 1 };
                let _ = rx.await;
            }
        };

        let outer = timeout(Duration::from_millis(20), waiting).await;
        assert!(outer.is_err());
        assert!(state.lock().await.pending.is_empty());
    }

    #[tokio::test]
    async fn missing_content_length_is_an_error() {
        let raw = b"X-Other: 1\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(raw.as_slice());
        assert!(read_lsp_message(&mut reader).await.is_err());
    }

    #[test]
    fn file_uris_round_trip_through_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sample file.ts");
        let uri = path_to_uri(&file).unwrap();
        assert!(uri.starts_with("file://"));
        assert!(uri.contains("sample%20file.ts"));
        assert_eq!(uri_to_path(&uri).unwrap(), file);
    }

    #[test]
    fn non_file_uris_are_rejected() {
        let err = uri_to_path("untitled:Untitled-1").unwrap_err();
        assert!(err.to_string().contains("unsupported URI scheme"));
    }

    #[test]
    fn capabilities_request_hierarchical_symbols_and_links() {
        let caps = client_capabilities();
        assert_eq!(
            caps["textDocument"]["documentSymbol"]["hierarchicalDocumentSymbolSupport"],
            json!(true)
        );
        assert_eq!(caps["textDocument"]["definition"]["linkSupport"], json!(true));
    }
}
