use std::path::Path;

use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    HoverAtPositionArgs, SymbolArgs, TshoverMcpServer, error_data, hover_error_to_mcp,
    structured_ok,
};

/// Substitute the placeholder for an empty result. The flag reports whether it was used.
pub(crate) fn text_or_placeholder(text: String, placeholder: &str) -> (String, bool) {
    if text.trim().is_empty() {
        (placeholder.to_string(), true)
    } else {
        (text, false)
    }
}

fn text_result(tool: &str, input: Value, file: &Path, text: String, placeholder: &str) -> CallToolResult {
    let (text, empty) = text_or_placeholder(text, placeholder);
    let mut structured_content = structured_ok(tool, input);
    if let Some(obj) = structured_content.as_object_mut() {
        obj.insert(
            "file".to_string(),
            Value::String(file.to_string_lossy().to_string()),
        );
        obj.insert("text".to_string(), Value::String(text.clone()));
        obj.insert("empty".to_string(), Value::Bool(empty));
    }

    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(structured_content),
        is_error: Some(false),
        meta: None,
    }
}

fn require_symbol(symbol: &str) -> Result<(), McpError> {
    if symbol.trim().is_empty() {
        return Err(McpError::invalid_params(
            "symbol must not be empty",
            error_data("invalid_params"),
        ));
    }
    Ok(())
}

impl TshoverMcpServer {
    pub(crate) async fn hover_at_position(
        &self,
        args: HoverAtPositionArgs,
    ) -> Result<CallToolResult, McpError> {
        let file = self.resolve_file(&args.file)?;
        let engine = self.engine().await?;

        let text = engine
            .hover_at_position(&file, args.line, args.character)
            .await
            .map_err(hover_error_to_mcp)?;
        debug!(
            "hover_at_position {}:{}:{} -> {} chars",
            file.display(),
            args.line,
            args.character,
            text.len()
        );

        Ok(text_result(
            "hover_at_position",
            json!({ "file": args.file, "line": args.line, "character": args.character }),
            &file,
            text,
            &self.state.no_hover_placeholder,
        ))
    }

    pub(crate) async fn hover_at_symbol(&self, args: SymbolArgs) -> Result<CallToolResult, McpError> {
        require_symbol(&args.symbol)?;
        let file = self.resolve_file(&args.file)?;
        let engine = self.engine().await?;

        let text = engine
            .hover_at_symbol(&file, &args.symbol)
            .await
            .map_err(hover_error_to_mcp)?;

        Ok(text_result(
            "hover_at_symbol",
            json!({ "file": args.file, "symbol": args.symbol }),
            &file,
            text,
            &self.state.no_hover_placeholder,
        ))
    }

    pub(crate) async fn public_type_shape(
        &self,
        args: SymbolArgs,
    ) -> Result<CallToolResult, McpError> {
        require_symbol(&args.symbol)?;
        let file = self.resolve_file(&args.file)?;
        let engine = self.engine().await?;

        let shape = engine
            .public_type_shape(&file, &args.symbol)
            .await
            .map_err(hover_error_to_mcp)?;

        Ok(text_result(
            "public_type_shape",
            json!({ "file": args.file, "symbol": args.symbol }),
            &file,
            shape,
            &self.state.no_type_placeholder,
        ))
    }
}
