use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HoverError {
    /// Neither the symbol outline nor the text scan found the name.
    #[error("symbol \"{symbol}\" not found in {}", file.display())]
    SymbolNotFound { file: PathBuf, symbol: String },

    #[error("provider call `{operation}` timed out after {}ms", timeout.as_millis())]
    ProviderTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    ProviderUnavailable(#[from] anyhow::Error),
}

impl HoverError {
    /// Stable machine-readable name, used in structured tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            HoverError::SymbolNotFound { .. } => "symbol_not_found",
            HoverError::ProviderTimeout { .. } => "timeout",
            HoverError::ProviderUnavailable(_) => "lsp_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_not_found_names_symbol_and_file() {
        let err = HoverError::SymbolNotFound {
            file: PathBuf::from("/w/sample.ts"),
            symbol: "Missing".to_string(),
        };
        assert_eq!(err.to_string(), "symbol \"Missing\" not found in /w/sample.ts");
        assert_eq!(err.kind(), "symbol_not_found");
    }

    #[test]
    fn provider_errors_keep_their_message() {
        let err = HoverError::from(anyhow::anyhow!("LSP response channel closed: textDocument/hover"));
        assert_eq!(
            err.to_string(),
            "LSP response channel closed: textDocument/hover"
        );
        assert_eq!(err.kind(), "lsp_error");
    }
}
