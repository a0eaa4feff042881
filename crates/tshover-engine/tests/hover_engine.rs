use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tshover_engine::{
    DefinitionCandidate, DocumentVersion, EngineOptions, HoverEngine, HoverError, HoverFragment,
    HoverProvider, Position, SourceRange, SymbolTreeNode,
};

const SAMPLE: &str = "\
// The User type is documented below
/**
 * A user record. User appears here too.
 */
export interface User {
  id: string;
  name: string;
}

export function greet(user: User): string {
  return `hi ${user.name}`;
}
";

#[derive(Default)]
struct FakeState {
    texts: HashMap<PathBuf, String>,
    versions: HashMap<PathBuf, DocumentVersion>,
    hovers: HashMap<(PathBuf, Position), Vec<HoverFragment>>,
    symbols: HashMap<PathBuf, Vec<SymbolTreeNode>>,
    definitions: HashMap<(PathBuf, Position), Vec<DefinitionCandidate>>,
    hover_calls: Vec<(PathBuf, Position)>,
    fail_hover: bool,
    hover_delay: Option<Duration>,
}

#[derive(Default, Clone)]
struct FakeProvider {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProvider {
    fn with_file(path: &str, text: &str) -> Self {
        let provider = Self::default();
        {
            let mut state = provider.state.lock().unwrap();
            state.texts.insert(PathBuf::from(path), text.to_string());
            state.versions.insert(PathBuf::from(path), 1);
        }
        provider
    }

    fn add_file(&self, path: &str, text: &str) {
        let mut state = self.state.lock().unwrap();
        state.texts.insert(PathBuf::from(path), text.to_string());
        state.versions.insert(PathBuf::from(path), 1);
    }

    fn set_hover(&self, path: &str, line: u32, character: u32, fragments: Vec<HoverFragment>) {
        self.state
            .lock()
            .unwrap()
            .hovers
            .insert((PathBuf::from(path), Position::new(line, character)), fragments);
    }

    fn set_symbols(&self, path: &str, nodes: Vec<SymbolTreeNode>) {
        self.state
            .lock()
            .unwrap()
            .symbols
            .insert(PathBuf::from(path), nodes);
    }

    fn set_definition(&self, path: &str, at: Position, candidates: Vec<DefinitionCandidate>) {
        self.state
            .lock()
            .unwrap()
            .definitions
            .insert((PathBuf::from(path), at), candidates);
    }

    fn bump_version(&self, path: &str) {
        let mut state = self.state.lock().unwrap();
        *state.versions.entry(PathBuf::from(path)).or_insert(0) += 1;
    }

    fn hover_calls(&self) -> Vec<(PathBuf, Position)> {
        self.state.lock().unwrap().hover_calls.clone()
    }
}

#[async_trait]
impl HoverProvider for FakeProvider {
    async fn hover(&self, file: &Path, position: Position) -> Result<Vec<HoverFragment>> {
        let (delay, fail, fragments) = {
            let mut state = self.state.lock().unwrap();
            state.hover_calls.push((file.to_path_buf(), position));
            (
                state.hover_delay,
                state.fail_hover,
                state
                    .hovers
                    .get(&(file.to_path_buf(), position))
                    .cloned()
                    .unwrap_or_default(),
            )
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(anyhow!("LSP server exited"));
        }
        Ok(fragments)
    }

    async fn document_symbols(&self, file: &Path) -> Result<Option<Vec<SymbolTreeNode>>> {
        Ok(self.state.lock().unwrap().symbols.get(file).cloned())
    }

    async fn definition(&self, file: &Path, position: Position) -> Result<Vec<DefinitionCandidate>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .definitions
            .get(&(file.to_path_buf(), position))
            .cloned()
            .unwrap_or_default())
    }

    async fn document_version(&self, file: &Path) -> Result<DocumentVersion> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .versions
            .get(file)
            .copied()
            .unwrap_or(0))
    }

    async fn full_text(&self, file: &Path) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .texts
            .get(file)
            .cloned()
            .ok_or_else(|| anyhow!("file not found: {}", file.display()))
    }
}

fn engine(provider: &FakeProvider) -> HoverEngine {
    HoverEngine::new(Arc::new(provider.clone()), EngineOptions::default())
}

fn node(name: &str, line: u32, character: u32, children: Vec<SymbolTreeNode>) -> SymbolTreeNode {
    SymbolTreeNode {
        name: name.to_string(),
        selection_position: Position::new(line, character),
        declaration_span: SourceRange::new(Position::new(line, 0), Position::new(line + 3, 1)),
        children,
    }
}

fn user_interface_hover() -> Vec<HoverFragment> {
    vec![
        HoverFragment::Code {
            language: "typescript".to_string(),
            value: "interface User {\n  id: string;\n  name: string;\n}".to_string(),
        },
        HoverFragment::Markdown("A **user** record.".to_string()),
    ]
}

#[tokio::test]
async fn hover_at_position_normalizes_and_caches() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_hover(
        "/w/sample.ts",
        4,
        17,
        vec![
            HoverFragment::Markdown("```typescript\ninterface User\n```".to_string()),
            HoverFragment::PlainText("A user record.".to_string()),
        ],
    );
    let engine = engine(&provider);

    let first = engine
        .hover_at_position(Path::new("/w/sample.ts"), 4, 17)
        .await
        .unwrap();
    let second = engine
        .hover_at_position(Path::new("/w/sample.ts"), 4, 17)
        .await
        .unwrap();

    assert_eq!(first, "interface User\n\nA user record.");
    assert_eq!(first, second);
    assert_eq!(provider.hover_calls().len(), 1);
    let stats = engine.cache().stats().await;
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);
}

#[tokio::test]
async fn version_change_invalidates_cached_hover() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_hover(
        "/w/sample.ts",
        4,
        17,
        vec![HoverFragment::PlainText("interface User".to_string())],
    );
    let engine = engine(&provider);
    let file = Path::new("/w/sample.ts");

    engine.hover_at_position(file, 4, 17).await.unwrap();
    provider.set_hover(
        "/w/sample.ts",
        4,
        17,
        vec![HoverFragment::PlainText("interface Account".to_string())],
    );
    provider.bump_version("/w/sample.ts");
    let after_edit = engine.hover_at_position(file, 4, 17).await.unwrap();

    assert_eq!(after_edit, "interface Account");
    assert_eq!(provider.hover_calls().len(), 2);
}

#[tokio::test]
async fn empty_hover_is_empty_text_and_not_cached() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    let engine = engine(&provider);
    let file = Path::new("/w/sample.ts");

    assert_eq!(engine.hover_at_position(file, 0, 0).await.unwrap(), "");
    assert_eq!(engine.hover_at_position(file, 0, 0).await.unwrap(), "");
    assert_eq!(provider.hover_calls().len(), 2);
    assert!(engine.cache().is_empty().await);
}

#[tokio::test]
async fn clear_cache_forces_refetch() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_hover(
        "/w/sample.ts",
        1,
        1,
        vec![HoverFragment::PlainText("x".to_string())],
    );
    let engine = engine(&provider);
    let file = Path::new("/w/sample.ts");

    engine.hover_at_position(file, 1, 1).await.unwrap();
    assert_eq!(engine.clear_cache().await, 1);
    engine.hover_at_position(file, 1, 1).await.unwrap();
    assert_eq!(provider.hover_calls().len(), 2);
}

#[tokio::test]
async fn symbol_hover_follows_definition_selection_range() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.add_file("/w/types.ts", "export interface User {\n  id: string;\n}\n");
    provider.set_symbols("/w/sample.ts", vec![node("greet", 9, 16, vec![])]);
    // The outline lacks User, so it is found by scanning past the commented mentions.
    let user_in_text = Position::new(4, 17);
    provider.set_definition(
        "/w/sample.ts",
        user_in_text,
        vec![DefinitionCandidate::Link {
            file: PathBuf::from("/w/types.ts"),
            target_range: SourceRange::new(Position::new(0, 0), Position::new(2, 1)),
            target_selection_range: Some(SourceRange::new(
                Position::new(0, 17),
                Position::new(0, 21),
            )),
        }],
    );
    provider.set_hover("/w/types.ts", 0, 17, user_interface_hover());
    let engine = engine(&provider);

    let text = engine
        .hover_at_symbol(Path::new("/w/sample.ts"), "User")
        .await
        .unwrap();

    assert_eq!(
        text,
        "interface User {\n  id: string;\n  name: string;\n}\n\nA user record."
    );
    assert_eq!(
        provider.hover_calls(),
        vec![(PathBuf::from("/w/types.ts"), Position::new(0, 17))]
    );
}

#[tokio::test]
async fn symbol_hover_uses_occurrence_when_no_definition() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_symbols(
        "/w/sample.ts",
        vec![node("User", 4, 17, vec![]), node("greet", 9, 16, vec![])],
    );
    provider.set_hover(
        "/w/sample.ts",
        9,
        16,
        vec![HoverFragment::Code {
            language: "typescript".to_string(),
            value: "function greet(user: User): string".to_string(),
        }],
    );
    let engine = engine(&provider);

    let text = engine
        .hover_at_symbol(Path::new("/w/sample.ts"), "greet")
        .await
        .unwrap();

    assert_eq!(text, "function greet(user: User): string");
    assert_eq!(
        provider.hover_calls(),
        vec![(PathBuf::from("/w/sample.ts"), Position::new(9, 16))]
    );
}

#[tokio::test]
async fn first_pre_order_symbol_wins() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_symbols(
        "/w/sample.ts",
        vec![
            node("Outer", 0, 6, vec![node("value", 1, 2, vec![])]),
            node("value", 7, 6, vec![]),
        ],
    );
    let engine = engine(&provider);

    engine
        .hover_at_symbol(Path::new("/w/sample.ts"), "value")
        .await
        .unwrap();

    assert_eq!(
        provider.hover_calls(),
        vec![(PathBuf::from("/w/sample.ts"), Position::new(1, 2))]
    );
}

#[tokio::test]
async fn commented_only_symbol_is_not_found() {
    let text = "// Phantom lives only in comments\n/* Phantom */\nconst x = 1;\n";
    let provider = FakeProvider::with_file("/w/comments.ts", text);
    let engine = engine(&provider);

    let err = engine
        .hover_at_symbol(Path::new("/w/comments.ts"), "Phantom")
        .await
        .unwrap_err();

    assert!(matches!(err, HoverError::SymbolNotFound { .. }));
    assert_eq!(err.kind(), "symbol_not_found");
    assert!(provider.hover_calls().is_empty());
}

#[tokio::test]
async fn provider_failure_surfaces_as_lsp_error() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.state.lock().unwrap().fail_hover = true;
    let engine = engine(&provider);

    let err = engine
        .hover_at_position(Path::new("/w/sample.ts"), 4, 17)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "lsp_error");
    assert_eq!(err.to_string(), "LSP server exited");
}

#[tokio::test]
async fn slow_provider_times_out() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.state.lock().unwrap().hover_delay = Some(Duration::from_millis(500));
    let engine = HoverEngine::new(
        Arc::new(provider.clone()),
        EngineOptions {
            provider_timeout: Some(Duration::from_millis(20)),
            cache_max_entries: 0,
        },
    );

    let err = engine
        .hover_at_position(Path::new("/w/sample.ts"), 4, 17)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HoverError::ProviderTimeout {
            operation: "hover",
            ..
        }
    ));
    assert_eq!(err.kind(), "timeout");
}

#[tokio::test]
async fn public_type_shape_keeps_declaration_only() {
    let provider = FakeProvider::with_file("/w/sample.ts", SAMPLE);
    provider.set_symbols("/w/sample.ts", vec![node("User", 4, 17, vec![])]);
    provider.set_hover("/w/sample.ts", 4, 17, user_interface_hover());
    let engine = engine(&provider);

    let shape = engine
        .public_type_shape(Path::new("/w/sample.ts"), "User")
        .await
        .unwrap();

    assert_eq!(shape, "interface User {\n  id: string;\n  name: string;\n}");
}

#[tokio::test]
async fn public_type_shape_of_alias() {
    let text = "export type Id = string | number;\n";
    let provider = FakeProvider::with_file("/w/alias.ts", text);
    provider.set_hover(
        "/w/alias.ts",
        0,
        12,
        vec![
            HoverFragment::Code {
                language: "typescript".to_string(),
                value: "type Id = string | number".to_string(),
            },
            HoverFragment::Markdown("Identifier of a record.".to_string()),
        ],
    );
    let engine = engine(&provider);

    let shape = engine
        .public_type_shape(Path::new("/w/alias.ts"), "Id")
        .await
        .unwrap();

    assert_eq!(shape, "type Id = string | number");
}
