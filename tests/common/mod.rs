#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use symrank::index::{IndexArtifact, ReferenceRecord, SymbolRecord};
use symrank::{EmbeddingProvider, ProviderError, RelationKind, Settings, SymbolKind};
use tempfile::TempDir;

/// Keywords that each get their own embedding dimension.
const KEYWORDS: &[&str] = &["parse", "render", "config", "http", "cache"];

/// Deterministic provider that counts its calls.
///
/// Each keyword found in the text switches on one dimension; a small constant
/// last component keeps every vector non-zero.
#[derive(Debug, Default)]
pub struct CountingProvider {
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for CountingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = text.to_lowercase();
        let mut embedding: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect();
        embedding.push(0.05);
        Ok(embedding)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Provider that always fails.
#[derive(Debug, Default)]
pub struct FailingProvider;

impl EmbeddingProvider for FailingProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::Request("service unavailable".to_string()))
    }
}

/// Builds index artifacts for tests.
#[derive(Default)]
pub struct ArtifactBuilder {
    symbols: Vec<SymbolRecord>,
    references: Vec<ReferenceRecord>,
}

impl ArtifactBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(self, id: &str, kind: SymbolKind, path: &str) -> Self {
        self.symbol_with_signature(id, kind, path, None)
    }

    pub fn function(self, id: &str) -> Self {
        self.symbol(id, SymbolKind::Function, "pkg/mod.py")
    }

    pub fn symbol_with_signature(
        mut self,
        id: &str,
        kind: SymbolKind,
        path: &str,
        signature: Option<&str>,
    ) -> Self {
        self.symbols.push(SymbolRecord {
            id: id.to_string(),
            name: id.rsplit('.').next().unwrap_or(id).to_string(),
            kind,
            path: path.to_string(),
            range: None,
            signature: signature.map(str::to_string),
        });
        self
    }

    pub fn calls(mut self, source: &str, target: &str) -> Self {
        self.references.push(ReferenceRecord {
            source: source.to_string(),
            target: target.to_string(),
            kind: RelationKind::Calls,
        });
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        IndexArtifact::new(self.symbols.clone(), self.references.clone())
            .to_bytes()
            .expect("Failed to serialize artifact")
    }

    pub fn write(&self, dir: &TempDir) -> PathBuf {
        let path = dir.path().join("index.json");
        std::fs::write(&path, self.to_bytes()).expect("Failed to write artifact");
        path
    }
}

/// Settings pointing at files inside `dir`.
pub fn test_settings(dir: &TempDir, artifact: &ArtifactBuilder) -> Settings {
    let mut settings = Settings::default();
    settings.index.artifact_path = artifact.write(dir);
    settings.embedding.store_path = dir.path().join("embeddings.json");
    settings
}

/// A small codebase: a config parser used by an HTTP layer and a renderer.
pub fn sample_codebase() -> ArtifactBuilder {
    ArtifactBuilder::new()
        .symbol_with_signature(
            "app.config.parse_config",
            SymbolKind::Function,
            "app/config.py",
            Some("def parse_config(text: str) -> Config"),
        )
        .symbol("app.config.Config", SymbolKind::Class, "app/config.py")
        .symbol_with_signature(
            "app.http.serve",
            SymbolKind::Function,
            "app/http.py",
            Some("def serve(config: Config) -> None"),
        )
        .symbol_with_signature(
            "app.view.render_page",
            SymbolKind::Function,
            "app/view.py",
            Some("def render_page(page: Page) -> str"),
        )
        .symbol("app.cache.lookup", SymbolKind::Function, "app/cache.py")
        .symbol(
            "tests.test_config.test_parse",
            SymbolKind::Function,
            "tests/test_config.py",
        )
        .calls("app.http.serve", "app.config.parse_config")
        .calls("app.config.parse_config", "app.config.Config")
        .calls("app.http.serve", "app.view.render_page")
        .calls("app.view.render_page", "app.cache.lookup")
        .calls("app.http.serve", "app.cache.lookup")
        .calls("tests.test_config.test_parse", "app.config.parse_config")
        .calls("app.http.serve", "requests.get")
}
