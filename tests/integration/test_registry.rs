//! Component wiring through the dependency registry

use crate::common::{CountingProvider, FailingProvider, sample_codebase, test_settings};
use std::sync::Arc;
use symrank::{
    Component, Dependency, DependencyRegistry, EmbeddingProvider, FlowPolicy, RegistryError,
    SearchError, Settings, SimilarityError,
};
use tempfile::TempDir;

fn registry_with(provider: Arc<dyn EmbeddingProvider>, dir: &TempDir) -> DependencyRegistry {
    DependencyRegistry::builder(test_settings(dir, &sample_codebase()))
        .with_override(Component::EmbeddingProvider(provider))
        .build()
}

#[test]
fn test_search_built_on_override_provider() {
    let dir = TempDir::new().unwrap();
    let provider = CountingProvider::new();
    let registry = registry_with(provider.clone(), &dir);

    let search = registry.symbol_search().unwrap();
    let results = search.search("render page", 2).unwrap();

    assert_eq!(results.len(), 2);
    assert!(provider.calls() > 0);
    // Embeddings were persisted to the configured store
    assert!(dir.path().join("embeddings.json").exists());
}

#[test]
fn test_components_are_shared() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(CountingProvider::new(), &dir);

    let search = registry.symbol_search().unwrap();
    let rank = registry.symbol_rank().unwrap();
    let similarity = registry.symbol_similarity().unwrap();
    let store = registry.embedding_store().unwrap();

    assert!(Arc::ptr_eq(search.rank(), &rank));
    assert!(Arc::ptr_eq(search.similarity(), &similarity));
    assert!(Arc::ptr_eq(similarity.store(), &store));
    assert!(Arc::ptr_eq(
        rank.subgraph(),
        &registry.subgraph().unwrap()
    ));

    for dependency in Dependency::ALL {
        assert!(registry.is_built(dependency), "{dependency} not built");
    }
}

#[test]
fn test_concurrent_first_requests_share_instance() {
    let dir = TempDir::new().unwrap();
    let registry = Arc::new(registry_with(CountingProvider::new(), &dir));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.get("symbol_search").unwrap())
        })
        .collect();
    let components: Vec<Component> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let first = &components[0];
    assert_eq!(first.dependency(), Dependency::SymbolSearch);
    assert!(components.iter().all(|c| c.ptr_eq(first)));
}

#[test]
fn test_unknown_dependency_name() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(CountingProvider::new(), &dir);

    let err = registry.get("symbol_magic").unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
    assert_eq!(err.status_code(), "NOT_FOUND");
}

#[test]
fn test_failing_provider_reaches_search_caller() {
    let dir = TempDir::new().unwrap();
    let registry = registry_with(Arc::new(FailingProvider), &dir);

    // Construction succeeds; the failure shows up on first use
    let search = registry.symbol_search().unwrap();
    assert!(matches!(
        search.search("cache", 3),
        Err(SearchError::Similarity(SimilarityError::Provider { .. }))
    ));
}

#[test]
fn test_settings_file_drives_components() {
    let dir = TempDir::new().unwrap();
    let artifact = sample_codebase().write(&dir);
    let config_path = dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[index]
artifact_path = "{}"

[subgraph]
flow_policy = "backward"
exclude_patterns = []

[rank]
damping = 0.5
"#,
            artifact.display()
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    assert_eq!(settings.rank.damping, 0.5);
    assert_eq!(settings.rank.max_iterations, 100);

    let registry = DependencyRegistry::new(settings);
    let subgraph = registry.subgraph().unwrap();
    assert_eq!(subgraph.policy(), FlowPolicy::Backward);
    // Without path patterns the test module is ranked too
    assert_eq!(subgraph.len(), 6);
    assert_eq!(registry.symbol_rank().unwrap().config().damping, 0.5);
}

#[test]
fn test_missing_artifact_fails_dependents() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(&dir, &sample_codebase());
    settings.index.artifact_path = dir.path().join("gone.json");
    let registry = DependencyRegistry::builder(settings)
        .with_override(Component::EmbeddingProvider(CountingProvider::new()))
        .build();

    let err = registry.symbol_search().unwrap_err();
    assert_eq!(err.status_code(), "FILE_READ_ERROR");
    assert!(!registry.is_built(Dependency::SymbolSearch));
    assert!(!registry.is_built(Dependency::SymbolGraph));

    // Nothing was cached, so a fixed artifact is picked up on retry
    std::fs::write(dir.path().join("gone.json"), sample_codebase().to_bytes()).unwrap();
    assert!(registry.symbol_search().is_ok());
}
