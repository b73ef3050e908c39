//! Embedding on demand, persistence across runs and provider failures

use crate::common::{CountingProvider, FailingProvider, sample_codebase};
use std::sync::Arc;
use symrank::{
    EmbeddingProvider, EmbeddingStore, ProviderError, RetryPolicy, RetryingProvider,
    SimilarityError, StoreError, SymbolGraph, SymbolId, SymbolSimilarity,
};
use tempfile::TempDir;

fn id(s: &str) -> SymbolId {
    SymbolId::new(s).unwrap()
}

fn sample_graph() -> Arc<SymbolGraph> {
    Arc::new(SymbolGraph::from_bytes(&sample_codebase().to_bytes()).unwrap())
}

#[test]
fn test_each_missing_symbol_embedded_once() {
    let provider = CountingProvider::new();
    let similarity = SymbolSimilarity::new(
        sample_graph(),
        provider.clone(),
        Arc::new(EmbeddingStore::in_memory()),
    );
    let ids = [id("app.config.parse_config"), id("app.view.render_page")];

    assert_eq!(similarity.ensure_embedded(&ids).unwrap(), 2);
    assert_eq!(provider.calls(), 2);

    assert_eq!(similarity.ensure_embedded(&ids).unwrap(), 0);
    assert_eq!(provider.calls(), 2);
    assert_eq!(similarity.store().len(), 2);
}

#[test]
fn test_embeddings_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("embeddings.json");
    let graph = sample_graph();
    let ids: Vec<SymbolId> = graph.symbols().map(|s| s.id.clone()).collect();

    let provider = CountingProvider::new();
    {
        let store = Arc::new(EmbeddingStore::open(&path).unwrap());
        let similarity = SymbolSimilarity::new(Arc::clone(&graph), provider.clone(), store);
        assert_eq!(similarity.ensure_embedded(&ids).unwrap(), ids.len());
    }
    assert!(path.exists());

    let reopened = Arc::new(EmbeddingStore::open(&path).unwrap());
    assert_eq!(reopened.len(), ids.len());
    assert_eq!(reopened.dimension(), Some(6));

    let fresh = CountingProvider::new();
    let similarity = SymbolSimilarity::new(graph, fresh.clone(), reopened);
    assert_eq!(similarity.ensure_embedded(&ids).unwrap(), 0);
    assert_eq!(fresh.calls(), 0);
}

#[test]
fn test_nearest_prefers_matching_symbol() {
    let graph = sample_graph();
    let ids: Vec<SymbolId> = graph.symbols().map(|s| s.id.clone()).collect();
    let similarity = SymbolSimilarity::new(
        graph,
        CountingProvider::new(),
        Arc::new(EmbeddingStore::in_memory()),
    );
    similarity.ensure_embedded(&ids).unwrap();

    let query = similarity.embed_query("parse the config").unwrap();
    let nearest = similarity.nearest(&query, 2).unwrap();
    assert_eq!(nearest.len(), 2);
    assert_eq!(nearest[0].0.as_str(), "app.config.parse_config");
    assert!((nearest[0].1 - 1.0).abs() < 1e-5);
    assert!(nearest[1].1 <= nearest[0].1);
}

#[test]
fn test_similarity_requires_stored_embedding() {
    let similarity = SymbolSimilarity::new(
        sample_graph(),
        CountingProvider::new(),
        Arc::new(EmbeddingStore::in_memory()),
    );
    let query = similarity.embed_query("cache").unwrap();

    match similarity.similarity(&query, &[id("app.cache.lookup")]) {
        Err(SimilarityError::MissingEmbedding { id }) => {
            assert_eq!(id.as_str(), "app.cache.lookup")
        }
        other => panic!("Expected MissingEmbedding, got {other:?}"),
    }
}

#[test]
fn test_query_dimension_must_match_store() {
    let similarity = SymbolSimilarity::new(
        sample_graph(),
        CountingProvider::new(),
        Arc::new(EmbeddingStore::in_memory()),
    );
    let ids = [id("app.cache.lookup")];
    similarity.ensure_embedded(&ids).unwrap();

    match similarity.similarity(&[1.0, 0.0], &ids) {
        Err(SimilarityError::DimensionMismatch { expected, actual }) => {
            assert_eq!(expected, 6);
            assert_eq!(actual, 2);
        }
        other => panic!("Expected DimensionMismatch, got {other:?}"),
    }
}

#[test]
fn test_unknown_symbol_cannot_be_embedded() {
    let similarity = SymbolSimilarity::new(
        sample_graph(),
        CountingProvider::new(),
        Arc::new(EmbeddingStore::in_memory()),
    );
    let result = similarity.ensure_embedded(&[id("requests.get")]);
    assert!(matches!(result, Err(SimilarityError::NotFound(_))));
}

#[test]
fn test_provider_failure_names_symbol() {
    let store = Arc::new(EmbeddingStore::in_memory());
    let similarity =
        SymbolSimilarity::new(sample_graph(), Arc::new(FailingProvider), Arc::clone(&store));

    let err = similarity
        .ensure_embedded(&[id("app.http.serve")])
        .unwrap_err();
    match &err {
        SimilarityError::Provider { context, source } => {
            assert!(context.contains("app.http.serve"));
            assert_eq!(
                *source,
                ProviderError::Request("service unavailable".to_string())
            );
        }
        other => panic!("Expected Provider error, got {other:?}"),
    }
    assert!(store.is_empty());
}

#[test]
fn test_retrying_provider_gives_up_with_last_error() {
    let policy = RetryPolicy {
        max_retries: 2,
        initial_delay: std::time::Duration::from_millis(1),
        max_delay: std::time::Duration::from_millis(2),
    };
    let provider = RetryingProvider::new(FailingProvider, policy);
    assert!(matches!(
        provider.embed("anything"),
        Err(ProviderError::Request(_))
    ));
}

#[test]
fn test_corrupted_store_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("embeddings.json");
    std::fs::write(&path, b"{ \"version\": 1, \"embeddings\": ").unwrap();

    assert!(matches!(
        EmbeddingStore::open(&path),
        Err(StoreError::Corrupted { .. })
    ));
}

#[test]
fn test_concurrent_embedding_writes_persist() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("embeddings.json");
    let store = Arc::new(EmbeddingStore::open(&path).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..10 {
                    let id = id(&format!("t{t}.s{i}"));
                    store.put(id, vec![t as f32, i as f32, 1.0]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let reopened = EmbeddingStore::open(&path).unwrap();
    assert_eq!(reopened.len(), 80);
    assert_eq!(reopened.get("t3.s7").unwrap().as_ref(), &[3.0, 7.0, 1.0]);
}
