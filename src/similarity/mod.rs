//! Semantic similarity between a query and symbols.

mod store;

pub use store::EmbeddingStore;

use crate::SymbolId;
use crate::embedding::{EmbeddingProvider, create_symbol_text};
use crate::error::{ProviderError, SimilarityError, SimilarityResult};
use crate::graph::SymbolGraph;
use std::collections::HashMap;
use std::sync::Arc;

/// Embeds symbols on demand and scores them against query embeddings.
pub struct SymbolSimilarity {
    graph: Arc<SymbolGraph>,
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<EmbeddingStore>,
}

impl std::fmt::Debug for SymbolSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolSimilarity")
            .field("provider", &self.provider.name())
            .field("stored", &self.store.len())
            .finish()
    }
}

impl SymbolSimilarity {
    pub fn new(
        graph: Arc<SymbolGraph>,
        provider: Arc<dyn EmbeddingProvider>,
        store: Arc<EmbeddingStore>,
    ) -> Self {
        Self {
            graph,
            provider,
            store,
        }
    }

    pub fn store(&self) -> &Arc<EmbeddingStore> {
        &self.store
    }

    /// Embed every id in `ids` that has no stored vector yet, one provider
    /// call per missing id. Returns how many were embedded.
    ///
    /// The store is flushed once for the whole batch. Vectors embedded before
    /// a failure are flushed too and stay stored.
    pub fn ensure_embedded<'a, I>(&self, ids: I) -> SimilarityResult<usize>
    where
        I: IntoIterator<Item = &'a SymbolId>,
    {
        let mut embedded = 0;
        let result = self.embed_missing(ids, &mut embedded);
        if embedded == 0 {
            return result.map(|()| 0);
        }

        if let Err(e) = result {
            if let Err(flush_err) = self.store.flush() {
                tracing::warn!("Failed to persist {embedded} embeddings after error: {flush_err}");
            }
            return Err(e);
        }

        self.store.flush()?;
        tracing::info!(
            "Embedded {embedded} new symbols with {}",
            self.provider.name()
        );
        Ok(embedded)
    }

    fn embed_missing<'a, I>(&self, ids: I, embedded: &mut usize) -> SimilarityResult<()>
    where
        I: IntoIterator<Item = &'a SymbolId>,
    {
        for id in ids {
            if self.store.contains(id.as_str()) {
                continue;
            }
            let symbol = self.graph.get_symbol(id.as_str())?;
            let text = create_symbol_text(symbol);

            let embedding = self
                .provider
                .embed(&text)
                .and_then(validate_embedding)
                .map_err(|source| SimilarityError::Provider {
                    context: format!("Failed to embed symbol '{id}'"),
                    source,
                })?;

            self.store.insert(id.clone(), embedding)?;
            *embedded += 1;
        }
        Ok(())
    }

    pub fn embed_query(&self, text: &str) -> SimilarityResult<Vec<f32>> {
        self.provider
            .embed(text)
            .and_then(validate_embedding)
            .map_err(|source| SimilarityError::Provider {
                context: "Failed to embed query".to_string(),
                source,
            })
    }

    /// Cosine similarity of `query` against the stored vector of each id.
    pub fn similarity<'a, I>(&self, query: &[f32], ids: I) -> SimilarityResult<HashMap<SymbolId, f32>>
    where
        I: IntoIterator<Item = &'a SymbolId>,
    {
        let mut scores = HashMap::new();
        for id in ids {
            let stored = self
                .store
                .get(id.as_str())
                .ok_or_else(|| SimilarityError::MissingEmbedding { id: id.clone() })?;
            if stored.len() != query.len() {
                return Err(SimilarityError::DimensionMismatch {
                    expected: stored.len(),
                    actual: query.len(),
                });
            }
            scores.insert(id.clone(), cosine_similarity(query, &stored));
        }
        Ok(scores)
    }

    /// The `top_k` stored symbols closest to `query`, best first. Ties are
    /// broken by ascending id.
    pub fn nearest(&self, query: &[f32], top_k: usize) -> SimilarityResult<Vec<(SymbolId, f32)>> {
        let ids = self.store.ids();
        let mut scored: Vec<(SymbolId, f32)> = self.similarity(query, &ids)?.into_iter().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Rejects empty vectors and vectors with NaN or infinite components.
fn validate_embedding(embedding: Vec<f32>) -> Result<Vec<f32>, ProviderError> {
    if embedding.is_empty() {
        return Err(ProviderError::EmptyEmbedding);
    }
    match embedding.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(ProviderError::NonFiniteEmbedding { index }),
        None => Ok(embedding),
    }
}

/// Cosine similarity in `[-1, 1]`. A zero vector is similar to nothing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0)
}
