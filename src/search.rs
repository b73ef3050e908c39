//! Relevance search: semantic similarity combined with structural rank.

use crate::SymbolId;
use crate::error::SearchError;
use crate::rank::SymbolRank;
use crate::similarity::SymbolSimilarity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Merges a symbol's similarity to the query with its rank score.
pub trait ScoreCombiner: Send + Sync + std::fmt::Debug {
    fn combine(&self, similarity: f64, rank: f64) -> f64;
}

/// Built-in combination rules, selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CombinationStrategy {
    /// `similarity * rank`
    #[default]
    Multiplicative,
    /// `w * similarity + (1 - w) * rank` on the raw scores
    Weighted { similarity_weight: f64 },
}

impl ScoreCombiner for CombinationStrategy {
    fn combine(&self, similarity: f64, rank: f64) -> f64 {
        match *self {
            Self::Multiplicative => similarity * rank,
            Self::Weighted { similarity_weight } => {
                let w = similarity_weight.clamp(0.0, 1.0);
                w * similarity + (1.0 - w) * rank
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub symbol_id: SymbolId,
    pub score: f64,
}

#[derive(Debug)]
pub struct SymbolSearch {
    rank: Arc<SymbolRank>,
    similarity: Arc<SymbolSimilarity>,
    combiner: Arc<dyn ScoreCombiner>,
}

impl SymbolSearch {
    pub fn new(rank: Arc<SymbolRank>, similarity: Arc<SymbolSimilarity>) -> Self {
        Self {
            rank,
            similarity,
            combiner: Arc::new(CombinationStrategy::default()),
        }
    }

    #[must_use]
    pub fn with_combiner(mut self, combiner: Arc<dyn ScoreCombiner>) -> Self {
        self.combiner = combiner;
        self
    }

    pub fn rank(&self) -> &Arc<SymbolRank> {
        &self.rank
    }

    pub fn similarity(&self) -> &Arc<SymbolSimilarity> {
        &self.similarity
    }

    /// The `top_k` rankable symbols most relevant to `query`.
    ///
    /// Every subgraph symbol without a stored embedding is embedded first.
    /// Results are ordered by descending score, ties by ascending id.
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let similarities = self.query_similarities(query)?;
        let outcome = self.rank.outcome();

        let results = self
            .rank
            .subgraph()
            .node_ids()
            .iter()
            .map(|id| {
                let similarity = similarities.get(id).copied().unwrap_or(0.0) as f64;
                let rank = outcome.score(id.as_str()).unwrap_or(0.0);
                SearchResult {
                    symbol_id: id.clone(),
                    score: self.combiner.combine(similarity, rank),
                }
            })
            .collect();

        Ok(finish(results, top_k))
    }

    /// Rank biased towards the query: positive similarities become the
    /// teleport preference of a personalised ranking run.
    pub fn rank_search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>, SearchError> {
        let similarities = self.query_similarities(query)?;
        let preference: HashMap<SymbolId, f64> = similarities
            .into_iter()
            .filter(|(_, s)| *s > 0.0)
            .map(|(id, s)| (id, s as f64))
            .collect();

        let outcome = self.rank.personalized(&preference);
        let results = outcome
            .scores
            .into_iter()
            .map(|(symbol_id, score)| SearchResult { symbol_id, score })
            .collect();

        Ok(finish(results, top_k))
    }

    fn query_similarities(&self, query: &str) -> Result<HashMap<SymbolId, f32>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let embedding = self.similarity.embed_query(query)?;
        let ids = self.rank.subgraph().node_ids();
        self.similarity.ensure_embedded(ids)?;
        Ok(self.similarity.similarity(&embedding, ids)?)
    }
}

fn finish(mut results: Vec<SearchResult>, top_k: usize) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.symbol_id.cmp(&b.symbol_id))
    });
    results.truncate(top_k);
    results
}
