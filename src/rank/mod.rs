//! Structural importance of symbols.
//!
//! [`rank`] runs PageRank over a [`Subgraph`]. [`SymbolRank`] ties a subgraph to
//! a validated configuration and computes the ranking at most once.

mod engine;

pub use engine::{rank, rank_personalized};

use crate::SymbolId;
use crate::error::RankError;
use crate::graph::Subgraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankConfig {
    /// Probability of following an edge rather than teleporting
    pub damping: f64,
    /// L1 change between iterations below which the ranking has converged
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

impl RankConfig {
    pub fn validate(&self) -> Result<(), RankError> {
        if !(self.damping > 0.0 && self.damping < 1.0) {
            return Err(RankError::InvalidDamping(self.damping));
        }
        if self.tolerance.is_nan() || self.tolerance <= 0.0 || self.tolerance.is_infinite() {
            return Err(RankError::InvalidTolerance(self.tolerance));
        }
        if self.max_iterations == 0 {
            return Err(RankError::InvalidIterations);
        }
        Ok(())
    }
}

/// Result of one ranking run.
#[derive(Debug, Clone, PartialEq)]
pub struct RankOutcome {
    pub scores: BTreeMap<SymbolId, f64>,
    pub iterations: usize,
    /// False when the iteration cap was hit first; scores are still usable
    pub converged: bool,
    /// L1 change of the last iteration
    pub delta: f64,
}

impl RankOutcome {
    pub(crate) fn empty() -> Self {
        Self {
            scores: BTreeMap::new(),
            iterations: 0,
            converged: true,
            delta: 0.0,
        }
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    /// Descending score, ascending id on ties.
    pub fn ranked(&self) -> Vec<(&SymbolId, f64)> {
        let mut ranked: Vec<(&SymbolId, f64)> =
            self.scores.iter().map(|(id, &score)| (id, score)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked
    }

    pub fn top(&self, n: usize) -> Vec<(&SymbolId, f64)> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }
}

/// Memoised ranking of one subgraph.
#[derive(Debug)]
pub struct SymbolRank {
    subgraph: Arc<Subgraph>,
    config: RankConfig,
    outcome: OnceLock<RankOutcome>,
}

impl SymbolRank {
    pub fn new(subgraph: Arc<Subgraph>, config: RankConfig) -> Result<Self, RankError> {
        config.validate()?;
        Ok(Self {
            subgraph,
            config,
            outcome: OnceLock::new(),
        })
    }

    /// A separate instance over the same subgraph with its own cache.
    pub fn with_config(&self, config: RankConfig) -> Result<Self, RankError> {
        Self::new(Arc::clone(&self.subgraph), config)
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    pub fn subgraph(&self) -> &Arc<Subgraph> {
        &self.subgraph
    }

    /// Computed on first access, then cached for the life of this instance.
    pub fn outcome(&self) -> &RankOutcome {
        self.outcome.get_or_init(|| {
            // validated in `new`
            engine::rank(&self.subgraph, &self.config).unwrap_or_else(|_| RankOutcome::empty())
        })
    }

    pub fn is_computed(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub fn score(&self, id: &str) -> Option<f64> {
        self.outcome().score(id)
    }

    pub fn scores(&self) -> &BTreeMap<SymbolId, f64> {
        &self.outcome().scores
    }

    pub fn top(&self, n: usize) -> Vec<(&SymbolId, f64)> {
        self.outcome().top(n)
    }

    /// Query-biased ranking. Not cached.
    pub fn personalized(&self, personalization: &HashMap<SymbolId, f64>) -> RankOutcome {
        engine::rank_personalized(&self.subgraph, &self.config, personalization)
            .unwrap_or_else(|_| RankOutcome::empty())
    }
}
