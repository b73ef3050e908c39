//! Symbol graph: every symbol of one indexed snapshot and the reference edges
//! between them.
//!
//! The graph is built once and never mutated afterwards, so it can be shared
//! across threads behind an `Arc` without further locking.

mod subgraph;

pub use subgraph::{DEFAULT_EXCLUDE_PATTERNS, ExclusionRules, Subgraph};

use crate::error::{IndexError, IndexResult, NotFoundError};
use crate::index::{self, RawIndex};
use crate::types::{Direction, ReferenceEdge, Symbol, SymbolId};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug)]
pub struct SymbolGraph {
    /// Symbols sorted by id; a symbol's position is its node index
    symbols: Vec<Symbol>,
    positions: HashMap<SymbolId, usize>,
    /// Resolved edges in artifact order, duplicates included
    edges: Vec<ReferenceEdge>,
    /// Neighbour position -> number of parallel edges
    outgoing: Vec<BTreeMap<usize, u32>>,
    incoming: Vec<BTreeMap<usize, u32>>,
    dropped_references: usize,
}

impl SymbolGraph {
    /// Load an artifact from disk and build the graph from it.
    pub fn from_artifact(path: &Path) -> IndexResult<Self> {
        Self::build(index::load(path)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> IndexResult<Self> {
        Self::build(index::parse(bytes)?)
    }

    /// Build the graph from loader output.
    ///
    /// All symbols are registered before any reference is resolved. References
    /// with an endpoint outside the index are dropped.
    pub fn build(raw: RawIndex) -> IndexResult<Self> {
        let mut symbols = raw.symbols;
        symbols.sort_by(|a, b| a.id.cmp(&b.id));

        let mut positions = HashMap::with_capacity(symbols.len());
        for (pos, symbol) in symbols.iter().enumerate() {
            if positions.insert(symbol.id.clone(), pos).is_some() {
                return Err(IndexError::Corrupted {
                    reason: format!("duplicate symbol id '{}'", symbol.id),
                });
            }
        }

        let mut outgoing = vec![BTreeMap::new(); symbols.len()];
        let mut incoming = vec![BTreeMap::new(); symbols.len()];
        let mut edges = Vec::with_capacity(raw.references.len());
        let mut dropped_references = 0;

        for reference in raw.references {
            let (Some(&source), Some(&target)) = (
                positions.get(reference.source.as_str()),
                positions.get(reference.target.as_str()),
            ) else {
                tracing::debug!(
                    "Dropping unresolved reference {} -> {}",
                    reference.source,
                    reference.target
                );
                dropped_references += 1;
                continue;
            };

            *outgoing[source].entry(target).or_insert(0) += 1;
            *incoming[target].entry(source).or_insert(0) += 1;
            edges.push(ReferenceEdge {
                source: symbols[source].id.clone(),
                target: symbols[target].id.clone(),
                kind: reference.kind,
            });
        }

        tracing::info!(
            "Built symbol graph: {} symbols, {} references ({} unresolved dropped)",
            symbols.len(),
            edges.len(),
            dropped_references
        );

        Ok(Self {
            symbols,
            positions,
            edges,
            outgoing,
            incoming,
            dropped_references,
        })
    }

    pub fn get_symbol(&self, id: &str) -> Result<&Symbol, NotFoundError> {
        self.position(id)
            .map(|pos| &self.symbols[pos])
            .ok_or_else(|| not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Neighbours of `id` in the given direction, deduplicated and sorted by id.
    pub fn references(&self, id: &str, direction: Direction) -> Result<Vec<&Symbol>, NotFoundError> {
        let pos = self.position(id).ok_or_else(|| not_found(id))?;

        let neighbours: Vec<usize> = match direction {
            Direction::Outgoing => self.outgoing[pos].keys().copied().collect(),
            Direction::Incoming => self.incoming[pos].keys().copied().collect(),
            Direction::Both => {
                let mut merged: Vec<usize> = self.outgoing[pos]
                    .keys()
                    .chain(self.incoming[pos].keys())
                    .copied()
                    .collect();
                merged.sort_unstable();
                merged.dedup();
                merged
            }
        };

        Ok(neighbours.into_iter().map(|n| &self.symbols[n]).collect())
    }

    /// Number of parallel `source -> target` edges. Zero when either endpoint
    /// is unknown.
    pub fn edge_multiplicity(&self, source: &str, target: &str) -> usize {
        match (self.position(source), self.position(target)) {
            (Some(s), Some(t)) => self.outgoing[s].get(&t).copied().unwrap_or(0) as usize,
            _ => 0,
        }
    }

    /// Symbols in ascending id order.
    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    pub fn edges(&self) -> &[ReferenceEdge] {
        &self.edges
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Resolved edges, parallel edges counted individually
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Distinct `(source, target)` pairs
    pub fn adjacency_count(&self) -> usize {
        self.outgoing.iter().map(BTreeMap::len).sum()
    }

    pub fn dropped_references(&self) -> usize {
        self.dropped_references
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub(crate) fn symbol_at(&self, pos: usize) -> &Symbol {
        &self.symbols[pos]
    }

    pub(crate) fn successors_at(&self, pos: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing[pos].keys().copied()
    }
}

fn not_found(id: &str) -> NotFoundError {
    NotFoundError::Symbol { id: id.to_string() }
}
