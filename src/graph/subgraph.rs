//! Rankable subgraph extraction.
//!
//! A subgraph keeps the symbols that survive the exclusion rules and the edges
//! between them, oriented by a [`FlowPolicy`]. Self loops never reach the
//! subgraph. Nodes are held in ascending id order and adjacency lists are sorted
//! and deduplicated, which is what makes ranking reproducible.

use super::SymbolGraph;
use crate::types::{FlowPolicy, Symbol, SymbolId, SymbolKind};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Path patterns use gitignore syntax and are matched against the symbol's
/// definition path and each of its parent directories.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "tests/",
    "test/",
    "test_*",
    "*_test.*",
    "conftest.py",
    "*.generated.*",
];

/// Which symbols are not rankable.
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    path_patterns: Vec<String>,
    matcher: Gitignore,
    kinds: HashSet<SymbolKind>,
    namespaces: Vec<String>,
}

impl ExclusionRules {
    /// Rules that exclude nothing.
    pub fn none() -> Self {
        Self::from_parts(&[], &[], &[])
    }

    /// Invalid patterns are skipped with a warning.
    pub fn from_parts(
        path_patterns: &[String],
        kinds: &[SymbolKind],
        namespaces: &[String],
    ) -> Self {
        let mut builder = GitignoreBuilder::new("");
        let mut accepted = Vec::with_capacity(path_patterns.len());
        for pattern in path_patterns {
            match builder.add_line(None, pattern) {
                Ok(_) => accepted.push(pattern.clone()),
                Err(e) => tracing::warn!("Ignoring invalid exclusion pattern '{pattern}': {e}"),
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::warn!("Failed to build exclusion matcher, path patterns disabled: {e}");
            accepted.clear();
            Gitignore::empty()
        });

        Self {
            path_patterns: accepted,
            matcher,
            kinds: kinds.iter().copied().collect(),
            namespaces: namespaces
                .iter()
                .filter(|ns| !ns.is_empty())
                .cloned()
                .collect(),
        }
    }

    pub fn path_patterns(&self) -> &[String] {
        &self.path_patterns
    }

    pub fn excludes(&self, symbol: &Symbol) -> bool {
        self.kinds.contains(&symbol.kind)
            || self
                .namespaces
                .iter()
                .any(|ns| symbol.id.as_str().starts_with(ns.as_str()))
            || self.excludes_path(&symbol.location.path)
    }

    fn excludes_path(&self, path: &str) -> bool {
        if self.path_patterns.is_empty() || path.is_empty() {
            return false;
        }

        let path = Path::new(path);
        path.ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.matcher.matched(p, p != path).is_ignore())
    }
}

impl Default for ExclusionRules {
    fn default() -> Self {
        let patterns: Vec<String> = DEFAULT_EXCLUDE_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect();
        Self::from_parts(&patterns, &[SymbolKind::Parameter], &[])
    }
}

#[derive(Debug, Clone)]
pub struct Subgraph {
    policy: FlowPolicy,
    nodes: Vec<SymbolId>,
    positions: HashMap<SymbolId, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
}

impl Subgraph {
    /// Filter `graph` down to its rankable part under `policy`.
    pub fn extract(graph: &SymbolGraph, policy: FlowPolicy, rules: &ExclusionRules) -> Self {
        let kept: Vec<usize> = (0..graph.symbol_count())
            .filter(|&pos| !rules.excludes(graph.symbol_at(pos)))
            .collect();

        let local: HashMap<usize, usize> = kept
            .iter()
            .enumerate()
            .map(|(local, &global)| (global, local))
            .collect();

        let mut edges = Vec::new();
        for (source, &global) in kept.iter().enumerate() {
            for target in graph.successors_at(global) {
                if let Some(&target) = local.get(&target) {
                    edges.push((source, target));
                }
            }
        }

        let nodes = kept
            .iter()
            .map(|&pos| graph.symbol_at(pos).id.clone())
            .collect();
        let subgraph = Self::assemble(nodes, edges, policy);

        tracing::info!(
            "Extracted {:?} subgraph: {} of {} symbols, {} edges",
            policy,
            subgraph.len(),
            graph.symbol_count(),
            subgraph.edge_count()
        );
        subgraph
    }

    /// Build a subgraph directly from ids and directed edges. Edges naming an
    /// id outside `nodes` are ignored.
    pub fn from_edges<I, E>(nodes: I, edges: E, policy: FlowPolicy) -> Self
    where
        I: IntoIterator<Item = SymbolId>,
        E: IntoIterator<Item = (SymbolId, SymbolId)>,
    {
        let mut nodes: Vec<SymbolId> = nodes.into_iter().collect();
        nodes.sort();
        nodes.dedup();

        let positions: HashMap<&SymbolId, usize> =
            nodes.iter().enumerate().map(|(i, id)| (id, i)).collect();
        let edges: Vec<(usize, usize)> = edges
            .into_iter()
            .filter_map(|(s, t)| Some((*positions.get(&s)?, *positions.get(&t)?)))
            .collect();

        Self::assemble(nodes, edges, policy)
    }

    fn assemble(nodes: Vec<SymbolId>, edges: Vec<(usize, usize)>, policy: FlowPolicy) -> Self {
        let n = nodes.len();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (source, target) in edges {
            if source == target {
                continue;
            }
            match policy {
                FlowPolicy::Forward => successors[source].push(target),
                FlowPolicy::Backward => successors[target].push(source),
                FlowPolicy::Bidirectional => {
                    successors[source].push(target);
                    successors[target].push(source);
                }
            }
        }

        for list in &mut successors {
            list.sort_unstable();
            list.dedup();
        }

        let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (source, targets) in successors.iter().enumerate() {
            for &target in targets {
                predecessors[target].push(source);
            }
        }

        let positions = nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), i))
            .collect();

        Self {
            policy,
            nodes,
            positions,
            successors,
            predecessors,
        }
    }

    pub fn policy(&self) -> FlowPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Node ids in ascending order.
    pub fn node_ids(&self) -> &[SymbolId] {
        &self.nodes
    }

    pub fn successors(&self, id: &str) -> Option<Vec<&SymbolId>> {
        let pos = *self.positions.get(id)?;
        Some(self.successors[pos].iter().map(|&t| &self.nodes[t]).collect())
    }

    pub fn out_degree(&self, id: &str) -> Option<usize> {
        self.positions.get(id).map(|&pos| self.successors[pos].len())
    }

    /// Directed adjacency entries after policy orientation.
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    pub(crate) fn position(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub(crate) fn predecessors_at(&self, pos: usize) -> &[usize] {
        &self.predecessors[pos]
    }

    pub(crate) fn out_degree_at(&self, pos: usize) -> usize {
        self.successors[pos].len()
    }
}
