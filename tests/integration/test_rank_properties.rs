//! Ranking behaviour observed through the public API

use crate::common::{ArtifactBuilder, sample_codebase};
use std::sync::Arc;
use symrank::{
    ExclusionRules, FlowPolicy, RankConfig, Subgraph, SymbolGraph, SymbolId, SymbolRank,
};

fn id(s: &str) -> SymbolId {
    SymbolId::new(s).unwrap()
}

fn rank_of(builder: &ArtifactBuilder, policy: FlowPolicy) -> SymbolRank {
    rank_with_rules(builder, policy, &ExclusionRules::none())
}

fn rank_with_rules(
    builder: &ArtifactBuilder,
    policy: FlowPolicy,
    rules: &ExclusionRules,
) -> SymbolRank {
    let graph = SymbolGraph::from_bytes(&builder.to_bytes()).unwrap();
    let subgraph = Subgraph::extract(&graph, policy, rules);
    SymbolRank::new(Arc::new(subgraph), RankConfig::default()).unwrap()
}

#[test]
fn test_cycle_outranks_isolated_symbol() {
    let builder = ArtifactBuilder::new()
        .function("A")
        .function("B")
        .function("C")
        .function("D")
        .calls("A", "B")
        .calls("B", "C")
        .calls("C", "A");
    let rank = rank_of(&builder, FlowPolicy::Forward);
    let outcome = rank.outcome();

    assert!(outcome.converged);
    assert!(outcome.iterations < 100);
    assert!((outcome.total() - 1.0).abs() < 1e-6);

    let a = rank.score("A").unwrap();
    let b = rank.score("B").unwrap();
    let c = rank.score("C").unwrap();
    let d = rank.score("D").unwrap();
    assert!((a - b).abs() < 1e-6);
    assert!((b - c).abs() < 1e-6);
    assert!(d < a);

    let top: Vec<&str> = rank.top(4).iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(top.last(), Some(&"D"));
}

#[test]
fn test_dangling_sink_keeps_total_mass() {
    let builder = ArtifactBuilder::new()
        .function("pkg.a")
        .function("pkg.b")
        .function("pkg.c")
        .function("pkg.sink")
        .calls("pkg.a", "pkg.sink")
        .calls("pkg.b", "pkg.sink")
        .calls("pkg.c", "pkg.sink");
    let rank = rank_of(&builder, FlowPolicy::Forward);

    assert!((rank.outcome().total() - 1.0).abs() < 1e-6);
    assert_eq!(rank.top(1)[0].0.as_str(), "pkg.sink");

    // Sources are symmetric, so they tie and fall back to id order
    let rest: Vec<&str> = rank.top(4)[1..].iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(rest, vec!["pkg.a", "pkg.b", "pkg.c"]);
}

#[test]
fn test_flow_policy_changes_what_matters() {
    let rules = ExclusionRules::default();
    let forward = rank_with_rules(&sample_codebase(), FlowPolicy::Forward, &rules);
    let backward = rank_with_rules(&sample_codebase(), FlowPolicy::Backward, &rules);

    // Called from two places
    assert_eq!(forward.top(1)[0].0.as_str(), "app.cache.lookup");
    // Calls everything else
    assert_eq!(backward.top(1)[0].0.as_str(), "app.http.serve");
}

#[test]
fn test_test_callers_feed_their_callees() {
    // With test code ranked, test_parse -> parse_config -> Config lifts Config
    let forward = rank_of(&sample_codebase(), FlowPolicy::Forward);
    assert_eq!(forward.top(1)[0].0.as_str(), "app.config.Config");
}

#[test]
fn test_outcome_is_computed_once() {
    let rank = rank_of(&sample_codebase(), FlowPolicy::Forward);
    assert!(!rank.is_computed());

    let first = rank.outcome() as *const _;
    assert!(rank.is_computed());
    let second = rank.outcome() as *const _;
    assert_eq!(first, second);
}

#[test]
fn test_repeated_rankings_agree() {
    let first = rank_of(&sample_codebase(), FlowPolicy::Bidirectional);
    let second = rank_of(&sample_codebase(), FlowPolicy::Bidirectional);
    assert_eq!(first.outcome(), second.outcome());
}

#[test]
fn test_large_graph_ranks_consistently() {
    let n = 3000;
    let nodes: Vec<SymbolId> = (0..n).map(|i| id(&format!("n{i:05}"))).collect();
    let mut edges = Vec::new();
    for i in 0..n {
        edges.push((nodes[i].clone(), nodes[(i * 7 + 3) % n].clone()));
        if i % 5 != 0 {
            edges.push((nodes[i].clone(), nodes[(i + 1) % n].clone()));
        }
    }
    let subgraph = Arc::new(Subgraph::from_edges(
        nodes.clone(),
        edges,
        FlowPolicy::Forward,
    ));

    let first = SymbolRank::new(Arc::clone(&subgraph), RankConfig::default()).unwrap();
    let second = SymbolRank::new(subgraph, RankConfig::default()).unwrap();

    assert_eq!(first.scores().len(), n);
    assert!((first.outcome().total() - 1.0).abs() < 1e-6);
    // Parallel iteration must not change a single bit
    assert_eq!(first.outcome(), second.outcome());
}

#[test]
fn test_with_config_keeps_subgraph() {
    let rank = rank_of(&sample_codebase(), FlowPolicy::Forward);
    let gentle = rank
        .with_config(RankConfig {
            damping: 0.5,
            ..RankConfig::default()
        })
        .unwrap();

    assert!(Arc::ptr_eq(rank.subgraph(), gentle.subgraph()));
    assert!(!gentle.is_computed());
    assert_ne!(rank.outcome().scores, gentle.outcome().scores);

    let invalid = rank.with_config(RankConfig {
        max_iterations: 0,
        ..RankConfig::default()
    });
    assert!(invalid.is_err());
}
