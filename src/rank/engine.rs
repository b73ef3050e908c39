//! Power-iteration PageRank over a [`Subgraph`].
//!
//! Each iteration pulls rank from the in-neighbours of every node. The pull for
//! one node only reads the previous iteration's scores and walks its sorted
//! in-neighbour list, so nodes can be updated in parallel while the summation
//! order for any single node stays fixed.

use super::{RankConfig, RankOutcome};
use crate::SymbolId;
use crate::error::RankError;
use crate::graph::Subgraph;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};

/// Below this many nodes the per-iteration work is not worth a rayon split.
const PARALLEL_THRESHOLD: usize = 2048;

/// Rank every node of `subgraph` with uniform teleportation.
pub fn rank(subgraph: &Subgraph, config: &RankConfig) -> Result<RankOutcome, RankError> {
    config.validate()?;
    let n = subgraph.len();
    if n == 0 {
        return Ok(RankOutcome::empty());
    }
    let teleport = vec![1.0 / n as f64; n];
    Ok(iterate(subgraph, config, &teleport))
}

/// Rank with teleportation and dangling mass biased towards `personalization`.
///
/// Weights are normalised to sum to one. Ids outside the subgraph and
/// non-positive or non-finite weights are ignored; when nothing usable remains
/// the result equals [`rank`].
pub fn rank_personalized(
    subgraph: &Subgraph,
    config: &RankConfig,
    personalization: &HashMap<SymbolId, f64>,
) -> Result<RankOutcome, RankError> {
    config.validate()?;
    let n = subgraph.len();
    if n == 0 {
        return Ok(RankOutcome::empty());
    }

    let mut teleport = vec![0.0; n];
    for (id, &weight) in personalization {
        if !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        if let Some(pos) = subgraph.position(id.as_str()) {
            teleport[pos] = weight;
        }
    }

    let total: f64 = teleport.iter().sum();
    if total > 0.0 {
        teleport.iter_mut().for_each(|w| *w /= total);
    } else {
        tracing::debug!("Personalization has no usable weight, falling back to uniform");
        teleport.fill(1.0 / n as f64);
    }

    Ok(iterate(subgraph, config, &teleport))
}

fn iterate(subgraph: &Subgraph, config: &RankConfig, teleport: &[f64]) -> RankOutcome {
    let n = subgraph.len();
    let damping = config.damping;
    let mut scores = vec![1.0 / n as f64; n];
    let mut shares = vec![0.0; n];
    let mut delta = f64::INFINITY;
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        iterations += 1;

        let mut dangling = 0.0;
        for (pos, share) in shares.iter_mut().enumerate() {
            let degree = subgraph.out_degree_at(pos);
            if degree == 0 {
                dangling += scores[pos];
                *share = 0.0;
            } else {
                *share = scores[pos] / degree as f64;
            }
        }

        let pull = |pos: usize| -> f64 {
            let inflow: f64 = subgraph
                .predecessors_at(pos)
                .iter()
                .map(|&source| shares[source])
                .sum();
            (1.0 - damping) * teleport[pos] + damping * (dangling * teleport[pos] + inflow)
        };

        let next: Vec<f64> = if n >= PARALLEL_THRESHOLD {
            (0..n).into_par_iter().map(pull).collect()
        } else {
            (0..n).map(pull).collect()
        };

        delta = next
            .iter()
            .zip(&scores)
            .map(|(new, old)| (new - old).abs())
            .sum();
        scores = next;

        tracing::debug!("Rank iteration {iterations}: delta {delta:.3e}");

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::info!("Rank converged after {iterations} iterations over {n} symbols");
    } else {
        tracing::warn!(
            "Rank did not converge within {} iterations (delta {:.3e}, tolerance {:.1e})",
            config.max_iterations,
            delta,
            config.tolerance
        );
    }

    let scores: BTreeMap<SymbolId, f64> = subgraph
        .node_ids()
        .iter()
        .cloned()
        .zip(scores)
        .collect();

    RankOutcome {
        scores,
        iterations,
        converged,
        delta,
    }
}
