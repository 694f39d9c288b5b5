//! Deterministic HNSW construction over pre-normalized rows.
//!
//! Similarity is the plain dot product. Node 0 is the fixed entry point on
//! every level; remaining nodes are inserted in ascending order. Neighbor
//! lists may grow past `M` while inserting and are cut back to `M` in one
//! pass at the end, so the final graph can hold one-directional edges.

use super::graph::LayeredGraph;
use super::visited::VisitedSet;
use crate::matrix::VectorMatrix;
use core_types::RowId;
use core_types::config::HnswConfig;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info};

/// Per-trial probability of promoting a node one level up.
const LEVEL_PROBABILITY: f64 = 1.0 / std::f64::consts::E;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HnswParams {
    pub m: usize,
    pub ef_construction: usize,
    pub seed: u64,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            seed: 0,
        }
    }
}

impl From<&HnswConfig> for HnswParams {
    fn from(cfg: &HnswConfig) -> Self {
        Self {
            m: cfg.m,
            ef_construction: cfg.ef_construction,
            seed: cfg.seed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HnswIndex {
    pub params: HnswParams,
    pub entry_point: RowId,
    pub max_level: usize,
    pub graph: LayeredGraph,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    sim: f32,
    node: RowId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Higher similarity first; on ties the lower node id wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.sim
            .total_cmp(&other.sim)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Geometric level: count Bernoulli(1/e) successes before the first failure.
fn draw_level(rng: &mut ChaCha8Rng) -> usize {
    let mut level = 0;
    while rng.random::<f64>() < LEVEL_PROBABILITY {
        level += 1;
    }
    level
}

/// Draw one level per node from a generator seeded with `seed`.
pub fn assign_levels(nodes: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..nodes).map(|_| draw_level(&mut rng)).collect()
}

struct Builder<'a> {
    vectors: &'a VectorMatrix,
    graph: LayeredGraph,
    visited: VisitedSet,
}

impl Builder<'_> {
    fn sim(&self, a: RowId, b: RowId) -> f32 {
        self.vectors.dot(a as usize, b as usize)
    }

    /// Best-first walk of one level from `entry`. Stops once `ef` results are
    /// held and the best remaining frontier entry is no better than the worst
    /// result. Results come back by similarity descending.
    fn search_level(&mut self, query: RowId, entry: RowId, ef: usize, level: usize) -> Vec<Candidate> {
        self.visited.clear();
        self.visited.insert(entry);
        let mut frontier = BinaryHeap::new();
        frontier.push(Candidate {
            sim: self.sim(query, entry),
            node: entry,
        });

        let mut accepted: Vec<Candidate> = Vec::new();
        let mut worst = f32::INFINITY;
        while let Some(candidate) = frontier.pop() {
            if accepted.len() >= ef && candidate.sim <= worst {
                break;
            }
            worst = worst.min(candidate.sim);
            accepted.push(candidate);
            for &next in self.graph.neighbors(level, candidate.node) {
                if self.visited.insert(next) {
                    frontier.push(Candidate {
                        sim: self.sim(query, next),
                        node: next,
                    });
                }
            }
        }

        accepted.sort_by(|a, b| b.cmp(a));
        accepted
    }

    fn insert(&mut self, node: RowId, node_level: usize, max_level: usize, params: HnswParams) {
        let mut entry: RowId = 0;
        for level in (node_level + 1..=max_level).rev() {
            if let Some(best) = self.search_level(node, entry, 1, level).first() {
                entry = best.node;
            }
        }

        for level in (0..=node_level.min(max_level)).rev() {
            let found = self.search_level(node, entry, params.ef_construction, level);
            let selected: Vec<RowId> = found
                .iter()
                .filter(|c| c.node != node)
                .take(params.m)
                .map(|c| c.node)
                .collect();
            for neighbor in selected {
                self.graph.add_edge(level, node, neighbor);
                self.graph.add_edge(level, neighbor, node);
            }
        }
    }

    fn trim(&mut self, m: usize) {
        let vectors = self.vectors;
        for level in 0..self.graph.num_levels() {
            for node in 0..self.graph.nodes() as RowId {
                self.graph
                    .trim_to(level, node, m, |other| vectors.dot(node as usize, other as usize));
            }
        }
    }
}

/// Build the graph over every row of `vectors`.
pub fn build(vectors: &VectorMatrix, params: HnswParams) -> HnswIndex {
    let nodes = vectors.rows();
    let levels = assign_levels(nodes, params.seed);
    let max_level = if nodes <= 1 {
        0
    } else {
        levels.iter().copied().max().unwrap_or(0)
    };

    let mut builder = Builder {
        vectors,
        graph: LayeredGraph::new(max_level + 1, nodes),
        visited: VisitedSet::new(nodes),
    };

    for node in 1..nodes {
        builder.insert(node as RowId, levels[node], max_level, params);
        if node % 10_000 == 0 {
            debug!(inserted = node, total = nodes, "hnsw insertion progress");
        }
    }
    builder.trim(params.m);

    let graph = builder.graph;
    info!(
        nodes,
        max_level,
        m = params.m,
        ef_construction = params.ef_construction,
        edges = (0..graph.num_levels()).map(|l| graph.edge_count(l)).sum::<usize>(),
        "built hnsw graph"
    );

    HnswIndex {
        params,
        entry_point: 0,
        max_level,
        graph,
    }
}
