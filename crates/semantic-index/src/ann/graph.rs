//! Per-level adjacency arena.
//!
//! Every level holds exactly one neighbor list per node, indexed by row id.
//! Lists only change through [`LayeredGraph::add_edge`] and
//! [`LayeredGraph::trim_to`].

use core_types::RowId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayeredGraph {
    nodes: usize,
    levels: Vec<Vec<Vec<RowId>>>,
}

impl LayeredGraph {
    pub fn new(num_levels: usize, nodes: usize) -> Self {
        Self {
            nodes,
            levels: (0..num_levels.max(1))
                .map(|_| vec![Vec::new(); nodes])
                .collect(),
        }
    }

    pub const fn nodes(&self) -> usize {
        self.nodes
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn neighbors(&self, level: usize, node: RowId) -> &[RowId] {
        &self.levels[level][node as usize]
    }

    /// All lists of one level, node-ascending.
    pub fn level(&self, level: usize) -> &[Vec<RowId>] {
        &self.levels[level]
    }

    /// Append `to` to `from`'s list unless already present.
    pub fn add_edge(&mut self, level: usize, from: RowId, to: RowId) {
        let list = &mut self.levels[level][from as usize];
        if !list.contains(&to) {
            list.push(to);
        }
    }

    /// Keep the `keep` highest-scoring neighbors of `node` (stable on ties).
    pub fn trim_to(&mut self, level: usize, node: RowId, keep: usize, score: impl Fn(RowId) -> f32) {
        let list = &mut self.levels[level][node as usize];
        if list.len() <= keep {
            return;
        }
        let mut scored: Vec<(f32, RowId)> = list.iter().map(|&n| (score(n), n)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(keep);
        *list = scored.into_iter().map(|(_, n)| n).collect();
    }

    pub fn edge_count(&self, level: usize) -> usize {
        self.levels[level].iter().map(Vec::len).sum()
    }

    pub fn max_degree(&self) -> usize {
        self.levels
            .iter()
            .flat_map(|level| level.iter().map(Vec::len))
            .max()
            .unwrap_or(0)
    }
}
