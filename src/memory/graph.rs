//! Thresholded connection graph over a similarity matrix.
//!
//! Two memories are connected when their similarity is at or above the threshold.
//! Building a graph is pure: it never touches scores.

use std::collections::BTreeMap;

use serde::Serialize;

use super::similarity::SimilarityMatrix;
use super::vectorizer::{similarity, Projected};
use crate::error::{EngineError, Result};

/// Connection threshold, validated to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&value) {
            return Err(EngineError::InvalidConfiguration(format!(
                "threshold must be within [0, 1], got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Inclusive: a pair exactly at the threshold is connected.
    pub fn admits(self, similarity: f64) -> bool {
        similarity >= self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub weight: f64,
}

/// One undirected edge, reported once with `source < target` in snapshot order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGraph {
    threshold: Threshold,
    ids: Vec<String>,
    /// Per node, neighbours in ascending index order.
    adjacency: Vec<Vec<Neighbor>>,
}

impl ConnectionGraph {
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn neighbors(&self, index: usize) -> &[Neighbor] {
        self.adjacency.get(index).map_or(&[], Vec::as_slice)
    }

    pub fn neighbors_of(&self, id: &str) -> Option<&[Neighbor]> {
        let index = self.ids.iter().position(|x| x == id)?;
        Some(self.neighbors(index))
    }

    pub fn degree(&self, index: usize) -> usize {
        self.neighbors(index).len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum::<usize>() / 2
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges = Vec::with_capacity(self.edge_count());
        for (i, row) in self.adjacency.iter().enumerate() {
            for n in row.iter().filter(|n| n.index > i) {
                edges.push(Edge {
                    source: self.ids[i].clone(),
                    target: self.ids[n.index].clone(),
                    weight: n.weight,
                });
            }
        }
        edges
    }
}

#[derive(Serialize)]
struct Link<'a> {
    id: &'a str,
    weight: f64,
}

#[derive(Serialize)]
struct GraphView<'a> {
    threshold: Threshold,
    adjacency: BTreeMap<&'a str, Vec<Link<'a>>>,
}

impl Serialize for ConnectionGraph {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let adjacency = self
            .ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let links = self
                    .neighbors(i)
                    .iter()
                    .map(|n| Link {
                        id: self.ids[n.index].as_str(),
                        weight: n.weight,
                    })
                    .collect();
                (id.as_str(), links)
            })
            .collect();
        GraphView {
            threshold: self.threshold,
            adjacency,
        }
        .serialize(serializer)
    }
}

/// Keep every pair whose similarity meets `threshold`. Each edge lands in both
/// endpoints' adjacency with the same weight.
pub fn build_graph(matrix: &SimilarityMatrix, threshold: Threshold) -> ConnectionGraph {
    let mut adjacency = vec![Vec::new(); matrix.len()];
    for (i, j, weight) in matrix.pairs() {
        if threshold.admits(weight) {
            adjacency[i].push(Neighbor { index: j, weight });
            adjacency[j].push(Neighbor { index: i, weight });
        }
    }
    for row in &mut adjacency {
        row.sort_by_key(|n| n.index);
    }
    ConnectionGraph {
        threshold,
        ids: matrix.ids().to_vec(),
        adjacency,
    }
}

/// Neighbours of a single node, without building the full matrix.
pub(crate) fn neighbor_row(projected: &[Projected], index: usize, threshold: Threshold) -> Vec<Neighbor> {
    let Some(own) = projected.get(index) else {
        return Vec::new();
    };
    projected
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != index)
        .filter_map(|(j, other)| {
            let weight = similarity(own, other);
            threshold.admits(weight).then_some(Neighbor { index: j, weight })
        })
        .collect()
}
