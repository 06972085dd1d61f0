//! Pairwise similarity over a corpus snapshot.

use ndarray::Array2;
use serde::Serialize;

use super::corpus::CorpusSnapshot;
use super::vectorizer::{similarity, Projected};

/// Symmetric `n x n` cosine similarities, indexed in snapshot order.
///
/// Only the upper triangle is computed; the lower one is mirrored from it so
/// `get(i, j) == get(j, i)` holds exactly. The diagonal is never exposed.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    ids: Vec<String>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    pub fn empty() -> Self {
        Self {
            ids: Vec::new(),
            values: Array2::zeros((0, 0)),
        }
    }

    pub fn build(snapshot: &CorpusSnapshot) -> Self {
        Self::from_projected(snapshot.ids(), &snapshot.project_all())
    }

    pub fn from_projected(ids: Vec<String>, projected: &[Projected]) -> Self {
        let n = ids.len();
        let mut values = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in (i + 1)..n {
                let s = similarity(&projected[i], &projected[j]);
                values[[i, j]] = s;
                values[[j, i]] = s;
            }
        }
        Self { ids, values }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|x| x == id)
    }

    /// Similarity of two distinct memories, `None` on the diagonal or out of range.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i == j || i >= self.len() || j >= self.len() {
            return None;
        }
        Some(self.values[[i, j]])
    }

    pub fn between(&self, a: &str, b: &str) -> Option<f64> {
        self.get(self.index_of(a)?, self.index_of(b)?)
    }

    /// Every unordered pair `(i, j, similarity)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        let n = self.len();
        (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| (i, j, self.values[[i, j]])))
    }
}

#[derive(Serialize)]
struct MatrixView<'a> {
    ids: &'a [String],
    values: Vec<Vec<f64>>,
}

impl Serialize for SimilarityMatrix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        MatrixView {
            ids: &self.ids,
            values: self.values.rows().into_iter().map(|r| r.to_vec()).collect(),
        }
        .serialize(serializer)
    }
}
