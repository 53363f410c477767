//! Exact top-k retrieval by linear scan.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::num::NonZeroUsize;

use ordered_float::OrderedFloat;
use serde::Serialize;

use crate::corpus::{CorpusIndex, SharedCorpus};
use crate::error::{Result, VectorDbError};
use crate::vector::EmbeddingVector;

/// A ranked identifier with its raw dot-product score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedHit {
    pub identifier: String,
    pub score: f32,
}

/// Ranks a shared corpus against query vectors.
///
/// Each search works on one snapshot, so concurrent rebuilds never change the
/// records under a running scan.
#[derive(Debug, Clone, Default)]
pub struct RetrievalEngine {
    corpus: SharedCorpus,
}

impl RetrievalEngine {
    pub fn new(corpus: SharedCorpus) -> Self {
        Self { corpus }
    }

    pub fn corpus(&self) -> &SharedCorpus {
        &self.corpus
    }

    /// Top-`k` records by descending score. Equal scores keep corpus order.
    pub fn search(&self, query: &EmbeddingVector, k: NonZeroUsize) -> Result<Vec<RankedHit>> {
        let snapshot = self.corpus.snapshot();
        rank(&snapshot, query, k)
    }
}

/// Scan `corpus` and return its best `k` records for `query`.
///
/// The query is expected to be unit length already and is not renormalized.
/// An empty corpus yields an empty list; fewer than `k` records yields all of
/// them.
pub fn rank(corpus: &CorpusIndex, query: &EmbeddingVector, k: NonZeroUsize) -> Result<Vec<RankedHit>> {
    if let Some(expected) = corpus.dimension() {
        if query.dimension() != expected {
            return Err(VectorDbError::DimensionMismatch {
                expected,
                got: query.dimension(),
            });
        }
    }
    let records = corpus.all();
    let k = k.get().min(records.len());
    if k == 0 {
        return Ok(Vec::new());
    }

    // Min-heap of the best k so far. The key orders by score, then by earlier
    // position, so the heap top is always the entry to evict.
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, Reverse<usize>)>> = BinaryHeap::with_capacity(k + 1);
    for (pos, record) in records.iter().enumerate() {
        let key = (OrderedFloat(query.dot(&record.vector)), Reverse(pos));
        if heap.len() < k {
            heap.push(Reverse(key));
        } else if heap.peek().is_some_and(|Reverse(worst)| key > *worst) {
            heap.pop();
            heap.push(Reverse(key));
        }
    }

    Ok(heap
        .into_sorted_vec()
        .into_iter()
        .map(|Reverse((OrderedFloat(score), Reverse(pos)))| RankedHit {
            identifier: records[pos].identifier.clone(),
            score,
        })
        .collect())
}
