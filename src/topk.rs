use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::{RankError, Result};

/// A dataset item id paired with its distance from a query.
///
/// Ordered ascending by distance, ties broken ascending by id. The same
/// ordering defines "better" and the deterministic output order of [`TopK`].
#[derive(Debug, Clone, Copy)]
#[cfg_attr(
    feature = "persistence",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct DistancePair {
    pub id: usize,
    pub distance: f32,
}

impl DistancePair {
    pub fn new(id: usize, distance: f32) -> Self {
        Self { id, distance }
    }
}

impl PartialEq for DistancePair {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DistancePair {}

impl PartialOrd for DistancePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DistancePair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl From<(usize, f32)> for DistancePair {
    fn from((id, distance): (usize, f32)) -> Self {
        Self { id, distance }
    }
}

/// Bounded collector of the best `k` pairs seen so far.
///
/// Held pairs live in a max-heap, so the top is the worst resident: greatest
/// distance, ties toward the greater id. Once full, a newcomer replaces the
/// worst only when its distance is strictly smaller. A newcomer at exactly the
/// worst distance is rejected even if its id is smaller, so ties at the
/// capacity boundary resolve in insertion order.
#[derive(Debug, Clone)]
pub struct TopK {
    k: usize,
    heap: BinaryHeap<DistancePair>,
}

impl TopK {
    /// Create an empty collector with capacity `k`.
    pub fn new(k: usize) -> Result<Self> {
        if k == 0 {
            return Err(RankError::InvalidK);
        }
        Ok(Self {
            k,
            heap: BinaryHeap::with_capacity(k),
        })
    }

    pub fn insert(&mut self, pair: DistancePair) {
        if self.heap.len() < self.k {
            self.heap.push(pair);
            return;
        }
        if let Some(mut worst) = self.heap.peek_mut() {
            if pair.distance < worst.distance {
                *worst = pair;
            }
        }
    }

    /// Insert every pair from `pairs` in order.
    pub fn collect<I>(&mut self, pairs: I)
    where
        I: IntoIterator,
        I::Item: Into<DistancePair>,
    {
        for pair in pairs {
            self.insert(pair.into());
        }
    }

    /// Held pairs sorted ascending by (distance, id). Does not consume.
    pub fn top_k(&self) -> Vec<DistancePair> {
        self.heap.clone().into_sorted_vec()
    }

    /// Held ids in ascending (distance, id) order.
    pub fn ids(&self) -> Vec<usize> {
        self.top_k().into_iter().map(|p| p.id).collect()
    }

    /// The resident that the next strictly-closer insert would evict.
    pub fn worst(&self) -> Option<&DistancePair> {
        self.heap.peek()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() == self.k
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
