//! Multi-probe bucket ranking.
//!
//! [`TableRanking`] orders one table's populated buckets by the weighted
//! Hamming distance between their code and the query's code. [`LossRanking`]
//! merges L such rankings with a min-heap, yielding `(table, bucket)` probes in
//! globally non-decreasing score order without sorting the union.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ndarray::ArrayView1;

use crate::error::{RankError, Result};
use crate::hash::{Buckets, HashModel};

/// One bucket to inspect next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probe {
    pub table: usize,
    pub bucket: u64,
    /// Estimated distance used to order this probe.
    pub score: f32,
}

/// Anything that produces candidate buckets one at a time, best first.
pub trait BucketProber {
    /// Next bucket to inspect, or `None` once every bucket has been produced.
    fn next_bucket(&mut self) -> Option<Probe>;

    /// Buckets produced so far.
    fn probed(&self) -> usize;

    fn is_exhausted(&self) -> bool;
}

/// Sum of `weights[i]` over every bit `i` set in `xor`.
pub fn flip_cost(xor: u64, weights: &[f32]) -> f32 {
    weights
        .iter()
        .enumerate()
        .filter(|(i, _)| (xor >> i) & 1 == 1)
        .map(|(_, w)| w)
        .sum()
}

// ---------------------------------------------------------------------------
// TableRanking
// ---------------------------------------------------------------------------

/// Populated buckets of one table for one query, sorted by ascending score,
/// with a forward cursor.
///
/// Scores and codes are copied at construction, so later changes to the
/// model's tables do not affect a built ranking. Equal scores have no defined
/// relative order.
#[derive(Debug, Clone)]
pub struct TableRanking {
    entries: Vec<(f32, u64)>,
    cursor: usize,
}

impl TableRanking {
    /// Rank every bucket of `table` against `hash_code`. `weights[i]` is the
    /// cost of flipping bit `i`.
    pub fn new(hash_code: u64, weights: &[f32], table: &Buckets) -> Result<Self> {
        if weights.len() > 64 {
            return Err(RankError::InvalidConfig(format!(
                "at most 64 bit weights are supported, got {}",
                weights.len()
            )));
        }
        let mut entries: Vec<(f32, u64)> = table
            .keys()
            .map(|&bucket| (flip_cost(hash_code ^ bucket, weights), bucket))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { entries, cursor: 0 })
    }

    /// Score of the bucket under the cursor, `None` once exhausted.
    pub fn current_score(&self) -> Option<f32> {
        self.entries.get(self.cursor).map(|e| e.0)
    }

    /// Code of the bucket under the cursor, `None` once exhausted.
    pub fn current_bucket(&self) -> Option<u64> {
        self.entries.get(self.cursor).map(|e| e.1)
    }

    /// Advance the cursor. Returns whether an entry remains under it.
    pub fn move_forward(&mut self) -> bool {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.cursor < self.entries.len()
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Number of populated buckets ranked.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All `(score, bucket)` entries in ranked order.
    pub fn entries(&self) -> &[(f32, u64)] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// LossRanking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    score: f32,
    table: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.table.cmp(&other.table))
    }
}

/// K-way merge of per-table rankings.
///
/// The heap holds one `(front score, table)` entry for every table that still
/// has buckets, so successive probes are non-decreasing in score and the first
/// `P` probes are the `P` cheapest buckets across all tables. Equal scores
/// come out in table order.
#[derive(Debug, Clone)]
pub struct LossRanking {
    tables: Vec<TableRanking>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    probed: usize,
}

impl LossRanking {
    /// Rank every table of `model` for `query`. Flip costs are the absolute
    /// values of the model's per-bit weights.
    pub fn new<M: HashModel + ?Sized>(model: &M, query: &ArrayView1<f32>) -> Result<Self> {
        let tables = (0..model.num_tables())
            .map(|t| {
                let code = model.hash_code(t, query)?;
                let weights: Vec<f32> = model
                    .hash_weights(t, query)?
                    .into_iter()
                    .map(f32::abs)
                    .collect();
                TableRanking::new(code, &weights, model.table(t)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_tables(tables))
    }

    /// Merge already-built rankings; table `i` of the output is `tables[i]`.
    pub fn from_tables(tables: Vec<TableRanking>) -> Self {
        let mut ranking = Self {
            heap: BinaryHeap::with_capacity(tables.len()),
            tables,
            probed: 0,
        };
        ranking.seed_heap();
        ranking
    }

    fn seed_heap(&mut self) {
        self.heap.clear();
        for (table, ranking) in self.tables.iter().enumerate() {
            if let Some(score) = ranking.current_score() {
                self.heap.push(Reverse(HeapEntry { score, table }));
            }
        }
    }

    /// Rewind every table and start probing from the cheapest bucket again.
    pub fn reset(&mut self) {
        for table in &mut self.tables {
            table.reset();
        }
        self.probed = 0;
        self.seed_heap();
    }

    /// Total populated buckets across all tables; the number of probes
    /// available before exhaustion.
    pub fn total_buckets(&self) -> usize {
        self.tables.iter().map(TableRanking::len).sum()
    }

    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    pub fn tables(&self) -> &[TableRanking] {
        &self.tables
    }
}

impl BucketProber for LossRanking {
    fn next_bucket(&mut self) -> Option<Probe> {
        let Reverse(HeapEntry { score, table }) = self.heap.pop()?;
        let ranking = &mut self.tables[table];
        let bucket = ranking.current_bucket()?;
        if ranking.move_forward() {
            if let Some(next) = ranking.current_score() {
                self.heap.push(Reverse(HeapEntry { score: next, table }));
            }
        }
        self.probed += 1;
        Some(Probe {
            table,
            bucket,
            score,
        })
    }

    fn probed(&self) -> usize {
        self.probed
    }

    fn is_exhausted(&self) -> bool {
        self.heap.is_empty()
    }
}

impl Iterator for LossRanking {
    type Item = Probe;

    fn next(&mut self) -> Option<Probe> {
        self.next_bucket()
    }
}

/// Multi-probe ranking by plain Hamming distance: every bit flip costs 1.
#[derive(Debug, Clone)]
pub struct HammingRanking {
    inner: LossRanking,
}

impl HammingRanking {
    pub fn new<M: HashModel + ?Sized>(model: &M, query: &ArrayView1<f32>) -> Result<Self> {
        let tables = (0..model.num_tables())
            .map(|t| {
                let code = model.hash_code(t, query)?;
                let bits = model.hash_weights(t, query)?.len();
                TableRanking::new(code, &vec![1.0; bits], model.table(t)?)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            inner: LossRanking::from_tables(tables),
        })
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn total_buckets(&self) -> usize {
        self.inner.total_buckets()
    }
}

impl BucketProber for HammingRanking {
    fn next_bucket(&mut self) -> Option<Probe> {
        self.inner.next_bucket()
    }

    fn probed(&self) -> usize {
        self.inner.probed()
    }

    fn is_exhausted(&self) -> bool {
        self.inner.is_exhausted()
    }
}
