use std::sync::Arc;

use hashbrown::HashSet;
use log::debug;
use ndarray::{Array1, ArrayView2};

use crate::distance::DistanceMetric;
use crate::error::{RankError, Result};
use crate::hash::HashModel;
use crate::metrics::{ProbeMetrics, ScanTimer};
use crate::ranking::BucketProber;
use crate::topk::{DistancePair, TopK};

/// Turns probed buckets into a ranked candidate set for one query.
///
/// Each distinct id is scored once against the dataset row it names; repeats
/// across buckets or tables are skipped.
pub struct Scanner<'a> {
    query: Array1<f32>,
    dataset: ArrayView2<'a, f32>,
    metric: DistanceMetric,
    topk: TopK,
    seen: HashSet<usize>,
    metrics: Option<Arc<ProbeMetrics>>,
}

impl<'a> Scanner<'a> {
    pub fn new(
        query: Array1<f32>,
        k: usize,
        metric: DistanceMetric,
        dataset: ArrayView2<'a, f32>,
    ) -> Result<Self> {
        if query.len() != dataset.ncols() {
            return Err(RankError::DimensionMismatch {
                expected: dataset.ncols(),
                got: query.len(),
            });
        }
        Ok(Self {
            query,
            dataset,
            metric,
            topk: TopK::new(k)?,
            seen: HashSet::new(),
            metrics: None,
        })
    }

    /// Report probes and candidates into a shared collector.
    pub fn with_metrics(mut self, metrics: Arc<ProbeMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Score every not-yet-seen id in `ids`.
    pub fn scan_bucket(&mut self, ids: &[usize]) -> Result<()> {
        let query = self.query.view();
        for &id in ids {
            if id >= self.dataset.nrows() {
                return Err(RankError::UnknownId(id));
            }
            if !self.seen.insert(id) {
                continue;
            }
            let distance = self.metric.compute(&query, &self.dataset.row(id))?;
            self.topk.insert(DistancePair::new(id, distance));
        }
        Ok(())
    }

    /// Pull up to `budget` buckets from `prober` and scan their contents.
    /// Returns how many buckets were actually probed.
    pub fn probe<P, M>(&mut self, prober: &mut P, model: &M, budget: usize) -> Result<usize>
    where
        P: BucketProber + ?Sized,
        M: HashModel + ?Sized,
    {
        let timer = self.metrics.as_ref().map(|_| ScanTimer::new());
        let mut probed = 0usize;
        while probed < budget {
            let Some(target) = prober.next_bucket() else {
                break;
            };
            probed += 1;
            match model.table(target.table)?.get(&target.bucket) {
                Some(ids) if !ids.is_empty() => {
                    if let Some(ref m) = self.metrics {
                        m.record_bucket_hit();
                    }
                    self.scan_bucket(ids)?;
                }
                _ => {
                    if let Some(ref m) = self.metrics {
                        m.record_bucket_miss();
                    }
                }
            }
        }

        if let (Some(m), Some(t)) = (&self.metrics, timer) {
            m.record_scan(probed as u64, self.seen.len() as u64, t.elapsed_ns());
        }
        debug!(
            "probed {} buckets, {} distinct candidates",
            probed,
            self.seen.len()
        );
        Ok(probed)
    }

    /// Number of distinct ids scanned so far.
    pub fn candidates(&self) -> usize {
        self.seen.len()
    }

    pub fn top_k(&self) -> Vec<DistancePair> {
        self.topk.top_k()
    }

    /// Forget all candidates, keeping the query and dataset.
    pub fn reset(&mut self) {
        self.topk.clear();
        self.seen.clear();
    }
}
