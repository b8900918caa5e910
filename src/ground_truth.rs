use std::fmt;
use std::sync::Arc;
use std::thread;

use log::{debug, info};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::distance::DistanceMetric;
use crate::error::{RankError, Result};
use crate::topk::{DistancePair, TopK};

/// Distance function injected into a [`GtQuery`]. Smaller means closer.
pub type DistanceFn =
    Arc<dyn Fn(&ArrayView1<f32>, &ArrayView1<f32>) -> Result<f32> + Send + Sync>;

/// Configuration for exact ground-truth computation.
#[derive(Debug, Clone)]
pub struct GroundTruthConfig {
    /// Number of true neighbors kept per query.
    pub k: usize,
    /// Worker threads per shard round.
    pub threads: usize,
    /// Rows per shard when splitting an in-memory dataset.
    pub shard_size: usize,
    /// Metric used by queries built through the engine.
    pub metric: DistanceMetric,
}

impl Default for GroundTruthConfig {
    fn default() -> Self {
        Self {
            k: 20,
            threads: 4,
            shard_size: 100_000,
            metric: DistanceMetric::Euclidean,
        }
    }
}

impl GroundTruthConfig {
    pub fn builder() -> GroundTruthConfigBuilder {
        GroundTruthConfigBuilder::default()
    }

    fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(RankError::InvalidK);
        }
        if self.threads == 0 {
            return Err(RankError::InvalidConfig("threads must be > 0".into()));
        }
        if self.shard_size == 0 {
            return Err(RankError::InvalidConfig("shard_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`GroundTruthConfig`].
#[derive(Default)]
pub struct GroundTruthConfigBuilder {
    config: GroundTruthConfig,
}

impl GroundTruthConfigBuilder {
    pub fn k(mut self, k: usize) -> Self {
        self.config.k = k;
        self
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.config.threads = n;
        self
    }

    pub fn shard_size(mut self, rows: usize) -> Self {
        self.config.shard_size = rows;
        self
    }

    pub fn metric(mut self, m: DistanceMetric) -> Self {
        self.config.metric = m;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<GroundTruthConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// ---------------------------------------------------------------------------
// GtQuery
// ---------------------------------------------------------------------------

/// One query's exact-search state: its vector, a distance function and the
/// best `k` items seen so far.
#[derive(Clone)]
pub struct GtQuery {
    content: Array1<f32>,
    topk: TopK,
    distance: DistanceFn,
}

impl fmt::Debug for GtQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GtQuery")
            .field("dim", &self.content.len())
            .field("k", &self.topk.k())
            .field("held", &self.topk.len())
            .finish()
    }
}

impl GtQuery {
    /// Create a query scored by an arbitrary distance function.
    pub fn new<F>(content: Array1<f32>, k: usize, distance: F) -> Result<Self>
    where
        F: Fn(&ArrayView1<f32>, &ArrayView1<f32>) -> Result<f32> + Send + Sync + 'static,
    {
        Ok(Self {
            content,
            topk: TopK::new(k)?,
            distance: Arc::new(distance),
        })
    }

    /// Create a query scored by one of the built-in metrics.
    pub fn with_metric(content: Array1<f32>, k: usize, metric: DistanceMetric) -> Result<Self> {
        Self::new(content, k, move |a, b| metric.compute(a, b))
    }

    /// Score `item` against this query and offer it to the top-k.
    pub fn evaluate(&mut self, item: &ArrayView1<f32>, id: usize) -> Result<()> {
        let distance = (self.distance)(&self.content.view(), item)?;
        self.topk.insert(DistancePair::new(id, distance));
        Ok(())
    }

    pub fn top_k(&self) -> Vec<DistancePair> {
        self.topk.top_k()
    }

    pub fn k(&self) -> usize {
        self.topk.k()
    }

    pub fn content(&self) -> ArrayView1<'_, f32> {
        self.content.view()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Computes exact top-k neighbors for a query batch by streaming dataset shards.
///
/// Each round splits the batch into contiguous groups of `ceil(Q / threads)`
/// queries; every group is owned by one worker that scans the whole shard.
/// Groups are disjoint and the shard is read-only, so no locking is needed.
/// All workers are joined before the next shard is admitted, so memory stays
/// at O(Q * k) however large the dataset is.
pub struct GroundTruthEngine {
    config: GroundTruthConfig,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl fmt::Debug for GroundTruthEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroundTruthEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl GroundTruthEngine {
    /// Engine that spawns scoped threads for every shard round.
    pub fn new(config: GroundTruthConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            #[cfg(feature = "parallel")]
            pool: None,
        })
    }

    /// Engine that reuses one rayon pool of `config.threads` workers across rounds.
    #[cfg(feature = "parallel")]
    pub fn with_pool(config: GroundTruthConfig) -> Result<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .build()
            .map_err(|e| RankError::InvalidConfig(e.to_string()))?;
        Ok(Self {
            config,
            pool: Some(pool),
        })
    }

    pub fn config(&self) -> &GroundTruthConfig {
        &self.config
    }

    /// Build one [`GtQuery`] per row using the configured `k` and metric.
    pub fn make_queries(&self, queries: ArrayView2<f32>) -> Result<Vec<GtQuery>> {
        queries
            .outer_iter()
            .map(|row| GtQuery::with_metric(row.to_owned(), self.config.k, self.config.metric))
            .collect()
    }

    /// Run one parallel round: every query evaluates every row of `shard`,
    /// with row `r` carrying id `item_start + r`.
    pub fn update_shard(
        &self,
        queries: &mut [GtQuery],
        shard: ArrayView2<f32>,
        item_start: usize,
    ) -> Result<()> {
        if queries.is_empty() || shard.nrows() == 0 {
            return Ok(());
        }
        let group = queries.len().div_ceil(self.config.threads);
        debug!(
            "ground truth round: items [{}, {}), {} queries in groups of {}",
            item_start,
            item_start + shard.nrows(),
            queries.len(),
            group
        );

        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.pool {
                return update_pooled(pool, queries, group, shard, item_start);
            }
        }

        thread::scope(|scope| {
            let handles: Vec<_> = queries
                .chunks_mut(group)
                .map(|chunk| scope.spawn(move || update_group(chunk, shard, item_start)))
                .collect();

            let mut outcome = Ok(());
            for handle in handles {
                let joined = handle
                    .join()
                    .map_err(|_| RankError::WorkerPanicked)
                    .and_then(|r| r);
                if outcome.is_ok() {
                    outcome = joined;
                }
            }
            outcome
        })
    }

    /// Stream `(item_start, shard)` pairs through the batch, one round each.
    pub fn compute<'a, I>(&self, queries: &mut [GtQuery], shards: I) -> Result<()>
    where
        I: IntoIterator<Item = (usize, ArrayView2<'a, f32>)>,
    {
        let mut rounds = 0usize;
        let mut items = 0usize;
        for (item_start, shard) in shards {
            self.update_shard(queries, shard, item_start)?;
            rounds += 1;
            items += shard.nrows();
        }
        info!(
            "ground truth computed for {} queries over {} items in {} rounds",
            queries.len(),
            items,
            rounds
        );
        Ok(())
    }

    /// Split `dataset` into contiguous shards of `config.shard_size` rows and
    /// stream them. Row `r` of `dataset` gets id `r`.
    pub fn compute_dataset(&self, queries: &mut [GtQuery], dataset: ArrayView2<f32>) -> Result<()> {
        let shard_size = self.config.shard_size;
        let shards = dataset
            .axis_chunks_iter(Axis(0), shard_size)
            .enumerate()
            .map(|(i, shard)| (i * shard_size, shard));
        self.compute(queries, shards)
    }
}

fn update_group(group: &mut [GtQuery], shard: ArrayView2<f32>, item_start: usize) -> Result<()> {
    for query in group.iter_mut() {
        for (offset, item) in shard.outer_iter().enumerate() {
            query.evaluate(&item, item_start + offset)?;
        }
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn update_pooled(
    pool: &rayon::ThreadPool,
    queries: &mut [GtQuery],
    group: usize,
    shard: ArrayView2<f32>,
    item_start: usize,
) -> Result<()> {
    use rayon::prelude::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    catch_unwind(AssertUnwindSafe(|| {
        pool.install(|| {
            queries
                .par_chunks_mut(group)
                .try_for_each(|chunk| update_group(chunk, shard, item_start))
        })
    }))
    .map_err(|_| RankError::WorkerPanicked)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn engine(k: usize, threads: usize) -> GroundTruthEngine {
        let config = GroundTruthConfig::builder()
            .k(k)
            .threads(threads)
            .build()
            .unwrap();
        GroundTruthEngine::new(config).unwrap()
    }

    #[test]
    fn test_builder_rejects_zero_values() {
        assert!(matches!(
            GroundTruthConfig::builder().k(0).build(),
            Err(RankError::InvalidK)
        ));
        assert!(matches!(
            GroundTruthConfig::builder().threads(0).build(),
            Err(RankError::InvalidConfig(_))
        ));
        assert!(matches!(
            GroundTruthConfig::builder().shard_size(0).build(),
            Err(RankError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_evaluate_uses_injected_distance() {
        let mut q = GtQuery::new(array![0.0, 0.0], 2, |_, item| Ok(item[0])).unwrap();
        q.evaluate(&array![3.0, 9.0].view(), 0).unwrap();
        q.evaluate(&array![1.0, 9.0].view(), 1).unwrap();
        q.evaluate(&array![2.0, 9.0].view(), 2).unwrap();
        let ids: Vec<usize> = q.top_k().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(q.k(), 2);
    }

    #[test]
    fn test_single_round_exact() {
        let data = array![[0.0, 0.0], [1.0, 0.0], [5.0, 5.0], [0.1, 0.1]];
        let queries = array![[0.0, 0.0], [5.0, 5.0], [1.0, 0.0]];
        let engine = engine(2, 2);
        let mut batch = engine.make_queries(queries.view()).unwrap();
        engine.update_shard(&mut batch, data.view(), 0).unwrap();

        let ids: Vec<Vec<usize>> = batch
            .iter()
            .map(|q| q.top_k().iter().map(|p| p.id).collect())
            .collect();
        assert_eq!(ids[0], vec![0, 3]);
        assert_eq!(ids[1][0], 2);
        assert_eq!(ids[2][0], 1);
    }

    #[test]
    fn test_more_threads_than_queries() {
        let data = array![[0.0], [2.0], [4.0]];
        let queries = array![[3.9]];
        let engine = engine(1, 8);
        let mut batch = engine.make_queries(queries.view()).unwrap();
        engine.update_shard(&mut batch, data.view(), 10).unwrap();
        assert_eq!(batch[0].top_k()[0].id, 12);
    }

    #[test]
    fn test_worker_error_propagates() {
        let data = array![[1.0, 2.0, 3.0]];
        let queries = array![[1.0, 2.0]];
        let engine = engine(1, 1);
        let mut batch = engine.make_queries(queries.view()).unwrap();
        let err = engine.update_shard(&mut batch, data.view(), 0).unwrap_err();
        assert!(matches!(err, RankError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_worker_panic_becomes_error() {
        let mut batch =
            vec![GtQuery::new(array![0.0], 1, |_, _| -> Result<f32> { panic!("boom") }).unwrap()];
        let data = array![[1.0]];
        let err = engine(1, 1)
            .update_shard(&mut batch, data.view(), 0)
            .unwrap_err();
        assert!(matches!(err, RankError::WorkerPanicked));
    }
}
