//! # lsh_rank
//!
//! Candidate ranking for locality-sensitive-hashing (LSH) nearest-neighbor
//! search, plus the exact ground truth used to measure it.
//!
//! * [`LossRanking`] merges one weighted-Hamming bucket ranking per hash table
//!   into a single stream of `(table, bucket)` probes, cheapest first.
//! * [`GroundTruthEngine`] computes exact top-k neighbors for a query batch,
//!   streaming dataset shards through a pool of worker threads.
//! * [`TopK`] is the bounded collector both of them rely on.
//!
//! ## Quick start
//!
//! ```rust
//! use lsh_rank::{BucketProber, LossRanking, RandomProjectionModel};
//! use ndarray::array;
//!
//! let mut model = RandomProjectionModel::builder()
//!     .dim(3)
//!     .num_bits(8)
//!     .num_tables(2)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//! model.insert(0, &array![1.0, 0.0, 0.0].view()).unwrap();
//! model.insert(1, &array![0.0, 1.0, 0.0].view()).unwrap();
//!
//! let query = array![0.9, 0.1, 0.0];
//! let mut prober = LossRanking::new(&model, &query.view()).unwrap();
//! while let Some(probe) = prober.next_bucket() {
//!     println!("table={} bucket={:#x} score={:.3}", probe.table, probe.bucket, probe.score);
//! }
//! ```
//!
//! ## Feature flags
//!
//! | Flag          | Effect                                                  |
//! |---------------|---------------------------------------------------------|
//! | `parallel`    | Reusable rayon worker pool for ground-truth rounds      |
//! | `persistence` | Save/load ground truth as JSON or bincode (serde)       |
//! | `full`        | Enables `parallel` + `persistence`                      |

pub mod distance;
pub mod error;
pub mod ground_truth;
pub mod hash;
pub mod metrics;
pub mod ranking;
pub mod scanner;
pub mod topk;
pub mod writer;

#[cfg(feature = "persistence")]
pub mod persistence;

// Re-exports for convenience.
pub use distance::DistanceMetric;
pub use error::{RankError, Result};
pub use ground_truth::{GroundTruthConfig, GroundTruthEngine, GtQuery};
pub use hash::{Buckets, HashModel, RandomProjectionModel};
pub use metrics::{ProbeMetrics, ProbeSnapshot};
pub use ranking::{BucketProber, HammingRanking, LossRanking, Probe, TableRanking};
pub use scanner::Scanner;
pub use topk::{DistancePair, TopK};
pub use writer::{Benchmark, GroundWriter};
