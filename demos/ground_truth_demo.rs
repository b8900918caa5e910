//! End-to-end use of `lsh_rank`.
//!
//! Computes exact ground truth for a batch of random queries, writes it in both
//! file layouts, then probes the hash tables for one query.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example ground_truth_demo

use lsh_rank::*;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

const DIM: usize = 64;
const NUM_ITEMS: usize = 20_000;
const NUM_QUERIES: usize = 50;
const K: usize = 10;

fn main() -> Result<()> {
    env_logger::init();

    // ---------------------------------------------------------------
    // 1. Random dataset and queries.
    // ---------------------------------------------------------------
    let mut rng = StdRng::seed_from_u64(123);
    let normal = Normal::new(0.0_f32, 1.0).unwrap();
    let data = Array2::from_shape_fn((NUM_ITEMS, DIM), |_| normal.sample(&mut rng));
    let queries = Array2::from_shape_fn((NUM_QUERIES, DIM), |_| normal.sample(&mut rng));
    println!("=== {NUM_ITEMS} items, {NUM_QUERIES} queries, dim={DIM} ===\n");

    // ---------------------------------------------------------------
    // 2. Exact ground truth, streamed in shards.
    // ---------------------------------------------------------------
    let config = GroundTruthConfig::builder()
        .k(K)
        .threads(4)
        .shard_size(5_000)
        .metric(DistanceMetric::Euclidean)
        .build()?;
    let engine = GroundTruthEngine::new(config)?;
    let mut batch = engine.make_queries(queries.view())?;
    engine.compute_dataset(&mut batch, data.view())?;
    let truth = Benchmark::from_queries(&batch)?;

    let out = std::env::temp_dir();
    truth.write_text(&out.join("demo_gt.lshbox"))?;
    truth.write_ivecs(&out.join("demo_gt.ivecs"))?;
    println!("Ground truth written to {}\n", out.display());

    // ---------------------------------------------------------------
    // 3. Hash the dataset and probe for the first query.
    // ---------------------------------------------------------------
    let mut model = RandomProjectionModel::builder()
        .dim(DIM)
        .num_bits(12)
        .num_tables(4)
        .seed(42)
        .build()?;
    model.insert_rows(data.view())?;
    println!("Buckets per table: {:?}\n", model.bucket_counts());

    let metrics = std::sync::Arc::new(ProbeMetrics::new());
    let query = queries.row(0);
    let mut prober = LossRanking::new(&model, &query)?;
    let mut scanner = Scanner::new(query.to_owned(), K, DistanceMetric::Euclidean, data.view())?
        .with_metrics(metrics.clone());

    println!("First probes for query 0:");
    for probe in LossRanking::new(&model, &query)?.take(8) {
        println!("  table={} bucket={:#05x} score={:.3}", probe.table, probe.bucket, probe.score);
    }

    scanner.probe(&mut prober, &model, 64)?;
    let ids: Vec<usize> = scanner.top_k().iter().map(|p| p.id).collect();
    println!(
        "\nAfter 64 probes: {} candidates, recall@{K} = {:.2}",
        scanner.candidates(),
        truth.recall(0, &ids).unwrap_or(0.0)
    );

    println!("\n{}", metrics.snapshot());
    Ok(())
}
