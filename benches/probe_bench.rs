use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lsh_rank::{
    BucketProber, DistanceMetric, DistancePair, GroundTruthConfig, GroundTruthEngine,
    LossRanking, RandomProjectionModel, TopK,
};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_matrix(rows: usize, dim: usize, seed: u64) -> Array2<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((rows, dim), |_| StandardNormal.sample(&mut rng))
}

fn build_model(data: &Array2<f32>, num_bits: usize) -> RandomProjectionModel {
    let mut model = RandomProjectionModel::builder()
        .dim(data.ncols())
        .num_bits(num_bits)
        .num_tables(8)
        .seed(42)
        .build()
        .unwrap();
    model.insert_rows(data.view()).unwrap();
    model
}

// ---------------------------------------------------------------------------
// TopK insert throughput
// ---------------------------------------------------------------------------

fn bench_topk(c: &mut Criterion) {
    let mut group = c.benchmark_group("topk_insert");
    let distances: Vec<f32> = generate_matrix(1, 100_000, 7).into_raw_vec();

    for &k in &[10usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(k), &k, |b, &k| {
            b.iter(|| {
                let mut topk = TopK::new(k).unwrap();
                for (id, &d) in distances.iter().enumerate() {
                    topk.insert(DistancePair::new(id, d));
                }
                black_box(topk.top_k());
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Ranking construction and first probes
// ---------------------------------------------------------------------------

fn bench_loss_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("loss_ranking");
    let dim = 128;

    for &n in &[10_000usize, 100_000] {
        let data = generate_matrix(n, dim, 99);
        let query = generate_matrix(1, dim, 1234).row(0).to_owned();
        let model = build_model(&data, 16);

        group.bench_with_input(BenchmarkId::new("build", n), &n, |b, _| {
            b.iter(|| black_box(LossRanking::new(&model, &query.view()).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("build+64_probes", n), &n, |b, _| {
            b.iter(|| {
                let mut prober = LossRanking::new(&model, &query.view()).unwrap();
                for _ in 0..64 {
                    black_box(prober.next_bucket());
                }
            });
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Ground truth (100 queries)
// ---------------------------------------------------------------------------

fn bench_ground_truth(c: &mut Criterion) {
    let mut group = c.benchmark_group("ground_truth_100");
    group.sample_size(10);
    let dim = 128;
    let queries = generate_matrix(100, dim, 5678);

    for &n in &[10_000usize, 50_000] {
        let data = generate_matrix(n, dim, 99);
        for &threads in &[1usize, 4] {
            let config = GroundTruthConfig::builder()
                .k(10)
                .threads(threads)
                .shard_size(10_000)
                .metric(DistanceMetric::Euclidean)
                .build()
                .unwrap();
            let engine = GroundTruthEngine::new(config).unwrap();

            group.bench_with_input(
                BenchmarkId::new(format!("threads={threads}"), n),
                &n,
                |b, _| {
                    b.iter(|| {
                        let mut batch = engine.make_queries(queries.view()).unwrap();
                        engine.compute_dataset(&mut batch, data.view()).unwrap();
                        black_box(batch);
                    });
                },
            );
        }
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

criterion_group!(benches, bench_topk, bench_loss_ranking, bench_ground_truth);
criterion_main!(benches);
