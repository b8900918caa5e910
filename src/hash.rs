use hashbrown::HashMap;
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::error::{RankError, Result};

/// One hash table: bucket code to the ids stored in it.
pub type Buckets = HashMap<u64, Vec<usize>>;

/// What the ranking engine needs from a trained LSH model.
///
/// Bit `i` of a hash code (counted from the least significant bit) pairs
/// with `hash_weights(..)[i]`.
pub trait HashModel {
    /// Number of independent tables (L).
    fn num_tables(&self) -> usize;

    /// The query's bucket code in `table`.
    fn hash_code(&self, table: usize, query: &ArrayView1<f32>) -> Result<u64>;

    /// Per-bit projection values for the query in `table`. Magnitude is the
    /// cost of flipping that bit; the sign is irrelevant to ranking.
    fn hash_weights(&self, table: usize, query: &ArrayView1<f32>) -> Result<Vec<f32>>;

    /// Populated buckets of `table`.
    fn table(&self, table: usize) -> Result<&Buckets>;
}

/// Random-projection hash family for one table.
///
/// Each bit is the sign of the dot product with a random Gaussian vector
/// (SimHash / hyperplane LSH).
#[derive(Debug, Clone)]
pub struct RandomProjectionHasher {
    projections: Vec<Array1<f32>>,
}

impl RandomProjectionHasher {
    /// Create a hasher with `num_bits` random projection vectors of dimension `dim`.
    pub fn new(dim: usize, num_bits: usize, rng: &mut impl Rng) -> Self {
        let projections = (0..num_bits)
            .map(|_| {
                let v: Vec<f32> = (0..dim).map(|_| rng.sample(StandardNormal)).collect();
                Array1::from_vec(v)
            })
            .collect();
        Self { projections }
    }

    /// Raw projection values, one per bit.
    pub fn project(&self, vector: &ArrayView1<f32>) -> Vec<f32> {
        self.projections.iter().map(|p| vector.dot(p)).collect()
    }

    /// Bucket code: bit `i` is set when projection `i` is non-negative.
    pub fn hash(&self, vector: &ArrayView1<f32>) -> u64 {
        let mut code: u64 = 0;
        for (i, proj) in self.projections.iter().enumerate() {
            if vector.dot(proj) >= 0.0 {
                code |= 1u64 << i;
            }
        }
        code
    }

    pub fn num_bits(&self) -> usize {
        self.projections.len()
    }
}

/// Configuration for [`RandomProjectionModel`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Dimensionality of vectors.
    pub dim: usize,
    /// Hash bits per table (1..=64).
    pub num_bits: usize,
    /// Number of independent hash tables.
    pub num_tables: usize,
    /// Optional RNG seed for reproducible projections.
    pub seed: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dim: 128,
            num_bits: 16,
            num_tables: 4,
            seed: None,
        }
    }
}

/// A simple in-memory [`HashModel`] built from random projections.
#[derive(Debug, Clone)]
pub struct RandomProjectionModel {
    config: ModelConfig,
    hashers: Vec<RandomProjectionHasher>,
    tables: Vec<Buckets>,
}

impl RandomProjectionModel {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn new(config: ModelConfig) -> Result<Self> {
        if config.dim == 0 {
            return Err(RankError::InvalidConfig("dim must be > 0".into()));
        }
        if config.num_bits == 0 || config.num_bits > 64 {
            return Err(RankError::InvalidConfig(format!(
                "num_bits must be between 1 and 64, got {}",
                config.num_bits
            )));
        }
        if config.num_tables == 0 {
            return Err(RankError::InvalidConfig("num_tables must be > 0".into()));
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let hashers = (0..config.num_tables)
            .map(|_| RandomProjectionHasher::new(config.dim, config.num_bits, &mut rng))
            .collect();
        let tables = (0..config.num_tables).map(|_| Buckets::new()).collect();

        Ok(Self {
            config,
            hashers,
            tables,
        })
    }

    /// Hash `vector` into every table under `id`.
    pub fn insert(&mut self, id: usize, vector: &ArrayView1<f32>) -> Result<()> {
        self.check_dim(vector)?;
        for (hasher, table) in self.hashers.iter().zip(self.tables.iter_mut()) {
            table.entry(hasher.hash(vector)).or_default().push(id);
        }
        Ok(())
    }

    /// Insert each row of `data` with its row index as id.
    pub fn insert_rows(&mut self, data: ArrayView2<f32>) -> Result<()> {
        for (id, row) in data.outer_iter().enumerate() {
            self.insert(id, &row)?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Populated bucket count per table.
    pub fn bucket_counts(&self) -> Vec<usize> {
        self.tables.iter().map(|t| t.len()).collect()
    }

    fn check_dim(&self, vector: &ArrayView1<f32>) -> Result<()> {
        if vector.len() != self.config.dim {
            return Err(RankError::DimensionMismatch {
                expected: self.config.dim,
                got: vector.len(),
            });
        }
        Ok(())
    }

    fn hasher(&self, table: usize) -> Result<&RandomProjectionHasher> {
        self.hashers.get(table).ok_or(RankError::TableOutOfRange {
            index: table,
            num_tables: self.hashers.len(),
        })
    }
}

impl HashModel for RandomProjectionModel {
    fn num_tables(&self) -> usize {
        self.tables.len()
    }

    fn hash_code(&self, table: usize, query: &ArrayView1<f32>) -> Result<u64> {
        self.check_dim(query)?;
        Ok(self.hasher(table)?.hash(query))
    }

    fn hash_weights(&self, table: usize, query: &ArrayView1<f32>) -> Result<Vec<f32>> {
        self.check_dim(query)?;
        Ok(self.hasher(table)?.project(query))
    }

    fn table(&self, table: usize) -> Result<&Buckets> {
        self.tables.get(table).ok_or(RankError::TableOutOfRange {
            index: table,
            num_tables: self.tables.len(),
        })
    }
}

/// Fluent builder for [`RandomProjectionModel`].
#[derive(Default)]
pub struct ModelBuilder {
    config: ModelConfig,
}

impl ModelBuilder {
    pub fn dim(mut self, dim: usize) -> Self {
        self.config.dim = dim;
        self
    }

    pub fn num_bits(mut self, n: usize) -> Self {
        self.config.num_bits = n;
        self
    }

    pub fn num_tables(mut self, n: usize) -> Self {
        self.config.num_tables = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Build the model, returning an error on invalid configuration.
    pub fn build(self) -> Result<RandomProjectionModel> {
        RandomProjectionModel::new(self.config)
    }
}
