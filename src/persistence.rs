//! Save and load finalized ground truth to/from disk, keeping distances.
//!
//! Requires the `persistence` feature flag.

use std::path::Path;

use crate::error::{RankError, Result};
use crate::writer::Benchmark;

impl Benchmark {
    /// Serialize the ground truth to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RankError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Deserialize ground truth from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| RankError::Serialization(e.to_string()))
    }

    /// Serialize the ground truth to a compact bincode file.
    pub fn save_bincode(&self, path: &Path) -> Result<()> {
        let bytes =
            bincode::serialize(self).map_err(|e| RankError::Serialization(e.to_string()))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Deserialize ground truth from a bincode file.
    pub fn load_bincode(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        bincode::deserialize(&data).map_err(|e| RankError::Serialization(e.to_string()))
    }
}
