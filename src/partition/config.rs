//! Tunable constants of the partition engine
//!
//! These values were calibrated empirically on one accelerator family and are
//! not universal. Keep them configurable per target.

use crate::error::{config_err, TilingResult};
use serde::{Deserialize, Serialize};

/// Largest number of canonical merged dims the plan header can carry
pub const MAX_ENCODED_DIMS: usize = 4;
/// Largest tensor rank the engine accepts
pub const MAX_SUPPORTED_RANK: usize = 8;

/// Configuration for partition planning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Below this many elements of work a single core is used
    pub min_parallel_work: u64,
    /// Bytes of the scratch tier kept back for the runtime
    pub scratch_reserved_bytes: u64,
    /// Widest packing unit for dtype promotion
    pub promotion_unit_bytes: u64,
    /// Scratch buffers in flight per stream (2 = double buffering)
    pub double_buffer_depth: u32,
    /// Canonical groups allowed after axis merging
    pub max_merged_dims: usize,
    /// Rank cap applied to every operand
    pub max_rank: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        PartitionConfig {
            min_parallel_work: 1024,
            scratch_reserved_bytes: 1024,
            promotion_unit_bytes: 8,
            double_buffer_depth: 2,
            max_merged_dims: MAX_ENCODED_DIMS,
            max_rank: MAX_SUPPORTED_RANK,
        }
    }
}

impl PartitionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_parallel_work(mut self, min_parallel_work: u64) -> Self {
        self.min_parallel_work = min_parallel_work;
        self
    }

    pub fn with_scratch_reserved_bytes(mut self, scratch_reserved_bytes: u64) -> Self {
        self.scratch_reserved_bytes = scratch_reserved_bytes;
        self
    }

    pub fn with_promotion_unit_bytes(mut self, promotion_unit_bytes: u64) -> Self {
        self.promotion_unit_bytes = promotion_unit_bytes;
        self
    }

    pub fn with_double_buffer_depth(mut self, double_buffer_depth: u32) -> Self {
        self.double_buffer_depth = double_buffer_depth;
        self
    }

    pub fn with_max_merged_dims(mut self, max_merged_dims: usize) -> Self {
        self.max_merged_dims = max_merged_dims;
        self
    }

    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        self.max_rank = max_rank;
        self
    }

    /// Load from JSON; absent fields keep their defaults
    pub fn from_json_str(text: &str) -> TilingResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| config_err("partition config", "valid JSON", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency
    pub fn validate(&self) -> TilingResult<()> {
        if self.double_buffer_depth == 0 {
            return Err(config_err("double_buffer_depth", ">= 1", 0));
        }
        if !matches!(self.promotion_unit_bytes, 1 | 2 | 4 | 8) {
            return Err(config_err(
                "promotion_unit_bytes",
                "one of 1, 2, 4, 8",
                self.promotion_unit_bytes,
            ));
        }
        if self.max_merged_dims == 0 || self.max_merged_dims > MAX_ENCODED_DIMS {
            return Err(config_err(
                "max_merged_dims",
                format!("1..={MAX_ENCODED_DIMS}"),
                self.max_merged_dims,
            ));
        }
        if self.max_rank == 0 || self.max_rank > MAX_SUPPORTED_RANK {
            return Err(config_err(
                "max_rank",
                format!("1..={MAX_SUPPORTED_RANK}"),
                self.max_rank,
            ));
        }
        Ok(())
    }
}
