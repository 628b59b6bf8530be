//! The immutable partition plan produced for one invocation

use super::axis::MergedAxes;
use super::cores::CoreSplit;
use super::key::VariantKey;
use super::subtile::{ChunkPlan, RowLayout};
use crate::platform::EngineKind;
use serde::Serialize;
use std::fmt::Write;

/// Complete numeric plan for one operator invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    pub engine: EngineKind,
    pub layout: RowLayout,
    /// Outer (parallel) rows
    pub total: u64,
    /// Elements per row before promotion
    pub inner: u64,
    pub element_size: u64,
    /// Bytes per element after promotion (equals `element_size` when not promoted)
    pub promoted_dtype_size: u64,
    /// Elements per row after promotion
    pub promoted_inner: u64,

    pub used_core_count: u32,
    pub block_factor: u64,
    /// 0 when the last core gets a full block
    pub tail_block_factor: u64,

    pub sub_tile_factor: u64,
    pub sub_tile_loop_count: u64,
    pub tail_sub_tile_size: u64,
    pub last_core_loop_count: u64,
    pub last_core_tail_sub_tile: u64,
    pub chunk: Option<ChunkPlan>,

    pub double_buffer_depth: u32,
    pub merged_axes: MergedAxes,
    pub variant_key: VariantKey,
}

impl PartitionPlan {
    pub fn core_split(&self) -> CoreSplit {
        CoreSplit {
            used_core_count: self.used_core_count,
            block_factor: self.block_factor,
            tail_block_factor: self.tail_block_factor,
        }
    }

    /// Rows processed by the last used core
    pub fn last_core_share(&self) -> u64 {
        self.core_split().last_core_share()
    }

    pub fn is_single_core(&self) -> bool {
        self.used_core_count == 1
    }

    pub fn is_chunked(&self) -> bool {
        self.chunk.is_some()
    }

    pub fn is_promoted(&self) -> bool {
        self.promoted_dtype_size != self.element_size
    }

    /// Bytes of scratch one sub-tile pass occupies per buffer
    pub fn sub_tile_bytes(&self) -> u64 {
        match self.chunk {
            Some(chunk) => chunk.chunk_size.saturating_mul(self.promoted_dtype_size),
            None => self
                .sub_tile_factor
                .saturating_mul(self.promoted_inner)
                .saturating_mul(self.promoted_dtype_size),
        }
    }

    /// Human-readable field listing for diagnostics
    pub fn dump(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = writeln!(out, "PartitionPlan");
        let _ = writeln!(out, "  engine                  = {:?}", self.engine);
        let _ = writeln!(out, "  layout                  = {:?}", self.layout);
        let _ = writeln!(
            out,
            "  merged_axes             = {} {:?}",
            self.merged_axes.pattern(),
            self.merged_axes.dims()
        );
        let _ = writeln!(out, "  total                   = {}", self.total);
        let _ = writeln!(out, "  inner                   = {}", self.inner);
        let _ = writeln!(out, "  element_size            = {}", self.element_size);
        let _ = writeln!(out, "  promoted_dtype_size     = {}", self.promoted_dtype_size);
        let _ = writeln!(out, "  promoted_inner          = {}", self.promoted_inner);
        let _ = writeln!(out, "  used_core_count         = {}", self.used_core_count);
        let _ = writeln!(out, "  block_factor            = {}", self.block_factor);
        let _ = writeln!(out, "  tail_block_factor       = {}", self.tail_block_factor);
        let _ = writeln!(out, "  sub_tile_factor         = {}", self.sub_tile_factor);
        let _ = writeln!(out, "  sub_tile_loop_count     = {}", self.sub_tile_loop_count);
        let _ = writeln!(out, "  tail_sub_tile_size      = {}", self.tail_sub_tile_size);
        let _ = writeln!(out, "  last_core_loop_count    = {}", self.last_core_loop_count);
        let _ = writeln!(out, "  last_core_tail_sub_tile = {}", self.last_core_tail_sub_tile);
        match self.chunk {
            Some(chunk) => {
                let _ = writeln!(
                    out,
                    "  chunk                   = size {} x {} (tail {})",
                    chunk.chunk_size, chunk.chunk_count, chunk.tail_chunk_size
                );
            }
            None => {
                let _ = writeln!(out, "  chunk                   = none");
            }
        }
        let _ = writeln!(out, "  double_buffer_depth     = {}", self.double_buffer_depth);
        let _ = write!(out, "  variant_key             = {}", self.variant_key);
        out
    }
}
