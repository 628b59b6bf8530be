//! Partition engine
//!
//! Turns capability, merged axes and an iteration space into a
//! [`PartitionPlan`] through a short fixed pipeline: core assignment, dtype
//! promotion, sub-tiling, variant key. Each step is a pure function in its
//! own module; [`partition`] only wires them together.

pub mod axis;
pub mod config;
pub mod cores;
pub mod key;
pub mod plan;
pub mod promote;
pub mod subtile;

pub use axis::{merge_axes, normalize_axes, normalize_axis, AxisGroup, AxisKind, CombineType, MergedAxes};
pub use config::{PartitionConfig, MAX_ENCODED_DIMS, MAX_SUPPORTED_RANK};
pub use cores::{split_cores, CoreSplit};
pub use key::{VariantKey, VariantKeyFields, TEMPLATE_BASE_STEP};
pub use plan::PartitionPlan;
pub use promote::{promote, Promotion};
pub use subtile::{max_rows, plan_sub_tiles, ChunkPlan, RowFootprint, RowLayout, ScratchBudget, SubTilePlan};

use crate::error::TilingResult;
use crate::operand::DType;
use crate::platform::{EngineKind, PlatformCapability};

/// Rows and row length the plan splits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationSpace {
    pub total: u64,
    pub inner: u64,
    pub layout: RowLayout,
}

impl IterationSpace {
    /// Preserved groups become rows, reduced groups the row length
    pub fn from_merged(merged: &MergedAxes, layout: RowLayout) -> Self {
        Self {
            total: merged.preserved_size(),
            inner: merged.reduced_size(),
            layout,
        }
    }

    /// One element per row, rows contiguous
    pub fn elementwise(numel: u64) -> Self {
        Self {
            total: numel,
            inner: 1,
            layout: RowLayout::Packed,
        }
    }
}

/// Strategy-specific inputs to [`partition`]
#[derive(Debug, Clone)]
pub struct PartitionRequest {
    pub engine: EngineKind,
    pub template_base: u64,
    pub merged: MergedAxes,
    pub space: IterationSpace,
    pub element_size: u64,
    pub dtype_key: u64,
    /// Inner data movement is byte-opaque, so packing is allowed
    pub commutative: bool,
    pub buffers_per_row: u64,
    pub extra_bytes_per_row: u64,
    pub double_buffer: bool,
}

impl PartitionRequest {
    pub fn new(template_base: u64, merged: MergedAxes, space: IterationSpace, dtype: DType) -> Self {
        Self {
            engine: EngineKind::Vector,
            template_base,
            merged,
            space,
            element_size: dtype.size_bytes(),
            dtype_key: dtype.dtype_key(),
            commutative: false,
            buffers_per_row: 1,
            extra_bytes_per_row: 0,
            double_buffer: true,
        }
    }

    pub fn with_engine(mut self, engine: EngineKind) -> Self {
        self.engine = engine;
        self
    }

    pub fn commutative(mut self) -> Self {
        self.commutative = true;
        self
    }

    pub fn with_buffers_per_row(mut self, buffers: u64) -> Self {
        self.buffers_per_row = buffers;
        self
    }

    pub fn with_extra_bytes_per_row(mut self, bytes: u64) -> Self {
        self.extra_bytes_per_row = bytes;
        self
    }

    pub fn single_buffered(mut self) -> Self {
        self.double_buffer = false;
        self
    }

    fn depth(&self, config: &PartitionConfig) -> u32 {
        if self.double_buffer {
            config.double_buffer_depth
        } else {
            1
        }
    }

    /// Row footprint as sub-tiling sees it, after optional promotion
    pub fn row_footprint(&self, config: &PartitionConfig) -> (RowFootprint, Option<Promotion>) {
        let promotion = if self.commutative {
            promote(self.space.inner, self.element_size, config.promotion_unit_bytes)
        } else {
            None
        };
        let (inner, element_size) = match promotion {
            Some(p) => (p.inner, p.promoted_size),
            None => (self.space.inner, self.element_size),
        };
        let row = RowFootprint {
            inner,
            element_size,
            layout: self.space.layout,
            buffers_per_row: self.buffers_per_row,
            extra_bytes_per_row: self.extra_bytes_per_row,
        };
        (row, promotion)
    }

    /// Scratch budget on this request's engine
    pub fn scratch_budget(&self, capability: &PlatformCapability, config: &PartitionConfig) -> ScratchBudget {
        ScratchBudget {
            tier_bytes: capability.scratch_bytes(self.engine),
            reserved_bytes: config.scratch_reserved_bytes,
            depth: self.depth(config),
            alignment: capability.alignment_bytes,
        }
    }

    /// Whether at least one whole row fits a scratch buffer
    pub fn row_fits(&self, capability: &PlatformCapability, config: &PartitionConfig) -> bool {
        let (row, _) = self.row_footprint(config);
        max_rows(&self.scratch_budget(capability, config), &row) >= 1
    }
}

/// Compute the partition plan for a request
pub fn partition(
    capability: &PlatformCapability,
    config: &PartitionConfig,
    request: &PartitionRequest,
) -> TilingResult<PartitionPlan> {
    let space = request.space;
    let block_align = match space.layout {
        RowLayout::Packed => {
            let row_bytes = space.inner.saturating_mul(request.element_size).max(1);
            (capability.alignment_bytes / row_bytes).max(1)
        }
        RowLayout::Padded => 1,
    };
    let split = split_cores(
        space.total,
        space.inner,
        capability.core_count(request.engine),
        block_align,
        config.min_parallel_work,
    );

    let (row, promotion) = request.row_footprint(config);
    let budget = request.scratch_budget(capability, config);
    let sub = plan_sub_tiles(&budget, &row, &split)?;

    let variant_key = VariantKey::compose(&VariantKeyFields {
        template_base: request.template_base,
        combine: request.merged.combine.code(),
        dtype_key: request.dtype_key,
        chunked: sub.chunk.is_some(),
        promoted: promotion.is_some(),
        single_core: split.used_core_count == 1,
    })?;

    Ok(PartitionPlan {
        engine: request.engine,
        layout: space.layout,
        total: space.total,
        inner: space.inner,
        element_size: request.element_size,
        promoted_dtype_size: row.element_size,
        promoted_inner: row.inner,
        used_core_count: split.used_core_count,
        block_factor: split.block_factor,
        tail_block_factor: split.tail_block_factor,
        sub_tile_factor: sub.sub_tile_factor,
        sub_tile_loop_count: sub.sub_tile_loop_count,
        tail_sub_tile_size: sub.tail_sub_tile_size,
        last_core_loop_count: sub.last_core_loop_count,
        last_core_tail_sub_tile: sub.last_core_tail_sub_tile,
        chunk: sub.chunk,
        double_buffer_depth: budget.depth,
        merged_axes: request.merged.clone(),
        variant_key,
    })
}
