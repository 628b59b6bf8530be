//! Sub-tiling: how many rows of a core's share fit one scratch buffer pass

use super::cores::CoreSplit;
use crate::capacity_error;
use crate::error::TilingResult;
use crate::platform::align_up;
use serde::Serialize;

/// How consecutive rows sit in the scratch tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RowLayout {
    /// Rows are contiguous; elementwise streams
    Packed,
    /// Each row starts on an alignment boundary
    Padded,
}

/// Scratch budget for one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchBudget {
    pub tier_bytes: u64,
    pub reserved_bytes: u64,
    pub depth: u32,
    pub alignment: u64,
}

impl ScratchBudget {
    /// Tier minus the fixed reservation
    pub fn available(&self) -> u64 {
        self.tier_bytes.saturating_sub(self.reserved_bytes)
    }

    /// Bytes one in-flight buffer may use
    pub fn per_buffer(&self) -> u64 {
        self.available() / u64::from(self.depth.max(1))
    }
}

/// Byte footprint of one row in scratch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFootprint {
    /// Row length in (possibly promoted) elements
    pub inner: u64,
    pub element_size: u64,
    pub layout: RowLayout,
    /// Resident copies of the row (inputs, outputs, casts)
    pub buffers_per_row: u64,
    /// Fixed extra bytes per row (per-row scalars, fp32 staging)
    pub extra_bytes_per_row: u64,
}

impl RowFootprint {
    pub fn row_bytes(&self, alignment: u64) -> u64 {
        let data = self.inner.saturating_mul(self.element_size);
        let data = match self.layout {
            RowLayout::Packed => data,
            RowLayout::Padded => align_up(data, alignment),
        };
        data.saturating_mul(self.buffers_per_row.max(1))
            .saturating_add(self.extra_bytes_per_row)
    }
}

/// Largest row count that fits one buffer; 0 when a single row does not fit
pub fn max_rows(budget: &ScratchBudget, row: &RowFootprint) -> u64 {
    let row_bytes = row.row_bytes(budget.alignment);
    if row_bytes == 0 {
        return 0;
    }
    let rows = budget.per_buffer() / row_bytes;
    if row.layout == RowLayout::Packed {
        let data = row.inner.saturating_mul(row.element_size).max(1);
        let granule = (budget.alignment / data).max(1);
        if rows >= granule {
            return rows - rows % granule;
        }
    }
    rows
}

/// Chunked ("split row") accounting when one row exceeds a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkPlan {
    /// Elements per chunk, a whole number of alignment blocks
    pub chunk_size: u64,
    pub chunk_count: u64,
    /// Elements in the final chunk; 0 when chunks tile the row exactly
    pub tail_chunk_size: u64,
}

/// Loop structure inside one core's share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubTilePlan {
    pub sub_tile_factor: u64,
    pub sub_tile_loop_count: u64,
    pub tail_sub_tile_size: u64,
    pub last_core_loop_count: u64,
    pub last_core_tail_sub_tile: u64,
    pub chunk: Option<ChunkPlan>,
}

impl SubTilePlan {
    fn empty() -> Self {
        Self {
            sub_tile_factor: 0,
            sub_tile_loop_count: 0,
            tail_sub_tile_size: 0,
            last_core_loop_count: 0,
            last_core_tail_sub_tile: 0,
            chunk: None,
        }
    }
}

/// Compute sub-tile factors for a core split.
///
/// Rows branch when at least one row fits; otherwise each row is streamed in
/// alignment-block chunks. Fails with a capacity error when not even one
/// block of one row fits.
pub fn plan_sub_tiles(
    budget: &ScratchBudget,
    row: &RowFootprint,
    split: &CoreSplit,
) -> TilingResult<SubTilePlan> {
    if split.block_factor == 0 || row.inner == 0 {
        return Ok(SubTilePlan::empty());
    }
    let block = split.block_factor;
    let last = split.last_core_share();

    let rows = max_rows(budget, row);
    if rows >= 1 {
        let factor = rows.min(block);
        return Ok(SubTilePlan {
            sub_tile_factor: factor,
            sub_tile_loop_count: block.div_ceil(factor),
            tail_sub_tile_size: block % factor,
            last_core_loop_count: last.div_ceil(factor),
            last_core_tail_sub_tile: last % factor,
            chunk: None,
        });
    }

    let chunk = plan_chunks(budget, row)?;
    Ok(SubTilePlan {
        sub_tile_factor: 1,
        sub_tile_loop_count: block,
        tail_sub_tile_size: 0,
        last_core_loop_count: last,
        last_core_tail_sub_tile: 0,
        chunk: Some(chunk),
    })
}

fn plan_chunks(budget: &ScratchBudget, row: &RowFootprint) -> TilingResult<ChunkPlan> {
    let element_bytes = row.element_size.saturating_mul(row.buffers_per_row.max(1)).max(1);
    let block_elems = (budget.alignment / row.element_size.max(1)).max(1);
    let room = budget.per_buffer().saturating_sub(row.extra_bytes_per_row);
    let mut chunk = room / element_bytes / block_elems * block_elems;

    if chunk == 0 {
        let one_block = block_elems
            .saturating_mul(element_bytes)
            .saturating_add(row.extra_bytes_per_row);
        return Err(capacity_error!(
            "scratch tier",
            one_block
                .saturating_mul(u64::from(budget.depth.max(1)))
                .saturating_add(budget.reserved_bytes),
            budget.tier_bytes
        ));
    }

    // avoid a final chunk shorter than one alignment block
    while chunk > block_elems && row.inner % chunk != 0 && row.inner % chunk < block_elems {
        chunk -= block_elems;
    }

    Ok(ChunkPlan {
        chunk_size: chunk,
        chunk_count: row.inner.div_ceil(chunk),
        tail_chunk_size: row.inner % chunk,
    })
}
