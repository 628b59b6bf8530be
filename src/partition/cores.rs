//! Core assignment: split the outer iteration space across compute units

use serde::Serialize;

/// Per-core share of the iteration space
///
/// `tail_block_factor` is 0 when every used core gets `block_factor` rows
/// (uniform split or single core); otherwise it is the last core's share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoreSplit {
    pub used_core_count: u32,
    pub block_factor: u64,
    pub tail_block_factor: u64,
}

impl CoreSplit {
    pub fn single(total: u64) -> Self {
        Self {
            used_core_count: 1,
            block_factor: total,
            tail_block_factor: 0,
        }
    }

    /// Rows handled by the last used core
    pub fn last_core_share(&self) -> u64 {
        if self.tail_block_factor == 0 {
            self.block_factor
        } else {
            self.tail_block_factor
        }
    }

    /// Largest share any single core receives
    pub fn max_share(&self) -> u64 {
        self.block_factor.max(self.last_core_share())
    }

    /// Rows covered by all used cores together
    pub fn covered(&self) -> u64 {
        self.block_factor
            .saturating_mul(u64::from(self.used_core_count.saturating_sub(1)))
            .saturating_add(self.last_core_share())
    }
}

/// Distribute `total` rows of `inner` elements each over at most `cores` units.
///
/// Work below `min_parallel_work` elements stays on one core. `block_align`
/// rounds the per-core block to a multiple of that many rows (packed layouts
/// split on alignment-block boundaries); pass 1 for no rounding.
///
/// The used core count is `min(cores, ceil(total / block_align))`, so it never
/// drops as `total` grows. Blocks are the ceiling share when that still spans
/// exactly the used cores; otherwise they are the floor share and the last
/// core takes the remainder, which may then exceed `block_factor`.
pub fn split_cores(
    total: u64,
    inner: u64,
    cores: u32,
    block_align: u64,
    min_parallel_work: u64,
) -> CoreSplit {
    if total == 0 || inner == 0 {
        return CoreSplit::single(0);
    }
    let work = total.saturating_mul(inner);
    let cores = u64::from(cores.max(1));
    if work < min_parallel_work || cores == 1 {
        return CoreSplit::single(total);
    }

    let align = block_align.max(1);
    let units = total.div_ceil(align);
    let used = units.min(cores);
    if used == 1 {
        return CoreSplit::single(total);
    }

    let ceil_block = units.div_ceil(used).saturating_mul(align);
    let block = if (used - 1).saturating_mul(ceil_block) < total {
        ceil_block
    } else {
        // units >= used, so at least one alignment block per core
        (units / used).saturating_mul(align)
    };
    let last = total - (used - 1) * block;

    CoreSplit {
        // used <= cores, which came from a u32
        used_core_count: used as u32,
        block_factor: block,
        tail_block_factor: if last == block { 0 } else { last },
    }
}
