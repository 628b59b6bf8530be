//! Host-side stand-in for the device kernel dispatcher
//!
//! Decodes a [`TilingBlob`] by position exactly as the device does, picks a
//! routine from the variant key and runs every lane of the launch grid on
//! the host. Used to check that a plan covers its iteration space.

use crate::error::{TilingError, TilingResult};
use crate::partition::VariantKeyFields;
use crate::tiling_data::{FieldValue, PlanHeader, TilingBlob, TilingLayout};
use serde::Serialize;

/// One lane's share of the iteration space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LaneAssignment {
    pub lane: u32,
    /// First row of this lane
    pub start: u64,
    pub len: u64,
    pub sub_tile_loops: u64,
    /// Rows in the final sub-tile pass; 0 when passes are uniform
    pub tail_sub_tile: u64,
}

/// Blob contents as the device sees them
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLaunch {
    pub header: PlanHeader,
    pub key: VariantKeyFields,
    pub section: Vec<FieldValue>,
}

/// A compiled compute routine selected by variant key
pub trait KernelRoutine: Send + Sync {
    fn name(&self) -> &'static str;

    fn accepts(&self, key: &VariantKeyFields) -> bool;

    fn run_lane(&self, launch: &DecodedLaunch, lane: &LaneAssignment) -> TilingResult<()>;
}

/// What a dispatch ran
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub routine: &'static str,
    pub lanes: Vec<LaneAssignment>,
}

impl DispatchReport {
    /// Rows touched by all lanes together
    pub fn rows_covered(&self) -> u64 {
        self.lanes.iter().map(|l| l.len).sum()
    }
}

/// Lane assignments implied by a header
pub fn lanes(header: &PlanHeader) -> Vec<LaneAssignment> {
    let grid = header.used_core_count;
    (0..grid)
        .map(|lane| {
            let last = lane + 1 == grid;
            let (len, sub_tile_loops, tail_sub_tile) = if last {
                (
                    header.last_core_share(),
                    header.last_core_loop_count,
                    header.last_core_tail_sub_tile,
                )
            } else {
                (
                    header.block_factor,
                    header.sub_tile_loop_count,
                    header.tail_sub_tile_size,
                )
            };
            LaneAssignment {
                lane,
                start: u64::from(lane).saturating_mul(header.block_factor),
                len,
                sub_tile_loops,
                tail_sub_tile,
            }
        })
        .collect()
}

/// Routines for one operator section layout
pub struct KernelDispatcher {
    section: TilingLayout,
    routines: Vec<Box<dyn KernelRoutine>>,
}

impl KernelDispatcher {
    pub fn new(section: TilingLayout) -> Self {
        Self {
            section,
            routines: Vec::new(),
        }
    }

    /// Routines are matched in registration order
    pub fn register(&mut self, routine: Box<dyn KernelRoutine>) {
        self.routines.push(routine);
    }

    pub fn decode(&self, blob: &TilingBlob) -> TilingResult<DecodedLaunch> {
        let header = blob.header()?;
        if header.variant_key != blob.variant_key.value() {
            return Err(TilingError::Internal(format!(
                "blob key {} disagrees with header key {}",
                blob.variant_key, header.variant_key
            )));
        }
        if header.used_core_count != blob.launch_grid {
            return Err(TilingError::Internal(format!(
                "launch grid {} disagrees with header core count {}",
                blob.launch_grid, header.used_core_count
            )));
        }
        Ok(DecodedLaunch {
            key: blob.variant_key.decode()?,
            section: blob.decode_section(&self.section)?,
            header,
        })
    }

    pub fn dispatch(&self, blob: &TilingBlob) -> TilingResult<DispatchReport> {
        let launch = self.decode(blob)?;
        let routine = self
            .routines
            .iter()
            .find(|r| r.accepts(&launch.key))
            .ok_or_else(|| TilingError::UnsupportedConfiguration {
                op: self.section.name.to_string(),
                detail: format!("no kernel routine for variant key {}", blob.variant_key),
            })?;

        let lanes = lanes(&launch.header);
        for lane in &lanes {
            routine.run_lane(&launch, lane)?;
        }
        Ok(DispatchReport {
            routine: routine.name(),
            lanes,
        })
    }
}
