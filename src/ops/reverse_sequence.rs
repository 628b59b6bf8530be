//! ReverseSequence tiling
//!
//! Reverses the first `seq_lengths[b]` entries along `seq_dim` for every
//! batch entry `b` along `batch_dim`. Data is only moved, never combined, so
//! the inner run may be repacked into wider units.

use crate::error::{attr_err, TilingResult};
use crate::operand::{
    element_count, AttrKind, AttrValue, AttributeSpec, DType, Extracted, OperandSpec,
    OperatorSpec, ShapeRelation,
};
use crate::partition::{
    merge_axes, normalize_axis, partition, IterationSpace, MergedAxes, PartitionPlan,
    PartitionRequest, RowLayout,
};
use crate::strategy::{PlanContext, StrategyRegistry, TilingStrategy};
use crate::tiling_data;
use crate::tiling_data::OperatorSection;

pub const OP_NAME: &str = "ReverseSequence";

pub const BSA_TEMPLATE: u64 = 3_000_000;
pub const SIMT_TEMPLATE: u64 = 3_100_000;

const BSA_PRIORITY: i64 = 10_000;
const SIMT_PRIORITY: i64 = 5_000;

/// Widest element the BSA template moves
const BSA_MAX_ELEMENT_BYTES: u64 = 8;

pub const SPLIT_NONE: u32 = 0;
pub const SPLIT_A: u32 = 1;
pub const SPLIT_S: u32 = 2;
pub const SPLIT_B: u32 = 3;

pub const GATHER_S: u32 = 0;
pub const GATHER_B: u32 = 1;
pub const NOT_GATHER: u32 = 1001;

tiling_data! {
    /// ReverseSequence operator section
    pub struct ReverseSequenceTilingData {
        batch_size: u64,
        seq_size: u64,
        inner_size: u64,
        dtype_size: u32,
        split_mode: u32,
        gather_mode: u32,
    }
}

pub fn operator_spec() -> OperatorSpec {
    OperatorSpec::new(OP_NAME)
        .operand(OperandSpec::input("x").rank(2, 8))
        .operand(
            OperandSpec::input("seq_lengths")
                .rank(1, 1)
                .dtypes(&[DType::Int32, DType::Int64])
                .relate(ShapeRelation::DimEquals {
                    of: "x",
                    dim_attr: "batch_dim",
                }),
        )
        .operand(
            OperandSpec::output("y")
                .relate(ShapeRelation::SameShape("x"))
                .relate(ShapeRelation::SameDtype { of: "x", or: None }),
        )
        .attribute(AttributeSpec::required("seq_dim", AttrKind::Int))
        .attribute(AttributeSpec::with_default(
            "batch_dim",
            AttrKind::Int,
            AttrValue::Int(0),
        ))
        .validator(validate)
}

fn validate(extracted: &Extracted) -> TilingResult<()> {
    let rank = extracted.operand("x")?.rank();
    let seq_dim = normalize_axis(extracted.attrs.int("seq_dim")?, rank, "seq_dim")?;
    let batch_dim = normalize_axis(extracted.attrs.int("batch_dim")?, rank, "batch_dim")?;
    if seq_dim == batch_dim {
        return Err(attr_err(
            "batch_dim",
            format!("different from seq_dim {seq_dim}"),
            batch_dim,
        ));
    }
    Ok(())
}

pub fn register(registry: &mut StrategyRegistry) {
    registry.register(OP_NAME, bsa, BSA_PRIORITY);
    registry.register(OP_NAME, simt, SIMT_PRIORITY);
}

fn bsa() -> Box<dyn TilingStrategy> {
    Box::new(ReverseSequenceBsa)
}

fn simt() -> Box<dyn TilingStrategy> {
    Box::new(ReverseSequenceSimt)
}

#[derive(Debug, Clone, Copy)]
struct Dims {
    seq_dim: usize,
    batch_dim: usize,
}

impl Dims {
    fn of(ctx: &PlanContext<'_>) -> TilingResult<Self> {
        let rank = ctx.operand("x")?.rank();
        Ok(Self {
            seq_dim: normalize_axis(ctx.attrs().int("seq_dim")?, rank, "seq_dim")?,
            batch_dim: normalize_axis(ctx.attrs().int("batch_dim")?, rank, "batch_dim")?,
        })
    }

    /// `batch_dim` precedes `seq_dim` and every other leading dim is 1, so
    /// the shape folds to `[B, S, A]` with `B` matching `seq_lengths`
    fn folds_to_bsa(&self, shape: &[u64]) -> bool {
        self.batch_dim < self.seq_dim
            && shape[..self.seq_dim]
                .iter()
                .enumerate()
                .all(|(dim, size)| dim == self.batch_dim || *size == 1)
    }
}

/// Rows of `[B, S, A]` with a contiguous inner `A` run
pub struct ReverseSequenceBsa;

impl ReverseSequenceBsa {
    fn request(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionRequest> {
        let x = ctx.operand("x")?;
        let dims = Dims::of(ctx)?;
        let merged = merge_axes(ctx.op(), &x.shape, &[dims.seq_dim], ctx.config.max_merged_dims)?;
        let batch = x.shape[dims.batch_dim];
        let space = IterationSpace {
            total: batch.saturating_mul(x.shape[dims.seq_dim]),
            inner: element_count(&x.shape[dims.seq_dim + 1..]),
            layout: RowLayout::Padded,
        };
        // x and y rows
        Ok(PartitionRequest::new(BSA_TEMPLATE, merged, space, x.dtype)
            .commutative()
            .with_buffers_per_row(2))
    }
}

impl TilingStrategy for ReverseSequenceBsa {
    fn name(&self) -> &'static str {
        "ReverseSequenceBsa"
    }

    fn is_capable(&self, ctx: &PlanContext<'_>) -> bool {
        let (Ok(x), Ok(dims)) = (ctx.operand("x"), Dims::of(ctx)) else {
            return false;
        };
        dims.folds_to_bsa(&x.shape) && x.element_size <= BSA_MAX_ELEMENT_BYTES
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        partition(ctx.capability, ctx.config, &self.request(ctx)?)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        let x = ctx.operand("x")?;
        let dims = Dims::of(ctx)?;
        let seq_size = x.shape[dims.seq_dim];
        let batch_size = x.shape[dims.batch_dim];

        let split_mode = if plan.is_chunked() {
            SPLIT_A
        } else if seq_size > 0 && plan.block_factor % seq_size == 0 {
            SPLIT_B
        } else {
            SPLIT_S
        };
        let row_bytes = plan.promoted_inner.saturating_mul(plan.promoted_dtype_size);
        let gather_mode = if row_bytes >= ctx.capability.alignment_bytes {
            NOT_GATHER
        } else if plan.promoted_inner == 1 {
            GATHER_S
        } else {
            GATHER_B
        };

        Ok(OperatorSection::from_data(&ReverseSequenceTilingData {
            batch_size,
            seq_size,
            inner_size: plan.promoted_inner,
            dtype_size: plan.promoted_dtype_size as u32,
            split_mode,
            gather_mode,
        }))
    }
}

/// One element per lane; any axis order
pub struct ReverseSequenceSimt;

impl TilingStrategy for ReverseSequenceSimt {
    fn name(&self) -> &'static str {
        "ReverseSequenceSimt"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        true
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        let x = ctx.operand("x")?;
        let request = PartitionRequest::new(
            SIMT_TEMPLATE,
            MergedAxes::flat(x.numel(), x.rank()),
            IterationSpace::elementwise(x.numel()),
            x.dtype,
        )
        .with_buffers_per_row(2);
        partition(ctx.capability, ctx.config, &request)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        let x = ctx.operand("x")?;
        let dims = Dims::of(ctx)?;
        Ok(OperatorSection::from_data(&ReverseSequenceTilingData {
            batch_size: x.shape[dims.batch_dim],
            seq_size: x.shape[dims.seq_dim],
            inner_size: 1,
            dtype_size: x.element_size as u32,
            split_mode: SPLIT_NONE,
            gather_mode: GATHER_S,
        }))
    }
}
