//! RmsNorm tiling
//!
//! `y = x / sqrt(mean(x^2, last dims) + epsilon) * gamma`, normalised over
//! the trailing dims covered by `gamma`. Rows are the leading dims of `x`.
//!
//! Two strategies:
//! - `RmsNormMergeN` packs many short rows into one scratch pass
//! - `RmsNormGeneral` handles any row length, streaming long rows in chunks

use crate::error::{attr_err, TilingResult};
use crate::operand::{
    element_count, AttrKind, AttrValue, AttributeSpec, DType, Extracted, OperandSpec,
    OperatorSpec, ShapeRelation,
};
use crate::partition::{
    merge_axes, partition, IterationSpace, PartitionPlan, PartitionRequest, RowLayout,
};
use crate::platform::align_up;
use crate::strategy::{PlanContext, StrategyRegistry, TilingStrategy};
use crate::tiling_data;
use crate::tiling_data::OperatorSection;
use crate::workspace::UserWorkspace;

pub const OP_NAME: &str = "RmsNorm";

pub const GENERAL_TEMPLATE: u64 = 1_000_000;
pub const MERGE_N_TEMPLATE: u64 = 1_100_000;

const MERGE_N_PRIORITY: i64 = 200;
const GENERAL_PRIORITY: i64 = 100;

/// Widest aligned row MergeN still packs
const SMALL_REDUCE_NUM: u64 = 2000;
const MERGE_N_SOC: &str = "Ascend910B";
/// Scratch bytes per aligned column in MergeN (x, y, gamma, fp32 staging)
const MERGE_N_BYTES_PER_COL: u64 = 16;
/// Per-row rstd slot, one alignment block
const RSTD_BYTES_PER_ROW: u64 = 32;
const USER_WORKSPACE_BYTES: u64 = 256;

tiling_data! {
    /// RmsNorm operator section
    pub struct RmsNormTilingData {
        num_row: u64,
        num_col: u64,
        num_col_align: u64,
        epsilon: f32,
        avg_factor: f32,
        is_mix_dtype: u32,
    }
}

pub fn operator_spec() -> OperatorSpec {
    OperatorSpec::new(OP_NAME)
        .operand(
            OperandSpec::input("x")
                .rank(1, 8)
                .dtypes(DType::FLOATS)
                .non_empty(),
        )
        .operand(
            OperandSpec::input("gamma")
                .rank(1, 8)
                .dtypes(DType::FLOATS)
                .relate(ShapeRelation::TrailingDims("x"))
                .relate(ShapeRelation::SameDtype {
                    of: "x",
                    or: Some(DType::Float32),
                }),
        )
        .operand(
            OperandSpec::output("y")
                .dtypes(DType::FLOATS)
                .relate(ShapeRelation::SameShape("x"))
                .relate(ShapeRelation::SameDtype { of: "x", or: None }),
        )
        .operand(
            OperandSpec::output("rstd")
                .optional()
                .dtypes(&[DType::Float32])
                .relate(ShapeRelation::LeadingDimsOrOne("x")),
        )
        .attribute(AttributeSpec::with_default(
            "epsilon",
            AttrKind::Float,
            AttrValue::Float(1e-6),
        ))
        .validator(validate)
}

fn validate(extracted: &Extracted) -> TilingResult<()> {
    let epsilon = extracted.attrs.float("epsilon")?;
    if !(epsilon >= 0.0) {
        return Err(attr_err("epsilon", ">= 0", epsilon));
    }
    Ok(())
}

pub fn register(registry: &mut StrategyRegistry) {
    registry.register(OP_NAME, merge_n, MERGE_N_PRIORITY);
    registry.register(OP_NAME, general, GENERAL_PRIORITY);
}

fn merge_n() -> Box<dyn TilingStrategy> {
    Box::new(RmsNormMergeN)
}

fn general() -> Box<dyn TilingStrategy> {
    Box::new(RmsNormGeneral)
}

/// Row geometry shared by both strategies
#[derive(Debug, Clone, Copy)]
struct Geometry {
    dtype: DType,
    lead_rank: usize,
    num_row: u64,
    num_col: u64,
    num_col_align: u64,
    is_mix_dtype: bool,
}

impl Geometry {
    fn of(ctx: &PlanContext<'_>) -> TilingResult<Self> {
        let x = ctx.operand("x")?;
        let gamma = ctx.operand("gamma")?;
        let lead_rank = x.rank().saturating_sub(gamma.rank());
        let num_col = gamma.numel();
        let block = ctx.capability.block_elements(x.element_size);
        Ok(Self {
            dtype: x.dtype,
            lead_rank,
            num_row: element_count(&x.shape[..lead_rank]),
            num_col,
            num_col_align: align_up(num_col, block),
            is_mix_dtype: gamma.dtype == DType::Float32 && x.dtype != DType::Float32,
        })
    }

    fn request(&self, ctx: &PlanContext<'_>, template_base: u64) -> TilingResult<PartitionRequest> {
        let x = ctx.operand("x")?;
        let reduced: Vec<usize> = (self.lead_rank..x.rank()).collect();
        let merged = merge_axes(ctx.op(), &x.shape, &reduced, ctx.config.max_merged_dims)?;
        let space = IterationSpace {
            total: self.num_row,
            inner: self.num_col,
            layout: RowLayout::Padded,
        };
        Ok(PartitionRequest::new(template_base, merged, space, self.dtype)
            .with_extra_bytes_per_row(RSTD_BYTES_PER_ROW))
    }

    fn section(&self, ctx: &PlanContext<'_>) -> TilingResult<OperatorSection> {
        let epsilon = ctx.attrs().float("epsilon")?;
        let avg_factor = if self.num_col == 0 {
            0.0
        } else {
            1.0 / self.num_col as f32
        };
        Ok(OperatorSection::from_data(&RmsNormTilingData {
            num_row: self.num_row,
            num_col: self.num_col,
            num_col_align: self.num_col_align,
            epsilon: epsilon as f32,
            avg_factor,
            is_mix_dtype: u32::from(self.is_mix_dtype),
        }))
    }
}

/// Many short rows per pass
pub struct RmsNormMergeN;

impl RmsNormMergeN {
    fn request(&self, ctx: &PlanContext<'_>, geo: &Geometry) -> TilingResult<PartitionRequest> {
        let buffers = (MERGE_N_BYTES_PER_COL / geo.dtype.size_bytes()).max(1);
        Ok(geo
            .request(ctx, MERGE_N_TEMPLATE)?
            .with_buffers_per_row(buffers))
    }
}

impl TilingStrategy for RmsNormMergeN {
    fn name(&self) -> &'static str {
        "RmsNormMergeN"
    }

    fn is_capable(&self, ctx: &PlanContext<'_>) -> bool {
        let Ok(geo) = Geometry::of(ctx) else {
            return false;
        };
        if geo.num_col_align > SMALL_REDUCE_NUM || ctx.capability.soc_version != MERGE_N_SOC {
            return false;
        }
        self.request(ctx, &geo)
            .map(|request| request.row_fits(ctx.capability, ctx.config))
            .unwrap_or(false)
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        let geo = Geometry::of(ctx)?;
        partition(ctx.capability, ctx.config, &self.request(ctx, &geo)?)
    }

    fn workspace(&self, _ctx: &PlanContext<'_>, _plan: &PartitionPlan) -> UserWorkspace {
        UserWorkspace::Fixed(USER_WORKSPACE_BYTES)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        Geometry::of(ctx)?.section(ctx)
    }
}

/// Any row length; rows that exceed one pass are split along D
pub struct RmsNormGeneral;

impl TilingStrategy for RmsNormGeneral {
    fn name(&self) -> &'static str {
        "RmsNormGeneral"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        true
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        let geo = Geometry::of(ctx)?;
        // x, y, gamma plus the fp32 accumulator in units of x elements
        let buffers = 3 + (DType::Float32.size_bytes() / geo.dtype.size_bytes()).max(1);
        let request = geo
            .request(ctx, GENERAL_TEMPLATE)?
            .with_buffers_per_row(buffers)
            .single_buffered();
        partition(ctx.capability, ctx.config, &request)
    }

    fn workspace(&self, _ctx: &PlanContext<'_>, _plan: &PartitionPlan) -> UserWorkspace {
        UserWorkspace::Fixed(USER_WORKSPACE_BYTES)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        Geometry::of(ctx)?.section(ctx)
    }
}
