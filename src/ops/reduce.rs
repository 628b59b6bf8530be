//! ReduceSum / ReduceMean tiling
//!
//! Both operators share the operand contract and the strategies; only the
//! mean factor in the operator section differs.

use crate::error::TilingResult;
use crate::operand::{
    AttrKind, AttrValue, AttributeSpec, DType, OperandSpec, OperatorSpec, ShapeRelation,
};
use crate::partition::{
    merge_axes, normalize_axes, partition, AxisGroup, AxisKind, IterationSpace, MergedAxes,
    PartitionPlan, PartitionRequest, RowLayout,
};
use crate::strategy::{PlanContext, StrategyRegistry, TilingStrategy};
use crate::tiling_data;
use crate::tiling_data::OperatorSection;
use crate::workspace::UserWorkspace;

pub const REDUCE_SUM: &str = "ReduceSum";
pub const REDUCE_MEAN: &str = "ReduceMean";

pub const FULL_LOAD_TEMPLATE: u64 = 2_000_000;
pub const GROUP_SPLIT_TEMPLATE: u64 = 2_100_000;

const FULL_LOAD_PRIORITY: i64 = 1000;
const GROUP_SPLIT_PRIORITY: i64 = 500;

/// fp32 accumulator slot per row
const ACCUMULATOR_BYTES_PER_ROW: u64 = 32;

const REDUCE_DTYPES: &[DType] = &[DType::Float16, DType::BFloat16, DType::Float32, DType::Int32];

tiling_data! {
    /// Reduce operator section
    pub struct ReduceTilingData {
        outer: u64,
        reduce: u64,
        inner_a: u64,
        combine_type: u32,
        mean_factor: f32,
    }
}

pub fn operator_spec(op: &'static str) -> OperatorSpec {
    OperatorSpec::new(op)
        .operand(OperandSpec::input("x").rank(1, 8).dtypes(REDUCE_DTYPES))
        .operand(
            OperandSpec::output("y")
                .dtypes(REDUCE_DTYPES)
                .relate(ShapeRelation::SameDtype { of: "x", or: None })
                .relate(ShapeRelation::ReducedFrom {
                    of: "x",
                    axes_attr: "axes",
                    keep_dims_attr: "keep_dims",
                }),
        )
        .attribute(AttributeSpec::with_default(
            "axes",
            AttrKind::IntList,
            AttrValue::IntList(Vec::new()),
        ))
        .attribute(AttributeSpec::with_default(
            "keep_dims",
            AttrKind::Bool,
            AttrValue::Bool(false),
        ))
}

pub fn register(registry: &mut StrategyRegistry) {
    for op in [REDUCE_SUM, REDUCE_MEAN] {
        registry.register(op, full_load, FULL_LOAD_PRIORITY);
        registry.register(op, group_split, GROUP_SPLIT_PRIORITY);
    }
}

fn full_load() -> Box<dyn TilingStrategy> {
    Box::new(ReduceFullLoad)
}

fn group_split() -> Box<dyn TilingStrategy> {
    Box::new(ReduceGroupSplit)
}

fn merged_axes(ctx: &PlanContext<'_>) -> TilingResult<MergedAxes> {
    let x = ctx.operand("x")?;
    let axes = normalize_axes(&ctx.attrs().int_list("axes")?, x.rank(), "axes")?;
    merge_axes(ctx.op(), &x.shape, &axes, ctx.config.max_merged_dims)
}

fn request(ctx: &PlanContext<'_>, template_base: u64) -> TilingResult<PartitionRequest> {
    let x = ctx.operand("x")?;
    let merged = merged_axes(ctx)?;
    let space = IterationSpace::from_merged(&merged, RowLayout::Padded);
    // input row plus one fp32 working row, counted in input-sized slots
    let buffers = 1 + DType::Float32.size_bytes() / x.element_size;
    Ok(PartitionRequest::new(template_base, merged, space, x.dtype)
        .with_buffers_per_row(buffers)
        .with_extra_bytes_per_row(ACCUMULATOR_BYTES_PER_ROW))
}

fn section(ctx: &PlanContext<'_>, plan: &PartitionPlan) -> TilingResult<OperatorSection> {
    let merged = &plan.merged_axes;
    let last_reduced = merged
        .groups
        .iter()
        .rposition(|g| g.kind == AxisKind::Reduced);
    let product = |range: &[AxisGroup]| {
        range
            .iter()
            .filter(|g| g.kind == AxisKind::Preserved)
            .fold(1u64, |acc, g| acc.saturating_mul(g.size))
    };
    let (outer, inner_a) = match last_reduced {
        Some(i) => (
            product(&merged.groups[..i]),
            product(&merged.groups[i + 1..]),
        ),
        None => (merged.preserved_size(), 1),
    };
    let reduce = merged.reduced_size();
    let mean_factor = if ctx.op() == REDUCE_MEAN && reduce > 0 {
        1.0 / reduce as f32
    } else {
        1.0
    };
    Ok(OperatorSection::from_data(&ReduceTilingData {
        outer,
        reduce,
        inner_a,
        combine_type: merged.combine.code() as u32,
        mean_factor,
    }))
}

/// Whole reduced rows resident in scratch
pub struct ReduceFullLoad;

impl TilingStrategy for ReduceFullLoad {
    fn name(&self) -> &'static str {
        "ReduceFullLoad"
    }

    fn is_capable(&self, ctx: &PlanContext<'_>) -> bool {
        request(ctx, FULL_LOAD_TEMPLATE)
            .map(|r| r.row_fits(ctx.capability, ctx.config))
            .unwrap_or(false)
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        partition(ctx.capability, ctx.config, &request(ctx, FULL_LOAD_TEMPLATE)?)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        section(ctx, plan)
    }
}

/// Rows streamed in chunks with fp32 partial sums in workspace
pub struct ReduceGroupSplit;

impl TilingStrategy for ReduceGroupSplit {
    fn name(&self) -> &'static str {
        "ReduceGroupSplit"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        true
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        partition(ctx.capability, ctx.config, &request(ctx, GROUP_SPLIT_TEMPLATE)?)
    }

    fn workspace(&self, _ctx: &PlanContext<'_>, _plan: &PartitionPlan) -> UserWorkspace {
        UserWorkspace::PerCore {
            buffers: 1,
            element_size: DType::Float32.size_bytes(),
            double_buffered: false,
        }
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        section(ctx, plan)
    }
}
