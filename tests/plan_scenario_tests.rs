//! End-to-end planning scenarios through [`Planner`]

mod common;

use common::*;
use tileforge::operand::{extract, OperandSpec, OperatorSpec, ShapeRelation};
use tileforge::partition::{
    partition, IterationSpace, MergedAxes, PartitionConfig, PartitionPlan, PartitionRequest,
};
use tileforge::pipeline::{OperatorCatalog, PlanStage};
use tileforge::strategy::{PlanContext, Rejection, StrategyRegistry, TilingStrategy};
use tileforge::tiling_data::{OperatorSection, TilingData};
use tileforge::{DType, PlatformCapability, Planner, TilingContext, TilingResult};

const PROBE_OP: &str = "Probe";

tileforge::tiling_data! {
    /// Section written by the probe strategies
    pub struct ProbeTilingData {
        numel: u64,
        chosen_priority: u32,
    }
}

fn probe_spec() -> OperatorSpec {
    OperatorSpec::new(PROBE_OP)
        .operand(OperandSpec::input("x"))
        .operand(OperandSpec::output("y").relate(ShapeRelation::SameShape("x")))
}

fn probe_partition(ctx: &PlanContext<'_>, template_base: u64) -> TilingResult<PartitionPlan> {
    let x = ctx.operand("x")?;
    let request = PartitionRequest::new(
        template_base,
        MergedAxes::flat(x.numel(), x.rank()),
        IterationSpace::elementwise(x.numel()),
        x.dtype,
    );
    partition(ctx.capability, ctx.config, &request)
}

fn probe_section(ctx: &PlanContext<'_>, priority: u32) -> TilingResult<OperatorSection> {
    Ok(OperatorSection::from_data(&ProbeTilingData {
        numel: ctx.operand("x")?.numel(),
        chosen_priority: priority,
    }))
}

/// High priority, never capable
struct Picky;

impl TilingStrategy for Picky {
    fn name(&self) -> &'static str {
        "Picky"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        false
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        probe_partition(ctx, 5_000_000)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        probe_section(ctx, 10_000)
    }
}

/// Low priority, always capable
struct Fallback;

impl TilingStrategy for Fallback {
    fn name(&self) -> &'static str {
        "Fallback"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        true
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        probe_partition(ctx, 5_100_000)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        probe_section(ctx, 5_000)
    }
}

fn picky() -> Box<dyn TilingStrategy> {
    Box::new(Picky)
}

fn fallback() -> Box<dyn TilingStrategy> {
    Box::new(Fallback)
}

fn probe_planner() -> Planner {
    let mut registry = StrategyRegistry::new();
    // registration order must not matter
    registry.register(PROBE_OP, fallback, 5_000);
    registry.register(PROBE_OP, picky, 10_000);
    let mut catalog = OperatorCatalog::new();
    catalog.insert(probe_spec());
    Planner::new(registry, catalog)
}

fn probe_ctx(shape: &[u64]) -> TilingContext {
    TilingContext::new(PROBE_OP)
        .with_input(shape, DType::Float32)
        .with_output(shape, DType::Float32)
}

#[test]
fn test_rank_nine_against_cap_of_eight_is_shape_error() {
    let shape = [2u64; 9];
    let ctx = reduce_ctx("ReduceSum", &shape, &[8], DType::Float32);
    let (result, stage) = Planner::with_builtin_operators().plan_traced(capability(), &ctx);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "ShapeError");
    assert!(err.is_invocation_error());
    assert_eq!(stage, PlanStage::Failed("ShapeError".to_string()));
}

#[test]
fn test_higher_priority_rejection_falls_through() {
    let planner = probe_planner();
    assert_eq!(
        planner.registry().strategies_for(PROBE_OP),
        vec![("Picky", 10_000), ("Fallback", 5_000)]
    );

    let ctx = probe_ctx(&[4096]);
    let spec = probe_spec();
    let extracted = extract(&ctx, &spec, 8).unwrap();
    let config = PartitionConfig::default();
    let plan_ctx = PlanContext::new(capability(), &extracted, &config);
    let selection = planner.registry().select(&plan_ctx).unwrap();

    assert_eq!(selection.strategy.name(), "Fallback");
    assert_eq!(selection.priority, 5_000);
    assert_eq!(
        selection.rejected,
        vec![Rejection {
            strategy: "Picky",
            priority: 10_000
        }]
    );

    let output = planner.plan(capability(), &ctx).unwrap();
    assert_eq!(output.strategy, "Fallback");
    assert_eq!(output.variant_key.value(), 5_102_000);
    let values = output
        .blob
        .decode_section(&ProbeTilingData::LAYOUT)
        .unwrap();
    let data = ProbeTilingData::from_values(&values).unwrap();
    assert_eq!(data.numel, 4096);
    assert_eq!(data.chosen_priority, 5_000);
}

#[test]
fn test_no_capable_strategy_names_every_rejection() {
    let mut registry = StrategyRegistry::new();
    registry.register(PROBE_OP, picky, 10_000);
    let mut catalog = OperatorCatalog::new();
    catalog.insert(probe_spec());
    let planner = Planner::new(registry, catalog);

    let (result, stage) = planner.plan_traced(capability(), &probe_ctx(&[64]));
    let err = result.unwrap_err();
    assert_eq!(err.kind(), "UnsupportedConfigurationError");
    assert!(err.allows_fallback());
    assert!(err.to_string().contains("Picky(10000)"));
    assert!(stage.is_failed());
}

#[test]
fn test_rms_norm_short_rows_batch_per_pass() {
    let ctx = rms_norm_ctx(&[64, 1024], DType::Float16);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    assert_eq!(output.strategy, "RmsNormMergeN");
    assert_eq!(output.launch_grid, 8);
    assert_eq!(output.plan.sub_tile_factor, 5);
    assert_eq!(output.variant_key.value(), 1_121_000);
    // system workspace plus the fixed user slot
    assert_eq!(output.workspace_bytes, 16 * 1024 * 1024 + 256);
}

#[test]
fn test_rms_norm_capacity_error_on_tiny_scratch() {
    let tiny = PlatformCapability::from_json_str(r#"{"CORE_NUM": 8, "UB_SIZE": 1100}"#).unwrap();
    let ctx = rms_norm_ctx(&[16, 256], DType::Float32);
    let (result, stage) = Planner::with_builtin_operators().plan_traced(&tiny, &ctx);

    let err = result.unwrap_err();
    assert_eq!(err.kind(), "CapacityError");
    assert!(err.allows_fallback());
    assert_eq!(stage, PlanStage::Failed("CapacityError".to_string()));
}

#[test]
fn test_reduce_long_rows_use_group_split_workspace() {
    let ctx = reduce_ctx("ReduceSum", &[2, 1_000_000], &[-1], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    assert_eq!(output.strategy, "ReduceGroupSplit");
    assert!(output.plan.is_chunked());
    assert_eq!(output.variant_key.value(), 2_122_100);
    assert_eq!(output.workspace.user_bytes, 8_000_000);
    assert_eq!(output.workspace_bytes, 16 * 1024 * 1024 + 8_000_000);

    let header = output.blob.header().unwrap();
    assert_eq!(header.user_workspace_bytes, 8_000_000);
    assert_eq!(header.chunk_size, 12_216);
}

#[test]
fn test_reduce_dtype_mismatch_is_dtype_error() {
    let ctx = TilingContext::new("ReduceMean")
        .with_input(&[8, 8], DType::Float32)
        .with_output(&[8], DType::Float16)
        .with_attr("axes", vec![1i64]);
    let err = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap_err();
    assert_eq!(err.kind(), "DtypeError");
}

#[test]
fn test_reverse_sequence_strategies_by_layout() {
    let planner = Planner::with_builtin_operators();

    let bsa = planner
        .plan(capability(), &reverse_sequence_ctx(&[4, 100, 64], 1, 0, DType::Float16))
        .unwrap();
    assert_eq!(bsa.strategy, "ReverseSequenceBsa");
    assert_eq!(bsa.variant_key.value(), 3_041_010);

    let simt = planner
        .plan(capability(), &reverse_sequence_ctx(&[100, 4, 8], 0, 1, DType::Float32))
        .unwrap();
    assert_eq!(simt.strategy, "ReverseSequenceSimt");
    assert_eq!(simt.variant_key.value(), 3_102_000);
}

#[test]
fn test_adam_w_elementwise_split() {
    let ctx = adam_w_ctx(&[1024, 1024], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    assert_eq!(output.strategy, "ApplyAdamWElementwise");
    assert_eq!(output.plan.block_factor, 131_072);
    assert_eq!(output.plan.sub_tile_factor, 6112);
    assert_eq!(output.variant_key.value(), 4_002_000);
    assert_eq!(output.workspace.user_bytes, 0);
}

#[test]
fn test_single_core_platform_sets_single_core_digit() {
    let ctx = adam_w_ctx(&[1024, 1024], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(&SINGLE_CORE_CAPABILITY, &ctx)
        .unwrap();
    assert_eq!(output.launch_grid, 1);
    assert_eq!(output.variant_key.value(), 4_002_001);
    assert_eq!(output.plan.last_core_share(), 1 << 20);
}

#[test]
fn test_more_elements_never_use_fewer_cores() {
    let wide = PlatformCapability::from_json_str(r#"{"CORE_NUM": 48, "UB_SIZE": 196608}"#).unwrap();
    let planner = Planner::with_builtin_operators();

    let even = planner
        .plan(&wide, &adam_w_ctx(&[2304], DType::Float32))
        .unwrap();
    assert_eq!(even.launch_grid, 48);
    assert_eq!(even.plan.block_factor, 48);

    let uneven = planner
        .plan(&wide, &adam_w_ctx(&[2305], DType::Float32))
        .unwrap();
    assert_eq!(uneven.launch_grid, 48);
    assert_eq!(uneven.plan.block_factor, 48);
    assert_eq!(uneven.plan.last_core_share(), 49);
    assert_eq!(uneven.blob.header().unwrap().tail_block_factor, 49);
}

#[test]
fn test_dump_shows_actual_group_order() {
    let planner = Planner::with_builtin_operators();

    let rara = planner
        .plan(capability(), &reduce_ctx("ReduceSum", &[2, 3, 4, 5], &[0, 2], DType::Float32))
        .unwrap();
    assert!(rara.plan.dump().contains("merged_axes             = RARA [2, 3, 4, 5]"));

    let arar = planner
        .plan(capability(), &reduce_ctx("ReduceSum", &[2, 3, 4, 5], &[1, 3], DType::Float32))
        .unwrap();
    assert!(arar.plan.dump().contains("merged_axes             = ARAR [2, 3, 4, 5]"));
}
