//! Planning pipeline
//!
//! One call to [`Planner::plan`] walks a single invocation through
//! extraction, strategy selection, partitioning, workspace sizing and
//! serialization. Every stage fails fast; no partial blob is ever returned.

pub mod stage;

pub use stage::PlanStage;

use crate::error::{TilingError, TilingResult};
use crate::logging::PLAN_TARGET;
use crate::operand::{extract, OperatorSpec, TilingContext};
use crate::partition::{PartitionConfig, PartitionPlan, VariantKey};
use crate::platform::PlatformCapability;
use crate::strategy::{PlanContext, StrategyRegistry};
use crate::tiling_data::{serialize, TilingBlob};
use crate::workspace::{self, WorkspaceRequest};
use std::collections::BTreeMap;
use tracing::{debug, debug_span, warn};

/// Operand and attribute contracts by operator name
#[derive(Debug, Clone, Default)]
pub struct OperatorCatalog {
    specs: BTreeMap<String, OperatorSpec>,
}

impl OperatorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtin_operators() -> Self {
        let mut catalog = Self::new();
        for spec in crate::ops::operator_specs() {
            catalog.insert(spec);
        }
        catalog
    }

    /// Add or replace an operator contract
    pub fn insert(&mut self, spec: OperatorSpec) {
        self.specs.insert(spec.op.to_string(), spec);
    }

    pub fn get(&self, op: &str) -> Option<&OperatorSpec> {
        self.specs.get(op)
    }

    pub fn operators(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }
}

/// Everything the caller needs to launch the kernel
#[derive(Debug, Clone)]
pub struct PlanOutput {
    pub blob: TilingBlob,
    pub variant_key: VariantKey,
    pub launch_grid: u32,
    pub workspace_bytes: u64,
    pub workspace: WorkspaceRequest,
    pub strategy: &'static str,
    pub plan: PartitionPlan,
}

/// Registry, contracts and tuning constants for planning
pub struct Planner {
    registry: StrategyRegistry,
    catalog: OperatorCatalog,
    config: PartitionConfig,
}

impl Planner {
    pub fn new(registry: StrategyRegistry, catalog: OperatorCatalog) -> Self {
        Self {
            registry,
            catalog,
            config: PartitionConfig::default(),
        }
    }

    pub fn with_builtin_operators() -> Self {
        Self::new(
            StrategyRegistry::with_builtin_operators(),
            OperatorCatalog::with_builtin_operators(),
        )
    }

    pub fn with_config(mut self, config: PartitionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut StrategyRegistry {
        &mut self.registry
    }

    pub fn catalog(&self) -> &OperatorCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut OperatorCatalog {
        &mut self.catalog
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Plan one invocation
    pub fn plan(
        &self,
        capability: &PlatformCapability,
        ctx: &TilingContext,
    ) -> TilingResult<PlanOutput> {
        self.plan_traced(capability, ctx).0
    }

    /// Plan one invocation and report the stage it ended in
    pub fn plan_traced(
        &self,
        capability: &PlatformCapability,
        ctx: &TilingContext,
    ) -> (TilingResult<PlanOutput>, PlanStage) {
        let span = debug_span!(target: PLAN_TARGET, "plan", op = %ctx.op);
        let _enter = span.enter();

        let mut stage = PlanStage::Idle;
        let result = self.run(capability, ctx, &mut stage);
        if let Err(ref e) = result {
            warn!(
                target: PLAN_TARGET,
                op = %ctx.op,
                stage = %stage,
                kind = e.kind(),
                error = %e,
                "planning failed"
            );
            stage.fail(e.kind());
        }
        (result, stage)
    }

    fn run(
        &self,
        capability: &PlatformCapability,
        ctx: &TilingContext,
        stage: &mut PlanStage,
    ) -> TilingResult<PlanOutput> {
        self.config.validate()?;
        let spec = self
            .catalog
            .get(&ctx.op)
            .ok_or_else(|| TilingError::UnsupportedConfiguration {
                op: ctx.op.clone(),
                detail: "unknown operator".to_string(),
            })?;

        let extracted = extract(ctx, spec, self.config.max_rank)?;
        stage.advance(PlanStage::ShapeExtracted)?;
        debug!(target: PLAN_TARGET, operands = %extracted.describe(), "shapes extracted");

        let plan_ctx = PlanContext::new(capability, &extracted, &self.config);
        let selection = self.registry.select(&plan_ctx)?;
        let strategy = selection.strategy;
        stage.advance(PlanStage::StrategySelected)?;

        let plan = strategy.partition(&plan_ctx)?;
        let cores = capability.core_count(plan.engine);
        if plan.used_core_count > cores {
            return Err(TilingError::Internal(format!(
                "{} planned {} cores, {} available",
                strategy.name(),
                plan.used_core_count,
                cores
            )));
        }
        stage.advance(PlanStage::Partitioned)?;
        debug!(
            target: PLAN_TARGET,
            strategy = strategy.name(),
            used_cores = plan.used_core_count,
            block_factor = plan.block_factor,
            tail_block_factor = plan.tail_block_factor,
            sub_tile_factor = plan.sub_tile_factor,
            chunked = plan.is_chunked(),
            variant_key = plan.variant_key.value(),
            "partitioned"
        );

        let workspace = workspace::size(capability, &plan, &strategy.workspace(&plan_ctx, &plan));
        stage.advance(PlanStage::Sized)?;
        debug!(
            target: PLAN_TARGET,
            system_bytes = workspace.system_reserved_bytes,
            user_bytes = workspace.user_bytes,
            "workspace sized"
        );

        let section = strategy.operator_data(&plan_ctx, &plan)?;
        let blob = serialize(&plan, &workspace, &section)?;
        stage.advance(PlanStage::Serialized)?;
        debug!(target: PLAN_TARGET, data_size = blob.data_size, "serialized");

        Ok(PlanOutput {
            variant_key: blob.variant_key,
            launch_grid: blob.launch_grid,
            workspace_bytes: workspace.total_bytes(),
            workspace,
            strategy: strategy.name(),
            plan,
            blob,
        })
    }
}
