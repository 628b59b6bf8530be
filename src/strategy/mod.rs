//! Competing tiling strategies per operator
//!
//! Several strategies may serve one operator name. Each declares whether it
//! can handle the extracted operands before committing to a plan; the
//! [`StrategyRegistry`] tries them in descending priority order and runs the
//! first that accepts.

pub mod registry;

pub use registry::{Rejection, Selection, StrategyFactory, StrategyRegistry};

use crate::error::TilingResult;
use crate::operand::{Extracted, OpAttributes, OperandDescriptor};
use crate::partition::{PartitionConfig, PartitionPlan};
use crate::platform::{EngineKind, PlatformCapability};
use crate::tiling_data::OperatorSection;
use crate::workspace::UserWorkspace;

/// Read-only inputs every strategy sees
#[derive(Debug, Clone, Copy)]
pub struct PlanContext<'a> {
    pub capability: &'a PlatformCapability,
    pub operands: &'a Extracted,
    pub config: &'a PartitionConfig,
}

impl<'a> PlanContext<'a> {
    pub fn new(
        capability: &'a PlatformCapability,
        operands: &'a Extracted,
        config: &'a PartitionConfig,
    ) -> Self {
        Self {
            capability,
            operands,
            config,
        }
    }

    pub fn op(&self) -> &str {
        &self.operands.op
    }

    pub fn operand(&self, name: &str) -> TilingResult<&'a OperandDescriptor> {
        self.operands.operand(name)
    }

    pub fn optional_operand(&self, name: &str) -> Option<&'a OperandDescriptor> {
        self.operands.optional_operand(name)
    }

    pub fn attrs(&self) -> &'a OpAttributes {
        &self.operands.attrs
    }
}

/// One way of tiling an operator
pub trait TilingStrategy: Send + Sync {
    /// Stable name used in logs and diagnostics
    fn name(&self) -> &'static str;

    /// Engine the device routine runs on
    fn engine(&self) -> EngineKind {
        EngineKind::Vector
    }

    /// Cheap check, no planning
    fn is_capable(&self, ctx: &PlanContext<'_>) -> bool;

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan>;

    /// Plan-dependent user workspace
    fn workspace(&self, _ctx: &PlanContext<'_>, _plan: &PartitionPlan) -> UserWorkspace {
        UserWorkspace::None
    }

    /// Operator fields appended after the plan header
    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection>;
}
