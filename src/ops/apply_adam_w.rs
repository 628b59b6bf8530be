//! ApplyAdamW tiling
//!
//! Elementwise optimizer update over `var`, `m`, `v` and `grad` with scalar
//! hyper-parameters. All tensors stream through scratch together, so the
//! resident buffer count sets the sub-tile size.

use crate::error::TilingResult;
use crate::operand::{
    AttrKind, AttrValue, AttributeSpec, DType, Extracted, OperandSpec, OperatorSpec,
    ShapeRelation,
};
use crate::partition::{partition, IterationSpace, MergedAxes, PartitionPlan, PartitionRequest};
use crate::shape_error;
use crate::strategy::{PlanContext, StrategyRegistry, TilingStrategy};
use crate::tiling_data;
use crate::tiling_data::OperatorSection;

pub const OP_NAME: &str = "ApplyAdamW";

pub const ELEMENTWISE_TEMPLATE: u64 = 4_000_000;
const ELEMENTWISE_PRIORITY: i64 = 100;

const SCALAR_INPUTS: [&str; 5] = ["lr", "beta1", "beta2", "weight_decay", "eps"];

tiling_data! {
    /// ApplyAdamW operator section
    pub struct ApplyAdamWTilingData {
        total_elements: u64,
        amsgrad: u32,
        maximize: u32,
    }
}

fn state_operand(name: &'static str) -> OperandSpec {
    OperandSpec::input(name)
        .dtypes(DType::FLOATS)
        .relate(ShapeRelation::SameShape("var"))
        .relate(ShapeRelation::SameDtype { of: "var", or: None })
}

fn updated_operand(name: &'static str) -> OperandSpec {
    OperandSpec::output(name)
        .dtypes(DType::FLOATS)
        .relate(ShapeRelation::SameShape("var"))
        .relate(ShapeRelation::SameDtype { of: "var", or: None })
}

pub fn operator_spec() -> OperatorSpec {
    let mut spec = OperatorSpec::new(OP_NAME)
        .operand(OperandSpec::input("var").rank(1, 8).dtypes(DType::FLOATS))
        .operand(state_operand("m"))
        .operand(state_operand("v"))
        .operand(state_operand("grad"));
    for name in SCALAR_INPUTS {
        spec = spec.operand(
            OperandSpec::input(name)
                .rank(0, 1)
                .dtypes(DType::FLOATS)
                .relate(ShapeRelation::ElementCount(1)),
        );
    }
    spec.operand(state_operand("max_grad_norm").optional())
        .operand(updated_operand("var_out"))
        .operand(updated_operand("m_out"))
        .operand(updated_operand("v_out"))
        .attribute(AttributeSpec::with_default(
            "amsgrad",
            AttrKind::Bool,
            AttrValue::Bool(false),
        ))
        .attribute(AttributeSpec::with_default(
            "maximize",
            AttrKind::Bool,
            AttrValue::Bool(false),
        ))
        .validator(validate)
}

fn validate(extracted: &Extracted) -> TilingResult<()> {
    if extracted.attrs.bool("amsgrad")? && extracted.optional_operand("max_grad_norm").is_none() {
        return Err(shape_error!(
            "max_grad_norm",
            "required when amsgrad is set",
            "present",
            "absent"
        ));
    }
    Ok(())
}

pub fn register(registry: &mut StrategyRegistry) {
    registry.register(OP_NAME, elementwise, ELEMENTWISE_PRIORITY);
}

fn elementwise() -> Box<dyn TilingStrategy> {
    Box::new(ApplyAdamWElementwise)
}

/// Flat packed stream over every element
pub struct ApplyAdamWElementwise;

impl TilingStrategy for ApplyAdamWElementwise {
    fn name(&self) -> &'static str {
        "ApplyAdamWElementwise"
    }

    fn is_capable(&self, _ctx: &PlanContext<'_>) -> bool {
        true
    }

    fn partition(&self, ctx: &PlanContext<'_>) -> TilingResult<PartitionPlan> {
        let var = ctx.operand("var")?;
        // var, m, v, grad, plus the running max under amsgrad
        let buffers = if ctx.attrs().bool("amsgrad")? { 5 } else { 4 };
        let request = PartitionRequest::new(
            ELEMENTWISE_TEMPLATE,
            MergedAxes::flat(var.numel(), var.rank()),
            IterationSpace::elementwise(var.numel()),
            var.dtype,
        )
        .with_buffers_per_row(buffers);
        partition(ctx.capability, ctx.config, &request)
    }

    fn operator_data(
        &self,
        ctx: &PlanContext<'_>,
        _plan: &PartitionPlan,
    ) -> TilingResult<OperatorSection> {
        Ok(OperatorSection::from_data(&ApplyAdamWTilingData {
            total_elements: ctx.operand("var")?.numel(),
            amsgrad: u32::from(ctx.attrs().bool("amsgrad")?),
            maximize: u32::from(ctx.attrs().bool("maximize")?),
        }))
    }
}
