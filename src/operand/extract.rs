//! Shape/attribute extraction and validation
//!
//! Turns a [`TilingContext`] into validated [`OperandDescriptor`]s and
//! [`OpAttributes`] against an [`OperatorSpec`]. Checks run in a fixed order:
//! attributes, then per-operand presence, engine rank cap, declared rank,
//! dtype and emptiness, then cross-operand relations, then the operator's own
//! validator. The first violation is returned.

use super::context::{AttrKind, AttrValue, TensorArg, TilingContext};
use super::dtype::DType;
use super::spec::{OperandRole, OperandSpec, OperatorSpec, ShapeRelation};
use crate::error::{attr_err, TilingError, TilingResult};
use crate::partition::axis::{normalize_axes, normalize_axis};
use crate::shape_error;
use std::collections::BTreeMap;

/// Validated view of one operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperandDescriptor {
    pub name: &'static str,
    pub role: OperandRole,
    pub shape: Vec<u64>,
    pub dtype: DType,
    pub element_size: u64,
    pub is_empty: bool,
}

impl OperandDescriptor {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> u64 {
        element_count(&self.shape)
    }

    pub fn byte_size(&self) -> u64 {
        self.numel().saturating_mul(self.element_size)
    }
}

/// Product of dims, 1 for a scalar
pub fn element_count(shape: &[u64]) -> u64 {
    shape.iter().fold(1u64, |acc, d| acc.saturating_mul(*d))
}

/// Attribute values after defaults and kind checks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpAttributes {
    values: BTreeMap<String, AttrValue>,
}

impl OpAttributes {
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.values.get(name)
    }

    fn require(&self, name: &str) -> TilingResult<&AttrValue> {
        self.values
            .get(name)
            .ok_or_else(|| attr_err(name, "declared attribute", "missing"))
    }

    pub fn int(&self, name: &str) -> TilingResult<i64> {
        let value = self.require(name)?;
        value
            .as_int()
            .ok_or_else(|| attr_err(name, "int", format!("{value:?}")))
    }

    pub fn float(&self, name: &str) -> TilingResult<f64> {
        let value = self.require(name)?;
        value
            .as_float()
            .ok_or_else(|| attr_err(name, "float", format!("{value:?}")))
    }

    pub fn bool(&self, name: &str) -> TilingResult<bool> {
        let value = self.require(name)?;
        value
            .as_bool()
            .ok_or_else(|| attr_err(name, "bool", format!("{value:?}")))
    }

    pub fn int_list(&self, name: &str) -> TilingResult<Vec<i64>> {
        let value = self.require(name)?;
        value
            .as_int_list()
            .ok_or_else(|| attr_err(name, "int list", format!("{value:?}")))
    }
}

/// Extraction result: operands in spec order plus attributes
#[derive(Debug, Clone)]
pub struct Extracted {
    pub op: String,
    pub operands: Vec<Option<OperandDescriptor>>,
    pub attrs: OpAttributes,
}

impl Extracted {
    /// A required operand; absent optional operands are an internal misuse
    pub fn operand(&self, name: &str) -> TilingResult<&OperandDescriptor> {
        self.optional_operand(name).ok_or_else(|| {
            TilingError::Internal(format!("operand '{name}' not extracted for {}", self.op))
        })
    }

    pub fn optional_operand(&self, name: &str) -> Option<&OperandDescriptor> {
        self.operands.iter().flatten().find(|d| d.name == name)
    }

    /// Compact listing used in diagnostics
    pub fn describe(&self) -> String {
        self.operands
            .iter()
            .flatten()
            .map(|d| format!("{}:{:?}:{}", d.name, d.shape, d.dtype))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Extract and validate operands and attributes for one invocation
pub fn extract(ctx: &TilingContext, spec: &OperatorSpec, max_rank: usize) -> TilingResult<Extracted> {
    let attrs = extract_attributes(ctx, spec)?;

    let mut operands = Vec::with_capacity(spec.operands.len());
    let mut input_slot = 0usize;
    let mut output_slot = 0usize;
    for operand in &spec.operands {
        let arg = match operand.role {
            OperandRole::Input => {
                input_slot += 1;
                ctx.inputs.get(input_slot - 1).and_then(Option::as_ref)
            }
            OperandRole::Output => {
                output_slot += 1;
                ctx.outputs.get(output_slot - 1).and_then(Option::as_ref)
            }
        };
        operands.push(describe_operand(operand, arg, max_rank)?);
    }

    let extracted = Extracted {
        op: ctx.op.clone(),
        operands,
        attrs,
    };

    for operand in &spec.operands {
        if let Some(desc) = extracted.optional_operand(operand.name) {
            for relation in &operand.relations {
                check_relation(&extracted, desc, relation)?;
            }
        }
    }

    if let Some(validate) = spec.validate {
        validate(&extracted)?;
    }
    Ok(extracted)
}

fn extract_attributes(ctx: &TilingContext, spec: &OperatorSpec) -> TilingResult<OpAttributes> {
    let mut values = BTreeMap::new();
    for attr in &spec.attributes {
        let value = match (ctx.attrs.get(attr.name), &attr.default) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => return Err(attr_err(attr.name, "required attribute", "missing")),
        };
        if !value.matches(attr.kind) {
            return Err(attr_err(
                attr.name,
                format!("{:?}", attr.kind),
                format!("{value:?}"),
            ));
        }
        // store in canonical form so accessors never see a coerced kind
        let value = match (attr.kind, &value) {
            (AttrKind::Float, AttrValue::Int(v)) => AttrValue::Float(*v as f64),
            (AttrKind::IntList, AttrValue::Int(v)) => AttrValue::IntList(vec![*v]),
            _ => value,
        };
        values.insert(attr.name.to_string(), value);
    }
    Ok(OpAttributes { values })
}

fn describe_operand(
    spec: &OperandSpec,
    arg: Option<&TensorArg>,
    max_rank: usize,
) -> TilingResult<Option<OperandDescriptor>> {
    let arg = match arg {
        Some(arg) => arg,
        None if spec.optional => return Ok(None),
        None => return Err(shape_error!(spec.name, "required operand", "present", "absent")),
    };

    let rank = arg.shape.len();
    if rank > max_rank {
        return Err(shape_error!(spec.name, "rank within engine maximum", max_rank, rank));
    }
    if rank < spec.min_rank || rank > spec.max_rank {
        return Err(shape_error!(
            spec.name,
            "declared rank range",
            format!("{}..={}", spec.min_rank, spec.max_rank),
            rank
        ));
    }
    if !spec.dtypes.contains(&arg.dtype) {
        return Err(TilingError::Dtype {
            operand: spec.name.to_string(),
            expected: format!("{:?}", spec.dtypes),
            actual: arg.dtype.to_string(),
        });
    }
    let is_empty = arg.shape.iter().any(|d| *d == 0);
    if is_empty && !spec.allow_empty {
        return Err(shape_error!(spec.name, "non-empty tensor", "all dims > 0", arg.shape));
    }

    Ok(Some(OperandDescriptor {
        name: spec.name,
        role: spec.role,
        shape: arg.shape.clone(),
        dtype: arg.dtype,
        element_size: arg.dtype.size_bytes(),
        is_empty,
    }))
}

fn check_relation(
    extracted: &Extracted,
    desc: &OperandDescriptor,
    relation: &ShapeRelation,
) -> TilingResult<()> {
    match relation {
        ShapeRelation::SameShape(of) => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            if desc.shape != other.shape {
                return Err(shape_error!(desc.name, format!("same shape as {of}"), other.shape, desc.shape));
            }
        }
        ShapeRelation::SameDtype { of, or } => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            if desc.dtype != other.dtype && Some(desc.dtype) != *or {
                let expected = match or {
                    Some(alt) => format!("[{}, {}]", other.dtype, alt),
                    None => format!("[{}]", other.dtype),
                };
                return Err(TilingError::Dtype {
                    operand: desc.name.to_string(),
                    expected,
                    actual: desc.dtype.to_string(),
                });
            }
        }
        ShapeRelation::TrailingDims(of) => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            let trailing = other.rank().checked_sub(desc.rank()).map(|start| &other.shape[start..]);
            if trailing != Some(desc.shape.as_slice()) {
                return Err(shape_error!(
                    desc.name,
                    format!("trailing dims of {of}"),
                    other.shape,
                    desc.shape
                ));
            }
        }
        ShapeRelation::LeadingDimsOrOne(of) => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            let ok = desc.rank() == other.rank()
                && desc
                    .shape
                    .iter()
                    .zip(&other.shape)
                    .all(|(d, o)| d == o || *d == 1);
            if !ok {
                return Err(shape_error!(
                    desc.name,
                    format!("each dim equals {of}'s or 1"),
                    other.shape,
                    desc.shape
                ));
            }
        }
        ShapeRelation::ReducedFrom {
            of,
            axes_attr,
            keep_dims_attr,
        } => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            let expected = reduced_shape(extracted, other, axes_attr, keep_dims_attr)?;
            let scalar_as_one = expected.is_empty() && desc.shape == vec![1u64];
            if desc.shape != expected && !scalar_as_one {
                return Err(shape_error!(
                    desc.name,
                    format!("{of} reduced over {axes_attr}"),
                    expected,
                    desc.shape
                ));
            }
        }
        ShapeRelation::DimEquals { of, dim_attr } => {
            let Some(other) = extracted.optional_operand(of) else {
                return Ok(());
            };
            let dim = normalize_axis(extracted.attrs.int(dim_attr)?, other.rank(), dim_attr)?;
            if desc.rank() != 1 || desc.shape[0] != other.shape[dim] {
                return Err(shape_error!(
                    desc.name,
                    format!("length equals {of}.shape[{dim_attr}]"),
                    vec![other.shape[dim]],
                    desc.shape
                ));
            }
        }
        ShapeRelation::ElementCount(count) => {
            if desc.numel() != *count {
                return Err(shape_error!(desc.name, "element count", count, desc.numel()));
            }
        }
    }
    Ok(())
}

fn reduced_shape(
    extracted: &Extracted,
    source: &OperandDescriptor,
    axes_attr: &str,
    keep_dims_attr: &str,
) -> TilingResult<Vec<u64>> {
    let axes = normalize_axes(&extracted.attrs.int_list(axes_attr)?, source.rank(), axes_attr)?;
    let keep_dims = extracted.attrs.bool(keep_dims_attr)?;
    let shape = source
        .shape
        .iter()
        .enumerate()
        .filter_map(|(i, d)| match (axes.contains(&i), keep_dims) {
            (false, _) => Some(*d),
            (true, true) => Some(1),
            (true, false) => None,
        })
        .collect();
    Ok(shape)
}
