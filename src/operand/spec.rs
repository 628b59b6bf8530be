//! Declarative operand and attribute contracts per operator

use super::context::{AttrKind, AttrValue};
use super::dtype::DType;
use super::extract::Extracted;
use crate::error::TilingResult;

/// Whether an operand is read or written by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandRole {
    Input,
    Output,
}

/// Relationship one operand must satisfy against another
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeRelation {
    /// Identical shape
    SameShape(&'static str),
    /// Same dtype, or the alternative dtype when given (mixed precision)
    SameDtype {
        of: &'static str,
        or: Option<DType>,
    },
    /// Equals the trailing dims of the other operand
    TrailingDims(&'static str),
    /// Same rank; every dim equals the other's or is 1
    LeadingDimsOrOne(&'static str),
    /// The other operand reduced over an axes attribute
    ReducedFrom {
        of: &'static str,
        axes_attr: &'static str,
        keep_dims_attr: &'static str,
    },
    /// Rank-1 length equals the other operand's dim selected by an attribute
    DimEquals {
        of: &'static str,
        dim_attr: &'static str,
    },
    /// Exact element count
    ElementCount(u64),
}

/// Contract for one positional operand
#[derive(Debug, Clone)]
pub struct OperandSpec {
    pub name: &'static str,
    pub role: OperandRole,
    pub min_rank: usize,
    pub max_rank: usize,
    pub dtypes: &'static [DType],
    pub optional: bool,
    pub allow_empty: bool,
    pub relations: Vec<ShapeRelation>,
}

impl OperandSpec {
    fn new(name: &'static str, role: OperandRole) -> Self {
        Self {
            name,
            role,
            min_rank: 0,
            max_rank: 8,
            dtypes: DType::ALL,
            optional: false,
            allow_empty: true,
            relations: Vec::new(),
        }
    }

    pub fn input(name: &'static str) -> Self {
        Self::new(name, OperandRole::Input)
    }

    pub fn output(name: &'static str) -> Self {
        Self::new(name, OperandRole::Output)
    }

    pub fn rank(mut self, min_rank: usize, max_rank: usize) -> Self {
        self.min_rank = min_rank;
        self.max_rank = max_rank;
        self
    }

    pub fn dtypes(mut self, dtypes: &'static [DType]) -> Self {
        self.dtypes = dtypes;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.allow_empty = false;
        self
    }

    pub fn relate(mut self, relation: ShapeRelation) -> Self {
        self.relations.push(relation);
        self
    }
}

/// Declared attribute with its kind and optional default
#[derive(Debug, Clone)]
pub struct AttributeSpec {
    pub name: &'static str,
    pub kind: AttrKind,
    pub default: Option<AttrValue>,
}

impl AttributeSpec {
    pub fn required(name: &'static str, kind: AttrKind) -> Self {
        Self {
            name,
            kind,
            default: None,
        }
    }

    pub fn with_default(name: &'static str, kind: AttrKind, default: AttrValue) -> Self {
        Self {
            name,
            kind,
            default: Some(default),
        }
    }
}

/// Operator-specific check run after generic extraction
pub type OperandValidator = fn(&Extracted) -> TilingResult<()>;

/// Full operand and attribute contract of one operator
#[derive(Debug, Clone)]
pub struct OperatorSpec {
    pub op: &'static str,
    pub operands: Vec<OperandSpec>,
    pub attributes: Vec<AttributeSpec>,
    pub validate: Option<OperandValidator>,
}

impl OperatorSpec {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            operands: Vec::new(),
            attributes: Vec::new(),
            validate: None,
        }
    }

    pub fn operand(mut self, spec: OperandSpec) -> Self {
        self.operands.push(spec);
        self
    }

    pub fn attribute(mut self, spec: AttributeSpec) -> Self {
        self.attributes.push(spec);
        self
    }

    pub fn validator(mut self, validate: OperandValidator) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn inputs(&self) -> impl Iterator<Item = &OperandSpec> {
        self.operands.iter().filter(|s| s.role == OperandRole::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &OperandSpec> {
        self.operands.iter().filter(|s| s.role == OperandRole::Output)
    }
}
