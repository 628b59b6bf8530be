//! Operands, attributes and their per-operator contracts

pub mod context;
pub mod dtype;
pub mod extract;
pub mod spec;

pub use context::{AttrKind, AttrValue, TensorArg, TilingContext};
pub use dtype::DType;
pub use extract::{element_count, extract, Extracted, OpAttributes, OperandDescriptor};
pub use spec::{AttributeSpec, OperandRole, OperandSpec, OperatorSpec, ShapeRelation};
