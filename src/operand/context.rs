//! Caller-supplied invocation context
//!
//! The context is the opaque handle the operator glue passes to planning:
//! positional inputs and outputs (absent optional tensors are `None`) plus a
//! named attribute map. It deserializes from JSON for the CLI.

use super::dtype::DType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape and dtype of one tensor argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorArg {
    pub shape: Vec<u64>,
    pub dtype: DType,
}

impl TensorArg {
    pub fn new(shape: &[u64], dtype: DType) -> Self {
        Self {
            shape: shape.to_vec(),
            dtype,
        }
    }
}

/// Operator attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    IntList(Vec<i64>),
    Str(String),
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::Bool(_) => AttrKind::Bool,
            AttrValue::Int(_) => AttrKind::Int,
            AttrValue::Float(_) => AttrKind::Float,
            AttrValue::IntList(_) => AttrKind::IntList,
            AttrValue::Str(_) => AttrKind::Str,
        }
    }

    /// Integers are accepted where a float is expected
    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttrValue::Float(v) => Some(*v),
            AttrValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// A single integer is accepted as a one-element list
    pub fn as_int_list(&self) -> Option<Vec<i64>> {
        match self {
            AttrValue::IntList(v) => Some(v.clone()),
            AttrValue::Int(v) => Some(vec![*v]),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn matches(&self, kind: AttrKind) -> bool {
        match kind {
            AttrKind::Float => self.as_float().is_some(),
            AttrKind::IntList => self.as_int_list().is_some(),
            other => self.kind() == other,
        }
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<Vec<i64>> for AttrValue {
    fn from(v: Vec<i64>) -> Self {
        AttrValue::IntList(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

/// Declared type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    IntList,
    Str,
}

/// One operator invocation as seen by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TilingContext {
    pub op: String,
    #[serde(default)]
    pub inputs: Vec<Option<TensorArg>>,
    #[serde(default)]
    pub outputs: Vec<Option<TensorArg>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl TilingContext {
    pub fn new(op: impl Into<String>) -> Self {
        Self {
            op: op.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_input(mut self, shape: &[u64], dtype: DType) -> Self {
        self.inputs.push(Some(TensorArg::new(shape, dtype)));
        self
    }

    /// Leave an optional input slot empty
    pub fn with_absent_input(mut self) -> Self {
        self.inputs.push(None);
        self
    }

    pub fn with_output(mut self, shape: &[u64], dtype: DType) -> Self {
        self.outputs.push(Some(TensorArg::new(shape, dtype)));
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
