//! Element types understood by the planner

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tensor element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[serde(alias = "fp32", alias = "float")]
    Float32,
    #[serde(alias = "fp16", alias = "half")]
    Float16,
    #[serde(alias = "bf16")]
    BFloat16,
    Int8,
    UInt8,
    Int16,
    Int32,
    Int64,
    UInt64,
    Bool,
}

impl DType {
    pub const FLOATS: &'static [DType] = &[DType::Float16, DType::BFloat16, DType::Float32];

    pub const ALL: &'static [DType] = &[
        DType::Float32,
        DType::Float16,
        DType::BFloat16,
        DType::Int8,
        DType::UInt8,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::UInt64,
        DType::Bool,
    ];

    pub fn size_bytes(&self) -> u64 {
        match self {
            DType::Int8 | DType::UInt8 | DType::Bool => 1,
            DType::Float16 | DType::BFloat16 | DType::Int16 => 2,
            DType::Float32 | DType::Int32 => 4,
            DType::Int64 | DType::UInt64 => 8,
        }
    }

    /// Stable small code embedded in variant keys.
    ///
    /// Int64 and UInt64 share a code: kernels only move their bits.
    pub fn dtype_key(&self) -> u64 {
        match self {
            DType::Float16 => 1,
            DType::Float32 => 2,
            DType::BFloat16 => 3,
            DType::Int8 => 4,
            DType::UInt8 => 5,
            DType::Int16 => 6,
            DType::Int32 => 7,
            DType::Int64 | DType::UInt64 => 8,
            DType::Bool => 9,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, DType::Float32 | DType::Float16 | DType::BFloat16)
    }

    /// Parse a dtype name (case-insensitive, short aliases accepted)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "float32" | "fp32" | "float" => Some(DType::Float32),
            "float16" | "fp16" | "half" => Some(DType::Float16),
            "bfloat16" | "bf16" => Some(DType::BFloat16),
            "int8" => Some(DType::Int8),
            "uint8" => Some(DType::UInt8),
            "int16" => Some(DType::Int16),
            "int32" => Some(DType::Int32),
            "int64" => Some(DType::Int64),
            "uint64" => Some(DType::UInt64),
            "bool" => Some(DType::Bool),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DType::Float32 => "float32",
            DType::Float16 => "float16",
            DType::BFloat16 => "bfloat16",
            DType::Int8 => "int8",
            DType::UInt8 => "uint8",
            DType::Int16 => "int16",
            DType::Int32 => "int32",
            DType::Int64 => "int64",
            DType::UInt64 => "uint64",
            DType::Bool => "bool",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DType::Float16.size_bytes(), 2);
        assert_eq!(DType::BFloat16.size_bytes(), 2);
        assert_eq!(DType::Float32.size_bytes(), 4);
        assert_eq!(DType::Int64.size_bytes(), 8);
        assert_eq!(DType::Bool.size_bytes(), 1);
    }

    #[test]
    fn test_dtype_keys_are_stable() {
        assert_eq!(DType::Float16.dtype_key(), 1);
        assert_eq!(DType::Float32.dtype_key(), 2);
        assert_eq!(DType::BFloat16.dtype_key(), 3);
        assert_eq!(DType::Int64.dtype_key(), DType::UInt64.dtype_key());
        for dtype in DType::ALL {
            assert!(dtype.dtype_key() < 10, "{dtype} key must fit one digit");
        }
    }

    #[test]
    fn test_from_name_and_serde_aliases() {
        assert_eq!(DType::from_name("FP16"), Some(DType::Float16));
        assert_eq!(DType::from_name("bf16"), Some(DType::BFloat16));
        assert_eq!(DType::from_name("complex64"), None);

        let parsed: DType = serde_json::from_str("\"fp32\"").unwrap();
        assert_eq!(parsed, DType::Float32);
        let parsed: DType = serde_json::from_str("\"int32\"").unwrap();
        assert_eq!(parsed, DType::Int32);
        assert_eq!(serde_json::to_string(&DType::BFloat16).unwrap(), "\"bfloat16\"");
    }
}
