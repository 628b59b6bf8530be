//! Variant key: decimal priority encoding of plan decisions
//!
//! ```text
//! key = template_base + combine * 10000 + dtype_key * 1000
//!     + chunked * 100 + promoted * 10 + single_core
//! ```
//!
//! `template_base` is a per-strategy multiple of 100000, so every decision
//! occupies its own decimal digit and the device side can branch on digits.

use crate::error::{TilingError, TilingResult};
use serde::Serialize;
use std::fmt;

/// Spacing between strategy template bases
pub const TEMPLATE_BASE_STEP: u64 = 100_000;

const COMBINE_WEIGHT: u64 = 10_000;
const DTYPE_WEIGHT: u64 = 1_000;
const CHUNKED_WEIGHT: u64 = 100;
const PROMOTED_WEIGHT: u64 = 10;

/// Integer selecting the device compute routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VariantKey(pub u64);

/// Decisions encoded in a [`VariantKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantKeyFields {
    pub template_base: u64,
    pub combine: u64,
    pub dtype_key: u64,
    pub chunked: bool,
    pub promoted: bool,
    pub single_core: bool,
}

impl VariantKey {
    pub fn compose(fields: &VariantKeyFields) -> TilingResult<Self> {
        if fields.template_base % TEMPLATE_BASE_STEP != 0 {
            return Err(TilingError::Internal(format!(
                "template base {} is not a multiple of {TEMPLATE_BASE_STEP}",
                fields.template_base
            )));
        }
        if fields.combine > 9 || fields.dtype_key > 9 {
            return Err(TilingError::Internal(format!(
                "variant digit out of range: combine {}, dtype {}",
                fields.combine, fields.dtype_key
            )));
        }
        Ok(VariantKey(
            fields.template_base
                + fields.combine * COMBINE_WEIGHT
                + fields.dtype_key * DTYPE_WEIGHT
                + u64::from(fields.chunked) * CHUNKED_WEIGHT
                + u64::from(fields.promoted) * PROMOTED_WEIGHT
                + u64::from(fields.single_core),
        ))
    }

    /// Split the key back into its digits
    pub fn decode(&self) -> TilingResult<VariantKeyFields> {
        let key = self.0;
        let flag = |weight: u64| -> TilingResult<bool> {
            match (key / weight) % 10 {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(TilingError::Internal(format!(
                    "variant key {key}: flag digit {other} at weight {weight}"
                ))),
            }
        };
        Ok(VariantKeyFields {
            template_base: key - key % TEMPLATE_BASE_STEP,
            combine: (key / COMBINE_WEIGHT) % 10,
            dtype_key: (key / DTYPE_WEIGHT) % 10,
            chunked: flag(CHUNKED_WEIGHT)?,
            promoted: flag(PROMOTED_WEIGHT)?,
            single_core: flag(1)?,
        })
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
