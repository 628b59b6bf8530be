//! Dtype promotion: move narrow elements as wider packed units

/// Promotion candidates, widest first
const PROMOTION_UNITS: [u64; 3] = [8, 4, 2];

/// Outcome of packing the inner dimension into wider units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    /// Bytes per packed unit
    pub promoted_size: u64,
    /// Inner dimension measured in packed units
    pub inner: u64,
}

/// Pick the widest unit that exactly tiles the inner row.
///
/// Only valid when the caller's data movement commutes with packing
/// (elements are copied or permuted as opaque bytes). Returns `None` when no
/// wider unit divides `inner * element_size`.
pub fn promote(inner: u64, element_size: u64, unit_limit: u64) -> Option<Promotion> {
    if inner == 0 || element_size == 0 {
        return None;
    }
    let row_bytes = inner.checked_mul(element_size)?;
    PROMOTION_UNITS
        .iter()
        .copied()
        .find(|&w| w <= unit_limit && w > element_size && row_bytes % w == 0)
        .map(|w| Promotion {
            promoted_size: w,
            inner: row_bytes / w,
        })
}
