//! Axis normalization: collapse a shape into canonical preserved/reduced groups

use crate::error::{attr_err, TilingError, TilingResult};
use serde::Serialize;
use std::fmt;

/// Whether an axis survives the operator or is consumed by it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AxisKind {
    /// "A" axis
    Preserved,
    /// "R" axis
    Reduced,
}

/// A run of contiguous dims of the same kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AxisGroup {
    pub kind: AxisKind,
    pub size: u64,
    /// Input dims folded into this group, ascending
    pub dims: Vec<usize>,
}

/// Ordering of preserved (A) and reduced (R) groups after merging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CombineType {
    /// A
    Preserved,
    /// R
    Full,
    /// AR
    TrailingReduce,
    /// RA
    LeadingReduce,
    /// ARA
    InnerReduce,
    /// RAR
    OuterReduce,
    /// ARAR or RARA
    Interleaved,
}

impl CombineType {
    /// Digit used in variant keys and the plan header
    pub fn code(&self) -> u64 {
        match self {
            CombineType::Preserved => 0,
            CombineType::Full => 1,
            CombineType::TrailingReduce => 2,
            CombineType::LeadingReduce => 3,
            CombineType::InnerReduce => 4,
            CombineType::OuterReduce => 5,
            CombineType::Interleaved => 6,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(CombineType::Preserved),
            1 => Some(CombineType::Full),
            2 => Some(CombineType::TrailingReduce),
            3 => Some(CombineType::LeadingReduce),
            4 => Some(CombineType::InnerReduce),
            5 => Some(CombineType::OuterReduce),
            6 => Some(CombineType::Interleaved),
            _ => None,
        }
    }

    fn from_pattern(kinds: &[AxisKind]) -> Self {
        use AxisKind::{Preserved as A, Reduced as R};
        match kinds {
            [A] => CombineType::Preserved,
            [R] => CombineType::Full,
            [A, R] => CombineType::TrailingReduce,
            [R, A] => CombineType::LeadingReduce,
            [A, R, A] => CombineType::InnerReduce,
            [R, A, R] => CombineType::OuterReduce,
            _ => CombineType::Interleaved,
        }
    }
}

impl fmt::Display for CombineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = match self {
            CombineType::Preserved => "A",
            CombineType::Full => "R",
            CombineType::TrailingReduce => "AR",
            CombineType::LeadingReduce => "RA",
            CombineType::InnerReduce => "ARA",
            CombineType::OuterReduce => "RAR",
            CombineType::Interleaved => "interleaved",
        };
        f.write_str(pattern)
    }
}

/// Result of axis merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedAxes {
    pub groups: Vec<AxisGroup>,
    pub combine: CombineType,
}

impl MergedAxes {
    /// Single preserved group covering a flat element count
    pub fn flat(numel: u64, rank: usize) -> Self {
        Self {
            groups: vec![AxisGroup {
                kind: AxisKind::Preserved,
                size: numel,
                dims: (0..rank).collect(),
            }],
            combine: CombineType::Preserved,
        }
    }

    /// Group kinds in order, e.g. "RARA"
    pub fn pattern(&self) -> String {
        self.groups
            .iter()
            .map(|g| match g.kind {
                AxisKind::Preserved => 'A',
                AxisKind::Reduced => 'R',
            })
            .collect()
    }

    /// Group sizes in order
    pub fn dims(&self) -> Vec<u64> {
        self.groups.iter().map(|g| g.size).collect()
    }

    pub fn preserved_size(&self) -> u64 {
        self.product_of(AxisKind::Preserved)
    }

    pub fn reduced_size(&self) -> u64 {
        self.product_of(AxisKind::Reduced)
    }

    fn product_of(&self, kind: AxisKind) -> u64 {
        self.groups
            .iter()
            .filter(|g| g.kind == kind)
            .fold(1u64, |acc, g| acc.saturating_mul(g.size))
    }
}

/// Wrap a possibly negative axis into `0..rank`
pub fn normalize_axis(axis: i64, rank: usize, attr: &str) -> TilingResult<usize> {
    let rank_i = rank as i64;
    let wrapped = if axis < 0 { axis + rank_i } else { axis };
    if wrapped < 0 || wrapped >= rank_i {
        return Err(attr_err(attr, format!("axis in [{}, {})", -rank_i, rank_i), axis));
    }
    Ok(wrapped as usize)
}

/// Normalize an axis list; empty means every axis. Result is sorted.
pub fn normalize_axes(axes: &[i64], rank: usize, attr: &str) -> TilingResult<Vec<usize>> {
    if axes.is_empty() {
        return Ok((0..rank).collect());
    }
    let mut normalized = Vec::with_capacity(axes.len());
    for &axis in axes {
        let axis = normalize_axis(axis, rank, attr)?;
        if normalized.contains(&axis) {
            return Err(attr_err(attr, "distinct axes", format!("{axes:?}")));
        }
        normalized.push(axis);
    }
    normalized.sort_unstable();
    Ok(normalized)
}

/// Merge `shape` into alternating preserved/reduced groups.
///
/// Size-1 dims (reduced or not) carry no work and are absorbed into the
/// larger neighbouring group, the preceding one on ties. Adjacent runs of the
/// same kind then merge. More than `max_groups` groups is unsupported.
pub fn merge_axes(
    op: &str,
    shape: &[u64],
    reduced: &[usize],
    max_groups: usize,
) -> TilingResult<MergedAxes> {
    let rank = shape.len();
    let mut groups: Vec<AxisGroup> = Vec::new();
    let mut anchor: Vec<Option<usize>> = vec![None; rank];

    for (dim, &size) in shape.iter().enumerate() {
        if size == 1 {
            continue;
        }
        let kind = if reduced.contains(&dim) {
            AxisKind::Reduced
        } else {
            AxisKind::Preserved
        };
        match groups.last_mut() {
            Some(group) if group.kind == kind => {
                group.size = group.size.saturating_mul(size);
                group.dims.push(dim);
            }
            _ => groups.push(AxisGroup {
                kind,
                size,
                dims: vec![dim],
            }),
        }
        anchor[dim] = Some(groups.len() - 1);
    }

    if groups.is_empty() {
        return Ok(MergedAxes::flat(1, rank));
    }

    for dim in 0..rank {
        if anchor[dim].is_some() {
            continue;
        }
        let prev = anchor[..dim].iter().rev().find_map(|a| *a);
        let next = anchor[dim + 1..].iter().find_map(|a| *a);
        let target = match (prev, next) {
            (Some(p), Some(n)) if p == n => p,
            (Some(p), Some(n)) => {
                if groups[p].size >= groups[n].size {
                    p
                } else {
                    n
                }
            }
            (Some(p), None) => p,
            (None, Some(n)) => n,
            (None, None) => {
                return Err(TilingError::Internal(format!(
                    "size-1 dim {dim} has no neighbouring group in {shape:?}"
                )))
            }
        };
        groups[target].dims.push(dim);
    }
    for group in &mut groups {
        group.dims.sort_unstable();
    }

    if groups.len() > max_groups {
        return Err(TilingError::UnsupportedConfiguration {
            op: op.to_string(),
            detail: format!(
                "shape {shape:?} reduced over {reduced:?} merges into {} groups, at most {max_groups} supported",
                groups.len()
            ),
        });
    }

    let kinds: Vec<AxisKind> = groups.iter().map(|g| g.kind).collect();
    Ok(MergedAxes {
        combine: CombineType::from_pattern(&kinds),
        groups,
    })
}
