//! Field-level binary layout of tiling data
//!
//! Fields are written little-endian in declaration order, each at its
//! natural alignment, with zero padding. The total is rounded up to 8 bytes
//! so sections can be concatenated without breaking alignment.

use crate::error::{TilingError, TilingResult};
use crate::platform::align_up;
use std::fmt::{self, Write};

/// Struct alignment of every tiling-data section
pub const SECTION_ALIGNMENT: usize = 8;

/// Width and signedness of one field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U32,
    I32,
    U64,
    I64,
    F32,
}

impl FieldKind {
    pub const fn width(&self) -> usize {
        match self {
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::U64 | FieldKind::I64 => 8,
        }
    }
}

/// Named field in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

/// A decoded field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::U32(_) => FieldKind::U32,
            FieldValue::I32(_) => FieldKind::I32,
            FieldValue::U64(_) => FieldKind::U64,
            FieldValue::I64(_) => FieldKind::I64,
            FieldValue::F32(_) => FieldKind::F32,
        }
    }

    fn write_le(&self, out: &mut [u8]) {
        match self {
            FieldValue::U32(v) => out.copy_from_slice(&v.to_le_bytes()),
            FieldValue::I32(v) => out.copy_from_slice(&v.to_le_bytes()),
            FieldValue::U64(v) => out.copy_from_slice(&v.to_le_bytes()),
            FieldValue::I64(v) => out.copy_from_slice(&v.to_le_bytes()),
            FieldValue::F32(v) => out.copy_from_slice(&v.to_bits().to_le_bytes()),
        }
    }

    fn read_le(kind: FieldKind, bytes: &[u8]) -> TilingResult<Self> {
        let four = |b: &[u8]| -> TilingResult<[u8; 4]> {
            b.try_into()
                .map_err(|_| TilingError::Internal(format!("expected 4 bytes, got {}", b.len())))
        };
        let eight = |b: &[u8]| -> TilingResult<[u8; 8]> {
            b.try_into()
                .map_err(|_| TilingError::Internal(format!("expected 8 bytes, got {}", b.len())))
        };
        Ok(match kind {
            FieldKind::U32 => FieldValue::U32(u32::from_le_bytes(four(bytes)?)),
            FieldKind::I32 => FieldValue::I32(i32::from_le_bytes(four(bytes)?)),
            FieldKind::U64 => FieldValue::U64(u64::from_le_bytes(eight(bytes)?)),
            FieldKind::I64 => FieldValue::I64(i64::from_le_bytes(eight(bytes)?)),
            FieldKind::F32 => FieldValue::F32(f32::from_bits(u32::from_le_bytes(four(bytes)?))),
        })
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::U32(v) => write!(f, "{v}"),
            FieldValue::I32(v) => write!(f, "{v}"),
            FieldValue::U64(v) => write!(f, "{v}"),
            FieldValue::I64(v) => write!(f, "{v}"),
            FieldValue::F32(v) => write!(f, "{v:e}"),
        }
    }
}

/// Rust scalar types allowed in a tiling-data struct
pub trait FieldType: Copy {
    const KIND: FieldKind;
    fn into_value(self) -> FieldValue;
    fn from_value(value: &FieldValue, field: &str) -> TilingResult<Self>;
}

macro_rules! impl_field_type {
    ($ty:ty, $variant:ident) => {
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::$variant;

            fn into_value(self) -> FieldValue {
                FieldValue::$variant(self)
            }

            fn from_value(value: &FieldValue, field: &str) -> TilingResult<Self> {
                match value {
                    FieldValue::$variant(v) => Ok(*v),
                    other => Err(TilingError::Internal(format!(
                        "field {field}: expected {:?}, decoded {:?}",
                        FieldKind::$variant,
                        other.kind()
                    ))),
                }
            }
        }
    };
}

impl_field_type!(u32, U32);
impl_field_type!(i32, I32);
impl_field_type!(u64, U64);
impl_field_type!(i64, I64);
impl_field_type!(f32, F32);

/// Ordered field list of one tiling-data struct
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingLayout {
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl TilingLayout {
    /// Byte offset of every field
    pub fn offsets(&self) -> Vec<usize> {
        let mut offset = 0usize;
        self.fields
            .iter()
            .map(|field| {
                let width = field.kind.width();
                let at = align_up(offset as u64, width as u64) as usize;
                offset = at + width;
                at
            })
            .collect()
    }

    /// Encoded size including trailing padding
    pub fn size(&self) -> usize {
        let end = match (self.fields.last(), self.offsets().last()) {
            (Some(field), Some(offset)) => offset + field.kind.width(),
            _ => 0,
        };
        align_up(end as u64, SECTION_ALIGNMENT as u64) as usize
    }

    pub fn encode(&self, values: &[FieldValue]) -> TilingResult<Vec<u8>> {
        if values.len() != self.fields.len() {
            return Err(TilingError::Internal(format!(
                "{}: {} values for {} fields",
                self.name,
                values.len(),
                self.fields.len()
            )));
        }
        let mut bytes = vec![0u8; self.size()];
        for ((field, offset), value) in self.fields.iter().zip(self.offsets()).zip(values) {
            if value.kind() != field.kind {
                return Err(TilingError::Internal(format!(
                    "{}.{}: expected {:?}, got {:?}",
                    self.name,
                    field.name,
                    field.kind,
                    value.kind()
                )));
            }
            value.write_le(&mut bytes[offset..offset + field.kind.width()]);
        }
        Ok(bytes)
    }

    /// Decode by position; trailing bytes beyond [`size`](Self::size) are ignored
    pub fn decode(&self, bytes: &[u8]) -> TilingResult<Vec<FieldValue>> {
        if bytes.len() < self.size() {
            return Err(TilingError::Internal(format!(
                "{}: need {} bytes, got {}",
                self.name,
                self.size(),
                bytes.len()
            )));
        }
        self.fields
            .iter()
            .zip(self.offsets())
            .map(|(field, offset)| {
                FieldValue::read_le(field.kind, &bytes[offset..offset + field.kind.width()])
            })
            .collect()
    }

    /// One `name = value` line per field
    pub fn dump(&self, values: &[FieldValue]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{} ({} bytes)", self.name, self.size());
        for ((field, offset), value) in self.fields.iter().zip(self.offsets()).zip(values) {
            let _ = writeln!(out, "  [{offset:>4}] {:<24} = {value}", field.name);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: TilingLayout = TilingLayout {
        name: "Mixed",
        fields: &[
            FieldDef {
                name: "a",
                kind: FieldKind::U32,
            },
            FieldDef {
                name: "b",
                kind: FieldKind::U64,
            },
            FieldDef {
                name: "c",
                kind: FieldKind::F32,
            },
        ],
    };

    #[test]
    fn test_natural_alignment_and_padding() {
        assert_eq!(MIXED.offsets(), vec![0, 8, 16]);
        assert_eq!(MIXED.size(), 24);
    }

    #[test]
    fn test_encode_little_endian() {
        let bytes = MIXED
            .encode(&[
                FieldValue::U32(0x0102_0304),
                FieldValue::U64(5),
                FieldValue::F32(1.0),
            ])
            .unwrap();
        assert_eq!(&bytes[0..4], &[4, 3, 2, 1]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 0]);
        assert_eq!(bytes[8], 5);
        assert_eq!(&bytes[16..20], &1.0f32.to_bits().to_le_bytes());
        assert_eq!(&bytes[20..24], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_encode_rejects_mismatch() {
        assert!(MIXED.encode(&[FieldValue::U32(1)]).is_err());
        assert!(MIXED
            .encode(&[FieldValue::U64(1), FieldValue::U64(5), FieldValue::F32(1.0)])
            .is_err());
    }

    #[test]
    fn test_decode_truncated() {
        assert!(MIXED.decode(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_empty_layout() {
        let empty = TilingLayout {
            name: "Empty",
            fields: &[],
        };
        assert_eq!(empty.size(), 0);
        assert!(empty.decode(&[]).unwrap().is_empty());
    }
}
