//! Fixed-layout tiling data
//!
//! The device kernel reads tiling data by structural position, never by
//! name. A tiling-data struct is declared once with [`tiling_data!`], which
//! generates both the Rust struct and its [`TilingLayout`]. Any reordering or
//! width change is a breaking change to the host/device contract.
//!
//! # Example
//! ```ignore
//! tiling_data! {
//!     /// Operator section of Foo
//!     pub struct FooTilingData {
//!         total: u64,
//!         scale: f32,
//!     }
//! }
//! let bytes = FooTilingData { total: 7, scale: 0.5 }.encode()?;
//! assert_eq!(bytes.len(), 16);
//! ```

pub mod blob;
pub mod header;
pub mod layout;

pub use blob::{serialize, OperatorSection, TilingBlob, MAX_TILING_DATA_SIZE};
pub use header::PlanHeader;
pub use layout::{FieldDef, FieldKind, FieldType, FieldValue, TilingLayout, SECTION_ALIGNMENT};

use crate::error::TilingResult;

/// A struct with a fixed binary layout
pub trait TilingData: Sized {
    const LAYOUT: TilingLayout;

    /// Field values in declaration order
    fn to_values(&self) -> Vec<FieldValue>;

    fn from_values(values: &[FieldValue]) -> TilingResult<Self>;

    fn encode(&self) -> TilingResult<Vec<u8>> {
        Self::LAYOUT.encode(&self.to_values())
    }

    fn decode(bytes: &[u8]) -> TilingResult<Self> {
        Self::from_values(&Self::LAYOUT.decode(bytes)?)
    }
}

/// Declare a fixed-layout tiling-data struct
///
/// Field types must implement [`FieldType`] (`u32`, `i32`, `u64`, `i64`,
/// `f32`). Field order is the wire order.
#[macro_export]
macro_rules! tiling_data {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Default)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $crate::tiling_data::TilingData for $name {
            const LAYOUT: $crate::tiling_data::TilingLayout = $crate::tiling_data::TilingLayout {
                name: stringify!($name),
                fields: &[
                    $( $crate::tiling_data::FieldDef {
                        name: stringify!($field),
                        kind: <$ty as $crate::tiling_data::FieldType>::KIND,
                    }, )*
                ],
            };

            fn to_values(&self) -> Vec<$crate::tiling_data::FieldValue> {
                vec![ $( $crate::tiling_data::FieldType::into_value(self.$field), )* ]
            }

            fn from_values(
                values: &[$crate::tiling_data::FieldValue],
            ) -> $crate::error::TilingResult<Self> {
                let expected = <Self as $crate::tiling_data::TilingData>::LAYOUT.fields.len();
                if values.len() != expected {
                    return Err($crate::error::TilingError::Internal(format!(
                        "{}: {} values for {} fields",
                        stringify!($name),
                        values.len(),
                        expected
                    )));
                }
                let mut values = values.iter();
                Ok(Self {
                    $( $field: {
                        let value = values.next().ok_or_else(|| {
                            $crate::error::TilingError::Internal(format!(
                                "{}: missing field {}",
                                stringify!($name),
                                stringify!($field)
                            ))
                        })?;
                        <$ty as $crate::tiling_data::FieldType>::from_value(value, stringify!($field))?
                    }, )*
                })
            }
        }
    };
}
