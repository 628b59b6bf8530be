//! tileforge - host-side tiling engine
//!
//! Turns operator shapes, dtypes and attributes plus the accelerator's
//! capability (core counts, scratch sizes, alignment) into a launch plan:
//! core split, sub-tiling, a variant key selecting the device routine, a
//! workspace size and a fixed-layout tiling blob the device decodes by
//! position.
//!
//! Data flows one way: capability cache and operand extraction feed the
//! strategy registry, the selected strategy partitions, then the workspace
//! sizer and serializer finish the plan.

#![allow(clippy::too_many_arguments)] // Plan constructors mirror the wire fields
#![allow(clippy::manual_div_ceil)] // Integer ceiling division reads clearer inline

pub mod error;
pub mod kernel;
pub mod logging;
pub mod operand;
pub mod ops;
pub mod partition;
pub mod pipeline;
pub mod platform;
pub mod strategy;
pub mod tiling_data;
pub mod workspace;

pub use error::{ErrorCategory, TilingError, TilingResult};
pub use operand::{DType, TilingContext};
pub use partition::{PartitionConfig, PartitionPlan, VariantKey};
pub use pipeline::{PlanOutput, Planner};
pub use platform::PlatformCapability;
pub use tiling_data::TilingBlob;
