//! Platform capability: core counts, scratch tiers and alignment

pub mod cache;
pub mod capability;

pub use cache::{global, CapabilityCache};
pub use capability::{align_up, EngineKind, PlatformCapability, ScratchTier};
