//! Shared fixtures for integration tests
//!
//! Capabilities are parsed once and reused. Tests that touch the process-wide
//! capability cache must run with `#[serial]`.

#![allow(dead_code)]

mod fixtures;
mod tempfile_helpers;

use once_cell::sync::Lazy;
pub use serial_test::serial;
use tileforge::PlatformCapability;

pub use fixtures::*;
pub use tempfile_helpers::*;

/// Platform description most tests plan against
pub const DEFAULT_PLATFORM_JSON: &str = r#"{"CORE_NUM": 8, "UB_SIZE": 196608}"#;

/// 8 vector cores, 192 KiB unified buffer, default alignment and workspace
pub static DEFAULT_CAPABILITY: Lazy<PlatformCapability> = Lazy::new(|| {
    PlatformCapability::from_json_str(DEFAULT_PLATFORM_JSON)
        .unwrap_or_else(|e| panic!("default platform fixture must parse: {e}"))
});

/// Same chip with a single core
pub static SINGLE_CORE_CAPABILITY: Lazy<PlatformCapability> = Lazy::new(|| {
    PlatformCapability::from_json_str(r#"{"CORE_NUM": 1, "UB_SIZE": 196608}"#)
        .unwrap_or_else(|e| panic!("single-core platform fixture must parse: {e}"))
});

pub fn capability() -> &'static PlatformCapability {
    &DEFAULT_CAPABILITY
}
