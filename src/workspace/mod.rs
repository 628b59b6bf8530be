//! Device workspace sizing
//!
//! The caller allocates one global scratch region before launch. Its size is
//! the engine's fixed system reservation plus whatever the selected strategy
//! needs for intermediates (partial reductions, staging). User buffers are
//! aligned individually, matching how the device carves the region.
//!
//! # Example
//! ```ignore
//! let mut sizer = WorkspaceSizer::with_alignment(32);
//! sizer.add_buffer("partial_sums", 8 * 1024, 4);
//! assert_eq!(sizer.total_bytes(), 32768);
//! ```

use crate::partition::PartitionPlan;
use crate::platform::{align_up, PlatformCapability};
use serde::Serialize;

/// Plan-dependent user workspace a strategy asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserWorkspace {
    /// Pure streaming, no intermediates
    #[default]
    None,
    /// Constant byte count regardless of the plan
    Fixed(u64),
    /// `buffers` buffers of `used_core_count * max_share * inner` elements
    PerCore {
        buffers: u64,
        element_size: u64,
        double_buffered: bool,
    },
}

/// Final scratch requirement handed back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceRequest {
    pub system_reserved_bytes: u64,
    pub user_bytes: u64,
    /// Named user buffers after alignment
    pub buffers: Vec<(String, u64)>,
}

impl WorkspaceRequest {
    pub fn total_bytes(&self) -> u64 {
        self.system_reserved_bytes.saturating_add(self.user_bytes)
    }
}

/// Accumulates aligned user buffers
#[derive(Debug, Clone)]
pub struct WorkspaceSizer {
    buffers: Vec<(String, u64)>,
    alignment: u64,
}

impl WorkspaceSizer {
    /// Default alignment of workspace sub-buffers
    pub const DEFAULT_ALIGNMENT: u64 = 32;

    pub fn new() -> Self {
        Self::with_alignment(Self::DEFAULT_ALIGNMENT)
    }

    pub fn with_alignment(alignment: u64) -> Self {
        Self {
            buffers: Vec::new(),
            alignment,
        }
    }

    /// Add a buffer of `element_count` elements, aligned up
    pub fn add_buffer(&mut self, name: impl Into<String>, element_count: u64, element_size: u64) {
        let bytes = element_count.saturating_mul(element_size);
        self.add_bytes(name, bytes);
    }

    pub fn add_bytes(&mut self, name: impl Into<String>, bytes: u64) {
        if bytes == 0 {
            return;
        }
        self.buffers.push((name.into(), align_up(bytes, self.alignment)));
    }

    pub fn total_bytes(&self) -> u64 {
        self.buffers
            .iter()
            .fold(0u64, |acc, (_, size)| acc.saturating_add(*size))
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffers(&self) -> &[(String, u64)] {
        &self.buffers
    }

    /// Finish with the system reservation of the plan's engine
    pub fn finish(self, system_reserved_bytes: u64) -> WorkspaceRequest {
        WorkspaceRequest {
            system_reserved_bytes,
            user_bytes: self.total_bytes(),
            buffers: self.buffers,
        }
    }
}

impl Default for WorkspaceSizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Size the workspace for a finished plan. Never fails.
pub fn size(
    capability: &PlatformCapability,
    plan: &PartitionPlan,
    user: &UserWorkspace,
) -> WorkspaceRequest {
    let mut sizer = WorkspaceSizer::with_alignment(capability.alignment_bytes);
    match *user {
        UserWorkspace::None => {}
        UserWorkspace::Fixed(bytes) => sizer.add_bytes("user", bytes),
        UserWorkspace::PerCore {
            buffers,
            element_size,
            double_buffered,
        } => {
            let per_buffer = u64::from(plan.used_core_count)
                .saturating_mul(plan.core_split().max_share())
                .saturating_mul(plan.inner);
            let copies = if double_buffered { 2 } else { 1 };
            for index in 0..buffers.saturating_mul(copies) {
                sizer.add_buffer(format!("per_core_{index}"), per_buffer, element_size);
            }
        }
    }
    sizer.finish(capability.system_reserved_bytes(plan.engine))
}
