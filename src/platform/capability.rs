//! Accelerator capability parsed from a platform description

use crate::error::{config_err, TilingError, TilingResult};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Default near-tier (L1) size when the description omits it
pub const DEFAULT_L1_SIZE: u64 = 524_288;
/// Default far-tier (L2) size when the description omits it
pub const DEFAULT_L2_SIZE: u64 = 33_554_432;
/// Default alignment granularity of the fast tier
pub const DEFAULT_UB_BLOCK_SIZE: u64 = 32;
/// Runtime bookkeeping reserved in the device workspace per engine
pub const DEFAULT_SYS_WORKSPACE_SIZE: u64 = 16 * 1024 * 1024;
pub const DEFAULT_SOC_VERSION: &str = "Ascend910B";

const KEY_CORE_NUM: &str = "CORE_NUM";
const KEY_CUBE_CORE_NUM: &str = "CUBE_CORE_NUM";
const KEY_UB_SIZE: &str = "UB_SIZE";
const KEY_L1_SIZE: &str = "L1_SIZE";
const KEY_L2_SIZE: &str = "L2_SIZE";
const KEY_UB_BLOCK_SIZE: &str = "UB_BLOCK_SIZE";
const KEY_SOC_VERSION: &str = "SOC_VERSION";
const KEY_SYS_WORKSPACE: &str = "SYS_WORKSPACE_SIZE";
const KEY_CUBE_SYS_WORKSPACE: &str = "CUBE_SYS_WORKSPACE_SIZE";

/// Which accelerator engine executes a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EngineKind {
    /// Vector engine: primary core count, fast (UB) tier
    Vector,
    /// Cube engine: secondary core count, near (L1) tier
    Cube,
}

impl EngineKind {
    pub fn scratch_tier(&self) -> ScratchTier {
        match self {
            EngineKind::Vector => ScratchTier::Fast,
            EngineKind::Cube => ScratchTier::Near,
        }
    }
}

/// On-chip memory tiers, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScratchTier {
    Fast,
    Near,
    Far,
}

/// Immutable hardware budget shared by every invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformCapability {
    pub core_count_primary: u32,
    pub core_count_secondary: u32,
    pub fast_tier_bytes: u64,
    pub near_tier_bytes: u64,
    pub far_tier_bytes: u64,
    pub alignment_bytes: u64,
    pub soc_version: String,
    pub vector_sys_workspace_bytes: u64,
    pub cube_sys_workspace_bytes: u64,
}

impl PlatformCapability {
    /// Parse a JSON platform description.
    ///
    /// Accepts either `{"hardware_info": {...}}` or a flat object. Values may be
    /// numbers or decimal strings; nested objects other than `hardware_info`
    /// are ignored.
    pub fn from_json_str(description: &str) -> TilingResult<Self> {
        let value: serde_json::Value = serde_json::from_str(description)
            .map_err(|e| config_err("platform description", "valid JSON", e))?;

        let object = match value.get("hardware_info") {
            Some(inner) => inner,
            None => &value,
        };
        let object = object.as_object().ok_or_else(|| {
            config_err("platform description", "JSON object", describe_json(object))
        })?;

        let mut map = HashMap::new();
        for (key, value) in object {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                _ => continue,
            };
            map.insert(key.clone(), text);
        }
        Self::from_map(&map)
    }

    /// Build from a key/value map. Keys are case-insensitive.
    pub fn from_map(entries: &HashMap<String, String>) -> TilingResult<Self> {
        let normalized: HashMap<String, &str> = entries
            .iter()
            .map(|(k, v)| (normalize_key(k), v.as_str()))
            .collect();
        let lookup = |key: &str| normalized.get(&normalize_key(key)).copied();

        let core_count_primary = required_u64(KEY_CORE_NUM, lookup(KEY_CORE_NUM))?;
        let core_count_primary = positive_u32(KEY_CORE_NUM, core_count_primary)?;

        let core_count_secondary = match lookup(KEY_CUBE_CORE_NUM) {
            Some(raw) => positive_u32(KEY_CUBE_CORE_NUM, parse_u64(KEY_CUBE_CORE_NUM, raw)?)?,
            None => (core_count_primary / 2).max(1),
        };

        let fast_tier_bytes = required_u64(KEY_UB_SIZE, lookup(KEY_UB_SIZE))?;
        if fast_tier_bytes == 0 {
            return Err(config_err(KEY_UB_SIZE, "positive byte count", 0));
        }
        let near_tier_bytes = optional_u64(KEY_L1_SIZE, lookup(KEY_L1_SIZE), DEFAULT_L1_SIZE)?;
        let far_tier_bytes = optional_u64(KEY_L2_SIZE, lookup(KEY_L2_SIZE), DEFAULT_L2_SIZE)?;

        let alignment_bytes = optional_u64(
            KEY_UB_BLOCK_SIZE,
            lookup(KEY_UB_BLOCK_SIZE),
            DEFAULT_UB_BLOCK_SIZE,
        )?;
        if !alignment_bytes.is_power_of_two() {
            return Err(config_err(
                KEY_UB_BLOCK_SIZE,
                "power of two",
                alignment_bytes,
            ));
        }

        let soc_version = lookup(KEY_SOC_VERSION)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SOC_VERSION.to_string());

        let vector_sys_workspace_bytes = optional_u64(
            KEY_SYS_WORKSPACE,
            lookup(KEY_SYS_WORKSPACE),
            DEFAULT_SYS_WORKSPACE_SIZE,
        )?;
        let cube_sys_workspace_bytes = optional_u64(
            KEY_CUBE_SYS_WORKSPACE,
            lookup(KEY_CUBE_SYS_WORKSPACE),
            vector_sys_workspace_bytes,
        )?;

        Ok(Self {
            core_count_primary,
            core_count_secondary,
            fast_tier_bytes,
            near_tier_bytes,
            far_tier_bytes,
            alignment_bytes,
            soc_version,
            vector_sys_workspace_bytes,
            cube_sys_workspace_bytes,
        })
    }

    /// Read a JSON platform description from disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> TilingResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(TilingError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn core_count(&self, engine: EngineKind) -> u32 {
        match engine {
            EngineKind::Vector => self.core_count_primary,
            EngineKind::Cube => self.core_count_secondary,
        }
    }

    pub fn tier_bytes(&self, tier: ScratchTier) -> u64 {
        match tier {
            ScratchTier::Fast => self.fast_tier_bytes,
            ScratchTier::Near => self.near_tier_bytes,
            ScratchTier::Far => self.far_tier_bytes,
        }
    }

    /// Scratch tier used for sub-tiling on the given engine
    pub fn scratch_bytes(&self, engine: EngineKind) -> u64 {
        self.tier_bytes(engine.scratch_tier())
    }

    pub fn system_reserved_bytes(&self, engine: EngineKind) -> u64 {
        match engine {
            EngineKind::Vector => self.vector_sys_workspace_bytes,
            EngineKind::Cube => self.cube_sys_workspace_bytes,
        }
    }

    /// Round `bytes` up to the platform alignment
    pub fn align_up(&self, bytes: u64) -> u64 {
        align_up(bytes, self.alignment_bytes)
    }

    /// Number of elements of `element_size` bytes in one alignment block
    pub fn block_elements(&self, element_size: u64) -> u64 {
        if element_size == 0 {
            return 1;
        }
        (self.alignment_bytes / element_size).max(1)
    }
}

/// Round up to a power-of-two alignment
pub fn align_up(bytes: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return bytes;
    }
    bytes.saturating_add(alignment - 1) & !(alignment - 1)
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_uppercase)
        .collect()
}

fn parse_u64(key: &str, raw: &str) -> TilingResult<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| config_err(key, "non-negative integer", raw))
}

fn required_u64(key: &str, raw: Option<&str>) -> TilingResult<u64> {
    match raw {
        Some(raw) => parse_u64(key, raw),
        None => Err(config_err(key, "required key", "missing")),
    }
}

fn optional_u64(key: &str, raw: Option<&str>, default: u64) -> TilingResult<u64> {
    raw.map_or(Ok(default), |raw| parse_u64(key, raw))
}

fn positive_u32(key: &str, value: u64) -> TilingResult<u32> {
    if value == 0 {
        return Err(config_err(key, "positive core count", value));
    }
    u32::try_from(value).map_err(|_| config_err(key, "core count <= u32::MAX", value))
}

fn describe_json(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
