//! Tiling blob: header plus operator section, handed to the device

use super::header::PlanHeader;
use super::layout::{FieldValue, TilingLayout};
use super::TilingData;
use crate::error::{TilingError, TilingResult};
use crate::partition::{PartitionPlan, VariantKey};
use crate::workspace::WorkspaceRequest;
use std::fmt::Write;

/// Raw tiling buffer capacity of the runtime
pub const MAX_TILING_DATA_SIZE: usize = 8192;

/// Operator-specific fields appended after the header
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorSection {
    pub layout: TilingLayout,
    pub values: Vec<FieldValue>,
}

impl OperatorSection {
    pub fn from_data<T: TilingData>(data: &T) -> Self {
        Self {
            layout: T::LAYOUT,
            values: data.to_values(),
        }
    }

    pub fn encode(&self) -> TilingResult<Vec<u8>> {
        self.layout.encode(&self.values)
    }
}

/// Serialized plan with its launch metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingBlob {
    pub bytes: Vec<u8>,
    /// Declared size; equals `bytes.len()`
    pub data_size: usize,
    pub variant_key: VariantKey,
    pub launch_grid: u32,
}

/// Pack a finished plan and its workspace into a blob
pub fn serialize(
    plan: &PartitionPlan,
    workspace: &WorkspaceRequest,
    section: &OperatorSection,
) -> TilingResult<TilingBlob> {
    let header = PlanHeader::from_plan(plan, workspace)?;
    let mut bytes = header.encode()?;
    bytes.extend(section.encode()?);

    if bytes.len() > MAX_TILING_DATA_SIZE {
        return Err(TilingError::Internal(format!(
            "tiling data of {} bytes exceeds the {MAX_TILING_DATA_SIZE}-byte buffer",
            bytes.len()
        )));
    }

    Ok(TilingBlob {
        data_size: bytes.len(),
        bytes,
        variant_key: plan.variant_key,
        launch_grid: plan.used_core_count,
    })
}

impl TilingBlob {
    /// Wrap bytes received from elsewhere (CLI, device dumps)
    pub fn from_bytes(bytes: Vec<u8>) -> TilingResult<Self> {
        let header = PlanHeader::decode(&bytes)?;
        Ok(Self {
            data_size: bytes.len(),
            variant_key: VariantKey(header.variant_key),
            launch_grid: header.used_core_count,
            bytes,
        })
    }

    pub fn header(&self) -> TilingResult<PlanHeader> {
        PlanHeader::decode(&self.bytes)
    }

    /// Bytes after the header
    pub fn section_bytes(&self) -> &[u8] {
        let start = PlanHeader::layout().size().min(self.bytes.len());
        &self.bytes[start..]
    }

    pub fn decode_section(&self, layout: &TilingLayout) -> TilingResult<Vec<FieldValue>> {
        layout.decode(self.section_bytes())
    }

    /// Decode every field and encode it again
    pub fn reencode(&self, layout: &TilingLayout) -> TilingResult<Vec<u8>> {
        let mut bytes = self.header()?.encode()?;
        bytes.extend(layout.encode(&self.decode_section(layout)?)?);
        Ok(bytes)
    }

    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn from_hex(hex: &str) -> TilingResult<Self> {
        let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
        if !hex.is_ascii() {
            return Err(TilingError::Internal("hex string is not ASCII".to_string()));
        }
        if hex.len() % 2 != 0 {
            return Err(TilingError::Internal(format!(
                "hex string has odd length {}",
                hex.len()
            )));
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|e| TilingError::Internal(format!("bad hex at {i}: {e}")))
            })
            .collect::<TilingResult<Vec<u8>>>()?;
        Self::from_bytes(bytes)
    }

    /// Field-by-field listing of header and section
    pub fn dump(&self, section: &TilingLayout) -> TilingResult<String> {
        let header_layout = PlanHeader::layout();
        let header_values = header_layout.decode(&self.bytes)?;
        let section_values = self.decode_section(section)?;

        let mut out = String::new();
        let _ = writeln!(
            out,
            "TilingBlob: {} bytes, variant key {}, grid {}",
            self.data_size, self.variant_key, self.launch_grid
        );
        out.push_str(&header_layout.dump(&header_values));
        out.push_str(&section.dump(&section_values));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::DType;
    use crate::partition::{
        merge_axes, partition, IterationSpace, MergedAxes, PartitionConfig, PartitionRequest,
    };
    use crate::platform::PlatformCapability;
    use crate::tiling_data;

    tiling_data! {
        pub struct ProbeData {
            rows: u64,
            factor: f32,
        }
    }

    fn plan_for(merged: MergedAxes, space: IterationSpace) -> PartitionPlan {
        let cap = PlatformCapability::from_json_str(r#"{"CORE_NUM": 8, "UB_SIZE": 196608}"#)
            .unwrap();
        let request = PartitionRequest::new(200_000, merged, space, DType::Float16);
        partition(&cap, &PartitionConfig::default(), &request).unwrap()
    }

    fn workspace() -> WorkspaceRequest {
        WorkspaceRequest {
            system_reserved_bytes: 16 * 1024 * 1024,
            user_bytes: 0,
            buffers: Vec::new(),
        }
    }

    fn section() -> OperatorSection {
        OperatorSection::from_data(&ProbeData {
            rows: 12,
            factor: 0.5,
        })
    }

    #[test]
    fn test_serialize_layout() {
        let plan = plan_for(MergedAxes::flat(4096, 1), IterationSpace::elementwise(4096));
        let blob = serialize(&plan, &workspace(), &section()).unwrap();

        assert_eq!(blob.data_size, PlanHeader::SIZE_HINT + 16);
        assert_eq!(blob.launch_grid, plan.used_core_count);
        assert_eq!(blob.variant_key, plan.variant_key);
        assert_eq!(
            blob.decode_section(&ProbeData::LAYOUT).unwrap(),
            vec![FieldValue::U64(12), FieldValue::F32(0.5)]
        );
    }

    #[test]
    fn test_reencode_reproduces_bytes() {
        let merged = merge_axes("probe", &[4, 6, 32], &[1], 4).unwrap();
        let space = IterationSpace::from_merged(&merged, crate::partition::RowLayout::Padded);
        let plan = plan_for(merged, space);
        let blob = serialize(&plan, &workspace(), &section()).unwrap();
        assert_eq!(blob.reencode(&ProbeData::LAYOUT).unwrap(), blob.bytes);
    }

    #[test]
    fn test_hex_round_trip() {
        let plan = plan_for(MergedAxes::flat(64, 1), IterationSpace::elementwise(64));
        let blob = serialize(&plan, &workspace(), &section()).unwrap();
        let parsed = TilingBlob::from_hex(&blob.to_hex()).unwrap();
        assert_eq!(parsed, blob);
        assert!(TilingBlob::from_hex("abc").is_err());
        assert!(TilingBlob::from_hex("zz").is_err());
    }

    #[test]
    fn test_dump_lists_fields() {
        let plan = plan_for(MergedAxes::flat(64, 1), IterationSpace::elementwise(64));
        let blob = serialize(&plan, &workspace(), &section()).unwrap();
        let dump = blob.dump(&ProbeData::LAYOUT).unwrap();
        assert!(dump.contains("PlanHeader (184 bytes)"));
        assert!(dump.contains("block_factor"));
        assert!(dump.contains("ProbeData (16 bytes)"));
        assert!(dump.contains("rows"));
    }

    #[test]
    fn test_oversized_section_is_rejected() {
        static MANY: [crate::tiling_data::FieldDef; 1100] = [crate::tiling_data::FieldDef {
            name: "pad",
            kind: crate::tiling_data::FieldKind::U64,
        }; 1100];
        let layout = TilingLayout {
            name: "Huge",
            fields: &MANY,
        };
        let section = OperatorSection {
            layout,
            values: vec![FieldValue::U64(0); 1100],
        };
        let plan = plan_for(MergedAxes::flat(64, 1), IterationSpace::elementwise(64));
        let err = serialize(&plan, &workspace(), &section).unwrap_err();
        assert_eq!(err.kind(), "InternalError");
    }
}
