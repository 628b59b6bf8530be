//! Generic plan header that leads every tiling blob

use super::layout::TilingLayout;
use super::TilingData;
use crate::error::{TilingError, TilingResult};
use crate::partition::{ChunkPlan, CombineType, MergedAxes, PartitionPlan, MAX_ENCODED_DIMS};
use crate::tiling_data;
use crate::workspace::WorkspaceRequest;

tiling_data! {
    /// Partition and workspace fields shared by every operator
    pub struct PlanHeader {
        variant_key: u64,
        used_core_count: u32,
        double_buffer_depth: u32,
        total: u64,
        inner: u64,
        block_factor: u64,
        tail_block_factor: u64,
        sub_tile_factor: u64,
        sub_tile_loop_count: u64,
        tail_sub_tile_size: u64,
        last_core_loop_count: u64,
        last_core_tail_sub_tile: u64,
        chunk_size: u64,
        chunk_count: u64,
        tail_chunk_size: u64,
        element_size: u32,
        promoted_dtype_size: u32,
        promoted_inner: u64,
        combine_type: u32,
        merged_dim_count: u32,
        merged_dim0: u64,
        merged_dim1: u64,
        merged_dim2: u64,
        merged_dim3: u64,
        system_workspace_bytes: u64,
        user_workspace_bytes: u64,
    }
}

fn narrow(field: &str, value: u64) -> TilingResult<u32> {
    u32::try_from(value)
        .map_err(|_| TilingError::Internal(format!("{field} = {value} does not fit u32")))
}

impl PlanHeader {
    pub const SIZE_HINT: usize = 184;

    pub fn layout() -> TilingLayout {
        <Self as TilingData>::LAYOUT
    }

    pub fn from_plan(plan: &PartitionPlan, workspace: &WorkspaceRequest) -> TilingResult<Self> {
        let dims = plan.merged_axes.dims();
        if dims.len() > MAX_ENCODED_DIMS {
            return Err(TilingError::UnsupportedConfiguration {
                op: "serializer".to_string(),
                detail: format!(
                    "{} merged dims, at most {MAX_ENCODED_DIMS} can be encoded",
                    dims.len()
                ),
            });
        }
        let dim = |i: usize| dims.get(i).copied().unwrap_or(0);
        let chunk = plan.chunk.unwrap_or(ChunkPlan {
            chunk_size: 0,
            chunk_count: 0,
            tail_chunk_size: 0,
        });

        Ok(Self {
            variant_key: plan.variant_key.value(),
            used_core_count: plan.used_core_count,
            double_buffer_depth: plan.double_buffer_depth,
            total: plan.total,
            inner: plan.inner,
            block_factor: plan.block_factor,
            tail_block_factor: plan.tail_block_factor,
            sub_tile_factor: plan.sub_tile_factor,
            sub_tile_loop_count: plan.sub_tile_loop_count,
            tail_sub_tile_size: plan.tail_sub_tile_size,
            last_core_loop_count: plan.last_core_loop_count,
            last_core_tail_sub_tile: plan.last_core_tail_sub_tile,
            chunk_size: chunk.chunk_size,
            chunk_count: chunk.chunk_count,
            tail_chunk_size: chunk.tail_chunk_size,
            element_size: narrow("element_size", plan.element_size)?,
            promoted_dtype_size: narrow("promoted_dtype_size", plan.promoted_dtype_size)?,
            promoted_inner: plan.promoted_inner,
            combine_type: narrow("combine_type", plan.merged_axes.combine.code())?,
            merged_dim_count: narrow("merged_dim_count", dims.len() as u64)?,
            merged_dim0: dim(0),
            merged_dim1: dim(1),
            merged_dim2: dim(2),
            merged_dim3: dim(3),
            system_workspace_bytes: workspace.system_reserved_bytes,
            user_workspace_bytes: workspace.user_bytes,
        })
    }

    pub fn chunk(&self) -> Option<ChunkPlan> {
        (self.chunk_size > 0).then_some(ChunkPlan {
            chunk_size: self.chunk_size,
            chunk_count: self.chunk_count,
            tail_chunk_size: self.tail_chunk_size,
        })
    }

    pub fn combine(&self) -> Option<CombineType> {
        CombineType::from_code(u64::from(self.combine_type))
    }

    pub fn merged_dims(&self) -> Vec<u64> {
        let all = [self.merged_dim0, self.merged_dim1, self.merged_dim2, self.merged_dim3];
        all.iter()
            .take(self.merged_dim_count as usize)
            .copied()
            .collect()
    }

    /// Rows of the last used core
    pub fn last_core_share(&self) -> u64 {
        if self.tail_block_factor == 0 {
            self.block_factor
        } else {
            self.tail_block_factor
        }
    }

    /// Shape-only check that the merged dims are what the header claims
    pub fn matches_axes(&self, merged: &MergedAxes) -> bool {
        self.merged_dims() == merged.dims()
            && u64::from(self.combine_type) == merged.combine.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::DType;
    use crate::partition::{partition, IterationSpace, PartitionConfig, PartitionRequest};
    use crate::platform::PlatformCapability;

    fn plan() -> PartitionPlan {
        let cap = PlatformCapability::from_json_str(r#"{"CORE_NUM": 8, "UB_SIZE": 196608}"#)
            .unwrap();
        let request = PartitionRequest::new(
            100_000,
            MergedAxes::flat(100_003, 1),
            IterationSpace::elementwise(100_003),
            DType::Float32,
        );
        partition(&cap, &PartitionConfig::default(), &request).unwrap()
    }

    fn workspace() -> WorkspaceRequest {
        WorkspaceRequest {
            system_reserved_bytes: 4096,
            user_bytes: 64,
            buffers: Vec::new(),
        }
    }

    #[test]
    fn test_header_size_is_fixed() {
        assert_eq!(PlanHeader::layout().size(), PlanHeader::SIZE_HINT);
    }

    #[test]
    fn test_from_plan_copies_fields() {
        let plan = plan();
        let header = PlanHeader::from_plan(&plan, &workspace()).unwrap();
        assert_eq!(header.variant_key, plan.variant_key.value());
        assert_eq!(header.used_core_count, plan.used_core_count);
        assert_eq!(header.block_factor, plan.block_factor);
        assert_eq!(header.last_core_share(), plan.last_core_share());
        assert_eq!(header.merged_dims(), vec![100_003]);
        assert!(header.matches_axes(&plan.merged_axes));
        assert_eq!(header.chunk(), None);
        assert_eq!(header.system_workspace_bytes, 4096);
        assert_eq!(header.user_workspace_bytes, 64);
    }

    #[test]
    fn test_header_decodes_by_position() {
        let header = PlanHeader::from_plan(&plan(), &workspace()).unwrap();
        let bytes = header.encode().unwrap();
        assert_eq!(&bytes[0..8], &header.variant_key.to_le_bytes());
        assert_eq!(&bytes[8..12], &header.used_core_count.to_le_bytes());
        assert_eq!(PlanHeader::decode(&bytes).unwrap(), header);
    }
}
