//! Partition engine properties: coverage, scratch budget, idempotence,
//! core-count monotonicity and blob round trips.

mod common;

use common::*;
use proptest::prelude::*;
use tileforge::ops::section_layout;
use tileforge::partition::{
    plan_sub_tiles, split_cores, RowFootprint, RowLayout, ScratchBudget,
};
use tileforge::tiling_data::TilingBlob;
use tileforge::{DType, Planner};

#[test]
fn test_small_work_stays_on_one_core() {
    let split = split_cores(24, 1, 8, 1, 1024);
    assert_eq!(split.used_core_count, 1);
    assert_eq!(split.block_factor, 24);
    assert_eq!(split.tail_block_factor, 0);
}

#[test]
fn test_even_split_has_no_tail() {
    let split = split_cores(100_000, 1, 8, 1, 1024);
    assert_eq!(split.used_core_count, 8);
    assert_eq!(split.block_factor, 12_500);
    assert_eq!(split.tail_block_factor, 0);
}

#[test]
fn test_uneven_split_short_last_core() {
    let split = split_cores(100_003, 1, 8, 1, 1024);
    assert_eq!(split.used_core_count, 8);
    assert_eq!(split.block_factor, 12_501);
    // 7 full blocks of 12501 leave 12496 for the last core
    assert_eq!(split.tail_block_factor, 12_496);
    assert_eq!(split.last_core_share(), 12_496);
    assert_eq!(split.covered(), 100_003);
}

fn dtype_size() -> impl Strategy<Value = u64> {
    prop_oneof![Just(1u64), Just(2u64), Just(4u64), Just(8u64)]
}

proptest! {
    #[test]
    fn test_core_split_covers_total(
        total in 1u64..10_000_000,
        inner in 1u64..4096,
        cores in 1u32..64,
        block_align in 1u64..32,
    ) {
        let split = split_cores(total, inner, cores, block_align, 1024);
        prop_assert!(split.used_core_count >= 1);
        prop_assert!(split.used_core_count <= cores);
        prop_assert_eq!(split.covered(), total);
        // the last core carries at most one alignment block per other core extra
        let spread = u64::from(split.used_core_count - 1) * block_align;
        prop_assert!(split.last_core_share() <= split.block_factor + spread);
        prop_assert!(split.last_core_share() >= 1);
    }

    #[test]
    fn test_used_cores_monotonic_in_total(
        total in 1u64..1_000_000,
        extra in 0u64..1_000_000,
        cores in 1u32..=64,
        block_align in prop_oneof![Just(1u64), Just(8u64), Just(16u64), Just(32u64)],
    ) {
        let small = split_cores(total, 1, cores, block_align, 1024);
        let large = split_cores(total + extra, 1, cores, block_align, 1024);
        prop_assert!(small.used_core_count <= large.used_core_count);
        prop_assert!(large.used_core_count <= cores);
    }

    #[test]
    fn test_sub_tiles_respect_scratch_budget(
        total in 1u64..100_000,
        inner in 1u64..200_000,
        element_size in dtype_size(),
        buffers in 1u64..4,
        extra in 0u64..64,
        depth in 1u32..=3,
    ) {
        let budget = ScratchBudget {
            tier_bytes: 196_608,
            reserved_bytes: 1024,
            depth,
            alignment: 32,
        };
        let row = RowFootprint {
            inner,
            element_size,
            layout: RowLayout::Padded,
            buffers_per_row: buffers,
            extra_bytes_per_row: extra,
        };
        let split = split_cores(total, inner, 8, 1, 1024);
        let sub = plan_sub_tiles(&budget, &row, &split).unwrap();

        match sub.chunk {
            None => {
                prop_assert!(sub.sub_tile_factor >= 1);
                prop_assert!(sub.sub_tile_factor * row.row_bytes(32) <= budget.per_buffer());
                prop_assert!(sub.sub_tile_loop_count * sub.sub_tile_factor >= split.block_factor);
                prop_assert!((sub.sub_tile_loop_count - 1) * sub.sub_tile_factor < split.block_factor);
            }
            Some(chunk) => {
                let block_elems = (32 / element_size).max(1);
                prop_assert_eq!(chunk.chunk_size % block_elems, 0);
                prop_assert!(chunk.chunk_size * element_size * buffers + extra <= budget.per_buffer());
                prop_assert!(chunk.chunk_count * chunk.chunk_size >= inner);
                prop_assert_eq!(sub.sub_tile_factor, 1);
            }
        }
    }

    #[test]
    fn test_planning_is_idempotent_and_blob_round_trips(
        rows in 1u64..512,
        mid in 1u64..64,
        cols in 1u64..4096,
        mean in any::<bool>(),
    ) {
        let op = if mean { "ReduceMean" } else { "ReduceSum" };
        let ctx = reduce_ctx(op, &[rows, mid, cols], &[-1], DType::Float32);
        let planner = Planner::with_builtin_operators();

        let first = planner.plan(capability(), &ctx).unwrap();
        let second = planner.plan(capability(), &ctx).unwrap();
        prop_assert_eq!(&first.blob, &second.blob);
        prop_assert_eq!(first.variant_key, second.variant_key);

        let layout = section_layout(op).unwrap();
        prop_assert_eq!(first.blob.reencode(&layout).unwrap(), first.blob.bytes.clone());

        let reread = TilingBlob::from_hex(&first.blob.to_hex()).unwrap();
        prop_assert_eq!(reread, first.blob);
    }
}
