//! Run planned blobs through the host dispatcher and check the lanes
//! reproduce the expected results.

mod common;

use common::*;
use std::sync::{Arc, Mutex};
use tileforge::kernel::{DecodedLaunch, KernelDispatcher, KernelRoutine, LaneAssignment};
use tileforge::ops::apply_adam_w::ApplyAdamWTilingData;
use tileforge::ops::reduce::{ReduceTilingData, FULL_LOAD_TEMPLATE, GROUP_SPLIT_TEMPLATE};
use tileforge::ops::reverse_sequence::ReverseSequenceTilingData;
use tileforge::partition::VariantKeyFields;
use tileforge::tiling_data::TilingData;
use tileforge::{DType, PlatformCapability, Planner, TilingError, TilingResult};

/// Row sums over the last axis, walking sub-tiles and chunks like the device
struct HostReduceSum {
    input: Vec<f32>,
    output: Arc<Mutex<Vec<f32>>>,
    passes: Arc<Mutex<u64>>,
}

impl HostReduceSum {
    fn sum_row(&self, launch: &DecodedLaunch, row: u64, reduce: u64) -> f32 {
        let base = (row * reduce) as usize;
        let header = &launch.header;
        if !launch.key.chunked {
            return self.input[base..base + reduce as usize].iter().sum();
        }
        let mut acc = 0.0;
        for chunk in 0..header.chunk_count {
            let start = chunk * header.chunk_size;
            let len = if chunk + 1 == header.chunk_count && header.tail_chunk_size != 0 {
                header.tail_chunk_size
            } else {
                header.chunk_size
            };
            let from = base + start as usize;
            acc += self.input[from..from + len as usize].iter().sum::<f32>();
        }
        acc
    }
}

impl KernelRoutine for HostReduceSum {
    fn name(&self) -> &'static str {
        "host_reduce_sum"
    }

    fn accepts(&self, key: &VariantKeyFields) -> bool {
        key.template_base == FULL_LOAD_TEMPLATE || key.template_base == GROUP_SPLIT_TEMPLATE
    }

    fn run_lane(&self, launch: &DecodedLaunch, lane: &LaneAssignment) -> TilingResult<()> {
        let section = ReduceTilingData::from_values(&launch.section)?;
        let factor = launch.header.sub_tile_factor.max(1);
        let mut output = self
            .output
            .lock()
            .map_err(|_| TilingError::Internal("output poisoned".to_string()))?;

        let mut row = lane.start;
        for pass in 0..lane.sub_tile_loops {
            let rows = if pass + 1 == lane.sub_tile_loops && lane.tail_sub_tile != 0 {
                lane.tail_sub_tile
            } else {
                factor
            };
            for r in row..row + rows {
                output[r as usize] = self.sum_row(launch, r, section.reduce);
            }
            row += rows;
        }
        if row != lane.start + lane.len {
            return Err(TilingError::Internal(format!(
                "lane {} walked to row {row}, share ends at {}",
                lane.lane,
                lane.start + lane.len
            )));
        }
        *self
            .passes
            .lock()
            .map_err(|_| TilingError::Internal("passes poisoned".to_string()))? +=
            lane.sub_tile_loops;
        Ok(())
    }
}

/// Counts elements touched by any elementwise routine
struct Coverage {
    template_base: u64,
    touched: Arc<Mutex<Vec<u8>>>,
}

impl Coverage {
    fn new(template_base: u64, len: u64) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let touched = Arc::new(Mutex::new(vec![0; len as usize]));
        (
            Self {
                template_base,
                touched: Arc::clone(&touched),
            },
            touched,
        )
    }
}

impl KernelRoutine for Coverage {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn accepts(&self, key: &VariantKeyFields) -> bool {
        key.template_base == self.template_base
    }

    fn run_lane(&self, _launch: &DecodedLaunch, lane: &LaneAssignment) -> TilingResult<()> {
        let mut touched = self
            .touched
            .lock()
            .map_err(|_| TilingError::Internal("coverage poisoned".to_string()))?;
        for i in lane.start..lane.start + lane.len {
            touched[i as usize] += 1;
        }
        Ok(())
    }
}

fn reduce_and_check(rows: u64, cols: u64) -> (String, u64) {
    let ctx = reduce_ctx("ReduceSum", &[rows, cols], &[-1], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    let input: Vec<f32> = (0..rows * cols).map(|i| (i % 7) as f32).collect();
    let expected: Vec<f32> = input
        .chunks(cols as usize)
        .map(|row| row.iter().sum())
        .collect();

    let results = Arc::new(Mutex::new(vec![0.0; rows as usize]));
    let passes = Arc::new(Mutex::new(0u64));
    let mut dispatcher = KernelDispatcher::new(ReduceTilingData::LAYOUT);
    dispatcher.register(Box::new(HostReduceSum {
        input,
        output: Arc::clone(&results),
        passes: Arc::clone(&passes),
    }));
    let report = dispatcher.dispatch(&output.blob).unwrap();
    assert_eq!(report.routine, "host_reduce_sum");
    assert_eq!(report.rows_covered(), rows);
    assert_eq!(report.lanes.len() as u32, output.launch_grid);

    assert_eq!(*results.lock().unwrap(), expected);
    let passes = *passes.lock().unwrap();
    (output.strategy.to_string(), passes)
}

#[test]
fn test_full_load_reduce_matches_host_sum() {
    let (strategy, passes) = reduce_and_check(37, 513);
    assert_eq!(strategy, "ReduceFullLoad");
    assert!(passes >= 1);
}

#[test]
fn test_chunked_reduce_matches_host_sum() {
    let (strategy, passes) = reduce_and_check(3, 100_000);
    assert_eq!(strategy, "ReduceGroupSplit");
    // one pass per row when rows are chunked
    assert_eq!(passes, 3);
}

#[test]
fn test_adam_w_lanes_touch_every_element_once() {
    let numel = 100_003u64;
    let ctx = adam_w_ctx(&[numel], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    let (coverage, touched) = Coverage::new(4_000_000, numel);
    let mut dispatcher = KernelDispatcher::new(ApplyAdamWTilingData::LAYOUT);
    dispatcher.register(Box::new(coverage));
    let report = dispatcher.dispatch(&output.blob).unwrap();
    assert_eq!(report.rows_covered(), numel);
    assert!(touched.lock().unwrap().iter().all(|&t| t == 1));
    for pair in report.lanes.windows(2) {
        assert_eq!(pair[0].start + pair[0].len, pair[1].start);
    }
}

#[test]
fn test_long_last_lane_still_covers_once() {
    let wide = PlatformCapability::from_json_str(r#"{"CORE_NUM": 48, "UB_SIZE": 196608}"#).unwrap();
    let numel = 2305u64;
    let output = Planner::with_builtin_operators()
        .plan(&wide, &adam_w_ctx(&[numel], DType::Float32))
        .unwrap();

    let (coverage, touched) = Coverage::new(4_000_000, numel);
    let mut dispatcher = KernelDispatcher::new(ApplyAdamWTilingData::LAYOUT);
    dispatcher.register(Box::new(coverage));
    let report = dispatcher.dispatch(&output.blob).unwrap();
    assert_eq!(report.lanes.len(), 48);
    assert_eq!(report.lanes[47].len, 49);
    assert!(touched.lock().unwrap().iter().all(|&t| t == 1));
}

#[test]
fn test_reverse_sequence_bsa_rows_partition_cleanly() {
    let ctx = reverse_sequence_ctx(&[4, 100, 64], 1, 0, DType::Float16);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    let (coverage, touched) = Coverage::new(3_000_000, output.plan.total);
    let mut dispatcher = KernelDispatcher::new(ReverseSequenceTilingData::LAYOUT);
    dispatcher.register(Box::new(coverage));
    let report = dispatcher.dispatch(&output.blob).unwrap();
    assert!(touched.lock().unwrap().iter().all(|&t| t == 1));
    assert_eq!(report.rows_covered(), output.plan.total);
    assert_eq!(report.lanes.len(), 8);
}

#[test]
fn test_unmatched_key_is_unsupported() {
    let ctx = adam_w_ctx(&[1024], DType::Float32);
    let output = Planner::with_builtin_operators()
        .plan(capability(), &ctx)
        .unwrap();

    let mut dispatcher = KernelDispatcher::new(ApplyAdamWTilingData::LAYOUT);
    dispatcher.register(Box::new(Coverage::new(1_000_000, 1024).0));
    let err = dispatcher.dispatch(&output.blob).unwrap_err();
    assert_eq!(err.kind(), "UnsupportedConfigurationError");
}
