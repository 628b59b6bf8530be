//! Invocation contexts for the built-in operators

use tileforge::{DType, TilingContext};

pub fn rms_norm_ctx(shape: &[u64], dtype: DType) -> TilingContext {
    let cols = shape.last().copied().unwrap_or(1);
    TilingContext::new("RmsNorm")
        .with_input(shape, dtype)
        .with_input(&[cols], dtype)
        .with_output(shape, dtype)
        .with_attr("epsilon", 1e-6)
}

pub fn reduce_ctx(op: &str, shape: &[u64], axes: &[i64], dtype: DType) -> TilingContext {
    let rank = shape.len() as i64;
    let reduced: Vec<usize> = axes
        .iter()
        .map(|&a| if a < 0 { (a + rank) as usize } else { a as usize })
        .collect();
    let out: Vec<u64> = shape
        .iter()
        .enumerate()
        .filter(|(i, _)| !reduced.contains(i))
        .map(|(_, &d)| d)
        .collect();
    let out = if out.is_empty() { vec![1] } else { out };
    TilingContext::new(op)
        .with_input(shape, dtype)
        .with_output(&out, dtype)
        .with_attr("axes", axes.to_vec())
}

pub fn reverse_sequence_ctx(shape: &[u64], seq_dim: i64, batch_dim: i64, dtype: DType) -> TilingContext {
    let batch = shape[batch_dim as usize];
    TilingContext::new("ReverseSequence")
        .with_input(shape, dtype)
        .with_input(&[batch], DType::Int32)
        .with_output(shape, dtype)
        .with_attr("seq_dim", seq_dim)
        .with_attr("batch_dim", batch_dim)
}

pub fn adam_w_ctx(shape: &[u64], dtype: DType) -> TilingContext {
    let mut ctx = TilingContext::new("ApplyAdamW");
    for _ in 0..4 {
        ctx = ctx.with_input(shape, dtype);
    }
    for _ in 0..5 {
        ctx = ctx.with_input(&[1], dtype);
    }
    ctx.with_absent_input()
        .with_output(shape, dtype)
        .with_output(shape, dtype)
        .with_output(shape, dtype)
}
