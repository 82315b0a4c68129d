//! Common test utilities
//!
//! - One shared stream for all integration tests (pool built once)
//! - Seeded random logits so failures are reproducible
//! - Tolerance helpers per storage type

#![allow(dead_code)]

use once_cell::sync::Lazy;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
pub use serial_test::serial;
use warpforge::{DType, ExecutionStream, StreamConfig, Tensor};

/// Shared stream for integration tests
pub static STREAM: Lazy<ExecutionStream> = Lazy::new(|| {
    ExecutionStream::new(
        StreamConfig::new()
            .with_num_threads(4)
            .with_thread_name_prefix("warpforge-test"),
    )
    .expect("test stream should build")
});

pub fn stream() -> &'static ExecutionStream {
    &STREAM
}

/// Uniform logits in `[-range, range)`
pub fn random_logits(seed: u64, len: usize, range: f32) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-range..range)).collect()
}

/// 0/1 mask with roughly `keep` of the entries set
pub fn random_mask(seed: u64, len: usize, keep: f64) -> Vec<f32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| if rng.gen_bool(keep) { 1.0 } else { 0.0 })
        .collect()
}

pub fn tensor(values: &[f32], dims: &[usize], dtype: DType) -> Tensor {
    Tensor::from_f32(values, dims, dtype).expect("test tensor should build")
}

/// Absolute tolerance appropriate for values in `[0, 1]`
pub fn tolerance(dtype: DType) -> f32 {
    match dtype {
        DType::F16 => 2e-3,
        DType::BF16 => 1.6e-2,
        _ => 1e-5,
    }
}

pub fn assert_close(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "element {}: got {}, expected {} (tol {})",
            i,
            a,
            e,
            tol
        );
    }
}

pub fn row_sums(values: &[f32], cols: usize) -> Vec<f32> {
    values.chunks(cols).map(|row| row.iter().sum()).collect()
}
