//! Row-wise softmax kernels
//!
//! Each row of a `rows x cols` row-major matrix is normalized by one 32-lane
//! warp: lanes load their column slice into a fixed per-lane buffer, a
//! butterfly all-reduce produces the row max, a second one the sum of
//! stabilized exponentials, and each lane writes its slice back. All
//! arithmetic is `f32` regardless of storage type.
//!
//! Variants:
//! - plain softmax and its gradient
//! - scale + mask (sentinel `-1e9`) and its gradient
//! - scale + mask + bias (sentinel `-1e10`); its gradient *is* the
//!   scale + mask gradient, since an additive shift drops out of the Jacobian
//!
//! The functions here take flat slices plus explicit `rows`, `cols`, `head`
//! and `scale`. Tensor validation and dtype dispatch live in
//! [`crate::ops::softmax`].

pub mod backward;
pub mod broadcast;
pub mod forward;
pub mod launch;
pub mod partition;
pub mod reference;
pub mod warp;


pub use backward::{scale_mask_softmax_backward, softmax_backward};
pub use broadcast::HeadBroadcast;
pub use forward::{
    scale_mask_bias_softmax_forward, scale_mask_softmax_forward, softmax_forward,
    MASK_BIAS_SENTINEL, MASK_SENTINEL,
};
pub use launch::{
    LaneCapacity, LaunchGeometry, MAX_COLS_PER_LANE, MAX_SUPPORTED_COLS, ROWS_PER_BLOCK,
    THREADS_PER_BLOCK,
};
pub use partition::ColumnPartition;
pub use warp::{warp_all_reduce_max, warp_all_reduce_sum, WARP_SIZE};

use crate::error::{ForgeResult, WarpForgeError};

/// Geometry for a `rows x cols` launch, rejecting empty and over-wide rows
pub(crate) fn checked_geometry(rows: usize, cols: usize) -> ForgeResult<LaunchGeometry> {
    if rows == 0 || cols == 0 {
        return Err(WarpForgeError::InvalidTensorShape(format!(
            "softmax needs rows >= 1 and cols >= 1, got {} x {}",
            rows, cols
        )));
    }
    if cols > MAX_SUPPORTED_COLS {
        return Err(WarpForgeError::ColumnsExceedCapacity {
            cols,
            max: MAX_SUPPORTED_COLS,
        });
    }
    Ok(LaunchGeometry::new(rows, cols))
}

pub(crate) fn check_len<T>(name: &'static str, buf: &[T], expected: usize) -> ForgeResult<()> {
    if buf.len() != expected {
        return Err(WarpForgeError::BufferLengthMismatch {
            name,
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}
