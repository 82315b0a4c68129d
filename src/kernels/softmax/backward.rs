//! Backward kernels
//!
//! For `y = softmax(x)` and upstream gradient `dy`, the input gradient is
//! `dx[i] = y[i] * (dy[i] - sum_j y[j] * dy[j])`. Only `y` and `dy` are
//! needed. The fused variant multiplies by `scale` and writes an exact zero
//! wherever the mask is zero. Bias is a constant shift inside the softmax and
//! has no term here, so the scale + mask + bias forward shares
//! [`scale_mask_softmax_backward`].

use super::broadcast::HeadBroadcast;
use super::launch::{for_each_row, with_lane_capacity};
use super::partition::ColumnPartition;
use super::warp::{warp_all_reduce_sum, LaneValues, WARP_SIZE};
use super::{check_len, checked_geometry};
use crate::error::ForgeResult;
use crate::tensor::StorageElement;

/// One warp computes one row of the input gradient.
///
/// `finish(col, g)` post-processes the plain Jacobian-vector product `g`
/// before it is narrowed and stored.
#[inline]
fn warp_softmax_grad_row<T, const CAP: usize>(
    partition: &ColumnPartition,
    row_dy: &[T],
    row_y: &[T],
    row_dx: &mut [T],
    finish: impl Fn(usize, f32) -> f32,
) where
    T: StorageElement,
{
    let mut y_buf = [[0.0f32; CAP]; WARP_SIZE];
    let mut dy_buf = [[0.0f32; CAP]; WARP_SIZE];

    let mut lane_dot: LaneValues = [0.0; WARP_SIZE];
    for lane in 0..WARP_SIZE {
        for (i, col) in partition.lane_range(lane).enumerate() {
            let y = row_y[col].to_working();
            let dy = row_dy[col].to_working();
            y_buf[lane][i] = y;
            dy_buf[lane][i] = dy;
            lane_dot[lane] += y * dy;
        }
    }
    let dot = warp_all_reduce_sum(lane_dot);

    for lane in 0..WARP_SIZE {
        for (i, col) in partition.lane_range(lane).enumerate() {
            let grad = (dy_buf[lane][i] - dot[lane]) * y_buf[lane][i];
            row_dx[col] = T::from_working(finish(col, grad));
        }
    }
}

/// Gradient of [`softmax_forward`](super::softmax_forward)
pub fn softmax_backward<T: StorageElement>(
    d_output: &[T],
    output: &[T],
    d_input: &mut [T],
    rows: usize,
    cols: usize,
) -> ForgeResult<()> {
    let geometry = checked_geometry(rows, cols)?;
    check_len("d_output", d_output, rows * cols)?;
    check_len("output", output, rows * cols)?;
    check_len("d_input", d_input, rows * cols)?;

    let partition = geometry.partition();
    with_lane_capacity!(cols, CAP => {
        for_each_row(&geometry, d_input, |row, row_dx| {
            let span = row * cols..(row + 1) * cols;
            warp_softmax_grad_row::<T, CAP>(
                &partition,
                &d_output[span.clone()],
                &output[span],
                row_dx,
                |_, g| g,
            );
        })
    });
    Ok(())
}

/// Gradient of both fused forwards: `scale * y * (dy - <y, dy>)`, zero where
/// the broadcast mask is zero
#[allow(clippy::too_many_arguments)]
pub fn scale_mask_softmax_backward<T: StorageElement>(
    d_output: &[T],
    output: &[T],
    mask: &[T],
    d_input: &mut [T],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> ForgeResult<()> {
    let geometry = checked_geometry(rows, cols)?;
    check_len("d_output", d_output, rows * cols)?;
    check_len("output", output, rows * cols)?;
    check_len("d_input", d_input, rows * cols)?;
    let broadcast = HeadBroadcast::new(head, cols);
    broadcast.check_mask(rows, mask.len())?;

    let partition = geometry.partition();
    with_lane_capacity!(cols, CAP => {
        for_each_row(&geometry, d_input, |row, row_dx| {
            let span = row * cols..(row + 1) * cols;
            let mask_row = &mask[broadcast.mask_row(row) * cols..][..cols];
            warp_softmax_grad_row::<T, CAP>(
                &partition,
                &d_output[span.clone()],
                &output[span],
                row_dx,
                |col, g| {
                    if mask_row[col].is_nonzero() {
                        scale * g
                    } else {
                        0.0
                    }
                },
            );
        })
    });
    Ok(())
}
