//! Forward kernels: plain, scale + mask, scale + mask + bias

use super::broadcast::HeadBroadcast;
use super::launch::{for_each_row, with_lane_capacity};
use super::partition::ColumnPartition;
use super::warp::{warp_all_reduce_max, warp_all_reduce_sum, LaneValues, WARP_SIZE};
use super::{check_len, checked_geometry};
use crate::error::ForgeResult;
use crate::tensor::StorageElement;

/// Logit substituted at masked positions (scale + mask)
pub const MASK_SENTINEL: f32 = -1e9;

/// Logit substituted at masked positions (scale + mask + bias)
pub const MASK_BIAS_SENTINEL: f32 = -1e10;

/// One warp normalizes one row.
///
/// `logit(col, x)` turns the widened input at `col` into the value that
/// enters the max/sum reductions; it is where scale, mask and bias fuse in.
#[inline]
fn warp_softmax_row<T, const CAP: usize>(
    partition: &ColumnPartition,
    row_in: &[T],
    row_out: &mut [T],
    logit: impl Fn(usize, f32) -> f32,
) where
    T: StorageElement,
{
    let mut buf = [[0.0f32; CAP]; WARP_SIZE];

    let mut lane_max: LaneValues = [f32::NEG_INFINITY; WARP_SIZE];
    for lane in 0..WARP_SIZE {
        for (i, col) in partition.lane_range(lane).enumerate() {
            let x = logit(col, row_in[col].to_working());
            buf[lane][i] = x;
            lane_max[lane] = lane_max[lane].max(x);
        }
    }
    let row_max = warp_all_reduce_max(lane_max);

    let mut lane_sum: LaneValues = [0.0; WARP_SIZE];
    for lane in 0..WARP_SIZE {
        for x in buf[lane][..partition.lane_cols(lane)].iter_mut() {
            *x = (*x - row_max[lane]).exp();
            lane_sum[lane] += *x;
        }
    }
    let row_sum = warp_all_reduce_sum(lane_sum);

    for lane in 0..WARP_SIZE {
        for (i, col) in partition.lane_range(lane).enumerate() {
            row_out[col] = T::from_working(buf[lane][i] / row_sum[lane]);
        }
    }
}

/// `output[r] = softmax(input[r])` for every row
pub fn softmax_forward<T: StorageElement>(
    input: &[T],
    output: &mut [T],
    rows: usize,
    cols: usize,
) -> ForgeResult<()> {
    let geometry = checked_geometry(rows, cols)?;
    check_len("input", input, rows * cols)?;
    check_len("output", output, rows * cols)?;

    let partition = geometry.partition();
    with_lane_capacity!(cols, CAP => {
        for_each_row(&geometry, output, |row, row_out| {
            let row_in = &input[row * cols..(row + 1) * cols];
            warp_softmax_row::<T, CAP>(&partition, row_in, row_out, |_, x| x);
        })
    });
    Ok(())
}

/// `softmax(input * scale)` with masked positions forced to [`MASK_SENTINEL`]
///
/// The mask row for logit row `r` is `r / (head * cols)`; zero entries mask.
pub fn scale_mask_softmax_forward<T: StorageElement>(
    input: &[T],
    mask: &[T],
    output: &mut [T],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> ForgeResult<()> {
    let geometry = checked_geometry(rows, cols)?;
    check_len("input", input, rows * cols)?;
    check_len("output", output, rows * cols)?;
    let broadcast = HeadBroadcast::new(head, cols);
    broadcast.check_mask(rows, mask.len())?;

    let partition = geometry.partition();
    with_lane_capacity!(cols, CAP => {
        for_each_row(&geometry, output, |row, row_out| {
            let row_in = &input[row * cols..(row + 1) * cols];
            let mask_row = &mask[broadcast.mask_row(row) * cols..][..cols];
            warp_softmax_row::<T, CAP>(&partition, row_in, row_out, |col, x| {
                if mask_row[col].is_nonzero() {
                    x * scale
                } else {
                    MASK_SENTINEL
                }
            });
        })
    });
    Ok(())
}

/// `softmax(input * scale + bias)` with masked positions forced to
/// [`MASK_BIAS_SENTINEL`]; bias is never added at a masked position.
///
/// The bias row for logit row `r` is `r % (head * cols)`.
#[allow(clippy::too_many_arguments)]
pub fn scale_mask_bias_softmax_forward<T: StorageElement>(
    input: &[T],
    mask: &[T],
    bias: &[T],
    output: &mut [T],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> ForgeResult<()> {
    let geometry = checked_geometry(rows, cols)?;
    check_len("input", input, rows * cols)?;
    check_len("output", output, rows * cols)?;
    let broadcast = HeadBroadcast::new(head, cols);
    broadcast.check_mask(rows, mask.len())?;
    broadcast.check_bias(rows, bias.len())?;

    let partition = geometry.partition();
    with_lane_capacity!(cols, CAP => {
        for_each_row(&geometry, output, |row, row_out| {
            let row_in = &input[row * cols..(row + 1) * cols];
            let mask_row = &mask[broadcast.mask_row(row) * cols..][..cols];
            let bias_row = &bias[broadcast.bias_row(row) * cols..][..cols];
            warp_softmax_row::<T, CAP>(&partition, row_in, row_out, |col, x| {
                if mask_row[col].is_nonzero() {
                    x * scale + bias_row[col].to_working()
                } else {
                    MASK_BIAS_SENTINEL
                }
            });
        })
    });
    Ok(())
}
