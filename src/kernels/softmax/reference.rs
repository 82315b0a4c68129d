//! Scalar CPU reference implementations
//!
//! Straight per-row loops with no lane partitioning, used to validate the
//! warp kernels and as a baseline in benchmarks. All inputs are `f32`; the
//! broadcast and sentinel rules match the lane kernels exactly.

use super::broadcast::HeadBroadcast;
use super::forward::{MASK_BIAS_SENTINEL, MASK_SENTINEL};

fn softmax_rows(
    input: &[f32],
    rows: usize,
    cols: usize,
    logit: impl Fn(usize, usize, f32) -> f32,
) -> Vec<f32> {
    let mut output = vec![0.0f32; rows * cols];

    for row in 0..rows {
        let row_in = &input[row * cols..(row + 1) * cols];
        let row_out = &mut output[row * cols..(row + 1) * cols];

        for (col, (out, &x)) in row_out.iter_mut().zip(row_in).enumerate() {
            *out = logit(row, col, x);
        }

        // Find max for numerical stability
        let max_val = row_out.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));

        let mut sum = 0.0f32;
        for v in row_out.iter_mut() {
            *v = (*v - max_val).exp();
            sum += *v;
        }

        for v in row_out.iter_mut() {
            *v /= sum;
        }
    }

    output
}

fn softmax_grad_rows(
    d_output: &[f32],
    output: &[f32],
    rows: usize,
    cols: usize,
    finish: impl Fn(usize, usize, f32) -> f32,
) -> Vec<f32> {
    let mut d_input = vec![0.0f32; rows * cols];

    for row in 0..rows {
        let span = row * cols..(row + 1) * cols;
        let dy = &d_output[span.clone()];
        let y = &output[span.clone()];

        let dot: f32 = y.iter().zip(dy).map(|(a, b)| a * b).sum();
        for (col, dx) in d_input[span].iter_mut().enumerate() {
            *dx = finish(row, col, (dy[col] - dot) * y[col]);
        }
    }

    d_input
}

pub fn reference_softmax(input: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    softmax_rows(input, rows, cols, |_, _, x| x)
}

pub fn reference_scale_mask_softmax(
    input: &[f32],
    mask: &[f32],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> Vec<f32> {
    let broadcast = HeadBroadcast::new(head, cols);
    softmax_rows(input, rows, cols, |row, col, x| {
        if mask[broadcast.mask_row(row) * cols + col] != 0.0 {
            x * scale
        } else {
            MASK_SENTINEL
        }
    })
}

pub fn reference_scale_mask_bias_softmax(
    input: &[f32],
    mask: &[f32],
    bias: &[f32],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> Vec<f32> {
    let broadcast = HeadBroadcast::new(head, cols);
    softmax_rows(input, rows, cols, |row, col, x| {
        if mask[broadcast.mask_row(row) * cols + col] != 0.0 {
            x * scale + bias[broadcast.bias_row(row) * cols + col]
        } else {
            MASK_BIAS_SENTINEL
        }
    })
}

pub fn reference_softmax_backward(
    d_output: &[f32],
    output: &[f32],
    rows: usize,
    cols: usize,
) -> Vec<f32> {
    softmax_grad_rows(d_output, output, rows, cols, |_, _, g| g)
}

pub fn reference_scale_mask_softmax_backward(
    d_output: &[f32],
    output: &[f32],
    mask: &[f32],
    rows: usize,
    cols: usize,
    head: usize,
    scale: f32,
) -> Vec<f32> {
    let broadcast = HeadBroadcast::new(head, cols);
    softmax_grad_rows(d_output, output, rows, cols, |row, col, g| {
        if mask[broadcast.mask_row(row) * cols + col] != 0.0 {
            scale * g
        } else {
            0.0
        }
    })
}
