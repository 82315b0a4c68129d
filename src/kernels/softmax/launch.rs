//! Launch geometry and the block executor
//!
//! One warp handles one row and four warps form a block, so a block covers
//! four consecutive rows (`row = block * 4 + warp`). Blocks are independent
//! and write disjoint slices of the output, which makes them the unit handed
//! to rayon. Rows past the end of the matrix in the final block are inert.

use rayon::prelude::*;

use super::partition::ColumnPartition;
use super::warp::WARP_SIZE;
use crate::error::{ForgeResult, WarpForgeError};

/// Warps (rows) per block
pub const ROWS_PER_BLOCK: usize = 4;

/// Lanes per block
pub const THREADS_PER_BLOCK: usize = ROWS_PER_BLOCK * WARP_SIZE;

/// Largest per-lane register buffer any kernel is instantiated with
pub const MAX_COLS_PER_LANE: usize = 128;

/// Widest row the kernels accept
pub const MAX_SUPPORTED_COLS: usize = WARP_SIZE * MAX_COLS_PER_LANE;

/// Per-lane buffer instantiations, smallest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneCapacity {
    Cols8,
    Cols32,
    Cols128,
}

impl LaneCapacity {
    /// Smallest instantiation holding `cols_per_thread` values per lane
    pub fn for_cols(cols: usize) -> ForgeResult<Self> {
        if cols > MAX_SUPPORTED_COLS {
            return Err(WarpForgeError::ColumnsExceedCapacity {
                cols,
                max: MAX_SUPPORTED_COLS,
            });
        }
        let per_lane = cols.div_ceil(WARP_SIZE);
        Ok(match per_lane {
            0..=8 => LaneCapacity::Cols8,
            9..=32 => LaneCapacity::Cols32,
            _ => LaneCapacity::Cols128,
        })
    }

    pub fn per_lane(&self) -> usize {
        match self {
            LaneCapacity::Cols8 => 8,
            LaneCapacity::Cols32 => 32,
            LaneCapacity::Cols128 => MAX_COLS_PER_LANE,
        }
    }
}

/// Instantiate `$body` with a `const $cap: usize` matching the row width
macro_rules! with_lane_capacity {
    ($cols:expr, $cap:ident => $body:expr) => {
        match $crate::kernels::softmax::launch::LaneCapacity::for_cols($cols)? {
            $crate::kernels::softmax::launch::LaneCapacity::Cols8 => {
                const $cap: usize = 8;
                $body
            }
            $crate::kernels::softmax::launch::LaneCapacity::Cols32 => {
                const $cap: usize = 32;
                $body
            }
            $crate::kernels::softmax::launch::LaneCapacity::Cols128 => {
                const $cap: usize = $crate::kernels::softmax::launch::MAX_COLS_PER_LANE;
                $body
            }
        }
    };
}
pub(crate) use with_lane_capacity;

/// Grid/block shape of one launch over a `rows x cols` matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    rows: usize,
    cols: usize,
}

impl LaunchGeometry {
    pub fn new(rows: usize, cols: usize) -> Self {
        LaunchGeometry { rows, cols }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `ceil(rows / 4)` blocks
    pub fn num_blocks(&self) -> usize {
        self.rows.div_ceil(ROWS_PER_BLOCK)
    }

    pub fn grid_dim(&self) -> (u32, u32, u32) {
        (self.num_blocks() as u32, 1, 1)
    }

    pub fn block_dim(&self) -> (u32, u32, u32) {
        (THREADS_PER_BLOCK as u32, 1, 1)
    }

    /// Reductions stay in registers
    pub fn shared_mem_bytes(&self) -> u32 {
        0
    }

    pub fn partition(&self) -> ColumnPartition {
        ColumnPartition::new(self.cols)
    }
}

/// Run `row_kernel(row, row_out)` for every row, block-parallel.
///
/// `output` must hold exactly `rows * cols` elements. Each block receives the
/// contiguous slice for its four rows; the final block's slice is shorter
/// when `rows % 4 != 0`, and the missing rows are skipped.
pub fn for_each_row<T, F>(geometry: &LaunchGeometry, output: &mut [T], row_kernel: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync,
{
    let cols = geometry.cols;
    debug_assert_eq!(output.len(), geometry.rows * cols);

    output
        .par_chunks_mut(ROWS_PER_BLOCK * cols)
        .enumerate()
        .for_each(|(block, block_out)| {
            for warp in 0..ROWS_PER_BLOCK {
                let row = block * ROWS_PER_BLOCK + warp;
                if row >= geometry.rows {
                    continue;
                }
                let row_out = &mut block_out[warp * cols..(warp + 1) * cols];
                row_kernel(row, row_out);
            }
        });
}
