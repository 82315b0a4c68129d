//! Assignment of a row's columns to the lanes of one warp
//!
//! With `cols_per_thread = ceil(cols / 32)`, lane `y` owns the contiguous
//! range starting at `y * cols_per_thread`. Lanes below
//! `last_y = cols / cols_per_thread` own a full `cols_per_thread` slice,
//! lane `last_y` owns the remainder and any higher lane owns nothing (it
//! still runs, contributing reduction identities).

use std::ops::Range;

use super::warp::WARP_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPartition {
    cols: usize,
    cols_per_thread: usize,
    last_y: usize,
}

impl ColumnPartition {
    /// `cols` must be at least 1; the dispatch layer rejects empty rows.
    pub fn new(cols: usize) -> Self {
        debug_assert!(cols > 0, "column partition of an empty row");
        let cols_per_thread = cols.div_ceil(WARP_SIZE).max(1);
        ColumnPartition {
            cols,
            cols_per_thread,
            last_y: cols / cols_per_thread,
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Per-lane buffer length this row needs
    pub fn cols_per_thread(&self) -> usize {
        self.cols_per_thread
    }

    /// Lane that owns the remainder slice
    pub fn last_lane(&self) -> usize {
        self.last_y
    }

    /// Number of columns lane `lane` owns
    #[inline]
    pub fn lane_cols(&self, lane: usize) -> usize {
        match lane.cmp(&self.last_y) {
            std::cmp::Ordering::Less => self.cols_per_thread,
            std::cmp::Ordering::Equal => self.cols - self.cols_per_thread * self.last_y,
            std::cmp::Ordering::Greater => 0,
        }
    }

    /// Column range owned by `lane`, empty for idle lanes
    #[inline]
    pub fn lane_range(&self, lane: usize) -> Range<usize> {
        let start = (lane * self.cols_per_thread).min(self.cols);
        start..start + self.lane_cols(lane)
    }
}
