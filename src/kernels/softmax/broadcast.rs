//! Head-derived broadcast of mask and bias rows
//!
//! Logits are laid out as `[batch, head, query, cols]` flattened to rows.
//! One mask row serves `head * cols` consecutive logit rows (a whole batch
//! entry), while the bias bank of `head * cols` rows repeats for every batch
//! entry.

use crate::error::{ForgeResult, WarpForgeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadBroadcast {
    head: usize,
    cols: usize,
}

impl HeadBroadcast {
    pub fn new(head: usize, cols: usize) -> Self {
        HeadBroadcast { head, cols }
    }

    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    fn period(&self) -> usize {
        self.head * self.cols
    }

    /// Mask row for logit row `row`: `row / (head * cols)`
    #[inline]
    pub fn mask_row(&self, row: usize) -> usize {
        row / self.period()
    }

    /// Bias row for logit row `row`: `row % (head * cols)`
    #[inline]
    pub fn bias_row(&self, row: usize) -> usize {
        row % self.period()
    }

    /// Mask rows a `rows`-row launch reads
    pub fn mask_rows_required(&self, rows: usize) -> usize {
        self.mask_row(rows - 1) + 1
    }

    /// Bias rows a `rows`-row launch reads
    pub fn bias_rows_required(&self, rows: usize) -> usize {
        rows.min(self.period())
    }

    /// Check that a mask of `mask_len` elements covers every row read
    pub fn check_mask(&self, rows: usize, mask_len: usize) -> ForgeResult<()> {
        self.check_period()?;
        self.check("mask", mask_len, self.mask_rows_required(rows))
    }

    /// Check that a bias of `bias_len` elements covers every row read
    pub fn check_bias(&self, rows: usize, bias_len: usize) -> ForgeResult<()> {
        self.check_period()?;
        self.check("bias", bias_len, self.bias_rows_required(rows))
    }

    fn check_period(&self) -> ForgeResult<()> {
        if self.head == 0 || self.cols == 0 {
            return Err(WarpForgeError::BroadcastShapeMismatch(format!(
                "head ({}) and cols ({}) must be non-zero",
                self.head, self.cols
            )));
        }
        Ok(())
    }

    fn check(&self, name: &str, len: usize, rows_needed: usize) -> ForgeResult<()> {
        if len % self.cols != 0 {
            return Err(WarpForgeError::BroadcastShapeMismatch(format!(
                "{} has {} elements, not a whole number of {}-column rows",
                name, len, self.cols
            )));
        }
        if len / self.cols < rows_needed {
            return Err(WarpForgeError::BroadcastShapeMismatch(format!(
                "{} provides {} rows of {} columns, head={} needs {}",
                name,
                len / self.cols,
                self.cols,
                self.head,
                rows_needed
            )));
        }
        Ok(())
    }
}
