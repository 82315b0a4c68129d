//! Compute device identity

use std::fmt;

/// A compute device that tensors live on and streams launch onto.
///
/// Lane kernels are executed by host worker threads, so the only device
/// kind is `cpu`. The ordinal still matters: operands created for one
/// device are rejected by a stream bound to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Device {
    ordinal: usize,
}

impl Device {
    pub const fn cpu(ordinal: usize) -> Self {
        Device { ordinal }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu:{}", self.ordinal)
    }
}
