//! Execution backend: device identity and launch streams
//!
//! Kernels never reach for an ambient "current device". Every entry
//! operation is handed an [`ExecutionStream`], which names the device its
//! operands must live on and owns the worker pool the launch runs on.

pub mod device;
pub mod stream;

pub use device::Device;
pub use stream::{ExecutionStream, StreamConfig};
