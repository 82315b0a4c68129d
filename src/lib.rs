//! WarpForge - fused row-wise softmax kernels
//!
//! Softmax over the last axis of attention-style logits, with fused
//! scale + mask and scale + mask + bias variants and their analytic
//! gradients. Every row is reduced by one emulated 32-lane warp using
//! butterfly exchanges; arithmetic is `f32` for `f32`, `f16` and `bf16`
//! storage.
//!
//! Operations take an explicit [`ExecutionStream`] and validate all operands
//! before launching, so failures are reported as [`WarpForgeError`] rather
//! than discovered mid-kernel.

#![allow(clippy::too_many_arguments)] // Kernel entry points take the full launch description
#![allow(clippy::needless_range_loop)] // Lane/column indexing mirrors the warp layout
#![allow(clippy::manual_slice_size_calculation)]
#![allow(clippy::type_complexity)]

pub mod backend;
pub mod error;
pub mod kernels;
pub mod logging;
pub mod ops;
pub mod tensor;

pub use backend::{Device, ExecutionStream, StreamConfig};
pub use error::{ErrorCategory, ForgeResult, WarpForgeError};
pub use logging::{init_logging_default, init_logging_from_env, init_with_config, LoggingConfig};
pub use ops::{
    fused_scale_mask_bias_softmax_backward, fused_scale_mask_bias_softmax_forward,
    fused_scale_mask_softmax_backward, fused_scale_mask_softmax_forward, softmax,
    softmax_gradient,
};
pub use tensor::{DType, Tensor};
