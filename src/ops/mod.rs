//! Tensor-level operations
//!
//! Entry points that validate tensors, pick the storage instantiation and
//! launch a kernel on an explicit [`ExecutionStream`](crate::backend::ExecutionStream).

pub mod softmax;

pub use softmax::{
    fused_scale_mask_bias_softmax_backward, fused_scale_mask_bias_softmax_forward,
    fused_scale_mask_softmax_backward, fused_scale_mask_softmax_forward, softmax,
    softmax_gradient, RowLayout,
};
