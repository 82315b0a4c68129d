//! Lane-level kernel implementations
//!
//! - `softmax`: row-wise softmax forward/backward, plain and fused with
//!   scale, mask and bias

pub mod softmax;
