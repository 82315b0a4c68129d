//! Host tensors consumed and produced by the softmax entry operations
//!
//! - `dtype`: storage types and the working-precision conversion trait
//! - `shape`: dims + strides with contiguity checks
//! - `tensor`: shared storage tagged with a shape and a device

pub mod dtype;
pub mod shape;
#[allow(clippy::module_inception)]
pub mod tensor;

pub use dtype::{DType, StorageElement};
pub use shape::TensorShape;
pub use tensor::{Tensor, TensorStorage};
