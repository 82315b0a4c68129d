//! Storage numeric types
//!
//! Kernels always compute in `f32`. Storage types only decide how a value is
//! widened on load and narrowed on store, which is all [`StorageElement`]
//! describes.

use std::fmt;

use half::{bf16, f16};

use crate::tensor::TensorStorage;

/// Element type of a tensor's storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
    BF16,
    F64,
    I32,
}

impl DType {
    /// Whether lane kernels are instantiated for this storage type
    pub fn is_kernel_supported(&self) -> bool {
        matches!(self, DType::F32 | DType::F16 | DType::BF16)
    }

    pub fn size_in_bytes(&self) -> usize {
        match self {
            DType::F16 | DType::BF16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
            DType::BF16 => "bf16",
            DType::F64 => "f64",
            DType::I32 => "i32",
        };
        f.write_str(name)
    }
}

/// A storage element that can be moved in and out of working precision.
pub trait StorageElement: Copy + Send + Sync + 'static {
    const DTYPE: DType;

    /// Widen to working precision
    fn to_working(self) -> f32;

    /// Narrow from working precision (round to nearest)
    fn from_working(value: f32) -> Self;

    fn storage_slice(storage: &TensorStorage) -> Option<&[Self]>;

    fn into_storage(data: Vec<Self>) -> TensorStorage;

    /// Mask test: any value other than zero keeps the position
    #[inline]
    fn is_nonzero(self) -> bool {
        self.to_working() != 0.0
    }
}

impl StorageElement for f32 {
    const DTYPE: DType = DType::F32;

    #[inline]
    fn to_working(self) -> f32 {
        self
    }

    #[inline]
    fn from_working(value: f32) -> Self {
        value
    }

    fn storage_slice(storage: &TensorStorage) -> Option<&[Self]> {
        match storage {
            TensorStorage::F32(data) => Some(data),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> TensorStorage {
        TensorStorage::F32(data)
    }
}

impl StorageElement for f16 {
    const DTYPE: DType = DType::F16;

    #[inline]
    fn to_working(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn from_working(value: f32) -> Self {
        f16::from_f32(value)
    }

    fn storage_slice(storage: &TensorStorage) -> Option<&[Self]> {
        match storage {
            TensorStorage::F16(data) => Some(data),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> TensorStorage {
        TensorStorage::F16(data)
    }
}

impl StorageElement for bf16 {
    const DTYPE: DType = DType::BF16;

    #[inline]
    fn to_working(self) -> f32 {
        self.to_f32()
    }

    #[inline]
    fn from_working(value: f32) -> Self {
        bf16::from_f32(value)
    }

    fn storage_slice(storage: &TensorStorage) -> Option<&[Self]> {
        match storage {
            TensorStorage::BF16(data) => Some(data),
            _ => None,
        }
    }

    fn into_storage(data: Vec<Self>) -> TensorStorage {
        TensorStorage::BF16(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_set_is_closed() {
        assert!(DType::F32.is_kernel_supported());
        assert!(DType::F16.is_kernel_supported());
        assert!(DType::BF16.is_kernel_supported());
        assert!(!DType::F64.is_kernel_supported());
        assert!(!DType::I32.is_kernel_supported());
    }

    #[test]
    fn test_working_precision_round_trip_for_exact_values() {
        for v in [0.0f32, 1.0, -2.5, 0.125, 1024.0] {
            assert_eq!(f16::from_working(v).to_working(), v);
            assert_eq!(bf16::from_working(v).to_working(), v);
            assert_eq!(f32::from_working(v).to_working(), v);
        }
    }

    #[test]
    fn test_narrowing_rounds() {
        // 1 + 2^-12 is below f16 resolution at 1.0
        let v = 1.0f32 + 1.0 / 4096.0;
        assert_eq!(f16::from_working(v).to_working(), 1.0);
        assert_eq!(f32::from_working(v), v);
    }

    #[test]
    fn test_is_nonzero() {
        assert!(!0.0f32.is_nonzero());
        assert!(!(-0.0f32).is_nonzero());
        assert!(1.0f32.is_nonzero());
        assert!(f16::from_f32(0.5).is_nonzero());
        assert!(!bf16::ZERO.is_nonzero());
    }

    #[test]
    fn test_dtype_display_and_size() {
        assert_eq!(DType::BF16.to_string(), "bf16");
        assert_eq!(DType::F16.size_in_bytes(), 2);
        assert_eq!(DType::F64.size_in_bytes(), 8);
    }
}
