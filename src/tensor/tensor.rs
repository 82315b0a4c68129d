//! Host tensor with shared storage

use std::sync::Arc;

use half::{bf16, f16};

use crate::backend::Device;
use crate::error::{ForgeResult, WarpForgeError};
use crate::tensor::{DType, StorageElement, TensorShape};

/// Typed element buffer
#[derive(Debug, Clone, PartialEq)]
pub enum TensorStorage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F64(Vec<f64>),
    I32(Vec<i32>),
}

impl TensorStorage {
    pub fn dtype(&self) -> DType {
        match self {
            TensorStorage::F32(_) => DType::F32,
            TensorStorage::F16(_) => DType::F16,
            TensorStorage::BF16(_) => DType::BF16,
            TensorStorage::F64(_) => DType::F64,
            TensorStorage::I32(_) => DType::I32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TensorStorage::F32(d) => d.len(),
            TensorStorage::F16(d) => d.len(),
            TensorStorage::BF16(d) => d.len(),
            TensorStorage::F64(d) => d.len(),
            TensorStorage::I32(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn from_f32(dtype: DType, data: &[f32]) -> Self {
        match dtype {
            DType::F32 => TensorStorage::F32(data.to_vec()),
            DType::F16 => TensorStorage::F16(data.iter().map(|&v| f16::from_f32(v)).collect()),
            DType::BF16 => TensorStorage::BF16(data.iter().map(|&v| bf16::from_f32(v)).collect()),
            DType::F64 => TensorStorage::F64(data.iter().map(|&v| v as f64).collect()),
            DType::I32 => TensorStorage::I32(data.iter().map(|&v| v as i32).collect()),
        }
    }

    fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            TensorStorage::F32(d) => d.clone(),
            TensorStorage::F16(d) => d.iter().map(|v| v.to_f32()).collect(),
            TensorStorage::BF16(d) => d.iter().map(|v| v.to_f32()).collect(),
            TensorStorage::F64(d) => d.iter().map(|&v| v as f32).collect(),
            TensorStorage::I32(d) => d.iter().map(|&v| v as f32).collect(),
        }
    }
}

/// Immutable tensor: shared storage, a shape (possibly a strided view) and
/// the device it lives on.
///
/// Clones and views share the same buffer; the entry operations never write
/// into their operands and always return a freshly allocated tensor.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<TensorStorage>,
    shape: TensorShape,
    device: Device,
}

impl Tensor {
    /// Wrap a typed buffer. Fails if `data.len()` does not match `dims`.
    pub fn from_vec<T: StorageElement>(data: Vec<T>, dims: &[usize]) -> ForgeResult<Self> {
        Self::from_storage(T::into_storage(data), dims, Device::default())
    }

    /// Build a tensor of `dtype` from `f32` values (narrowing as needed)
    pub fn from_f32(data: &[f32], dims: &[usize], dtype: DType) -> ForgeResult<Self> {
        Self::from_storage(TensorStorage::from_f32(dtype, data), dims, Device::default())
    }

    pub fn from_storage(storage: TensorStorage, dims: &[usize], device: Device) -> ForgeResult<Self> {
        let shape = TensorShape::from_dims(dims);
        if storage.len() != shape.total_elements() {
            return Err(WarpForgeError::InvalidTensorShape(format!(
                "shape {:?} needs {} elements, storage has {}",
                dims,
                shape.total_elements(),
                storage.len()
            )));
        }
        Ok(Tensor {
            storage: Arc::new(storage),
            shape,
            device,
        })
    }

    pub fn zeros(dims: &[usize], dtype: DType) -> Self {
        let n = TensorShape::from_dims(dims).total_elements();
        let storage = TensorStorage::from_f32(dtype, &vec![0.0f32; n]);
        Tensor {
            storage: Arc::new(storage),
            shape: TensorShape::from_dims(dims),
            device: Device::default(),
        }
    }

    /// Same buffer, tagged as living on `device`
    pub fn to_device(&self, device: Device) -> Self {
        Tensor {
            storage: Arc::clone(&self.storage),
            shape: self.shape.clone(),
            device,
        }
    }

    /// Strided view with axes `a` and `b` swapped (not contiguous)
    pub fn transpose(&self, a: usize, b: usize) -> ForgeResult<Self> {
        let shape = self.shape.transposed(a, b).ok_or_else(|| {
            WarpForgeError::InvalidTensorShape(format!(
                "cannot swap axes {} and {} of a {}-d tensor",
                a,
                b,
                self.shape.ndim()
            ))
        })?;
        Ok(Tensor {
            storage: Arc::clone(&self.storage),
            shape,
            device: self.device,
        })
    }

    pub fn shape(&self) -> &TensorShape {
        &self.shape
    }

    pub fn dims(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn numel(&self) -> usize {
        self.shape.total_elements()
    }

    pub fn is_contiguous(&self) -> bool {
        self.shape.is_contiguous()
    }

    pub fn storage(&self) -> &TensorStorage {
        &self.storage
    }

    /// Typed view of the underlying buffer, `None` if `T` is not the storage type
    pub fn as_slice<T: StorageElement>(&self) -> Option<&[T]> {
        T::storage_slice(&self.storage)
    }

    /// Copy of the underlying buffer widened to `f32` (buffer order)
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.storage.to_f32_vec()
    }
}
