//! Tensor shapes with explicit strides

/// Dimensions plus element strides.
///
/// Shapes built with [`TensorShape::from_dims`] are row-major (last dimension
/// varies fastest). Views such as [`TensorShape::transposed`] keep the
/// underlying buffer and only permute dims/strides, which is how a
/// non-contiguous operand reaches the validation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorShape {
    dims: Vec<usize>,
    strides: Vec<usize>,
}

impl TensorShape {
    /// Create tensor shape from dimensions, computing row-major strides
    pub fn from_dims(dims: &[usize]) -> Self {
        let mut strides = vec![0usize; dims.len()];
        let mut running = 1usize;
        for i in (0..dims.len()).rev() {
            strides[i] = running;
            running = running.saturating_mul(dims[i]);
        }

        Self {
            dims: dims.to_vec(),
            strides,
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Compute total number of elements
    pub fn total_elements(&self) -> usize {
        self.dims
            .iter()
            .copied()
            .fold(1usize, |acc, x| acc.checked_mul(x).unwrap_or(usize::MAX))
    }

    /// True when strides match the dense row-major layout of `dims`.
    ///
    /// Size-1 dimensions are ignored; their stride never affects addressing.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 1usize;
        for (&dim, &stride) in self.dims.iter().zip(&self.strides).rev() {
            if dim != 1 && stride != expected {
                return false;
            }
            expected = expected.saturating_mul(dim);
        }
        true
    }

    /// View with axes `a` and `b` swapped. Returns `None` for an out-of-range axis.
    pub fn transposed(&self, a: usize, b: usize) -> Option<Self> {
        if a >= self.dims.len() || b >= self.dims.len() {
            return None;
        }
        let mut view = self.clone();
        view.dims.swap(a, b);
        view.strides.swap(a, b);
        Some(view)
    }

    /// Size of the last (softmax) axis
    pub fn last_dim(&self) -> Option<usize> {
        self.dims.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_shape_stride_computation() {
        let shape = TensorShape::from_dims(&[2, 3, 4]);
        assert_eq!(shape.strides(), &[12, 4, 1]);
        assert_eq!(shape.total_elements(), 24);
        assert_eq!(shape.ndim(), 3);
        assert_eq!(shape.last_dim(), Some(4));
        assert!(shape.is_contiguous());
    }

    #[test]
    fn test_transposed_is_not_contiguous() {
        let shape = TensorShape::from_dims(&[2, 3, 4]);
        let view = shape.transposed(1, 2).unwrap();
        assert_eq!(view.dims(), &[2, 4, 3]);
        assert_eq!(view.strides(), &[12, 1, 4]);
        assert!(!view.is_contiguous());
        assert!(shape.transposed(0, 3).is_none());
    }

    #[test]
    fn test_unit_dims_do_not_break_contiguity() {
        let shape = TensorShape::from_dims(&[1, 5]);
        let view = shape.transposed(0, 1).unwrap();
        // [5, 1] with strides [1, 5]: the unit axis stride is irrelevant
        assert_eq!(view.dims(), &[5, 1]);
        assert!(view.is_contiguous());
    }

    #[test]
    fn test_empty_shape() {
        let shape = TensorShape::from_dims(&[]);
        assert_eq!(shape.total_elements(), 1);
        assert_eq!(shape.last_dim(), None);
        assert!(shape.is_contiguous());
    }
}
