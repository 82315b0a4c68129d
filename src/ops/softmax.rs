//! Softmax entry operations
//!
//! Each operation:
//! 1. validates every operand (contiguous, on the stream's device, one
//!    shared storage type from the supported set) before anything runs,
//! 2. derives `rows`, `cols` and `head` from the logical shape,
//! 3. checks mask/bias against the head broadcast rule and the row width
//!    against the lane-buffer bound,
//! 4. allocates a fresh output and launches the matching instantiation.
//!
//! Shapes are read as `[..., head, query, cols]`: softmax runs over the last
//! axis, every other axis is flattened into rows, and `head` is the third
//! axis from the end (1 for inputs with fewer than three axes).

use crate::backend::ExecutionStream;
use crate::error::{ForgeResult, WarpForgeError};
use crate::kernels::softmax::{self as kernels, HeadBroadcast, LaneCapacity, LaunchGeometry};
use crate::tensor::{DType, StorageElement, Tensor, TensorShape};

/// Flattened view of a softmax problem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLayout {
    pub rows: usize,
    pub cols: usize,
    pub head: usize,
}

impl RowLayout {
    pub fn from_shape(shape: &TensorShape) -> ForgeResult<Self> {
        let dims = shape.dims();
        let cols = shape.last_dim().ok_or_else(|| {
            WarpForgeError::InvalidTensorShape("softmax needs at least one axis".to_string())
        })?;
        let numel = shape.total_elements();
        if cols == 0 || numel == 0 {
            return Err(WarpForgeError::InvalidTensorShape(format!(
                "softmax needs a non-empty matrix, got shape {:?}",
                dims
            )));
        }

        let head = if dims.len() >= 3 {
            dims[dims.len() - 3]
        } else {
            1
        };

        Ok(RowLayout {
            rows: numel / cols,
            cols,
            head,
        })
    }

    pub fn geometry(&self) -> LaunchGeometry {
        LaunchGeometry::new(self.rows, self.cols)
    }

    pub fn broadcast(&self) -> HeadBroadcast {
        HeadBroadcast::new(self.head, self.cols)
    }
}

/// Instantiate `$body` with `$t` bound to the storage type of `$dtype`
macro_rules! dispatch_storage {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            DType::F32 => {
                type $t = f32;
                $body
            }
            DType::F16 => {
                type $t = half::f16;
                $body
            }
            DType::BF16 => {
                type $t = half::bf16;
                $body
            }
            other => Err(WarpForgeError::UnsupportedDType(other)),
        }
    };
}

/// Run operand validation, logging rejections
fn validated<R>(op: &'static str, check: impl FnOnce() -> ForgeResult<R>) -> ForgeResult<R> {
    check().map_err(|err| {
        tracing::debug!(op, error = %err, "rejected softmax operands");
        err
    })
}

/// Contiguity, device and dtype agreement across all operands
fn check_operands(stream: &ExecutionStream, operands: &[(&str, &Tensor)]) -> ForgeResult<DType> {
    let device = stream.device();
    let (_, first) = operands[0];
    let dtype = first.dtype();

    for &(name, tensor) in operands {
        if !tensor.is_contiguous() {
            return Err(WarpForgeError::NonContiguousTensor(name.to_string()));
        }
        if tensor.device() != device {
            return Err(WarpForgeError::DeviceMismatch {
                name: name.to_string(),
                expected: device,
                actual: tensor.device(),
            });
        }
        if tensor.dtype() != dtype {
            return Err(WarpForgeError::DTypeMismatch {
                name: name.to_string(),
                expected: dtype,
                actual: tensor.dtype(),
            });
        }
    }

    if !dtype.is_kernel_supported() {
        return Err(WarpForgeError::UnsupportedDType(dtype));
    }
    Ok(dtype)
}

fn check_same_shape(name: &str, tensor: &Tensor, expected: &Tensor) -> ForgeResult<()> {
    if tensor.dims() != expected.dims() {
        return Err(WarpForgeError::InvalidTensorShape(format!(
            "{} has shape {:?}, expected {:?}",
            name,
            tensor.dims(),
            expected.dims()
        )));
    }
    Ok(())
}

fn layout_of(tensor: &Tensor) -> ForgeResult<RowLayout> {
    let layout = RowLayout::from_shape(tensor.shape())?;
    LaneCapacity::for_cols(layout.cols)?;
    Ok(layout)
}

fn typed<'a, T: StorageElement>(name: &str, tensor: &'a Tensor) -> ForgeResult<&'a [T]> {
    tensor.as_slice::<T>().ok_or_else(|| {
        WarpForgeError::InternalError(format!(
            "{} storage is {}, dispatched as {}",
            name,
            tensor.dtype(),
            T::DTYPE
        ))
    })
}

/// Allocate the result, launch `kernel` into it on `stream`, wrap it as a tensor
fn launch_into<T, F>(
    stream: &ExecutionStream,
    op: &'static str,
    layout: RowLayout,
    dims: &[usize],
    kernel: F,
) -> ForgeResult<Tensor>
where
    T: StorageElement,
    F: FnOnce(&mut [T]) -> ForgeResult<()> + Send,
{
    let mut output = vec![T::from_working(0.0); layout.rows * layout.cols];
    stream.launch(op, &layout.geometry(), || kernel(&mut output))?;
    Tensor::from_storage(T::into_storage(output), dims, stream.device())
}

/// Row-wise softmax over the last axis
pub fn softmax(stream: &ExecutionStream, input: &Tensor) -> ForgeResult<Tensor> {
    const OP: &str = "softmax_forward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(stream, &[("input", input)])?;
        Ok((dtype, layout_of(input)?))
    })?;

    dispatch_storage!(dtype, T => {
        let x = typed::<T>("input", input)?;
        launch_into::<T, _>(stream, OP, layout, input.dims(), |out| {
            kernels::softmax_forward(x, out, layout.rows, layout.cols)
        })
    })
}

/// Gradient of [`softmax`] with respect to its input, from its output
pub fn softmax_gradient(
    stream: &ExecutionStream,
    d_output: &Tensor,
    output: &Tensor,
) -> ForgeResult<Tensor> {
    const OP: &str = "softmax_backward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(stream, &[("d_output", d_output), ("output", output)])?;
        check_same_shape("d_output", d_output, output)?;
        Ok((dtype, layout_of(output)?))
    })?;

    dispatch_storage!(dtype, T => {
        let dy = typed::<T>("d_output", d_output)?;
        let y = typed::<T>("output", output)?;
        launch_into::<T, _>(stream, OP, layout, output.dims(), |dx| {
            kernels::softmax_backward(dy, y, dx, layout.rows, layout.cols)
        })
    })
}

/// `softmax(input * scale)` with zero mask entries forced to a `-1e9` logit.
///
/// `mask` holds one row per `head * cols` logit rows.
pub fn fused_scale_mask_softmax_forward(
    stream: &ExecutionStream,
    input: &Tensor,
    mask: &Tensor,
    scale: f32,
) -> ForgeResult<Tensor> {
    const OP: &str = "scale_mask_softmax_forward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(stream, &[("input", input), ("mask", mask)])?;
        let layout = layout_of(input)?;
        layout.broadcast().check_mask(layout.rows, mask.numel())?;
        Ok((dtype, layout))
    })?;

    dispatch_storage!(dtype, T => {
        let x = typed::<T>("input", input)?;
        let m = typed::<T>("mask", mask)?;
        launch_into::<T, _>(stream, OP, layout, input.dims(), |out| {
            kernels::scale_mask_softmax_forward(
                x, m, out, layout.rows, layout.cols, layout.head, scale,
            )
        })
    })
}

/// Gradient of [`fused_scale_mask_softmax_forward`]
pub fn fused_scale_mask_softmax_backward(
    stream: &ExecutionStream,
    d_output: &Tensor,
    output: &Tensor,
    mask: &Tensor,
    scale: f32,
) -> ForgeResult<Tensor> {
    const OP: &str = "scale_mask_softmax_backward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(
            stream,
            &[("d_output", d_output), ("output", output), ("mask", mask)],
        )?;
        check_same_shape("d_output", d_output, output)?;
        let layout = layout_of(output)?;
        layout.broadcast().check_mask(layout.rows, mask.numel())?;
        Ok((dtype, layout))
    })?;

    launch_scale_mask_backward(stream, OP, dtype, layout, d_output, output, mask, scale)
}

/// `softmax(input * scale + bias)` with zero mask entries forced to a
/// `-1e10` logit (bias is not added there).
///
/// `mask` holds one row per `head * cols` logit rows; `bias` is a bank of
/// `head * cols` rows repeated for every batch entry.
pub fn fused_scale_mask_bias_softmax_forward(
    stream: &ExecutionStream,
    input: &Tensor,
    mask: &Tensor,
    bias: &Tensor,
    scale: f32,
) -> ForgeResult<Tensor> {
    const OP: &str = "scale_mask_bias_softmax_forward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(stream, &[("input", input), ("mask", mask), ("bias", bias)])?;
        let layout = layout_of(input)?;
        let broadcast = layout.broadcast();
        broadcast.check_mask(layout.rows, mask.numel())?;
        broadcast.check_bias(layout.rows, bias.numel())?;
        Ok((dtype, layout))
    })?;

    dispatch_storage!(dtype, T => {
        let x = typed::<T>("input", input)?;
        let m = typed::<T>("mask", mask)?;
        let b = typed::<T>("bias", bias)?;
        launch_into::<T, _>(stream, OP, layout, input.dims(), |out| {
            kernels::scale_mask_bias_softmax_forward(
                x, m, b, out, layout.rows, layout.cols, layout.head, scale,
            )
        })
    })
}

/// Gradient of [`fused_scale_mask_bias_softmax_forward`].
///
/// `bias` is validated like every other operand but does not enter the
/// computation: the result is bit-identical to
/// [`fused_scale_mask_softmax_backward`] on the same `d_output`, `output`,
/// `mask` and `scale`.
pub fn fused_scale_mask_bias_softmax_backward(
    stream: &ExecutionStream,
    d_output: &Tensor,
    output: &Tensor,
    mask: &Tensor,
    bias: &Tensor,
    scale: f32,
) -> ForgeResult<Tensor> {
    const OP: &str = "scale_mask_bias_softmax_backward";
    let (dtype, layout) = validated(OP, || {
        let dtype = check_operands(
            stream,
            &[
                ("d_output", d_output),
                ("output", output),
                ("mask", mask),
                ("bias", bias),
            ],
        )?;
        check_same_shape("d_output", d_output, output)?;
        let layout = layout_of(output)?;
        let broadcast = layout.broadcast();
        broadcast.check_mask(layout.rows, mask.numel())?;
        broadcast.check_bias(layout.rows, bias.numel())?;
        Ok((dtype, layout))
    })?;

    launch_scale_mask_backward(stream, OP, dtype, layout, d_output, output, mask, scale)
}

#[allow(clippy::too_many_arguments)]
fn launch_scale_mask_backward(
    stream: &ExecutionStream,
    op: &'static str,
    dtype: DType,
    layout: RowLayout,
    d_output: &Tensor,
    output: &Tensor,
    mask: &Tensor,
    scale: f32,
) -> ForgeResult<Tensor> {
    dispatch_storage!(dtype, T => {
        let dy = typed::<T>("d_output", d_output)?;
        let y = typed::<T>("output", output)?;
        let m = typed::<T>("mask", mask)?;
        launch_into::<T, _>(stream, op, layout, output.dims(), |dx| {
            kernels::scale_mask_softmax_backward(
                dy, y, m, dx, layout.rows, layout.cols, layout.head, scale,
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::StreamConfig;

    fn stream() -> ExecutionStream {
        ExecutionStream::new(StreamConfig::new().with_num_threads(2)).unwrap()
    }

    #[test]
    fn test_row_layout_from_shape() {
        let layout = RowLayout::from_shape(&TensorShape::from_dims(&[2, 3, 4, 4])).unwrap();
        assert_eq!(layout, RowLayout { rows: 24, cols: 4, head: 3 });

        let layout = RowLayout::from_shape(&TensorShape::from_dims(&[5, 7])).unwrap();
        assert_eq!(layout, RowLayout { rows: 5, cols: 7, head: 1 });

        assert!(RowLayout::from_shape(&TensorShape::from_dims(&[])).is_err());
        assert!(RowLayout::from_shape(&TensorShape::from_dims(&[3, 0])).is_err());
        assert!(RowLayout::from_shape(&TensorShape::from_dims(&[0, 3])).is_err());
    }

    #[test]
    fn test_softmax_example() {
        let stream = stream();
        let input = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[1, 4]).unwrap();
        let output = softmax(&stream, &input).unwrap();

        assert_eq!(output.dims(), &[1, 4]);
        assert_eq!(output.dtype(), DType::F32);
        let values = output.to_f32_vec();
        for (v, e) in values.iter().zip([0.0321f32, 0.0871, 0.2369, 0.6439]) {
            assert!((v - e).abs() < 1e-4);
        }
        assert_eq!(stream.launch_count(), 1);
    }

    #[test]
    fn test_output_keeps_storage_type() {
        let stream = stream();
        let input = Tensor::from_f32(&[0.5, 0.25, -1.0, 2.0], &[2, 2], DType::F16).unwrap();
        let output = softmax(&stream, &input).unwrap();
        assert_eq!(output.dtype(), DType::F16);
        assert!(output.as_slice::<half::f16>().is_some());
    }

    #[test]
    fn test_unsupported_dtype_fails_before_launch() {
        let stream = stream();
        let input = Tensor::from_f32(&[1.0, 2.0], &[1, 2], DType::F64).unwrap();
        let err = softmax(&stream, &input).unwrap_err();
        assert!(matches!(err, WarpForgeError::UnsupportedDType(DType::F64)));
        assert_eq!(stream.launch_count(), 0);
    }

    #[test]
    fn test_input_is_not_mutated() {
        let stream = stream();
        let values = vec![3.0f32, -1.0, 0.0, 8.0, 2.0, 2.0];
        let input = Tensor::from_vec(values.clone(), &[2, 3]).unwrap();
        let mask = Tensor::from_vec(vec![1.0f32, 0.0, 1.0], &[1, 3]).unwrap();
        let _ = fused_scale_mask_softmax_forward(&stream, &input, &mask, 0.5).unwrap();
        assert_eq!(input.to_f32_vec(), values);
    }
}
