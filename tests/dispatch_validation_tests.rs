//! Operand validation at the tensor-level entry points
//!
//! Every rejection must happen before a launch is issued, so each test
//! checks the stream's launch counter alongside the error variant.

mod common;

use common::tensor;
use warpforge::kernels::softmax::MAX_SUPPORTED_COLS;
use warpforge::{
    fused_scale_mask_bias_softmax_backward, fused_scale_mask_bias_softmax_forward,
    fused_scale_mask_softmax_backward, fused_scale_mask_softmax_forward, softmax,
    softmax_gradient, DType, Device, ExecutionStream, StreamConfig, Tensor, WarpForgeError,
};

fn fresh_stream() -> ExecutionStream {
    ExecutionStream::new(StreamConfig::new().with_num_threads(2)).expect("stream")
}

fn ones(dims: &[usize], dtype: DType) -> Tensor {
    let numel = dims.iter().product();
    tensor(&vec![1.0; numel], dims, dtype)
}

#[test]
fn test_non_contiguous_input_is_rejected() {
    let stream = fresh_stream();
    let input = ones(&[4, 8], DType::F32).transpose(0, 1).unwrap();

    let err = softmax(&stream, &input).unwrap_err();
    assert!(matches!(err, WarpForgeError::NonContiguousTensor(ref name) if name == "input"));
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_non_contiguous_mask_is_rejected() {
    let stream = fresh_stream();
    let input = ones(&[4, 4], DType::F32);
    let mask = ones(&[4, 4], DType::F32).transpose(0, 1).unwrap();

    let err = fused_scale_mask_softmax_forward(&stream, &input, &mask, 1.0).unwrap_err();
    assert!(matches!(err, WarpForgeError::NonContiguousTensor(ref name) if name == "mask"));
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_device_mismatch_is_rejected() {
    let stream = fresh_stream();
    let d_output = ones(&[2, 16], DType::F32);
    let output = ones(&[2, 16], DType::F32).to_device(Device::cpu(3));

    let err = softmax_gradient(&stream, &d_output, &output).unwrap_err();
    match err {
        WarpForgeError::DeviceMismatch {
            name,
            expected,
            actual,
        } => {
            assert_eq!(name, "output");
            assert_eq!(expected, Device::cpu(0));
            assert_eq!(actual, Device::cpu(3));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_unsupported_storage_type_fails_fast() {
    let stream = fresh_stream();
    for dtype in [DType::F64, DType::I32] {
        let input = ones(&[2, 4], dtype);
        let mask = ones(&[1, 4], dtype);

        let err = fused_scale_mask_softmax_forward(&stream, &input, &mask, 1.0).unwrap_err();
        assert!(matches!(err, WarpForgeError::UnsupportedDType(d) if d == dtype));
        assert!(err.to_string().contains("unsupported numeric type"));
    }
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_mixed_storage_types_are_rejected() {
    let stream = fresh_stream();
    let input = ones(&[2, 4], DType::F16);
    let mask = ones(&[1, 4], DType::F16);
    let bias = ones(&[2, 4], DType::BF16);

    let err =
        fused_scale_mask_bias_softmax_forward(&stream, &input, &mask, &bias, 1.0).unwrap_err();
    match err {
        WarpForgeError::DTypeMismatch {
            name,
            expected,
            actual,
        } => {
            assert_eq!(name, "bias");
            assert_eq!(expected, DType::F16);
            assert_eq!(actual, DType::BF16);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_gradient_shape_mismatch_is_rejected() {
    let stream = fresh_stream();
    let d_output = ones(&[3, 8], DType::F32);
    let output = ones(&[4, 8], DType::F32);

    let err = softmax_gradient(&stream, &d_output, &output).unwrap_err();
    assert!(matches!(err, WarpForgeError::InvalidTensorShape(_)));
}

#[test]
fn test_empty_input_is_rejected() {
    let stream = fresh_stream();
    let input = Tensor::from_vec(Vec::<f32>::new(), &[0, 8]).unwrap();

    let err = softmax(&stream, &input).unwrap_err();
    assert!(matches!(err, WarpForgeError::InvalidTensorShape(_)));
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_rows_wider_than_capacity_are_rejected() {
    let stream = fresh_stream();
    let cols = MAX_SUPPORTED_COLS + 1;
    let input = ones(&[1, cols], DType::F32);

    let err = softmax(&stream, &input).unwrap_err();
    match err {
        WarpForgeError::ColumnsExceedCapacity { cols: got, max } => {
            assert_eq!(got, cols);
            assert_eq!(max, MAX_SUPPORTED_COLS);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_short_mask_is_rejected() {
    let stream = fresh_stream();
    // 2 heads x 4 cols = 8 logit rows per mask row; 16 rows need 2 mask rows
    let input = ones(&[2, 2, 4, 4], DType::F32);
    let mask = ones(&[1, 4], DType::F32);

    let err = fused_scale_mask_softmax_forward(&stream, &input, &mask, 1.0).unwrap_err();
    assert!(matches!(err, WarpForgeError::BroadcastShapeMismatch(_)));

    let mask = ones(&[2, 1, 1, 4], DType::F32);
    assert!(fused_scale_mask_softmax_forward(&stream, &input, &mask, 1.0).is_ok());
}

#[test]
fn test_ragged_mask_is_rejected() {
    let stream = fresh_stream();
    let input = ones(&[2, 4], DType::F32);
    let mask = ones(&[1, 5], DType::F32);

    let err = fused_scale_mask_softmax_forward(&stream, &input, &mask, 1.0).unwrap_err();
    assert!(matches!(err, WarpForgeError::BroadcastShapeMismatch(_)));
}

#[test]
fn test_short_bias_is_rejected() {
    let stream = fresh_stream();
    let input = ones(&[1, 2, 4, 4], DType::F32);
    let mask = ones(&[1, 4], DType::F32);
    let bias = ones(&[1, 1, 4, 4], DType::F32);

    let err =
        fused_scale_mask_bias_softmax_forward(&stream, &input, &mask, &bias, 1.0).unwrap_err();
    assert!(matches!(err, WarpForgeError::BroadcastShapeMismatch(_)));

    let output = ones(&[1, 2, 4, 4], DType::F32);
    let err = fused_scale_mask_bias_softmax_backward(&stream, &output, &output, &mask, &bias, 1.0)
        .unwrap_err();
    assert!(matches!(err, WarpForgeError::BroadcastShapeMismatch(_)));
    assert_eq!(stream.launch_count(), 0);
}

#[test]
fn test_head_is_inferred_from_third_axis() {
    let stream = fresh_stream();
    let (batch, head, query, cols) = (3, 2, 2, 4);
    let input = ones(&[batch, head, query, cols], DType::F32);

    // with head = 2 the 12 rows need exactly one mask row per 8 logit rows
    let mask = ones(&[2, cols], DType::F32);
    let output = fused_scale_mask_softmax_backward(&stream, &input, &input, &mask, 1.0);
    assert!(output.is_ok());

    let mask = ones(&[1, cols], DType::F32);
    let err = fused_scale_mask_softmax_backward(&stream, &input, &input, &mask, 1.0).unwrap_err();
    assert!(matches!(err, WarpForgeError::BroadcastShapeMismatch(_)));
}
