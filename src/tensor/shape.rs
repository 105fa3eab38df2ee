//! Shape utilities for ONNX tensors
//!
//! Functions for working with tensor shapes and dimensions.

use crate::error::{GraftError, GraftResult};
use crate::proto::{TensorShapeProto, ValueInfoProto};

/// Calculate total number of elements from shape, `None` when a dim is
/// negative or the product overflows `usize`
pub fn numel(shape: &[i64]) -> Option<usize> {
    // empty shape means scalar
    shape
        .iter()
        .try_fold(1usize, |n, &d| n.checked_mul(usize::try_from(d).ok()?))
}

/// Check if shape contains dynamic dimensions (negative values)
pub fn is_dynamic(shape: &[i64]) -> bool {
    shape.iter().any(|&d| d < 0)
}

/// Extract shape from ValueInfoProto
pub fn shape_from_value_info(vi: &ValueInfoProto) -> Option<Vec<i64>> {
    vi.get_shape()
}

/// Extract shape from TensorShapeProto (symbolic dims become -1)
pub fn shape_from_proto(shape_proto: &TensorShapeProto) -> Vec<i64> {
    use crate::proto::onnx::tensor_shape_proto::dimension::Value;

    shape_proto
        .dim
        .iter()
        .map(|d| match &d.value {
            Some(Value::DimValue(v)) => *v,
            Some(Value::DimParam(_)) => -1, // symbolic dimension
            None => -1,
        })
        .collect()
}

/// Normalize axis to positive index
pub fn normalize_axis(axis: i64, ndim: usize) -> GraftResult<usize> {
    let ndim_i64 = ndim as i64;
    let normalized = if axis < 0 { axis + ndim_i64 } else { axis };

    if normalized < 0 || normalized >= ndim_i64 {
        return Err(GraftError::MalformedGraph(format!(
            "axis {axis} out of bounds for rank {ndim}"
        )));
    }

    Ok(normalized as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::make_tensor_value_info;

    #[test]
    fn test_numel() {
        assert_eq!(numel(&[2, 3, 4]), Some(24));
        assert_eq!(numel(&[1, 1, 1, 3]), Some(3));
        assert_eq!(numel(&[]), Some(1)); // scalar
        assert_eq!(numel(&[2, 0]), Some(0));
        assert_eq!(numel(&[-1, 3]), None); // dynamic dims have no count
        assert_eq!(numel(&[1 << 40, 1 << 40]), None);
    }

    #[test]
    fn test_is_dynamic() {
        assert!(!is_dynamic(&[1, 224, 224, 3]));
        assert!(is_dynamic(&[-1, 224, 224, 3]));
    }

    #[test]
    fn test_shape_from_value_info() {
        let vi = make_tensor_value_info("x", 1, &[1, 2]);
        assert_eq!(shape_from_value_info(&vi), Some(vec![1, 2]));

        let untyped = ValueInfoProto {
            name: "y".to_string(),
            ..Default::default()
        };
        assert_eq!(shape_from_value_info(&untyped), None);
    }

    #[test]
    fn test_normalize_axis() {
        assert_eq!(normalize_axis(0, 4).unwrap(), 0);
        assert_eq!(normalize_axis(3, 4).unwrap(), 3);
        assert_eq!(normalize_axis(-1, 4).unwrap(), 3);
        assert_eq!(normalize_axis(-4, 4).unwrap(), 0);
        assert!(normalize_axis(4, 4).is_err());
        assert!(normalize_axis(-5, 4).is_err());
    }
}
