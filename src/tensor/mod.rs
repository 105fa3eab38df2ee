//! Tensor utilities for ONNX models
//!
//! This module provides utilities for working with ONNX tensors:
//! - Data type mappings and payload-field resolution (`dtype`)
//! - Shape utilities (`shape`)

pub mod dtype;
pub mod shape;

// Re-export commonly used items
pub use dtype::{any_typed_data_len, dtype_size, i32_to_dtype, typed_data_len, TypedField};
pub use shape::{is_dynamic, normalize_axis, numel, shape_from_proto, shape_from_value_info};
