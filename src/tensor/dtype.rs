//! ONNX data type mappings
//!
//! Maps `TensorProto` data types to byte widths and to the typed repeated
//! field that may carry their payload.

use crate::error::{GraftError, GraftResult};
use crate::proto::onnx::tensor_proto::DataType;
use crate::proto::TensorProto;

/// Size in bytes of one element when stored in `raw_data`
pub fn dtype_size(dtype: DataType) -> GraftResult<usize> {
    match dtype {
        DataType::Float => Ok(4),
        DataType::Uint8 => Ok(1),
        DataType::Int8 => Ok(1),
        DataType::Uint16 => Ok(2),
        DataType::Int16 => Ok(2),
        DataType::Int32 => Ok(4),
        DataType::Int64 => Ok(8),
        DataType::Bool => Ok(1),
        DataType::Float16 => Ok(2),
        DataType::Double => Ok(8),
        DataType::Uint32 => Ok(4),
        DataType::Uint64 => Ok(8),
        DataType::Complex64 => Ok(8),
        DataType::Complex128 => Ok(16),
        DataType::Bfloat16 => Ok(2),
        DataType::String => Err(GraftError::MalformedGraph(
            "string tensors cannot use raw_data".to_string(),
        )),
        DataType::Undefined => Err(GraftError::MalformedGraph(
            "tensor has undefined data type".to_string(),
        )),
    }
}

/// Convert an i32 tag to the DataType enum
pub fn i32_to_dtype(value: i32) -> GraftResult<DataType> {
    DataType::try_from(value)
        .map_err(|_| GraftError::MalformedGraph(format!("invalid data type tag {value}")))
}

/// The typed repeated field of `TensorProto` that stores a given data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedField {
    /// `float_data` (FLOAT, COMPLEX64)
    Float,
    /// `int32_data` (INT32 and narrower ints, BOOL, FLOAT16, BFLOAT16)
    Int32,
    /// `int64_data`
    Int64,
    /// `string_data`
    String,
    /// `double_data` (DOUBLE, COMPLEX128)
    Double,
    /// `uint64_data` (UINT32, UINT64)
    Uint64,
}

/// Which typed field may carry payload for `dtype`
pub fn typed_field_for(dtype: DataType) -> GraftResult<TypedField> {
    match dtype {
        DataType::Float | DataType::Complex64 => Ok(TypedField::Float),
        DataType::Uint8
        | DataType::Int8
        | DataType::Uint16
        | DataType::Int16
        | DataType::Int32
        | DataType::Bool
        | DataType::Float16
        | DataType::Bfloat16 => Ok(TypedField::Int32),
        DataType::Int64 => Ok(TypedField::Int64),
        DataType::String => Ok(TypedField::String),
        DataType::Double | DataType::Complex128 => Ok(TypedField::Double),
        DataType::Uint32 | DataType::Uint64 => Ok(TypedField::Uint64),
        DataType::Undefined => Err(GraftError::MalformedGraph(
            "tensor has undefined data type".to_string(),
        )),
    }
}

/// Element count held by the typed field matching the tensor's data type.
///
/// Complex types store two scalars per element; that division is the caller's
/// concern and not folded in here.
pub fn typed_data_len(tensor: &TensorProto) -> GraftResult<usize> {
    let dtype = i32_to_dtype(tensor.data_type)?;
    Ok(match typed_field_for(dtype)? {
        TypedField::Float => tensor.float_data.len(),
        TypedField::Int32 => tensor.int32_data.len(),
        TypedField::Int64 => tensor.int64_data.len(),
        TypedField::String => tensor.string_data.len(),
        TypedField::Double => tensor.double_data.len(),
        TypedField::Uint64 => tensor.uint64_data.len(),
    })
}

/// Total length across all typed fields, used to detect payload in a field
/// that does not match the declared data type.
pub fn any_typed_data_len(tensor: &TensorProto) -> usize {
    tensor.float_data.len()
        + tensor.int32_data.len()
        + tensor.int64_data.len()
        + tensor.string_data.len()
        + tensor.double_data.len()
        + tensor.uint64_data.len()
}
