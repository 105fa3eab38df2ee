//! ONNX Protocol Buffer types
//!
//! The message structs live in the `onnx` submodule, maintained by hand with
//! upstream field numbers (see the note there on schema coverage). Extension
//! methods and constructors are provided in the `extensions` submodule.

/// ONNX protobuf message types.
#[allow(missing_docs)]
pub mod onnx;

// Re-export commonly used types at module level
pub use onnx::{
    AttributeProto, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, StringStringEntryProto,
    TensorProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

// Re-export submodules for nested types
pub use onnx::attribute_proto;
pub use onnx::tensor_proto;
pub use onnx::tensor_shape_proto;
pub use onnx::type_proto;

/// Extension methods for ONNX protobuf types
pub mod extensions;
