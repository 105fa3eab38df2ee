//! Extension methods for ONNX protobuf types
//!
//! Provides convenient helper methods for working with ONNX protobuf types.

use super::onnx::*;

// ============================================================================
// ModelProto extensions
// ============================================================================

impl ModelProto {
    /// Get the opset version for the default domain
    pub fn get_opset_version(&self) -> Option<i64> {
        self.opset_import
            .iter()
            .find(|op| op.domain.is_empty() || op.domain == "ai.onnx")
            .map(|op| op.version)
    }

    /// Add or update the opset import for a domain
    pub fn set_opset_version(&mut self, domain: &str, version: i64) {
        for opset in &mut self.opset_import {
            if opset.domain == domain {
                opset.version = version;
                return;
            }
        }
        self.opset_import.push(OperatorSetIdProto {
            domain: domain.to_string(),
            version,
        });
    }

    /// Check if the model has a graph
    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }
}

// ============================================================================
// NodeProto extensions
// ============================================================================

impl NodeProto {
    /// Get attribute by name
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|attr| attr.name == name)
    }

    /// Check whether an attribute is present
    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Get integer attribute value with default
    pub fn get_attribute_int(&self, name: &str, default: i64) -> i64 {
        self.get_attribute(name).map(|a| a.i).unwrap_or(default)
    }

    /// Get float attribute value with default
    pub fn get_attribute_float(&self, name: &str, default: f32) -> f32 {
        self.get_attribute(name).map(|a| a.f).unwrap_or(default)
    }

    /// Get repeated int attribute
    pub fn get_attribute_ints(&self, name: &str) -> Option<&[i64]> {
        self.get_attribute(name).map(|a| a.ints.as_slice())
    }

    /// Remove an attribute by name and return it
    pub fn take_attribute(&mut self, name: &str) -> Option<AttributeProto> {
        let idx = self.attribute.iter().position(|a| a.name == name)?;
        Some(self.attribute.remove(idx))
    }

    /// Count inputs with non-empty names (empty names mark omitted optionals)
    pub fn real_input_count(&self) -> usize {
        self.input.iter().filter(|s| !s.is_empty()).count()
    }

    /// Count outputs with non-empty names
    pub fn real_output_count(&self) -> usize {
        self.output.iter().filter(|s| !s.is_empty()).count()
    }
}

// ============================================================================
// ValueInfoProto extensions
// ============================================================================

impl ValueInfoProto {
    /// Get the tensor type if this value is tensor-typed
    pub fn tensor_type(&self) -> Option<&type_proto::Tensor> {
        self.r#type.as_ref().and_then(|t| {
            t.value.as_ref().map(|v| match v {
                type_proto::Value::TensorType(tensor) => tensor,
            })
        })
    }

    /// Get the shape dimensions if available (symbolic dims become -1)
    pub fn get_shape(&self) -> Option<Vec<i64>> {
        self.tensor_type().and_then(|tensor| {
            tensor.shape.as_ref().map(|s| {
                s.dim
                    .iter()
                    .map(|d| match &d.value {
                        Some(tensor_shape_proto::dimension::Value::DimValue(v)) => *v,
                        Some(tensor_shape_proto::dimension::Value::DimParam(_)) => -1,
                        None => -1,
                    })
                    .collect()
            })
        })
    }

    /// Get the element type if this is a tensor type
    pub fn get_elem_type(&self) -> Option<i32> {
        self.tensor_type().map(|tensor| tensor.elem_type)
    }
}

// ============================================================================
// TensorProto extensions
// ============================================================================

impl TensorProto {
    /// Get the total number of elements, `None` when a dim is negative or
    /// the product overflows `usize`
    pub fn num_elements(&self) -> Option<usize> {
        // empty dims means scalar
        self.dims
            .iter()
            .try_fold(1usize, |n, &d| n.checked_mul(usize::try_from(d).ok()?))
    }

    /// Check if this tensor has raw_data
    pub fn has_raw_data(&self) -> bool {
        !self.raw_data.is_empty()
    }

    /// Get data type enum value
    pub fn data_type_enum(&self) -> tensor_proto::DataType {
        tensor_proto::DataType::try_from(self.data_type)
            .unwrap_or(tensor_proto::DataType::Undefined)
    }
}

// ============================================================================
// AttributeProto extensions
// ============================================================================

impl AttributeProto {
    /// Create a new integer attribute
    pub fn new_int(name: &str, value: i64) -> Self {
        Self {
            name: name.to_string(),
            i: value,
            r#type: attribute_proto::AttributeType::Int as i32,
            ..Default::default()
        }
    }

    /// Create a new float attribute
    pub fn new_float(name: &str, value: f32) -> Self {
        Self {
            name: name.to_string(),
            f: value,
            r#type: attribute_proto::AttributeType::Float as i32,
            ..Default::default()
        }
    }

    /// Create a new ints attribute
    pub fn new_ints(name: &str, values: Vec<i64>) -> Self {
        Self {
            name: name.to_string(),
            ints: values,
            r#type: attribute_proto::AttributeType::Ints as i32,
            ..Default::default()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Create a new ValueInfoProto for a tensor
pub fn make_tensor_value_info(name: &str, elem_type: i32, shape: &[i64]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type,
                shape: Some(TensorShapeProto {
                    dim: shape
                        .iter()
                        .map(|&d| tensor_shape_proto::Dimension {
                            value: Some(tensor_shape_proto::dimension::Value::DimValue(d)),
                            denotation: String::new(),
                        })
                        .collect(),
                }),
            })),
            denotation: String::new(),
        }),
        doc_string: String::new(),
    }
}

/// Create a new NodeProto
pub fn make_node(op_type: &str, inputs: &[&str], outputs: &[&str], name: &str) -> NodeProto {
    NodeProto {
        op_type: op_type.to_string(),
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        name: name.to_string(),
        ..Default::default()
    }
}

/// Create a 1-D INT64 initializer
pub fn make_int64_initializer(name: &str, values: &[i64]) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: vec![values.len() as i64],
        data_type: tensor_proto::DataType::Int64 as i32,
        int64_data: values.to_vec(),
        ..Default::default()
    }
}

/// Create a FLOAT initializer with explicit dims
pub fn make_float_initializer(name: &str, dims: &[i64], values: &[f32]) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: tensor_proto::DataType::Float as i32,
        float_data: values.to_vec(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_get_attribute() {
        let mut node = NodeProto::default();
        node.attribute.push(AttributeProto::new_int("axis", 1));

        assert_eq!(node.get_attribute_int("axis", 0), 1);
        assert_eq!(node.get_attribute_int("missing", 99), 99);
    }

    #[test]
    fn test_take_attribute() {
        let mut node = NodeProto::default();
        node.attribute.push(AttributeProto::new_ints("axes", vec![0, 2]));

        let taken = node.take_attribute("axes").unwrap();
        assert_eq!(taken.ints, vec![0, 2]);
        assert!(node.attribute.is_empty());
        assert!(node.take_attribute("axes").is_none());
    }

    #[test]
    fn test_make_tensor_value_info() {
        let vi = make_tensor_value_info("test", 1, &[1, 3, 224, 224]);
        assert_eq!(vi.name, "test");
        assert_eq!(vi.get_shape(), Some(vec![1, 3, 224, 224]));
        assert_eq!(vi.get_elem_type(), Some(1));
    }

    #[test]
    fn test_make_node() {
        let node = make_node("Sub", &["X", "B"], &["Y"], "sub_0");
        assert_eq!(node.op_type, "Sub");
        assert_eq!(node.input, vec!["X", "B"]);
        assert_eq!(node.output, vec!["Y"]);
    }

    #[test]
    fn test_make_int64_initializer() {
        let t = make_int64_initializer("indices", &[2, 1, 0]);
        assert_eq!(t.dims, vec![3]);
        assert_eq!(t.int64_data, vec![2, 1, 0]);
        assert_eq!(t.data_type_enum(), tensor_proto::DataType::Int64);
    }

    #[test]
    fn test_make_float_initializer() {
        let t = make_float_initializer("mean", &[1, 1, 1, 3], &[104.0, 117.0, 123.0]);
        assert_eq!(t.dims, vec![1, 1, 1, 3]);
        assert_eq!(t.num_elements(), Some(3));
        assert_eq!(t.float_data, vec![104.0, 117.0, 123.0]);
    }

    #[test]
    fn test_num_elements() {
        assert_eq!(TensorProto::default().num_elements(), Some(1)); // scalar

        let huge = TensorProto {
            dims: vec![1i64 << 40, 1i64 << 40],
            ..Default::default()
        };
        assert_eq!(huge.num_elements(), None);

        let negative = TensorProto {
            dims: vec![2, -1],
            ..Default::default()
        };
        assert_eq!(negative.num_elements(), None);
    }

    #[test]
    fn test_real_io_counts() {
        let node = NodeProto {
            input: vec!["x".to_string(), String::new()],
            output: vec!["y".to_string()],
            ..Default::default()
        };
        assert_eq!(node.real_input_count(), 1);
        assert_eq!(node.real_output_count(), 1);
    }

    #[test]
    fn test_set_opset_version() {
        let mut model = ModelProto::default();
        model.set_opset_version("", 13);
        assert_eq!(model.get_opset_version(), Some(13));

        model.set_opset_version("", 17);
        assert_eq!(model.get_opset_version(), Some(17));
        assert_eq!(model.opset_import.len(), 1);

        model.set_opset_version("ai.onnx.ml", 2);
        assert_eq!(model.opset_import.len(), 2);
    }
}
