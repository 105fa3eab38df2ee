//! Model deserialization
//!
//! Load serialized models from files or bytes. Decoding only proves the
//! bytes are valid protobuf, so every load path also runs a schema check
//! that rejects models this crate cannot faithfully edit: control-flow
//! attributes, externally stored tensor data, unknown data types, and
//! initializer payloads that disagree with their declared shape.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use prost::Message;

use crate::error::{GraftError, GraftResult};
use crate::proto::onnx::attribute_proto::AttributeType;
use crate::proto::onnx::tensor_proto::{DataLocation, DataType};
use crate::proto::{
    type_proto, AttributeProto, GraphProto, ModelProto, TensorProto, ValueInfoProto,
};
use crate::tensor::{any_typed_data_len, dtype_size, i32_to_dtype, typed_data_len};

/// Load a model from a file path
///
/// # Example
///
/// ```ignore
/// use onnx_graft::io::load_model;
///
/// let model = load_model("model.onnx")?;
/// println!("IR version: {}", model.ir_version);
/// ```
pub fn load_model<P: AsRef<Path>>(path: P) -> GraftResult<ModelProto> {
    let file = File::open(path.as_ref())?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    load_model_from_bytes(&buffer)
}

/// Load a model from bytes
///
/// # Example
///
/// ```ignore
/// use onnx_graft::io::load_model_from_bytes;
///
/// let bytes = std::fs::read("model.onnx")?;
/// let model = load_model_from_bytes(&bytes)?;
/// ```
pub fn load_model_from_bytes(bytes: &[u8]) -> GraftResult<ModelProto> {
    let model = ModelProto::decode(bytes)
        .map_err(|e| GraftError::MalformedGraph(format!("failed to decode model: {e}")))?;
    check_schema(&model)?;
    Ok(model)
}

/// Load only the graph from a model file
pub fn load_graph<P: AsRef<Path>>(path: P) -> GraftResult<GraphProto> {
    let model = load_model(path)?;
    // check_schema already proved the graph is present
    model
        .graph
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))
}

// ============================================================================
// Schema checks
// ============================================================================

fn malformed(msg: String) -> GraftError {
    GraftError::MalformedGraph(msg)
}

fn check_schema(model: &ModelProto) -> GraftResult<()> {
    if model.ir_version < 1 {
        return Err(malformed(format!(
            "invalid ir_version {}",
            model.ir_version
        )));
    }

    for opset in &model.opset_import {
        if opset.version < 1 {
            return Err(malformed(format!(
                "opset import for domain '{}' has invalid version {}",
                opset.domain, opset.version
            )));
        }
    }

    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| malformed("model has no graph".to_string()))?;
    check_graph_schema(graph)
}

fn check_graph_schema(graph: &GraphProto) -> GraftResult<()> {
    for (idx, node) in graph.node.iter().enumerate() {
        if node.op_type.is_empty() {
            return Err(malformed(format!("node #{idx} has empty op_type")));
        }
        if node.output.is_empty() {
            return Err(malformed(format!(
                "node #{idx} ({}) has no outputs",
                node.op_type
            )));
        }
        for attr in &node.attribute {
            check_attribute(idx, node.op_type.as_str(), attr)?;
        }
    }

    for vi in graph
        .input
        .iter()
        .chain(&graph.output)
        .chain(&graph.value_info)
    {
        check_value_info(vi)?;
    }

    for init in &graph.initializer {
        if init.name.is_empty() {
            return Err(malformed("initializer has empty name".to_string()));
        }
        check_tensor_data(init, &format!("initializer '{}'", init.name))?;
    }

    Ok(())
}

/// Reject attribute payloads the data model does not carry.
///
/// Subgraph attributes (`If`/`Loop`/`Scan` bodies) and the sparse and
/// type-proto families are deliberately outside this crate's schema; a node
/// declaring one would silently lose its payload on a round trip.
fn check_attribute(node_idx: usize, op_type: &str, attr: &AttributeProto) -> GraftResult<()> {
    let site = format!("node #{node_idx} ({op_type}): attribute '{}'", attr.name);

    let attr_type = AttributeType::try_from(attr.r#type)
        .map_err(|_| malformed(format!("{site} has unknown type tag {}", attr.r#type)))?;

    match attr_type {
        AttributeType::Float
        | AttributeType::Int
        | AttributeType::String
        | AttributeType::Floats
        | AttributeType::Ints
        | AttributeType::Strings => Ok(()),
        AttributeType::Tensor => {
            let tensor = attr
                .t
                .as_ref()
                .ok_or_else(|| malformed(format!("{site} declares a tensor but carries none")))?;
            check_tensor_data(tensor, &format!("{site} tensor"))
        }
        AttributeType::Tensors => {
            for tensor in &attr.tensors {
                check_tensor_data(tensor, &format!("{site} tensor"))?;
            }
            Ok(())
        }
        AttributeType::Graph | AttributeType::Graphs => Err(malformed(format!(
            "{site} carries a subgraph, which is not supported"
        ))),
        other => Err(malformed(format!(
            "{site} has unsupported type {other:?}"
        ))),
    }
}

fn check_value_info(vi: &ValueInfoProto) -> GraftResult<()> {
    if let Some(ty) = &vi.r#type {
        match &ty.value {
            Some(type_proto::Value::TensorType(tensor)) => {
                // elem_type 0 means unspecified, anything else must be known
                i32_to_dtype(tensor.elem_type)?;
            }
            None => {
                return Err(malformed(format!(
                    "value '{}' has a non-tensor type, which is not supported",
                    vi.name
                )));
            }
        }
    }
    Ok(())
}

/// Payload consistency for one tensor: storage location, dtype tag, and the
/// invariant that exactly one payload form holds exactly `numel` elements.
fn check_tensor_data(tensor: &TensorProto, what: &str) -> GraftResult<()> {
    if tensor.dims.iter().any(|&d| d < 0) {
        return Err(malformed(format!("{what} has a negative dimension")));
    }

    if tensor.data_location != DataLocation::Default as i32 {
        return Err(malformed(format!(
            "{what} uses external data storage, which is not supported"
        )));
    }

    let dtype = i32_to_dtype(tensor.data_type)?;
    if dtype == DataType::Undefined {
        return Err(malformed(format!("{what} has undefined data type")));
    }

    let numel = tensor
        .num_elements()
        .ok_or_else(|| malformed(format!("{what}: dims imply an element count that overflows")))?;

    if tensor.has_raw_data() {
        if any_typed_data_len(tensor) > 0 {
            return Err(malformed(format!(
                "{what} has both raw_data and typed data fields"
            )));
        }
        let elem_size = dtype_size(dtype)
            .map_err(|_| malformed(format!("{what}: {dtype:?} tensors cannot use raw_data")))?;
        let expected = numel
            .checked_mul(elem_size)
            .ok_or_else(|| malformed(format!("{what}: dims imply a byte size that overflows")))?;
        if tensor.raw_data.len() != expected {
            return Err(malformed(format!(
                "{what}: raw_data holds {} bytes but shape implies {expected}",
                tensor.raw_data.len()
            )));
        }
    } else {
        let len = typed_data_len(tensor)?;
        if any_typed_data_len(tensor) != len {
            return Err(malformed(format!(
                "{what} stores data in a field that does not match {dtype:?}"
            )));
        }
        if len != numel {
            return Err(malformed(format!(
                "{what}: typed data holds {len} values but shape implies {numel}"
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Model metadata
// ============================================================================

/// Metadata summary extracted from a model
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// IR version
    pub ir_version: i64,
    /// Producer name
    pub producer_name: String,
    /// Producer version
    pub producer_version: String,
    /// Opset imports as (domain, version) pairs
    pub opsets: Vec<(String, i64)>,
    /// Graph name
    pub graph_name: String,
    /// Number of nodes
    pub node_count: usize,
    /// Number of initializers
    pub initializer_count: usize,
    /// Input names
    pub inputs: Vec<String>,
    /// Output names
    pub outputs: Vec<String>,
}

impl ModelInfo {
    /// Extract metadata from a model
    pub fn from_model(model: &ModelProto) -> Self {
        let graph = model.graph.as_ref();

        Self {
            ir_version: model.ir_version,
            producer_name: model.producer_name.clone(),
            producer_version: model.producer_version.clone(),
            opsets: model
                .opset_import
                .iter()
                .map(|op| (op.domain.clone(), op.version))
                .collect(),
            graph_name: graph.map(|g| g.name.clone()).unwrap_or_default(),
            node_count: graph.map(|g| g.node.len()).unwrap_or(0),
            initializer_count: graph.map(|g| g.initializer.len()).unwrap_or(0),
            inputs: graph
                .map(|g| g.input.iter().map(|i| i.name.clone()).collect())
                .unwrap_or_default(),
            outputs: graph
                .map(|g| g.output.iter().map(|o| o.name.clone()).collect())
                .unwrap_or_default(),
        }
    }
}

/// Load a model and summarize its metadata
pub fn get_model_info<P: AsRef<Path>>(path: P) -> GraftResult<ModelInfo> {
    let model = load_model(path)?;
    Ok(ModelInfo::from_model(&model))
}
