//! Node elision
//!
//! Removes one single-input/single-output node from a graph, splicing the
//! wire through it: every consumer of the elided output is rewired to the
//! elided input, and graph output ports naming the elided output are renamed
//! the same way with a freshly computed descriptor.
//!
//! The target is always explicit. Whether a node should go (a terminal
//! `Softmax` when raw scores are wanted, an `Identity` left by an exporter)
//! is the caller's call; this module never guesses.
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::elide::{elide_node, ElideTarget};
//!
//! // serve raw logits instead of probabilities
//! let scores = elide_node(&model, &ElideTarget::op_type("Softmax"))?;
//! ```

use crate::error::{GraftError, GraftResult};
use crate::graph::GraphContext;
use crate::proto::extensions::make_tensor_value_info;
use crate::proto::{ModelProto, NodeProto, ValueInfoProto};
use crate::traits::Transformer;
use crate::validate::validate_model;

/// Selects the node to elide
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElideTarget {
    /// Node with this exact name
    Name(String),
    /// The single node with this op_type; ambiguous when several exist
    OpType(String),
}

impl ElideTarget {
    /// Target a node by name
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Target the unique node with an op_type
    pub fn op_type(op_type: impl Into<String>) -> Self {
        Self::OpType(op_type.into())
    }
}

/// Remove one 1-in/1-out node, rewiring consumers and graph outputs
///
/// Returns a new model; the input is never mutated. The result is validated
/// before being returned.
pub fn elide_node(model: &ModelProto, target: &ElideTarget) -> GraftResult<ModelProto> {
    let ctx = GraphContext::from_model(model)?;

    let idx = resolve_target(&ctx, target)?;
    let node = &ctx.graph().node[idx];

    if node.real_input_count() != 1 || node.real_output_count() != 1 {
        return Err(shape_error(node));
    }
    let (Some(survivor), Some(removed)) = (
        node.input.iter().find(|s| !s.is_empty()).cloned(),
        node.output.iter().find(|s| !s.is_empty()).cloned(),
    ) else {
        return Err(shape_error(node));
    };

    // descriptor for ports that will now expose the surviving tensor,
    // computed against the pre-removal graph
    let replacement_port = ctx
        .is_graph_output(&removed)
        .then(|| recompute_descriptor(&ctx, &survivor));

    let mut out = model.clone();
    let graph = out
        .graph
        .as_mut()
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

    let elided = graph.node.remove(idx);
    tracing::debug!(
        op_type = %elided.op_type,
        name = %elided.name,
        output = %removed,
        "eliding node"
    );

    for node in &mut graph.node {
        for input in &mut node.input {
            if *input == removed {
                *input = survivor.clone();
            }
        }
    }

    if let Some(port) = replacement_port {
        for slot in &mut graph.output {
            if slot.name == removed {
                *slot = port.clone();
            }
        }
        // the port now carries the descriptor; a shadowing annotation would
        // be a duplicate
        graph.value_info.retain(|v| v.name != survivor);
    }

    graph.value_info.retain(|v| v.name != removed);

    validate_model(&out)?;
    Ok(out)
}

fn resolve_target(ctx: &GraphContext<'_>, target: &ElideTarget) -> GraftResult<usize> {
    match target {
        ElideTarget::Name(name) => ctx
            .get_node_index(name)
            .ok_or_else(|| GraftError::NodeNotFound(format!("no node named '{name}'"))),
        ElideTarget::OpType(op_type) => {
            let matches = ctx.find_node_indexes_by_op(op_type);
            match matches.as_slice() {
                [idx] => Ok(*idx),
                [] => Err(GraftError::NodeNotFound(format!("no {op_type} node"))),
                _ => Err(GraftError::NodeNotFound(format!(
                    "multiple {op_type} nodes; select by name"
                ))),
            }
        }
    }
}

fn shape_error(node: &NodeProto) -> GraftError {
    let label = if node.name.is_empty() {
        node.op_type.clone()
    } else {
        node.name.clone()
    };
    GraftError::UnsupportedShape {
        node: label,
        inputs: node.real_input_count(),
        outputs: node.real_output_count(),
    }
}

/// Best available descriptor for a tensor about to become a graph output:
/// any declared descriptor (value_info or a port), then initializer dims and
/// dtype, else a bare name with unknown type.
fn recompute_descriptor(ctx: &GraphContext<'_>, name: &str) -> ValueInfoProto {
    if let Some(vi) = ctx.get_value_info(name) {
        return vi.clone();
    }
    if let Some(init) = ctx.get_initializer(name) {
        return make_tensor_value_info(name, init.data_type, &init.dims);
    }
    tracing::debug!(tensor = name, "no descriptor source for new graph output");
    ValueInfoProto {
        name: name.to_string(),
        ..Default::default()
    }
}

/// [`Transformer`] adapter for node elision
pub struct NodeElider {
    target: ElideTarget,
}

impl NodeElider {
    /// Elide the node with this name
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            target: ElideTarget::name(name),
        }
    }

    /// Elide the unique node with this op_type
    pub fn by_op_type(op_type: impl Into<String>) -> Self {
        Self {
            target: ElideTarget::op_type(op_type),
        }
    }
}

impl Transformer for NodeElider {
    fn name(&self) -> &str {
        "NodeElider"
    }

    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        elide_node(model, &self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{make_float_initializer, make_node, make_tensor_value_info};
    use crate::proto::{GraphProto, OperatorSetIdProto};

    fn wrap(graph: GraphProto) -> ModelProto {
        ModelProto {
            ir_version: 8,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(graph),
            ..Default::default()
        }
    }

    /// X -[MatMul w]-> logits -[Softmax]-> probs, with a shape annotation
    /// on logits
    fn classifier_model() -> ModelProto {
        wrap(GraphProto {
            name: "classifier".to_string(),
            node: vec![
                make_node("MatMul", &["X", "w"], &["logits"], "matmul_0"),
                make_node("Softmax", &["logits"], &["probs"], "softmax_0"),
            ],
            input: vec![make_tensor_value_info("X", 1, &[1, 8])],
            output: vec![make_tensor_value_info("probs", 1, &[1, 10])],
            initializer: vec![make_float_initializer("w", &[8, 10], &[0.0; 80])],
            value_info: vec![make_tensor_value_info("logits", 1, &[1, 10])],
            ..Default::default()
        })
    }

    #[test]
    fn test_elide_terminal_softmax() {
        let model = classifier_model();
        let elided = elide_node(&model, &ElideTarget::op_type("Softmax")).unwrap();
        let graph = elided.graph.as_ref().unwrap();

        assert_eq!(graph.node.len(), 1);
        assert_eq!(graph.node[0].op_type, "MatMul");

        // the output port now names the surviving tensor, with the
        // descriptor recomputed from its annotation
        assert_eq!(graph.output.len(), 1);
        assert_eq!(graph.output[0].name, "logits");
        assert_eq!(graph.output[0].get_shape(), Some(vec![1, 10]));

        // the annotation folded into the port
        assert!(graph.value_info.is_empty());

        assert!(validate_model(&elided).is_ok());
    }

    #[test]
    fn test_elide_interior_node() {
        let model = wrap(GraphProto {
            name: "chain".to_string(),
            node: vec![
                make_node("Relu", &["X"], &["t1"], "relu_0"),
                make_node("Identity", &["t1"], &["t2"], "identity_0"),
                make_node("Relu", &["t2"], &["Y"], "relu_1"),
            ],
            input: vec![make_tensor_value_info("X", 1, &[4])],
            output: vec![make_tensor_value_info("Y", 1, &[4])],
            ..Default::default()
        });

        let elided = elide_node(&model, &ElideTarget::name("identity_0")).unwrap();
        let graph = elided.graph.as_ref().unwrap();

        assert_eq!(graph.node.len(), 2);
        // downstream consumer rewired to the survivor
        assert_eq!(graph.node[1].input, vec!["t1"]);
        // output port untouched
        assert_eq!(graph.output[0].name, "Y");
        assert!(validate_model(&elided).is_ok());
    }

    #[test]
    fn test_descriptor_from_initializer() {
        let model = wrap(GraphProto {
            name: "weights_out".to_string(),
            node: vec![make_node("Identity", &["w"], &["w_out"], "identity_0")],
            output: vec![ValueInfoProto {
                name: "w_out".to_string(),
                ..Default::default()
            }],
            initializer: vec![make_float_initializer("w", &[2, 3], &[0.0; 6])],
            ..Default::default()
        });

        let elided = elide_node(&model, &ElideTarget::name("identity_0")).unwrap();
        let graph = elided.graph.as_ref().unwrap();

        assert_eq!(graph.output[0].name, "w");
        assert_eq!(graph.output[0].get_shape(), Some(vec![2, 3]));
        assert_eq!(graph.output[0].get_elem_type(), Some(1));
    }

    #[test]
    fn test_descriptor_from_graph_input() {
        let model = wrap(GraphProto {
            name: "passthrough".to_string(),
            node: vec![make_node("Softmax", &["logits"], &["probs"], "softmax_0")],
            input: vec![make_tensor_value_info("logits", 1, &[1, 10])],
            output: vec![ValueInfoProto {
                name: "probs".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let elided = elide_node(&model, &ElideTarget::op_type("Softmax")).unwrap();
        let graph = elided.graph.as_ref().unwrap();

        assert!(graph.node.is_empty());
        assert_eq!(graph.output[0].name, "logits");
        assert_eq!(graph.output[0].get_shape(), Some(vec![1, 10]));
        assert!(validate_model(&elided).is_ok());
    }

    #[test]
    fn test_omitted_optional_inputs_still_elidable() {
        let mut node = make_node("Clip", &["t1"], &["t2"], "clip_0");
        node.input.push(String::new()); // omitted min
        let model = wrap(GraphProto {
            name: "opt".to_string(),
            node: vec![
                make_node("Relu", &["X"], &["t1"], "relu_0"),
                node,
            ],
            input: vec![make_tensor_value_info("X", 1, &[4])],
            output: vec![ValueInfoProto {
                name: "t2".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        let elided = elide_node(&model, &ElideTarget::name("clip_0")).unwrap();
        assert_eq!(elided.graph.as_ref().unwrap().output[0].name, "t1");
    }

    #[test]
    fn test_missing_node() {
        let model = classifier_model();
        assert!(matches!(
            elide_node(&model, &ElideTarget::name("nope")),
            Err(GraftError::NodeNotFound(_))
        ));
        assert!(matches!(
            elide_node(&model, &ElideTarget::op_type("Gemm")),
            Err(GraftError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_ambiguous_op_type() {
        let model = wrap(GraphProto {
            name: "two_relus".to_string(),
            node: vec![
                make_node("Relu", &["X"], &["t1"], "relu_0"),
                make_node("Relu", &["t1"], &["Y"], "relu_1"),
            ],
            input: vec![make_tensor_value_info("X", 1, &[4])],
            output: vec![ValueInfoProto {
                name: "Y".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        });

        match elide_node(&model, &ElideTarget::op_type("Relu")) {
            Err(GraftError::NodeNotFound(msg)) => assert!(msg.contains("multiple")),
            other => panic!("expected NodeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_multi_input_node_rejected() {
        let model = classifier_model();
        match elide_node(&model, &ElideTarget::name("matmul_0")) {
            Err(GraftError::UnsupportedShape { node, inputs, outputs }) => {
                assert_eq!(node, "matmul_0");
                assert_eq!(inputs, 2);
                assert_eq!(outputs, 1);
            }
            other => panic!("expected UnsupportedShape, got {other:?}"),
        }
    }

    #[test]
    fn test_input_untouched_on_failure() {
        let model = classifier_model();
        let before = model.clone();

        assert!(elide_node(&model, &ElideTarget::name("matmul_0")).is_err());
        assert_eq!(model, before);
    }

    #[test]
    fn test_elider_transformer() {
        let model = classifier_model();
        let elided = NodeElider::by_name("softmax_0").transform(&model).unwrap();
        assert_eq!(elided.graph.as_ref().unwrap().node.len(), 1);
    }
}
