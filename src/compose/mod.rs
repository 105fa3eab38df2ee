//! Graph merging
//!
//! Combines two models into one. Every name on each side is prefixed so the
//! united namespaces cannot clash, the node lists and port lists are
//! concatenated, and an optional `io_map` wires outputs (or any produced
//! tensor) of one side into input ports of the other.
//!
//! The sides may disagree on opset version; the lower side is reconciled up
//! to the higher one before merging, so the result carries a single
//! consistent default-domain opset.
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::compose::{merge_models, MergeOptions};
//!
//! let mut options = MergeOptions::with_prefixes("backbone_", "head_");
//! options.io_map.push(("backbone_features".to_string(), "head_input".to_string()));
//! let merged = merge_models(&backbone, &head, &options)?;
//! ```

use indexmap::IndexMap;

use crate::error::{GraftError, GraftResult};
use crate::graph::{collect_node_names, collect_tensor_names};
use crate::opset::{get_opset_version, is_default_domain, reconcile_opset};
use crate::proto::{GraphProto, ModelProto, OperatorSetIdProto};
use crate::traits::Transformer;
use crate::validate::validate_model;

/// Controls for [`merge_models`]
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Prefix applied to every name on the first side
    pub prefix_a: String,
    /// Prefix applied to every name on the second side
    pub prefix_b: String,
    /// Connections from a produced tensor to a consumed input port, as
    /// `(producer, consumer)` pairs of prefixed names
    pub io_map: Vec<(String, String)>,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            prefix_a: "g1_".to_string(),
            prefix_b: "g2_".to_string(),
            io_map: Vec::new(),
        }
    }
}

impl MergeOptions {
    /// Options with the given prefixes and no connections
    pub fn with_prefixes(prefix_a: impl Into<String>, prefix_b: impl Into<String>) -> Self {
        Self {
            prefix_a: prefix_a.into(),
            prefix_b: prefix_b.into(),
            io_map: Vec::new(),
        }
    }
}

/// Merge two models into one
///
/// The lower-opset side is reconciled to the higher side's version first,
/// then both graphs are prefixed and concatenated. `io_map` pairs are applied
/// in order: each removes the consumer input port and rewires its readers to
/// the producer tensor. Returns a new model; neither input is mutated. The
/// result is validated before being returned.
pub fn merge_models(
    a: &ModelProto,
    b: &ModelProto,
    options: &MergeOptions,
) -> GraftResult<ModelProto> {
    if a.graph.is_none() || b.graph.is_none() {
        return Err(GraftError::MalformedGraph("model has no graph".to_string()));
    }

    // bring both sides to the higher default-domain opset
    let version_a = get_opset_version(a);
    let version_b = get_opset_version(b);
    let target = version_a.max(version_b);
    let a = if version_a < target {
        reconcile_opset(a, target)?
    } else {
        a.clone()
    };
    let b = if version_b < target {
        reconcile_opset(b, target)?
    } else {
        b.clone()
    };
    if version_a != version_b {
        tracing::debug!(
            from = version_a.min(version_b),
            to = target,
            "reconciled lower merge side"
        );
    }

    let mut graph_a = a.graph.clone().unwrap_or_default();
    let mut graph_b = b.graph.clone().unwrap_or_default();
    add_prefix(&mut graph_a, &options.prefix_a);
    add_prefix(&mut graph_b, &options.prefix_b);
    check_disjoint(&graph_a, &graph_b)?;

    let mut graph = GraphProto {
        name: merged_name(&graph_a.name, &graph_b.name),
        ..Default::default()
    };
    graph.node.extend(graph_a.node);
    graph.node.extend(graph_b.node);
    graph.input.extend(graph_a.input);
    graph.input.extend(graph_b.input);
    graph.output.extend(graph_a.output);
    graph.output.extend(graph_b.output);
    graph.initializer.extend(graph_a.initializer);
    graph.initializer.extend(graph_b.initializer);
    graph.value_info.extend(graph_a.value_info);
    graph.value_info.extend(graph_b.value_info);

    for (producer, consumer) in &options.io_map {
        connect(&mut graph, producer, consumer)?;
    }

    let merged = ModelProto {
        ir_version: a.ir_version.max(b.ir_version),
        producer_name: "onnx-graft".to_string(),
        producer_version: crate::VERSION.to_string(),
        opset_import: union_opsets(&a.opset_import, &b.opset_import),
        graph: Some(graph),
        ..Default::default()
    };

    validate_model(&merged)?;
    Ok(merged)
}

/// Prefix every tensor and node name in the graph. Empty names stay empty:
/// an anonymous node gets a generated name instead, an empty input slot is
/// an omitted optional and keeps meaning that.
pub fn add_prefix(graph: &mut GraphProto, prefix: &str) {
    let rename = |name: &mut String| {
        if !name.is_empty() {
            *name = format!("{prefix}{name}");
        }
    };

    for (i, node) in graph.node.iter_mut().enumerate() {
        if node.name.is_empty() {
            node.name = format!("{prefix}node_{i}");
        } else {
            node.name = format!("{prefix}{}", node.name);
        }
        node.input.iter_mut().for_each(rename);
        node.output.iter_mut().for_each(rename);
    }
    graph.input.iter_mut().for_each(|p| rename(&mut p.name));
    graph.output.iter_mut().for_each(|p| rename(&mut p.name));
    graph
        .initializer
        .iter_mut()
        .for_each(|t| rename(&mut t.name));
    graph
        .value_info
        .iter_mut()
        .for_each(|v| rename(&mut v.name));
}

/// Cross-side name clash check after prefixing
fn check_disjoint(a: &GraphProto, b: &GraphProto) -> GraftResult<()> {
    let mut names_a = collect_tensor_names(a);
    names_a.extend(collect_node_names(a));
    let mut names_b = collect_tensor_names(b);
    names_b.extend(collect_node_names(b));

    if let Some(name) = names_a.intersection(&names_b).next() {
        return Err(GraftError::PrefixCollision((*name).to_string()));
    }
    Ok(())
}

/// Apply one io_map pair: drop the consumer input port and point its readers
/// at the producer tensor
fn connect(graph: &mut GraphProto, producer: &str, consumer: &str) -> GraftResult<()> {
    let unresolvable = |reason: &str| GraftError::IoMapUnresolvable {
        producer: producer.to_string(),
        consumer: consumer.to_string(),
        reason: reason.to_string(),
    };

    let position = graph
        .input
        .iter()
        .position(|p| p.name == consumer)
        .ok_or_else(|| unresolvable("consumer is not an input of the merged graph"))?;

    let produced = graph.initializer.iter().any(|t| t.name == producer)
        || graph
            .node
            .iter()
            .any(|n| n.output.iter().any(|o| o == producer))
        || graph
            .input
            .iter()
            .enumerate()
            .any(|(i, p)| i != position && p.name == producer);
    if !produced {
        return Err(unresolvable("producer does not name a tensor in the merged graph"));
    }

    graph.input.remove(position);
    for node in &mut graph.node {
        for input in &mut node.input {
            if input == consumer {
                *input = producer.to_string();
            }
        }
    }
    for output in &mut graph.output {
        if output.name == consumer {
            output.name = producer.to_string();
        }
    }
    graph.value_info.retain(|v| v.name != consumer);

    tracing::debug!(producer, consumer, "connected merged graphs");
    Ok(())
}

/// Per-domain union keeping the higher version; both default-domain
/// spellings fold into one `""` entry
fn union_opsets(
    a: &[OperatorSetIdProto],
    b: &[OperatorSetIdProto],
) -> Vec<OperatorSetIdProto> {
    let mut by_domain: IndexMap<&str, i64> = IndexMap::new();
    for opset in a.iter().chain(b) {
        let domain = if is_default_domain(&opset.domain) {
            ""
        } else {
            opset.domain.as_str()
        };
        let entry = by_domain.entry(domain).or_insert(opset.version);
        *entry = (*entry).max(opset.version);
    }
    by_domain
        .into_iter()
        .map(|(domain, version)| OperatorSetIdProto {
            domain: domain.to_string(),
            version,
        })
        .collect()
}

fn merged_name(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (false, false) => format!("{a}_{b}"),
        (false, true) => a.to_string(),
        (true, false) => b.to_string(),
        (true, true) => "merged".to_string(),
    }
}

/// [`Transformer`] adapter merging a fixed second model into the one being
/// transformed
pub struct ModelMerger {
    other: ModelProto,
    options: MergeOptions,
}

impl ModelMerger {
    /// Merger that appends `other` under the given options
    pub fn new(other: ModelProto, options: MergeOptions) -> Self {
        Self { other, options }
    }
}

impl Transformer for ModelMerger {
    fn name(&self) -> &str {
        "ModelMerger"
    }

    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        merge_models(model, &self.other, &self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::extensions::{
        make_float_initializer, make_node, make_tensor_value_info,
    };
    use crate::proto::{AttributeProto, ValueInfoProto};

    fn model(
        opset: i64,
        nodes: Vec<crate::proto::NodeProto>,
        inputs: Vec<ValueInfoProto>,
        outputs: &[&str],
        initializers: Vec<crate::proto::TensorProto>,
    ) -> ModelProto {
        ModelProto {
            ir_version: 8,
            opset_import: vec![OperatorSetIdProto {
                domain: String::new(),
                version: opset,
            }],
            graph: Some(GraphProto {
                name: "g".to_string(),
                node: nodes,
                input: inputs,
                output: outputs
                    .iter()
                    .map(|name| ValueInfoProto {
                        name: name.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                initializer: initializers,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Sub(x, c) -> d at opset 9
    fn sub_model() -> ModelProto {
        model(
            9,
            vec![make_node("Sub", &["x", "c"], &["d"], "sub_0")],
            vec![make_tensor_value_info("x", 1, &[2])],
            &["d"],
            vec![make_float_initializer("c", &[2], &[1.0, 2.0])],
        )
    }

    /// Identity(u) -> v at opset 13
    fn identity_model() -> ModelProto {
        model(
            13,
            vec![make_node("Identity", &["u"], &["v"], "id_0")],
            vec![make_tensor_value_info("u", 1, &[2])],
            &["v"],
            vec![],
        )
    }

    #[test]
    fn test_merge_disjoint() {
        let a = sub_model();
        let b = identity_model();
        let merged =
            merge_models(&a, &b, &MergeOptions::with_prefixes("p1_", "p2_")).unwrap();
        let graph = merged.graph.as_ref().unwrap();

        assert_eq!(graph.node.len(), 2);
        assert_eq!(graph.node[0].name, "p1_sub_0");
        assert_eq!(graph.node[0].input, vec!["p1_x", "p1_c"]);
        assert_eq!(graph.node[1].name, "p2_id_0");

        assert_eq!(graph.input.len(), 2);
        assert_eq!(graph.input[0].name, "p1_x");
        assert_eq!(graph.input[1].name, "p2_u");
        assert_eq!(graph.output.len(), 2);
        assert_eq!(graph.initializer.len(), 1);
        assert_eq!(graph.initializer[0].name, "p1_c");

        // opset 9 side was reconciled up
        assert_eq!(merged.opset_import.len(), 1);
        assert_eq!(merged.opset_import[0].version, 13);
        assert_eq!(merged.producer_name, "onnx-graft");

        assert!(validate_model(&merged).is_ok());
    }

    #[test]
    fn test_merge_io_map() {
        let a = sub_model();
        let b = identity_model();
        let mut options = MergeOptions::with_prefixes("p1_", "p2_");
        options.io_map.push(("p1_d".to_string(), "p2_u".to_string()));

        let merged = merge_models(&a, &b, &options).unwrap();
        let graph = merged.graph.as_ref().unwrap();

        // consumed port removed, its reader rewired
        assert_eq!(graph.input.len(), 1);
        assert_eq!(graph.input[0].name, "p1_x");
        assert_eq!(graph.node[1].input, vec!["p1_d"]);
        assert_eq!(graph.output.len(), 2);

        assert!(validate_model(&merged).is_ok());
    }

    #[test]
    fn test_merge_prefix_collision() {
        let a = sub_model();
        let b = sub_model();
        match merge_models(&a, &b, &MergeOptions::with_prefixes("p_", "p_")) {
            Err(GraftError::PrefixCollision(name)) => assert!(name.starts_with("p_")),
            other => panic!("expected PrefixCollision, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_io_map_unknown_consumer() {
        let a = sub_model();
        let b = identity_model();
        let mut options = MergeOptions::with_prefixes("p1_", "p2_");
        options
            .io_map
            .push(("p1_d".to_string(), "p2_nope".to_string()));

        match merge_models(&a, &b, &options) {
            Err(GraftError::IoMapUnresolvable {
                producer,
                consumer,
                reason,
            }) => {
                assert_eq!(producer, "p1_d");
                assert_eq!(consumer, "p2_nope");
                assert!(reason.contains("consumer"));
            }
            other => panic!("expected IoMapUnresolvable, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_io_map_unknown_producer() {
        let a = sub_model();
        let b = identity_model();
        let mut options = MergeOptions::with_prefixes("p1_", "p2_");
        options
            .io_map
            .push(("p1_nope".to_string(), "p2_u".to_string()));

        match merge_models(&a, &b, &options) {
            Err(GraftError::IoMapUnresolvable { reason, .. }) => {
                assert!(reason.contains("producer"));
            }
            other => panic!("expected IoMapUnresolvable, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_reconciles_rewrites() {
        // Squeeze with an axes attribute is the opset-9 form; merging with an
        // opset-13 model must convert it before prefixing
        let mut squeeze = make_node("Squeeze", &["x"], &["y"], "sq");
        squeeze
            .attribute
            .push(AttributeProto::new_ints("axes", vec![0]));
        let a = model(
            9,
            vec![squeeze],
            vec![make_tensor_value_info("x", 1, &[1, 2])],
            &["y"],
            vec![],
        );
        let b = identity_model();

        let merged =
            merge_models(&a, &b, &MergeOptions::with_prefixes("p1_", "p2_")).unwrap();
        let graph = merged.graph.as_ref().unwrap();

        let squeeze = graph.node.iter().find(|n| n.op_type == "Squeeze").unwrap();
        assert!(squeeze.attribute.is_empty());
        assert_eq!(squeeze.input.len(), 2);
        assert_eq!(squeeze.input[1], "p1_sq_axes");
        assert!(graph.initializer.iter().any(|t| t.name == "p1_sq_axes"));
    }

    #[test]
    fn test_merge_unions_custom_domains() {
        let mut a = sub_model();
        a.opset_import.push(OperatorSetIdProto {
            domain: "com.acme".to_string(),
            version: 2,
        });
        let mut b = identity_model();
        b.opset_import.push(OperatorSetIdProto {
            domain: "com.acme".to_string(),
            version: 5,
        });

        let merged =
            merge_models(&a, &b, &MergeOptions::with_prefixes("p1_", "p2_")).unwrap();
        let acme = merged
            .opset_import
            .iter()
            .find(|o| o.domain == "com.acme")
            .unwrap();
        assert_eq!(acme.version, 5);
    }

    #[test]
    fn test_merge_anonymous_nodes_named() {
        let mut b = identity_model();
        b.graph.as_mut().unwrap().node[0].name = String::new();

        let merged =
            merge_models(&sub_model(), &b, &MergeOptions::with_prefixes("p1_", "p2_"))
                .unwrap();
        assert_eq!(merged.graph.as_ref().unwrap().node[1].name, "p2_node_0");
    }

    #[test]
    fn test_merge_inputs_untouched() {
        let a = sub_model();
        let b = identity_model();
        let before_a = a.clone();
        let before_b = b.clone();

        merge_models(&a, &b, &MergeOptions::default()).unwrap();
        assert_eq!(a, before_a);
        assert_eq!(b, before_b);
    }

    #[test]
    fn test_merger_transformer() {
        let merger = ModelMerger::new(
            identity_model(),
            MergeOptions::with_prefixes("p1_", "p2_"),
        );
        let merged = merger.transform(&sub_model()).unwrap();
        assert_eq!(merged.graph.as_ref().unwrap().node.len(), 2);
    }
}
