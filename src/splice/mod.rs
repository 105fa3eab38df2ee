//! Input splicing
//!
//! Replaces one graph input port with a new input plus a chain of
//! preprocessing nodes. The chain's final node re-produces the replaced
//! input's exact name, so every downstream consumer keeps working untouched;
//! the graph's entry point changes, nothing else does.
//!
//! The canonical use is folding image preprocessing into the graph: a
//! channel reorder (BGR source feeding an RGB-trained network, or the other
//! way around) followed by a per-channel mean subtraction.
//! [`channel_preprocess_splice`] builds that chain from a
//! [`ChannelPreprocess`] description; arbitrary chains go through
//! [`InputSplice`] directly.
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::splice::{channel_preprocess_splice, splice_input, ChannelPreprocess};
//!
//! let preprocess = ChannelPreprocess {
//!     input_name: "images".to_string(),
//!     order: vec![2, 1, 0],
//!     bias: vec![104.0, 117.0, 123.0],
//!     axis: -1,
//!     ..Default::default()
//! };
//! let splice = channel_preprocess_splice(&model, &preprocess)?;
//! let spliced = splice_input(&model, &splice)?;
//! ```

use indexmap::IndexSet;

use crate::error::{GraftError, GraftResult};
use crate::graph::{collect_node_names, collect_tensor_names, fresh_name};
use crate::proto::extensions::{make_float_initializer, make_int64_initializer, make_node};
use crate::proto::{
    AttributeProto, GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto,
};
use crate::tensor::normalize_axis;
use crate::traits::Transformer;
use crate::validate::validate_model;

/// A splice: which input port to replace and what replaces it
#[derive(Debug, Clone)]
pub struct InputSplice {
    /// Name of the graph input port being replaced
    pub input_name: String,
    /// Descriptor of the new input port, inserted at the same position
    pub replacement: ValueInfoProto,
    /// Preprocessing chain in execution order; the last node must produce
    /// a tensor named exactly `input_name`
    pub nodes: Vec<NodeProto>,
    /// Constant tensors the chain needs
    pub initializers: Vec<TensorProto>,
}

/// Replace a graph input port with a new input plus a node chain
///
/// Every name the chain introduces must be fresh with respect to the graph's
/// tensor and node namespaces; the one permitted reuse is the chain's final
/// output taking over the replaced input's name. The replaced port's
/// descriptor is preserved as a value_info annotation so the tensor's
/// declared layout survives.
///
/// Returns a new model; the input is never mutated. The result is validated
/// before being returned.
pub fn splice_input(model: &ModelProto, splice: &InputSplice) -> GraftResult<ModelProto> {
    let graph_ref = model
        .graph
        .as_ref()
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

    let position = graph_ref
        .input
        .iter()
        .position(|p| p.name == splice.input_name)
        .ok_or_else(|| GraftError::InputNotFound(splice.input_name.clone()))?;

    check_chain_names(graph_ref, splice)?;

    let mut out = model.clone();
    let graph = out
        .graph
        .as_mut()
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

    let old_port = std::mem::replace(&mut graph.input[position], splice.replacement.clone());
    graph.node.splice(0..0, splice.nodes.iter().cloned());
    graph
        .initializer
        .extend(splice.initializers.iter().cloned());

    // keep the replaced port's declared layout visible
    if !graph.value_info.iter().any(|v| v.name == old_port.name) {
        graph.value_info.push(old_port);
    }

    tracing::debug!(
        input = %splice.input_name,
        replacement = %splice.replacement.name,
        chain_len = splice.nodes.len(),
        "spliced input port"
    );

    validate_model(&out)?;
    Ok(out)
}

/// Freshness check for everything the chain introduces.
///
/// Tensor and node namespaces are guarded jointly; intra-chain duplicates
/// count as collisions too. The replaced input's name must be re-produced by
/// the final node, exactly once.
fn check_chain_names(graph: &GraphProto, splice: &InputSplice) -> GraftResult<()> {
    fn claim<'a>(
        name: &'a str,
        existing: &IndexSet<&str>,
        introduced: &mut IndexSet<&'a str>,
    ) -> GraftResult<()> {
        if existing.contains(name) || !introduced.insert(name) {
            return Err(GraftError::NameCollision(name.to_string()));
        }
        Ok(())
    }

    let mut existing = collect_tensor_names(graph);
    existing.extend(collect_node_names(graph));
    let mut introduced: IndexSet<&str> = IndexSet::new();

    if splice.replacement.name.is_empty() {
        return Err(GraftError::MalformedGraph(
            "splice replacement input has empty name".to_string(),
        ));
    }
    claim(&splice.replacement.name, &existing, &mut introduced)?;

    for node in &splice.nodes {
        if !node.name.is_empty() {
            claim(&node.name, &existing, &mut introduced)?;
        }
    }

    let mut reconnect_seen = false;
    for (i, node) in splice.nodes.iter().enumerate() {
        let is_last = i + 1 == splice.nodes.len();
        for output in &node.output {
            if output.is_empty() {
                continue;
            }
            if *output == splice.input_name {
                // the reconnection name: allowed once, on the last node only
                if !is_last || reconnect_seen {
                    return Err(GraftError::NameCollision(output.clone()));
                }
                reconnect_seen = true;
                continue;
            }
            claim(output, &existing, &mut introduced)?;
        }
    }

    for init in &splice.initializers {
        if init.name.is_empty() {
            return Err(GraftError::MalformedGraph(
                "splice initializer has empty name".to_string(),
            ));
        }
        claim(&init.name, &existing, &mut introduced)?;
    }

    if !reconnect_seen {
        return Err(GraftError::DanglingReference {
            name: splice.input_name.clone(),
            referrer: "splice chain".to_string(),
        });
    }

    Ok(())
}

// ============================================================================
// Channel preprocessing chains
// ============================================================================

/// How a channel reorder is expressed in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReorderStrategy {
    /// One `Gather` with an INT64 index initializer
    #[default]
    Gather,
    /// `Split` into per-channel slices, `Concat` back in permuted order
    SplitConcat,
}

/// Description of a channel preprocessing chain: reorder, then subtract a
/// per-channel bias.
///
/// `order` permutes the channel axis (`[2, 1, 0]` swaps RGB and BGR); `bias`
/// is given in the reordered channel order. Either may be empty to skip that
/// step, but not both: an empty chain cannot re-produce the input name and
/// [`splice_input`] will reject it.
#[derive(Debug, Clone, Default)]
pub struct ChannelPreprocess {
    /// Graph input port to splice
    pub input_name: String,
    /// Channel permutation, each index in `0..len` exactly once; empty for
    /// no reorder
    pub order: Vec<i64>,
    /// Per-channel values to subtract, empty for no bias step
    pub bias: Vec<f32>,
    /// Channel axis; negative counts from the end when the port declares a
    /// rank
    pub axis: i64,
    /// Reorder strategy
    pub strategy: ReorderStrategy,
}

/// Build an [`InputSplice`] for a channel preprocessing chain
///
/// The replacement port reuses the replaced port's descriptor (reorder and
/// bias-subtract both preserve shape), and every generated name is picked
/// fresh against the graph.
pub fn channel_preprocess_splice(
    model: &ModelProto,
    preprocess: &ChannelPreprocess,
) -> GraftResult<InputSplice> {
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

    let port = graph
        .input
        .iter()
        .find(|p| p.name == preprocess.input_name)
        .ok_or_else(|| GraftError::InputNotFound(preprocess.input_name.clone()))?;

    check_order(&preprocess.order)?;

    let mut taken: IndexSet<&str> = collect_tensor_names(graph);
    taken.extend(collect_node_names(graph));

    let shape = port.get_shape();
    let rank = shape.as_ref().map(|s| s.len());
    let axis = resolve_axis(preprocess.axis, rank)?;

    let base = preprocess.input_name.as_str();
    let raw_name = fresh_name(&taken, &format!("{base}_raw"));

    let mut replacement = port.clone();
    replacement.name = raw_name.clone();

    let mut nodes = Vec::new();
    let mut initializers = Vec::new();

    let reordered_name = if preprocess.order.is_empty() {
        raw_name.clone()
    } else {
        // last chain step takes over the spliced name
        let out_name = if preprocess.bias.is_empty() {
            preprocess.input_name.clone()
        } else {
            fresh_name(&taken, &format!("{base}_reordered"))
        };
        match preprocess.strategy {
            ReorderStrategy::Gather => {
                build_gather_reorder(
                    base, &raw_name, &out_name, &preprocess.order, axis, &taken,
                    &mut nodes, &mut initializers,
                );
            }
            ReorderStrategy::SplitConcat => {
                build_split_concat_reorder(
                    base, &raw_name, &out_name, &preprocess.order, axis, &taken,
                    &mut nodes,
                );
            }
        }
        out_name
    };

    if !preprocess.bias.is_empty() {
        let bias_name = fresh_name(&taken, &format!("{base}_bias"));
        let dims = bias_dims(&preprocess.bias, axis, rank);
        initializers.push(make_float_initializer(&bias_name, &dims, &preprocess.bias));
        nodes.push(make_node(
            "Sub",
            &[reordered_name.as_str(), bias_name.as_str()],
            &[preprocess.input_name.as_str()],
            &fresh_name(&taken, &format!("{base}_debias")),
        ));
    }

    Ok(InputSplice {
        input_name: preprocess.input_name.clone(),
        replacement,
        nodes,
        initializers,
    })
}

/// Channel reorder as one Gather with an index initializer
#[allow(clippy::too_many_arguments)]
fn build_gather_reorder(
    base: &str,
    input: &str,
    output: &str,
    order: &[i64],
    axis: i64,
    taken: &IndexSet<&str>,
    nodes: &mut Vec<NodeProto>,
    initializers: &mut Vec<TensorProto>,
) {
    let order_name = fresh_name(taken, &format!("{base}_order"));
    initializers.push(make_int64_initializer(&order_name, order));

    let mut gather = make_node(
        "Gather",
        &[input, order_name.as_str()],
        &[output],
        &fresh_name(taken, &format!("{base}_reorder")),
    );
    gather.attribute.push(AttributeProto::new_int("axis", axis));
    nodes.push(gather);
}

/// Channel reorder as Split into slices and Concat in permuted order
fn build_split_concat_reorder(
    base: &str,
    input: &str,
    output: &str,
    order: &[i64],
    axis: i64,
    taken: &IndexSet<&str>,
    nodes: &mut Vec<NodeProto>,
) {
    let slice_names: Vec<String> = (0..order.len())
        .map(|i| fresh_name(taken, &format!("{base}_ch{i}")))
        .collect();

    let mut split = make_node(
        "Split",
        &[input],
        &slice_names.iter().map(String::as_str).collect::<Vec<_>>(),
        &fresh_name(taken, &format!("{base}_split")),
    );
    split.attribute.push(AttributeProto::new_int("axis", axis));
    nodes.push(split);

    // pick slices back up in the permuted order; the caller has already
    // checked order is a permutation of the slice indexes
    let permuted: Vec<&str> = order
        .iter()
        .map(|&i| slice_names[i as usize].as_str())
        .collect();

    let mut concat = make_node(
        "Concat",
        &permuted,
        &[output],
        &fresh_name(taken, &format!("{base}_reorder")),
    );
    concat.attribute.push(AttributeProto::new_int("axis", axis));
    nodes.push(concat);
}

/// `order` must be exactly a permutation of `0..len`: both strategies read
/// its entries as channel indexes, so an out-of-range or repeated entry
/// would drop or duplicate a channel instead of reordering.
fn check_order(order: &[i64]) -> GraftResult<()> {
    let n = order.len();
    let mut seen = vec![false; n];
    for &entry in order {
        let idx = usize::try_from(entry).ok().filter(|&i| i < n).ok_or_else(|| {
            GraftError::MalformedGraph(format!("channel order entry {entry} is outside 0..{n}"))
        })?;
        if seen[idx] {
            return Err(GraftError::MalformedGraph(format!(
                "channel order repeats entry {entry}"
            )));
        }
        seen[idx] = true;
    }
    Ok(())
}

/// Normalize a possibly negative axis against the port's declared rank.
/// Without a rank the raw value passes through; older opsets may reject
/// negative axes at load time elsewhere, so warn.
fn resolve_axis(axis: i64, rank: Option<usize>) -> GraftResult<i64> {
    match rank {
        Some(r) if r > 0 => Ok(normalize_axis(axis, r)? as i64),
        _ => {
            if axis < 0 {
                tracing::warn!(axis, "input rank unknown; negative axis left as-is");
            }
            Ok(axis)
        }
    }
}

/// Bias shape broadcasting along the channel axis: `[1, .., n, .., 1]` when
/// rank is known, plain `[n]` otherwise
fn bias_dims(bias: &[f32], axis: i64, rank: Option<usize>) -> Vec<i64> {
    match rank {
        Some(r) if r > 0 && axis >= 0 && (axis as usize) < r => {
            let mut dims = vec![1i64; r];
            dims[axis as usize] = bias.len() as i64;
            dims
        }
        _ => {
            tracing::warn!("input rank unknown; bias broadcasts along the last axis");
            vec![bias.len() as i64]
        }
    }
}

/// [`Transformer`] adapter for input splicing
pub struct InputSplicer {
    splice: InputSplice,
}

impl InputSplicer {
    /// Wrap a prepared splice
    pub fn new(splice: InputSplice) -> Self {
        Self { splice }
    }
}

impl Transformer for InputSplicer {
    fn name(&self) -> &str {
        "InputSplicer"
    }

    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        splice_input(model, &self.splice)
    }
}
