//! Operator-set version reconciliation
//!
//! Raises a model's default-domain opset version with per-operator awareness
//! of what changed between versions. The version-to-semantics table lives
//! here: an operator is either certified unchanged across the requested span,
//! rewritten across a documented boundary, or explicitly rejected with
//! [`GraftError::UnsupportedOperatorVersion`]. Unknown operators crossing any
//! boundary are rejected the same way; the table cannot certify them.
//!
//! Reconciliation never downgrades: a model already at or above the target is
//! returned unchanged.
//!
//! # Rewrites carried
//!
//! | Op | Boundary | Rewrite |
//! |----|----------|---------|
//! | `Squeeze`/`Unsqueeze` | 13 | `axes` attribute becomes a second input backed by an INT64 initializer |
//! | `Split` | 13 | `split` attribute becomes a second input |
//! | `ReduceSum` | 13 | `axes` attribute becomes a second input |
//! | `Softmax`/`LogSoftmax`/`Hardmax` | 13 | default axis changed 1 to -1; the old default is pinned as `axis = 1` when absent |
//! | `Reshape` | 14 | `allowzero = 0` materialized |
//! | `Clip` | 11 | `min`/`max` attributes become scalar FLOAT inputs |
//! | `Pad` | 11 | `pads` attribute becomes an INT64 input, `value` a scalar FLOAT input |
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::opset::reconcile_opset;
//!
//! let raised = reconcile_opset(&model, 13)?;
//! ```

use indexmap::IndexSet;

use crate::error::{GraftError, GraftResult};
use crate::graph::collect_tensor_names;
use crate::proto::extensions::{make_float_initializer, make_int64_initializer};
use crate::proto::{AttributeProto, ModelProto, NodeProto, OperatorSetIdProto, TensorProto};
use crate::traits::Transformer;
use crate::validate::validate_model;
use crate::{SUPPORTED_OPSET_MAX, SUPPORTED_OPSET_MIN};

/// ONNX default domain identifier
const ONNX_DOMAIN: &str = "ai.onnx";

pub(crate) fn is_default_domain(domain: &str) -> bool {
    domain.is_empty() || domain == ONNX_DOMAIN
}

/// Current default-domain opset version of a model, 1 when unspecified
pub fn get_opset_version(model: &ModelProto) -> i64 {
    model.get_opset_version().unwrap_or(1)
}

/// Opset version reconciler
///
/// # Example
///
/// ```ignore
/// use onnx_graft::opset::OpsetReconciler;
///
/// let raised = OpsetReconciler::new(13).reconcile(&model)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct OpsetReconciler {
    target: i64,
}

impl OpsetReconciler {
    /// Create a reconciler targeting the given opset version
    pub fn new(target: i64) -> Self {
        Self { target }
    }

    /// Target opset version
    pub fn target(&self) -> i64 {
        self.target
    }

    /// Reconcile a model up to the target version
    ///
    /// A model already at or above the target comes back as an unchanged
    /// clone. Otherwise a single pass consults the table for every
    /// default-domain node; custom-domain nodes are outside the table and
    /// pass through untouched.
    pub fn reconcile(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        let current = get_opset_version(model);

        if current >= self.target {
            tracing::debug!(current, target = self.target, "opset already at or above target");
            return Ok(model.clone());
        }

        let mut reconciled = model.clone();
        set_default_opset(&mut reconciled, self.target);

        let graph = reconciled
            .graph
            .as_mut()
            .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

        // names already present, so rewrite initializers never collide
        let mut taken: IndexSet<String> = collect_tensor_names(graph)
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut new_initializers: Vec<TensorProto> = Vec::new();

        for node in &mut graph.node {
            if !is_default_domain(&node.domain) {
                continue;
            }
            match certify(node, current, self.target)? {
                Rewrite::None => {}
                Rewrite::AxesToInput => {
                    move_ints_attr_to_input(node, "axes", &mut taken, &mut new_initializers);
                }
                Rewrite::SplitToInput => {
                    move_ints_attr_to_input(node, "split", &mut taken, &mut new_initializers);
                }
                Rewrite::PinAxisOne => {
                    if !node.has_attribute("axis") {
                        node.attribute.push(AttributeProto::new_int("axis", 1));
                    }
                }
                Rewrite::PinAllowZero => {
                    if !node.has_attribute("allowzero") {
                        node.attribute.push(AttributeProto::new_int("allowzero", 0));
                    }
                }
                Rewrite::ClipBoundsToInputs => {
                    clip_bounds_to_inputs(node, &mut taken, &mut new_initializers);
                }
                Rewrite::PadAttrsToInputs => {
                    pad_attrs_to_inputs(node, current, self.target, &mut taken, &mut new_initializers)?;
                }
            }
        }

        graph.initializer.extend(new_initializers);

        validate_model(&reconciled)?;
        Ok(reconciled)
    }
}

impl Transformer for OpsetReconciler {
    fn name(&self) -> &str {
        "OpsetReconciler"
    }

    fn transform(&self, model: &ModelProto) -> GraftResult<ModelProto> {
        self.reconcile(model)
    }
}

/// Reconcile a model up to the target opset version
pub fn reconcile_opset(model: &ModelProto, target: i64) -> GraftResult<ModelProto> {
    OpsetReconciler::new(target).reconcile(model)
}

/// Stamp the default-domain import, whichever spelling the model uses
fn set_default_opset(model: &mut ModelProto, version: i64) {
    let mut found = false;
    for opset in &mut model.opset_import {
        if is_default_domain(&opset.domain) {
            opset.version = version;
            found = true;
        }
    }
    if !found {
        model.opset_import.push(OperatorSetIdProto {
            domain: String::new(),
            version,
        });
    }
}

// ============================================================================
// Version-to-semantics table
// ============================================================================

enum Rewrite {
    None,
    AxesToInput,
    SplitToInput,
    PinAxisOne,
    PinAllowZero,
    ClipBoundsToInputs,
    PadAttrsToInputs,
}

/// Operators whose semantics are unchanged across the supported window.
///
/// Reductions other than `ReduceSum` move their axes to an input at opset 18,
/// outside the window; `ReduceSum` made that move at 13 and is handled in the
/// table instead.
const STABLE_OPS: &[&str] = &[
    // elementwise arithmetic
    "Add", "Sub", "Mul", "Div", "Pow", "Min", "Max", "Mean", "Sum",
    // elementwise unary
    "Abs", "Neg", "Floor", "Ceil", "Round", "Sqrt", "Exp", "Log", "Reciprocal",
    "Sign", "Erf",
    // activations
    "Relu", "LeakyRelu", "PRelu", "Sigmoid", "HardSigmoid", "Tanh", "Elu",
    "Selu", "Softplus", "Softsign", "ThresholdedRelu",
    // comparison and logic
    "Equal", "Greater", "GreaterOrEqual", "Less", "LessOrEqual", "And", "Or",
    "Not", "Xor", "Where",
    // pooling
    "MaxPool", "AveragePool", "GlobalMaxPool", "GlobalAveragePool",
    // convolution and linear algebra
    "Conv", "ConvTranspose", "MatMul", "Gemm",
    // normalization
    "InstanceNormalization", "LRN",
    // shape and layout
    "Shape", "Size", "Flatten", "Transpose", "Identity", "Concat", "Gather",
    "Expand", "Tile", "Cast", "Constant", "ConstantOfShape", "NonZero",
    "ArgMax", "ArgMin",
    // reductions stable below 18
    "ReduceMean", "ReduceMax", "ReduceMin", "ReduceProd", "ReduceL1",
    "ReduceL2", "ReduceLogSum", "ReduceLogSumExp", "ReduceSumSquare",
];

fn crosses(boundary: i64, from: i64, to: i64) -> bool {
    from < boundary && boundary <= to
}

fn unsupported(op_type: &str, from: i64, to: i64) -> GraftError {
    GraftError::UnsupportedOperatorVersion {
        op_type: op_type.to_string(),
        from,
        to,
    }
}

/// Classify one node for the span `(from, to]`.
///
/// Spans reaching outside the supported window are never certified, even for
/// stable operators; the table has not been audited there.
fn certify(node: &NodeProto, from: i64, to: i64) -> GraftResult<Rewrite> {
    let op_type = node.op_type.as_str();

    if from < SUPPORTED_OPSET_MIN || to > SUPPORTED_OPSET_MAX {
        return Err(unsupported(op_type, from, to));
    }

    let rewrite = match op_type {
        "Squeeze" | "Unsqueeze" | "ReduceSum" if crosses(13, from, to) => Rewrite::AxesToInput,
        "Squeeze" | "Unsqueeze" | "ReduceSum" => Rewrite::None,

        "Split" if crosses(13, from, to) => Rewrite::SplitToInput,
        "Split" => Rewrite::None,

        "Softmax" | "LogSoftmax" | "Hardmax" if crosses(13, from, to) => Rewrite::PinAxisOne,
        "Softmax" | "LogSoftmax" | "Hardmax" => Rewrite::None,

        "Reshape" if crosses(14, from, to) => Rewrite::PinAllowZero,
        "Reshape" => Rewrite::None,

        "Clip" if crosses(11, from, to) => Rewrite::ClipBoundsToInputs,
        "Clip" => Rewrite::None,

        "Pad" if crosses(11, from, to) => Rewrite::PadAttrsToInputs,
        "Pad" => Rewrite::None,

        // breaking changes with no rewrite rule
        "Dropout" if crosses(12, from, to) => return Err(unsupported(op_type, from, to)),
        "Dropout" => Rewrite::None,
        "TopK" if crosses(10, from, to) => return Err(unsupported(op_type, from, to)),
        "TopK" => Rewrite::None,
        "Slice" if crosses(10, from, to) => return Err(unsupported(op_type, from, to)),
        "Slice" => Rewrite::None,
        "Upsample" if crosses(10, from, to) => return Err(unsupported(op_type, from, to)),
        "Upsample" => Rewrite::None,
        "Resize" if crosses(11, from, to) => return Err(unsupported(op_type, from, to)),
        "Resize" => Rewrite::None,

        // control flow carries subgraphs this crate does not model
        "Scan" | "Loop" | "If" => return Err(unsupported(op_type, from, to)),

        // multi-output training form changed at 14
        "BatchNormalization" if crosses(14, from, to) && node.real_output_count() > 1 => {
            return Err(unsupported(op_type, from, to))
        }
        "BatchNormalization" => Rewrite::None,

        stable if STABLE_OPS.contains(&stable) => Rewrite::None,

        unknown => return Err(unsupported(unknown, from, to)),
    };

    Ok(rewrite)
}

// ============================================================================
// Rewrite helpers
// ============================================================================

/// Base name for an initializer created on behalf of a node
fn initializer_base(node: &NodeProto, suffix: &str) -> String {
    if node.name.is_empty() {
        format!("{}_{suffix}", node.op_type.to_lowercase())
    } else {
        format!("{}_{suffix}", node.name)
    }
}

/// Claim a name not yet present in the graph
fn claim_name(taken: &mut IndexSet<String>, base: String) -> String {
    let name = if taken.contains(base.as_str()) {
        let mut counter = 0;
        loop {
            let candidate = format!("{base}_{counter}");
            if !taken.contains(candidate.as_str()) {
                break candidate;
            }
            counter += 1;
        }
    } else {
        base
    };
    taken.insert(name.clone());
    name
}

/// Grow the input list as needed and set one slot, padding skipped slots with
/// the empty placeholder
fn set_input_slot(node: &mut NodeProto, slot: usize, name: String) {
    while node.input.len() <= slot {
        node.input.push(String::new());
    }
    node.input[slot] = name;
}

/// Move a repeated-ints attribute into the node's second input, backed by a
/// new INT64 initializer. Absent attributes stay absent; at the new version
/// the omitted input carries the same meaning as the omitted attribute did.
fn move_ints_attr_to_input(
    node: &mut NodeProto,
    attr_name: &str,
    taken: &mut IndexSet<String>,
    new_initializers: &mut Vec<TensorProto>,
) {
    let Some(attr) = node.take_attribute(attr_name) else {
        return;
    };

    let name = claim_name(taken, initializer_base(node, attr_name));
    new_initializers.push(make_int64_initializer(&name, &attr.ints));
    set_input_slot(node, 1, name);
}

/// Clip-11 moved `min`/`max` from attributes to optional scalar inputs.
/// A present `max` without `min` leaves the empty placeholder in slot 1.
fn clip_bounds_to_inputs(
    node: &mut NodeProto,
    taken: &mut IndexSet<String>,
    new_initializers: &mut Vec<TensorProto>,
) {
    let min = node.take_attribute("min");
    let max = node.take_attribute("max");

    if let Some(attr) = min {
        let name = claim_name(taken, initializer_base(node, "min"));
        new_initializers.push(make_float_initializer(&name, &[], &[attr.f]));
        set_input_slot(node, 1, name);
    }
    if let Some(attr) = max {
        let name = claim_name(taken, initializer_base(node, "max"));
        new_initializers.push(make_float_initializer(&name, &[], &[attr.f]));
        set_input_slot(node, 2, name);
    }
}

/// Pad-11 moved `pads` and `value` from attributes to inputs. `pads` was a
/// required attribute before 11; a node without it cannot be rewritten.
fn pad_attrs_to_inputs(
    node: &mut NodeProto,
    from: i64,
    to: i64,
    taken: &mut IndexSet<String>,
    new_initializers: &mut Vec<TensorProto>,
) -> GraftResult<()> {
    let Some(pads) = node.take_attribute("pads") else {
        return Err(unsupported(&node.op_type, from, to));
    };

    let pads_name = claim_name(taken, initializer_base(node, "pads"));
    new_initializers.push(make_int64_initializer(&pads_name, &pads.ints));
    set_input_slot(node, 1, pads_name);

    if let Some(value) = node.take_attribute("value") {
        let value_name = claim_name(taken, initializer_base(node, "value"));
        new_initializers.push(make_float_initializer(&value_name, &[], &[value.f]));
        set_input_slot(node, 2, value_name);
    }

    Ok(())
}
