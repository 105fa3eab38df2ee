//! Error types for onnx-graft
//!
//! This module defines all error types used throughout the crate. Every
//! transform returns `GraftResult`; on failure the caller's model is left
//! untouched.

use thiserror::Error;

/// Main error type for graph editing operations
#[derive(Error, Debug)]
pub enum GraftError {
    /// Byte payload or decoded structure does not fit the schema
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// Two producers declare the same tensor name, or two nodes share a name
    #[error("duplicate name '{name}': declared by {first} and {second}")]
    DuplicateName {
        /// The colliding name
        name: String,
        /// First declaration site
        first: String,
        /// Second declaration site
        second: String,
    },

    /// A referenced tensor has no producer anywhere in the graph
    #[error("dangling reference to '{name}' from {referrer}")]
    DanglingReference {
        /// The unresolved tensor name
        name: String,
        /// Node or output port holding the reference
        referrer: String,
    },

    /// The node dependency graph is not acyclic
    #[error("cycle detected involving nodes: {nodes:?}")]
    CycleDetected {
        /// Nodes left unordered by the topological sort
        nodes: Vec<String>,
    },

    /// No rewrite rule certifies this operator across the version range
    #[error("operator '{op_type}' cannot be reconciled from opset {from} to {to}")]
    UnsupportedOperatorVersion {
        /// Operator type
        op_type: String,
        /// Source opset version
        from: i64,
        /// Target opset version
        to: i64,
    },

    /// Splice target is not a graph input
    #[error("graph input '{0}' not found")]
    InputNotFound(String),

    /// A name introduced by a splice already exists in the graph
    #[error("name collision on '{0}'")]
    NameCollision(String),

    /// Elision target does not identify exactly one node
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Elision target is not single-input/single-output
    #[error("node '{node}' has {inputs} input(s) and {outputs} output(s), expected 1 and 1")]
    UnsupportedShape {
        /// Node name or op_type used to select it
        node: String,
        /// Non-empty input count
        inputs: usize,
        /// Non-empty output count
        outputs: usize,
    },

    /// Prefixed names from the two merge sides collapse to the same string
    #[error("prefix collision on '{0}' between merged graphs")]
    PrefixCollision(String),

    /// io_map names a producer or consumer the merged graph does not have
    #[error("io_map entry ({producer} -> {consumer}) unresolvable: {reason}")]
    IoMapUnresolvable {
        /// Producer-side tensor name
        producer: String,
        /// Consumer-side graph input name
        consumer: String,
        /// What failed to resolve
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for graph editing operations
pub type GraftResult<T> = Result<T, GraftError>;
