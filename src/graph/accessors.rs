//! Graph accessor methods and name-set helpers
//!
//! Query methods on [`GraphContext`] plus free functions for collecting the
//! name sets that splicing and merging check against.

use indexmap::IndexSet;

use crate::proto::{GraphProto, NodeProto};
use crate::tensor::shape_from_value_info;

use super::context::GraphContext;

impl<'a> GraphContext<'a> {
    // ========================================================================
    // Op type lookups
    // ========================================================================

    /// Find nodes by op type
    pub fn find_nodes_by_op(&self, op_type: &str) -> Vec<&'a NodeProto> {
        self.nodes().filter(|n| n.op_type == op_type).collect()
    }

    /// Find node indexes by op type, in graph order
    pub fn find_node_indexes_by_op(&self, op_type: &str) -> Vec<usize> {
        self.graph()
            .node
            .iter()
            .enumerate()
            .filter(|(_, n)| n.op_type == op_type)
            .map(|(i, _)| i)
            .collect()
    }

    // ========================================================================
    // Shape and type queries
    // ========================================================================

    /// Get the shape of a tensor, from its declared descriptor or its
    /// initializer dims
    pub fn get_tensor_shape(&self, name: &str) -> Option<Vec<i64>> {
        if let Some(vi) = self.get_value_info(name) {
            if let Some(shape) = shape_from_value_info(vi) {
                return Some(shape);
            }
        }

        if let Some(init) = self.get_initializer(name) {
            return Some(init.dims.clone());
        }

        None
    }

    /// Get the element type of a tensor
    pub fn get_tensor_elem_type(&self, name: &str) -> Option<i32> {
        if let Some(vi) = self.get_value_info(name) {
            if let Some(elem_type) = vi.get_elem_type() {
                return Some(elem_type);
            }
        }

        if let Some(init) = self.get_initializer(name) {
            return Some(init.data_type);
        }

        None
    }
}

// ============================================================================
// Name-set helpers
// ============================================================================

/// Collect every tensor name present in the graph, in declaration order:
/// graph inputs, outputs, initializers, value_info, then node inputs and
/// outputs. Used for collision checks where the first offending name in
/// graph order should be the one reported.
pub fn collect_tensor_names(graph: &GraphProto) -> IndexSet<&str> {
    let mut names = IndexSet::new();

    for vi in &graph.input {
        names.insert(vi.name.as_str());
    }
    for vi in &graph.output {
        names.insert(vi.name.as_str());
    }
    for init in &graph.initializer {
        names.insert(init.name.as_str());
    }
    for vi in &graph.value_info {
        names.insert(vi.name.as_str());
    }
    for node in &graph.node {
        for input in &node.input {
            if !input.is_empty() {
                names.insert(input.as_str());
            }
        }
        for output in &node.output {
            if !output.is_empty() {
                names.insert(output.as_str());
            }
        }
    }

    names
}

/// Collect non-empty node names in graph order
pub fn collect_node_names(graph: &GraphProto) -> IndexSet<&str> {
    graph
        .node
        .iter()
        .filter(|n| !n.name.is_empty())
        .map(|n| n.name.as_str())
        .collect()
}

/// Pick a name not present in `taken`: the base itself when free, otherwise
/// `base_0`, `base_1`, ...
pub fn fresh_name(taken: &IndexSet<&str>, base: &str) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut counter = 0;
    loop {
        let candidate = format!("{base}_{counter}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        counter += 1;
    }
}
