//! Graph context for ONNX model inspection
//!
//! `GraphContext` is the central read view over a graph. It bundles the
//! lookup maps so transforms can answer producer/consumer questions in O(1)
//! while the graph itself stays immutable; every transform in this crate
//! mutates a clone, never the graph a context borrows.

use crate::error::{GraftError, GraftResult};
use crate::proto::{GraphProto, ModelProto, NodeProto, TensorProto, ValueInfoProto};

use super::maps::{
    build_consumer_map, build_graph_input_map, build_graph_output_map, build_initializer_map,
    build_node_name_map, build_producer_map, build_value_info_map, ConsumerMap, InitializerMap,
    NodeNameMap, ProducerMap, ValueInfoMap,
};

/// Read-only index over a graph
#[derive(Debug)]
pub struct GraphContext<'a> {
    graph: &'a GraphProto,

    /// Maps output tensor name → producer node index
    pub producer_map: ProducerMap<'a>,

    /// Maps tensor name → consumer node indexes
    pub consumer_map: ConsumerMap<'a>,

    /// Maps non-empty node name → node index
    pub node_name_map: NodeNameMap<'a>,

    /// Maps initializer name → TensorProto
    pub initializer_map: InitializerMap<'a>,

    /// Maps tensor name → ValueInfoProto (inputs + outputs + value_info)
    pub value_info_map: ValueInfoMap<'a>,

    /// Maps graph input name → ValueInfoProto
    pub graph_input_map: ValueInfoMap<'a>,

    /// Maps graph output name → ValueInfoProto
    pub graph_output_map: ValueInfoMap<'a>,
}

impl<'a> GraphContext<'a> {
    /// Create a new GraphContext over a GraphProto
    pub fn new(graph: &'a GraphProto) -> Self {
        Self {
            graph,
            producer_map: build_producer_map(graph),
            consumer_map: build_consumer_map(graph),
            node_name_map: build_node_name_map(graph),
            initializer_map: build_initializer_map(graph),
            value_info_map: build_value_info_map(graph),
            graph_input_map: build_graph_input_map(graph),
            graph_output_map: build_graph_output_map(graph),
        }
    }

    /// Create from a ModelProto
    pub fn from_model(model: &'a ModelProto) -> GraftResult<Self> {
        let graph = model
            .graph
            .as_ref()
            .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;

        Ok(Self::new(graph))
    }

    /// The graph this context indexes
    pub fn graph(&self) -> &'a GraphProto {
        self.graph
    }

    // ========================================================================
    // Node accessors
    // ========================================================================

    /// Get a node by index
    pub fn node(&self, index: usize) -> Option<&'a NodeProto> {
        self.graph.node.get(index)
    }

    /// Get a node by name (anonymous nodes are only reachable by index)
    pub fn get_node(&self, name: &str) -> Option<&'a NodeProto> {
        self.get_node_index(name).and_then(|idx| self.node(idx))
    }

    /// Get a node index by name
    pub fn get_node_index(&self, name: &str) -> Option<usize> {
        self.node_name_map.get(name).copied()
    }

    /// Check if a named node exists
    pub fn has_node(&self, name: &str) -> bool {
        self.node_name_map.contains_key(name)
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node.len()
    }

    /// Iterate over all nodes in graph order
    pub fn nodes(&self) -> impl Iterator<Item = &'a NodeProto> {
        self.graph.node.iter()
    }

    // ========================================================================
    // Graph traversal
    // ========================================================================

    /// Get the producer node for a tensor
    pub fn get_producer(&self, tensor_name: &str) -> Option<&'a NodeProto> {
        self.get_producer_index(tensor_name)
            .and_then(|idx| self.node(idx))
    }

    /// Get the producer node index for a tensor
    pub fn get_producer_index(&self, tensor_name: &str) -> Option<usize> {
        self.producer_map.get(tensor_name).copied()
    }

    /// Get consumer nodes for a tensor
    pub fn get_consumers(&self, tensor_name: &str) -> Vec<&'a NodeProto> {
        self.consumer_map
            .get(tensor_name)
            .map(|idxs| idxs.iter().filter_map(|&i| self.node(i)).collect())
            .unwrap_or_default()
    }

    /// Get consumer node indexes for a tensor
    pub fn get_consumer_indexes(&self, tensor_name: &str) -> &[usize] {
        self.consumer_map
            .get(tensor_name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Check if a tensor is a graph input
    pub fn is_graph_input(&self, name: &str) -> bool {
        self.graph_input_map.contains_key(name)
    }

    /// Check if a tensor is a graph output
    pub fn is_graph_output(&self, name: &str) -> bool {
        self.graph_output_map.contains_key(name)
    }

    /// Check if a tensor is an initializer
    pub fn is_initializer(&self, name: &str) -> bool {
        self.initializer_map.contains_key(name)
    }

    /// Check if a name has a producer at all: an initializer, a graph input,
    /// or some node's output
    pub fn resolves(&self, name: &str) -> bool {
        self.is_initializer(name)
            || self.is_graph_input(name)
            || self.producer_map.contains_key(name)
    }

    // ========================================================================
    // Value info and initializer accessors
    // ========================================================================

    /// Get the declared descriptor for a tensor, from any source
    pub fn get_value_info(&self, name: &str) -> Option<&'a ValueInfoProto> {
        self.value_info_map.get(name).copied()
    }

    /// Get initializer by name
    pub fn get_initializer(&self, name: &str) -> Option<&'a TensorProto> {
        self.initializer_map.get(name).copied()
    }
}
