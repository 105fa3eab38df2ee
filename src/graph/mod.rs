//! Graph inspection module for ONNX models
//!
//! This module provides the read-side infrastructure for working with ONNX
//! graphs:
//!
//! - [`GraphContext`]: read view over a graph with O(1) lookups
//! - [`maps`]: type definitions and builders for the lookup maps
//! - [`accessors`]: op/shape queries and name-set helpers
//!
//! Transforms never mutate through a context; they clone the model, consult a
//! context built over the original, and edit the clone.
//!
//! # Example
//!
//! ```ignore
//! use onnx_graft::graph::GraphContext;
//!
//! let ctx = GraphContext::new(&graph);
//!
//! let softmaxes = ctx.find_nodes_by_op("Softmax");
//! let producer = ctx.get_producer("probs");
//! let consumers = ctx.get_consumers("logits");
//! ```
//!
//! # Maps
//!
//! | Map | Description |
//! |-----|-------------|
//! | `producer_map` | output name → producer node index |
//! | `consumer_map` | tensor name → consumer node indexes |
//! | `node_name_map` | non-empty node name → node index |
//! | `initializer_map` | name → TensorProto |
//! | `value_info_map` | name → ValueInfoProto (ports + value_info) |

pub mod accessors;
pub mod context;
pub mod maps;

// Re-export main types
pub use accessors::{collect_node_names, collect_tensor_names, fresh_name};
pub use context::GraphContext;
pub use maps::{ConsumerMap, InitializerMap, NodeNameMap, ProducerMap, ValueInfoMap};
