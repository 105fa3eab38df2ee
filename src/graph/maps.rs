//! Graph map types and builders
//!
//! Defines the lookup structures for efficient graph traversal. All maps
//! borrow from the graph they index and key nodes by position, since node
//! names may be empty while tensor names are the real reference mechanism.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::proto::{GraphProto, TensorProto, ValueInfoProto};

/// Producer map: output tensor name → producing node index
pub type ProducerMap<'a> = FxHashMap<&'a str, usize>;

/// Consumer map: tensor name → consuming node indexes.
/// SmallVec optimized for the common case of 1-4 consumers.
pub type ConsumerMap<'a> = FxHashMap<&'a str, SmallVec<[usize; 4]>>;

/// Node name map: non-empty node name → node index
pub type NodeNameMap<'a> = FxHashMap<&'a str, usize>;

/// Initializer map: name → TensorProto
pub type InitializerMap<'a> = FxHashMap<&'a str, &'a TensorProto>;

/// Value info map: name → ValueInfoProto
pub type ValueInfoMap<'a> = FxHashMap<&'a str, &'a ValueInfoProto>;

/// Build producer map from graph nodes
///
/// Maps each non-empty output tensor name to the index of the node that
/// produces it. On a duplicate the later node wins; the validator is the
/// component that reports duplicates as errors.
pub fn build_producer_map(graph: &GraphProto) -> ProducerMap<'_> {
    let mut map = FxHashMap::default();

    for (idx, node) in graph.node.iter().enumerate() {
        for output in &node.output {
            if !output.is_empty() {
                map.insert(output.as_str(), idx);
            }
        }
    }

    map
}

/// Build consumer map from graph nodes
///
/// Maps each non-empty tensor name to the indexes of the nodes that consume
/// it. A node reading the same tensor through two ports appears twice.
pub fn build_consumer_map(graph: &GraphProto) -> ConsumerMap<'_> {
    let mut map: ConsumerMap<'_> = FxHashMap::default();

    for (idx, node) in graph.node.iter().enumerate() {
        for input in &node.input {
            if !input.is_empty() {
                map.entry(input.as_str()).or_default().push(idx);
            }
        }
    }

    map
}

/// Build node name map from graph nodes (anonymous nodes are skipped)
pub fn build_node_name_map(graph: &GraphProto) -> NodeNameMap<'_> {
    let mut map = FxHashMap::default();

    for (idx, node) in graph.node.iter().enumerate() {
        if !node.name.is_empty() {
            map.insert(node.name.as_str(), idx);
        }
    }

    map
}

/// Build initializer map from graph
pub fn build_initializer_map(graph: &GraphProto) -> InitializerMap<'_> {
    graph
        .initializer
        .iter()
        .map(|t| (t.name.as_str(), t))
        .collect()
}

/// Build value info map from graph
///
/// Combines graph inputs, outputs, and intermediate value_info, so a lookup
/// answers "what descriptor is declared for this tensor" from any source.
pub fn build_value_info_map(graph: &GraphProto) -> ValueInfoMap<'_> {
    let mut map = FxHashMap::default();

    for vi in &graph.input {
        map.insert(vi.name.as_str(), vi);
    }
    for vi in &graph.output {
        map.insert(vi.name.as_str(), vi);
    }
    for vi in &graph.value_info {
        map.insert(vi.name.as_str(), vi);
    }

    map
}

/// Build graph input map
pub fn build_graph_input_map(graph: &GraphProto) -> ValueInfoMap<'_> {
    graph
        .input
        .iter()
        .map(|vi| (vi.name.as_str(), vi))
        .collect()
}

/// Build graph output map
pub fn build_graph_output_map(graph: &GraphProto) -> ValueInfoMap<'_> {
    graph
        .output
        .iter()
        .map(|vi| (vi.name.as_str(), vi))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_graph() -> GraphProto {
        use crate::proto::extensions::make_node;

        GraphProto {
            node: vec![
                make_node("Gather", &["X", "indices"], &["gathered"], "gather_0"),
                make_node("Sub", &["gathered", "mean"], &["centered"], "sub_0"),
                make_node("Relu", &["centered"], &["Y"], ""),
            ],
            input: vec![ValueInfoProto {
                name: "X".to_string(),
                ..Default::default()
            }],
            output: vec![ValueInfoProto {
                name: "Y".to_string(),
                ..Default::default()
            }],
            initializer: vec![
                TensorProto {
                    name: "indices".to_string(),
                    ..Default::default()
                },
                TensorProto {
                    name: "mean".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_build_producer_map() {
        let graph = make_test_graph();
        let map = build_producer_map(&graph);

        assert_eq!(map.get("gathered"), Some(&0));
        assert_eq!(map.get("centered"), Some(&1));
        assert_eq!(map.get("Y"), Some(&2)); // anonymous producer still indexed
        assert!(map.get("X").is_none()); // input, not produced by node
    }

    #[test]
    fn test_build_consumer_map() {
        let graph = make_test_graph();
        let map = build_consumer_map(&graph);

        assert_eq!(map.get("gathered").map(|v| v.as_slice()), Some(&[1usize][..]));
        assert_eq!(map.get("centered").map(|v| v.as_slice()), Some(&[2usize][..]));
        assert_eq!(map.get("mean").map(|v| v.as_slice()), Some(&[1usize][..]));
    }

    #[test]
    fn test_build_node_name_map_skips_anonymous() {
        let graph = make_test_graph();
        let map = build_node_name_map(&graph);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("gather_0"), Some(&0));
        assert_eq!(map.get("sub_0"), Some(&1));
        assert!(map.get("").is_none());
    }

    #[test]
    fn test_build_initializer_map() {
        let graph = make_test_graph();
        let map = build_initializer_map(&graph);

        assert!(map.contains_key("indices"));
        assert!(map.contains_key("mean"));
        assert!(!map.contains_key("X"));
    }

    #[test]
    fn test_build_value_info_map_covers_ports() {
        let graph = make_test_graph();
        let map = build_value_info_map(&graph);

        assert!(map.contains_key("X"));
        assert!(map.contains_key("Y"));
        assert!(!map.contains_key("gathered"));
    }
}
