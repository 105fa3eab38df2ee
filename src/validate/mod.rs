//! Structural validation for computation graphs
//!
//! Every transform in this crate runs [`validate_graph`] on its result before
//! returning it; a candidate graph that fails here is discarded and the error
//! surfaces to the caller with the input model untouched.
//!
//! Three checks run in order, first failure wins:
//!
//! 1. **Name uniqueness**: graph inputs, initializers, and node outputs share
//!    one tensor namespace with exactly one producer per name
//!    ([`GraftError::DuplicateName`]). Non-empty node names form a second
//!    namespace checked the same way.
//! 2. **Reference resolution**: every non-empty node input and every graph
//!    output must name something the first pass declared
//!    ([`GraftError::DanglingReference`]).
//! 3. **Acyclicity**: Kahn's algorithm over node-to-node edges; any node left
//!    unordered sits on a cycle ([`GraftError::CycleDetected`]).
//!
//! The node list does not need to be topologically sorted; a graph is valid
//! as long as some valid order exists.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::error::{GraftError, GraftResult};
use crate::graph::maps::build_producer_map;
use crate::proto::{GraphProto, ModelProto};

/// Validate the graph inside a model
pub fn validate_model(model: &ModelProto) -> GraftResult<()> {
    let graph = model
        .graph
        .as_ref()
        .ok_or_else(|| GraftError::MalformedGraph("model has no graph".to_string()))?;
    validate_graph(graph)
}

/// Validate a graph: unique names, resolvable references, no cycles
pub fn validate_graph(graph: &GraphProto) -> GraftResult<()> {
    let declared = check_unique_names(graph)?;
    check_references(graph, &declared)?;
    check_acyclic(graph)?;
    Ok(())
}

/// Human-readable label for a node, falling back to position for anonymous
/// nodes
fn node_label(graph: &GraphProto, idx: usize) -> String {
    let node = &graph.node[idx];
    if node.name.is_empty() {
        format!("node #{idx} ({})", node.op_type)
    } else {
        format!("node '{}'", node.name)
    }
}

fn declare<'a>(
    declared: &mut FxHashMap<&'a str, String>,
    name: &'a str,
    site: String,
) -> GraftResult<()> {
    if let Some(first) = declared.insert(name, site.clone()) {
        return Err(GraftError::DuplicateName {
            name: name.to_string(),
            first,
            second: site,
        });
    }
    Ok(())
}

/// Pass 1: build the name → producer map, failing on any collision
fn check_unique_names(graph: &GraphProto) -> GraftResult<FxHashMap<&str, String>> {
    let mut declared: FxHashMap<&str, String> = FxHashMap::default();

    for vi in &graph.input {
        if !vi.name.is_empty() {
            declare(&mut declared, &vi.name, "graph input".to_string())?;
        }
    }

    for init in &graph.initializer {
        if !init.name.is_empty() {
            declare(&mut declared, &init.name, "initializer".to_string())?;
        }
    }

    for (idx, node) in graph.node.iter().enumerate() {
        for output in &node.output {
            if !output.is_empty() {
                declare(
                    &mut declared,
                    output,
                    format!("output of {}", node_label(graph, idx)),
                )?;
            }
        }
    }

    // node names live in their own namespace
    let mut seen_nodes: FxHashMap<&str, usize> = FxHashMap::default();
    for (idx, node) in graph.node.iter().enumerate() {
        if node.name.is_empty() {
            continue;
        }
        if let Some(prev) = seen_nodes.insert(&node.name, idx) {
            return Err(GraftError::DuplicateName {
                name: node.name.clone(),
                first: format!("node #{prev}"),
                second: format!("node #{idx}"),
            });
        }
    }

    Ok(declared)
}

/// Pass 2: every consumed name and every graph output must be declared
fn check_references(graph: &GraphProto, declared: &FxHashMap<&str, String>) -> GraftResult<()> {
    for (idx, node) in graph.node.iter().enumerate() {
        for input in &node.input {
            // empty input slots mark omitted optional inputs
            if !input.is_empty() && !declared.contains_key(input.as_str()) {
                return Err(GraftError::DanglingReference {
                    name: input.clone(),
                    referrer: node_label(graph, idx),
                });
            }
        }
    }

    for port in &graph.output {
        if !declared.contains_key(port.name.as_str()) {
            return Err(GraftError::DanglingReference {
                name: port.name.clone(),
                referrer: "graph output".to_string(),
            });
        }
    }

    Ok(())
}

/// Pass 3: Kahn's algorithm over node-to-node edges
fn check_acyclic(graph: &GraphProto) -> GraftResult<()> {
    let n = graph.node.len();
    let producer_map = build_producer_map(graph);

    let mut in_degree = vec![0usize; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (idx, node) in graph.node.iter().enumerate() {
        for input in &node.input {
            if input.is_empty() {
                continue;
            }
            if let Some(&producer) = producer_map.get(input.as_str()) {
                in_degree[idx] += 1;
                successors[producer].push(idx);
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut processed = 0;

    while let Some(idx) = queue.pop_front() {
        processed += 1;
        for &succ in &successors[idx] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                queue.push_back(succ);
            }
        }
    }

    if processed < n {
        let nodes = (0..n)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| node_label(graph, i))
            .collect();
        return Err(GraftError::CycleDetected { nodes });
    }

    Ok(())
}
