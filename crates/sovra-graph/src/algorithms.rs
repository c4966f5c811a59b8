//! Traversals over the reasoning graph
//!
//! All walks use explicit stacks so graph size never translates into call
//! stack depth. Neighbours are visited in node insertion order, which keeps
//! results deterministic.

use crate::node::GraphNode;
use petgraph::graph::{DiGraph, NodeIndex};
use sovra_rag::thought::ThoughtUnit;
use std::collections::{HashMap, HashSet};

fn ordered_successors(graph: &DiGraph<String, ()>, node: NodeIndex) -> std::vec::IntoIter<NodeIndex> {
    let mut next: Vec<NodeIndex> = graph.neighbors(node).collect();
    next.sort();
    next.dedup();
    next.into_iter()
}

/// Ancestors of `start` followed by `start`, each at most once
///
/// Parents are followed through `parent_thought_ids`; ids missing from `nodes`
/// are skipped, and a cyclic ancestry yields a partial chain.
pub(crate) fn reasoning_chain<'a>(
    nodes: &'a HashMap<String, GraphNode>,
    start: &'a str,
) -> Vec<ThoughtUnit> {
    let mut chain = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&str, bool)> = vec![(start, false)];

    while let Some((id, expanded)) = stack.pop() {
        let Some(node) = nodes.get(id) else {
            continue;
        };
        if expanded {
            chain.push(node.thought.clone());
            continue;
        }
        if !visited.insert(id) {
            continue;
        }
        stack.push((id, true));
        for parent in node.thought.parent_thought_ids.iter().rev() {
            if !visited.contains(parent.as_str()) {
                stack.push((parent.as_str(), false));
            }
        }
    }

    chain
}

/// Directed cycles found by depth-first search
///
/// Each cycle runs from the node reached twice to the node that closed it.
pub(crate) fn detect_cycles(graph: &DiGraph<String, ()>) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited = vec![false; graph.node_count()];
    let mut on_stack = vec![false; graph.node_count()];

    for start in graph.node_indices() {
        if visited[start.index()] {
            continue;
        }
        visited[start.index()] = true;
        on_stack[start.index()] = true;
        let mut path = vec![start];
        let mut frames = vec![ordered_successors(graph, start)];

        while !frames.is_empty() {
            let step = frames.last_mut().and_then(|frame| frame.next());
            match step {
                Some(next) if on_stack[next.index()] => {
                    if let Some(pos) = path.iter().position(|n| *n == next) {
                        cycles.push(path[pos..].iter().map(|n| graph[*n].clone()).collect());
                    }
                }
                Some(next) if !visited[next.index()] => {
                    visited[next.index()] = true;
                    on_stack[next.index()] = true;
                    path.push(next);
                    frames.push(ordered_successors(graph, next));
                }
                Some(_) => {}
                None => {
                    frames.pop();
                    if let Some(done) = path.pop() {
                        on_stack[done.index()] = false;
                    }
                }
            }
        }
    }

    cycles
}

/// Weakly connected components, each listed in insertion order
pub(crate) fn connected_components(graph: &DiGraph<String, ()>) -> Vec<Vec<String>> {
    let mut components = Vec::new();
    let mut seen = vec![false; graph.node_count()];

    for start in graph.node_indices() {
        if seen[start.index()] {
            continue;
        }
        seen[start.index()] = true;
        let mut members = Vec::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            members.push(node);
            for neighbor in graph.neighbors_undirected(node) {
                if !seen[neighbor.index()] {
                    seen[neighbor.index()] = true;
                    stack.push(neighbor);
                }
            }
        }
        members.sort();
        components.push(members.into_iter().map(|n| graph[n].clone()).collect());
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(ids: &[&str], edges: &[(usize, usize)]) -> DiGraph<String, ()> {
        let mut graph = DiGraph::new();
        let nodes: Vec<NodeIndex> = ids.iter().map(|id| graph.add_node(id.to_string())).collect();
        for (a, b) in edges {
            graph.add_edge(nodes[*a], nodes[*b], ());
        }
        graph
    }

    #[test]
    fn test_planted_cycle_is_found() {
        let g = graph(&["a", "b", "c", "d"], &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        let cycles = detect_cycles(&g);
        assert_eq!(cycles, vec![vec!["a".to_string(), "b".to_string(), "c".to_string()]]);
    }

    #[test]
    fn test_dag_has_no_cycles() {
        // diamond: a -> b, a -> c, b -> d, c -> d
        let g = graph(&["a", "b", "c", "d"], &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        assert!(detect_cycles(&g).is_empty());
    }

    #[test]
    fn test_cycle_path_starts_at_reentry_node() {
        // x -> a -> b -> a
        let g = graph(&["x", "a", "b"], &[(0, 1), (1, 2), (2, 1)]);
        assert_eq!(detect_cycles(&g), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_components_ignore_direction() {
        // a -> b <- c   and   d -> e
        let g = graph(&["a", "b", "c", "d", "e"], &[(0, 1), (2, 1), (3, 4)]);
        let components = connected_components(&g);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], vec!["a", "b", "c"]);
        assert_eq!(components[1], vec!["d", "e"]);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let ids: Vec<String> = (0..50_000).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let edges: Vec<(usize, usize)> = (0..49_999).map(|i| (i, i + 1)).collect();
        let g = graph(&refs, &edges);

        assert!(detect_cycles(&g).is_empty());
        assert_eq!(connected_components(&g).len(), 1);
    }
}
