//! The reasoning graph store
//!
//! Thoughts are arena nodes in a petgraph `DiGraph`; adjacency edges run from
//! parent to child and from relationship source to target. Typed
//! relationships are kept separately as an append-only log.

use crate::algorithms;
use crate::error::{GraphError, GraphResult};
use crate::export::{self, ExportFormat, GraphExport};
use crate::node::{GraphNode, GraphStats, ThoughtCriteria};
use chrono::Utc;
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use sovra_rag::thought::{RelationshipType, ThoughtRelationship, ThoughtUnit};
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
pub(crate) struct GraphInner {
    pub(crate) graph: DiGraph<String, ()>,
    pub(crate) indices: HashMap<String, NodeIndex>,
    pub(crate) nodes: HashMap<String, GraphNode>,
    /// Declared parent id -> ids of thoughts naming it, including parents not yet added
    pub(crate) children: HashMap<String, Vec<String>>,
    pub(crate) relationships: Vec<ThoughtRelationship>,
}

impl GraphInner {
    /// Nodes in insertion order
    pub(crate) fn ordered_nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.graph
            .node_indices()
            .filter_map(move |index| self.nodes.get(&self.graph[index]))
    }

    /// Depth and path of `id` from the current state of its parents
    ///
    /// Parents whose own path already runs through `id` are ignored so that
    /// cyclic ancestry cannot grow paths without bound.
    fn lineage_of(&self, id: &str) -> Option<(usize, Vec<String>)> {
        let node = self.nodes.get(id)?;
        let mut best: Option<&GraphNode> = None;
        for parent_id in &node.thought.parent_thought_ids {
            let Some(parent) = self.nodes.get(parent_id) else {
                continue;
            };
            if parent.path.iter().any(|p| p == id) {
                continue;
            }
            if best.map_or(true, |b| parent.path.len() > b.path.len()) {
                best = Some(parent);
            }
        }
        Some(match best {
            Some(parent) => {
                let mut path = parent.path.clone();
                path.push(id.to_string());
                (parent.depth + 1, path)
            }
            None => (0, vec![id.to_string()]),
        })
    }

    /// Recompute depth and path for `start` and every descendant it affects
    fn refresh_lineage(&mut self, start: &str) {
        let mut queue = VecDeque::from([start.to_string()]);
        let mut budget = self.nodes.len().saturating_mul(self.nodes.len()).max(1);

        while let Some(id) = queue.pop_front() {
            if budget == 0 {
                tracing::warn!(thought_id = %start, "Lineage refresh stopped early");
                break;
            }
            budget -= 1;

            let Some((depth, path)) = self.lineage_of(&id) else {
                continue;
            };
            let Some(node) = self.nodes.get_mut(&id) else {
                continue;
            };
            let changed = node.depth != depth || node.path != path;
            node.depth = depth;
            node.path = path;

            if changed || id == start {
                if let Some(children) = self.children.get(&id) {
                    queue.extend(children.iter().filter(|c| self.nodes.contains_key(*c)).cloned());
                }
            }
        }
    }

    fn link_child(&mut self, parent: &str, child: &str) {
        if let (Some(&p), Some(&c)) = (self.indices.get(parent), self.indices.get(child)) {
            self.graph.update_edge(p, c, ());
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            if !node.thought.child_thought_ids.iter().any(|id| id == child) {
                node.thought.child_thought_ids.push(child.to_string());
            }
        }
    }

    fn index_of(&self, id: &str) -> GraphResult<NodeIndex> {
        self.indices
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::thought_not_found(id))
    }
}

/// Directed graph of thoughts and their relationships
///
/// Mutations take the write lock, so concurrent writers are serialized.
#[derive(Default)]
pub struct ReasoningGraphStore {
    inner: RwLock<GraphInner>,
}

impl ReasoningGraphStore {
    /// Empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a thought, linking it below every parent already in the graph
    ///
    /// Parents that are not in the graph yet contribute neither depth nor an
    /// edge; once they are added, the thought's depth and path are updated.
    pub fn add_thought(&self, thought: ThoughtUnit) -> GraphResult<GraphNode> {
        thought.validate()?;

        let mut inner = self.inner.write();
        if inner.indices.contains_key(&thought.id) {
            return Err(GraphError::validation(
                "id",
                format!("thought {} is already in the graph", thought.id),
            ));
        }

        let id = thought.id.clone();
        let parents = thought.parent_thought_ids.clone();
        let index = inner.graph.add_node(id.clone());
        inner.indices.insert(id.clone(), index);
        inner.nodes.insert(id.clone(), GraphNode::new(thought));

        for parent in &parents {
            inner
                .children
                .entry(parent.clone())
                .or_default()
                .push(id.clone());
            if inner.indices.contains_key(parent) {
                inner.link_child(parent, &id);
            } else {
                tracing::debug!(thought_id = %id, parent_id = %parent, "Parent not in graph yet");
            }
        }

        let waiting: Vec<String> = inner
            .children
            .get(&id)
            .map(|children| {
                children
                    .iter()
                    .filter(|c| inner.indices.contains_key(*c))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for child in &waiting {
            inner.link_child(&id, child);
        }

        inner.refresh_lineage(&id);
        let node = inner
            .nodes
            .get(&id)
            .cloned()
            .ok_or_else(|| GraphError::thought_not_found(&id))?;

        tracing::info!(
            thought_id = %id,
            thought_type = %node.thought.thought_type,
            depth = node.depth,
            parents = parents.len(),
            "Added thought to reasoning graph"
        );
        Ok(node)
    }

    /// Record a typed relationship between two thoughts already in the graph
    pub fn create_relationship(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
        strength: f64,
    ) -> GraphResult<ThoughtRelationship> {
        if source_id == target_id {
            return Err(GraphError::validation(
                "target_id",
                "a thought cannot relate to itself",
            ));
        }

        let mut inner = self.inner.write();
        let source = inner.index_of(source_id)?;
        let target = inner.index_of(target_id)?;

        let relationship = ThoughtRelationship::new(source_id, target_id, relationship_type, strength);
        inner.graph.update_edge(source, target, ());
        if let Some(node) = inner.nodes.get_mut(source_id) {
            node.out_degree += 1;
        }
        if let Some(node) = inner.nodes.get_mut(target_id) {
            node.in_degree += 1;
        }
        inner.relationships.push(relationship.clone());

        tracing::info!(
            relationship_id = %relationship.id,
            source_id = %source_id,
            target_id = %target_id,
            relationship_type = %relationship_type,
            strength = relationship.strength,
            "Created thought relationship"
        );
        Ok(relationship)
    }

    /// Fetch a node, counting the read
    pub fn get_node(&self, id: &str) -> GraphResult<GraphNode> {
        let mut inner = self.inner.write();
        let node = inner
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::thought_not_found(id))?;
        node.access_count += 1;
        node.last_accessed = Some(Utc::now());
        Ok(node.clone())
    }

    /// Fetch a thought without touching usage counters
    pub fn get_thought(&self, id: &str) -> GraphResult<ThoughtUnit> {
        self.inner
            .read()
            .nodes
            .get(id)
            .map(|node| node.thought.clone())
            .ok_or_else(|| GraphError::thought_not_found(id))
    }

    /// Whether the thought is in the graph
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().nodes.contains_key(id)
    }

    /// Number of thoughts
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Whether the graph is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The thought and its ancestors, roots first
    pub fn get_reasoning_chain(&self, id: &str) -> GraphResult<Vec<ThoughtUnit>> {
        let inner = self.inner.read();
        if !inner.nodes.contains_key(id) {
            return Err(GraphError::thought_not_found(id));
        }
        Ok(algorithms::reasoning_chain(&inner.nodes, id))
    }

    /// Directed cycles, if any; cyclic graphs are allowed, this only reports them
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        let cycles = algorithms::detect_cycles(&self.inner.read().graph);
        if !cycles.is_empty() {
            tracing::warn!(cycles = cycles.len(), "Reasoning graph contains cycles");
        }
        cycles
    }

    /// Groups of thoughts connected by any edge, ignoring direction
    pub fn find_connected_components(&self) -> Vec<Vec<String>> {
        algorithms::connected_components(&self.inner.read().graph)
    }

    /// Thoughts matching every set criterion, in insertion order
    pub fn find_thoughts_by_criteria(&self, criteria: &ThoughtCriteria) -> Vec<ThoughtUnit> {
        self.inner
            .read()
            .ordered_nodes()
            .filter(|node| criteria.matches(node))
            .map(|node| node.thought.clone())
            .collect()
    }

    /// Relationships where the thought is source or target
    pub fn relationships_for(&self, id: &str) -> Vec<ThoughtRelationship> {
        self.inner
            .read()
            .relationships
            .iter()
            .filter(|rel| rel.source_id == id || rel.target_id == id)
            .cloned()
            .collect()
    }

    /// Serialize the graph
    pub fn export_graph(&self, format: ExportFormat) -> GraphExport {
        export::export(&self.inner.read(), format)
    }

    /// Serialize the graph, naming the format as text
    pub fn export_graph_as(&self, format: &str) -> GraphResult<GraphExport> {
        Ok(self.export_graph(format.parse()?))
    }

    /// Shape summary
    pub fn stats(&self) -> GraphStats {
        let inner = self.inner.read();
        let node_count = inner.nodes.len();
        let degree_sum: usize = inner
            .nodes
            .values()
            .map(|node| node.in_degree + node.out_degree)
            .sum();

        GraphStats {
            node_count,
            edge_count: inner.graph.edge_count(),
            relationship_count: inner.relationships.len(),
            max_depth: inner.nodes.values().map(|n| n.depth).max().unwrap_or(0),
            root_count: inner.nodes.values().filter(|n| n.is_root()).count(),
            leaf_count: inner
                .graph
                .node_indices()
                .filter(|&i| {
                    inner
                        .graph
                        .neighbors_directed(i, Direction::Outgoing)
                        .next()
                        .is_none()
                })
                .count(),
            average_degree: if node_count == 0 {
                0.0
            } else {
                degree_sum as f64 / node_count as f64
            },
        }
    }
}
