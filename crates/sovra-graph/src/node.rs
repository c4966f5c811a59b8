//! Graph nodes, search criteria and summary statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovra_rag::thought::{ThoughtType, ThoughtUnit};

/// A thought placed in the reasoning graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// The wrapped thought
    pub thought: ThoughtUnit,

    /// 0 for roots, otherwise 1 + the depth of the deepest known parent
    pub depth: usize,

    /// Root-to-node ids through the parent with the longest path
    pub path: Vec<String>,

    /// Relationships targeting this node
    pub in_degree: usize,

    /// Relationships originating at this node
    pub out_degree: usize,

    /// Reads through `get_node`
    pub access_count: u64,

    /// Last read through `get_node`
    pub last_accessed: Option<DateTime<Utc>>,
}

impl GraphNode {
    pub(crate) fn new(thought: ThoughtUnit) -> Self {
        let path = vec![thought.id.clone()];
        Self {
            thought,
            depth: 0,
            path,
            in_degree: 0,
            out_degree: 0,
            access_count: 0,
            last_accessed: None,
        }
    }

    /// Id of the wrapped thought
    pub fn id(&self) -> &str {
        &self.thought.id
    }

    /// Whether no known parent feeds this node
    pub fn is_root(&self) -> bool {
        self.depth == 0
    }
}

/// Conjunctive filter for [`find_thoughts_by_criteria`]; unset fields are ignored
///
/// [`find_thoughts_by_criteria`]: crate::ReasoningGraphStore::find_thoughts_by_criteria
#[derive(Debug, Clone, Default)]
pub struct ThoughtCriteria {
    /// Thought type
    pub thought_type: Option<ThoughtType>,
    /// Minimum confidence (inclusive)
    pub min_confidence: Option<f64>,
    /// Maximum depth (inclusive)
    pub max_depth: Option<usize>,
    /// Tags that must all be present
    pub tags: Vec<String>,
    /// Producing agent
    pub agent_id: Option<String>,
}

impl ThoughtCriteria {
    /// Match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a thought type
    pub fn with_type(mut self, thought_type: ThoughtType) -> Self {
        self.thought_type = Some(thought_type);
        self
    }

    /// Require a minimum confidence
    pub fn with_min_confidence(mut self, confidence: f64) -> Self {
        self.min_confidence = Some(confidence);
        self
    }

    /// Require a maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Require tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Require a producing agent
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub(crate) fn matches(&self, node: &GraphNode) -> bool {
        let thought = &node.thought;
        self.thought_type.map_or(true, |t| thought.thought_type == t)
            && self.min_confidence.map_or(true, |c| thought.confidence >= c)
            && self.max_depth.map_or(true, |d| node.depth <= d)
            && self.tags.iter().all(|tag| thought.tags.contains(tag))
            && self.agent_id.as_ref().map_or(true, |a| &thought.agent_id == a)
    }
}

/// Summary of the graph's shape
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    /// Thoughts in the graph
    pub node_count: usize,
    /// Adjacency edges (parent links and relationships, deduplicated)
    pub edge_count: usize,
    /// Recorded relationships
    pub relationship_count: usize,
    /// Deepest node
    pub max_depth: usize,
    /// Nodes without known parents
    pub root_count: usize,
    /// Nodes without outgoing adjacency
    pub leaf_count: usize,
    /// Mean relationships per node (in plus out)
    pub average_degree: f64,
}
