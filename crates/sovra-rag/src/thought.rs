//! Thoughts, reasoning traces and the relationships between them
//!
//! A [`ThoughtUnit`] is immutable once created: revising one produces a new
//! unit linked to its predecessor through `parent_thought_ids`. The content
//! hash is the integrity anchor and must match the content at all times.

use crate::error::{SovraError, SovraResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lowercase hex SHA-256 of `text`
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{:x}", digest)
}

/// Kind of cognitive step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThoughtType {
    /// Something perceived
    Observation,
    /// An inference step
    Reasoning,
    /// An intended course of action
    Plan,
    /// Evaluation of another thought
    Critique,
    /// Combination of several thoughts
    Synthesis,
}

impl ThoughtType {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Reasoning => "reasoning",
            Self::Plan => "plan",
            Self::Critique => "critique",
            Self::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for ThoughtType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThoughtType {
    type Err = SovraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "observation" => Ok(Self::Observation),
            "reasoning" => Ok(Self::Reasoning),
            "plan" => Ok(Self::Plan),
            "critique" => Ok(Self::Critique),
            "synthesis" => Ok(Self::Synthesis),
            other => Err(SovraError::validation(
                "thought_type",
                "must be one of observation|reasoning|plan|critique|synthesis",
                other,
            )),
        }
    }
}

/// Semantic band derived from a numeric confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    /// Below 0.3
    Uncertain,
    /// 0.3 up to 0.5
    Low,
    /// 0.5 up to 0.7
    Moderate,
    /// 0.7 up to 0.9
    High,
    /// 0.9 and above
    Certain,
}

impl ConfidenceBand {
    /// Band for a confidence value in [0, 1]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence < 0.3 {
            Self::Uncertain
        } else if confidence < 0.5 {
            Self::Low
        } else if confidence < 0.7 {
            Self::Moderate
        } else if confidence < 0.9 {
            Self::High
        } else {
            Self::Certain
        }
    }
}

/// An atomic unit of agent cognition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtUnit {
    /// Unique identifier
    pub id: String,

    /// When the thought was produced
    pub created_at: chrono::DateTime<chrono::Utc>,

    /// Agent that produced the thought
    pub agent_id: String,

    /// Free-text content
    pub content: String,

    /// Kind of cognitive step
    pub thought_type: ThoughtType,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Band derived from `confidence`
    pub confidence_band: ConfidenceBand,

    /// Thoughts this one builds on
    #[serde(default)]
    pub parent_thought_ids: Vec<String>,

    /// Thoughts known to build on this one
    #[serde(default)]
    pub child_thought_ids: Vec<String>,

    /// Loosely related thoughts
    #[serde(default)]
    pub related_thought_ids: Vec<String>,

    /// Free-form labels
    #[serde(default)]
    pub tags: Vec<String>,

    /// SHA-256 of `content`
    pub content_hash: String,

    /// Session correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Task correlation id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl ThoughtUnit {
    /// Create a new thought with confidence 0.5
    pub fn new(
        agent_id: impl Into<String>,
        content: impl Into<String>,
        thought_type: ThoughtType,
    ) -> Self {
        let content = content.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now(),
            agent_id: agent_id.into(),
            content_hash: content_hash(&content),
            content,
            thought_type,
            confidence: 0.5,
            confidence_band: ConfidenceBand::from_confidence(0.5),
            parent_thought_ids: Vec::new(),
            child_thought_ids: Vec::new(),
            related_thought_ids: Vec::new(),
            tags: Vec::new(),
            session_id: None,
            task_id: None,
        }
    }

    /// Override the generated id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set confidence (clamped to [0, 1]) and refresh the band
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self.confidence_band = ConfidenceBand::from_confidence(self.confidence);
        self
    }

    /// Set parent thoughts
    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_thought_ids = parents.into_iter().map(Into::into).collect();
        self
    }

    /// Set related thoughts
    pub fn with_related<I, S>(mut self, related: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_thought_ids = related.into_iter().map(Into::into).collect();
        self
    }

    /// Set tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set task id
    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Whether the stored hash still matches the content
    pub fn verify_integrity(&self) -> bool {
        content_hash(&self.content) == self.content_hash
    }

    /// Produce a successor thought carrying `new_content`, linked to this one
    pub fn revise(&self, new_content: impl Into<String>) -> Self {
        let mut next = ThoughtUnit::new(self.agent_id.clone(), new_content, self.thought_type)
            .with_confidence(self.confidence)
            .with_parents([self.id.clone()])
            .with_tags(self.tags.clone());
        next.session_id = self.session_id.clone();
        next.task_id = self.task_id.clone();
        next
    }

    /// Reject malformed thoughts before they reach any store
    pub fn validate(&self) -> SovraResult<()> {
        if self.id.trim().is_empty() {
            return Err(SovraError::validation("id", "must not be empty", ""));
        }
        if self.agent_id.trim().is_empty() {
            return Err(SovraError::validation("agent_id", "must not be empty", ""));
        }
        if self.content.trim().is_empty() {
            return Err(SovraError::validation("content", "must not be empty", ""));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(SovraError::validation(
                "confidence",
                "must be within [0, 1]",
                self.confidence.to_string(),
            ));
        }
        if self.confidence_band != ConfidenceBand::from_confidence(self.confidence) {
            return Err(SovraError::validation(
                "confidence_band",
                "must match confidence",
                format!("{:?} for {}", self.confidence_band, self.confidence),
            ));
        }
        if !self.verify_integrity() {
            return Err(SovraError::validation(
                "content_hash",
                "must match SHA-256 of content",
                self.content_hash.clone(),
            ));
        }
        if self.parent_thought_ids.iter().any(|p| p == &self.id) {
            return Err(SovraError::validation(
                "parent_thought_ids",
                "a thought cannot be its own parent",
                self.id.clone(),
            ));
        }
        Ok(())
    }
}

/// A single tool invocation inside a reasoning trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAction {
    /// Tool or action name
    pub tool: String,

    /// Parameters passed to the tool
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// What the agent observed afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
}

impl TraceAction {
    /// Create an action without params
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: BTreeMap::new(),
            observation: None,
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the observation
    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }
}

/// A recorded ReAct episode: thoughts interleaved with actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningTrace {
    /// Unique identifier
    pub id: String,

    /// Agent that ran the episode
    pub agent_id: String,

    /// Task the episode worked on
    pub task: String,

    /// Thoughts produced during the episode
    #[serde(default)]
    pub thoughts: Vec<ThoughtUnit>,

    /// Actions taken during the episode
    #[serde(default)]
    pub actions: Vec<TraceAction>,

    /// Whether the episode reached its goal
    pub success: bool,

    /// Episode start
    pub started_at: chrono::DateTime<chrono::Utc>,

    /// Episode end, if finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl ReasoningTrace {
    /// Start a new trace
    pub fn new(agent_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_id: agent_id.into(),
            task: task.into(),
            thoughts: Vec::new(),
            actions: Vec::new(),
            success: false,
            started_at: chrono::Utc::now(),
            completed_at: None,
        }
    }

    /// Append a thought
    pub fn with_thought(mut self, thought: ThoughtUnit) -> Self {
        self.thoughts.push(thought);
        self
    }

    /// Append an action
    pub fn with_action(mut self, action: TraceAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Mark the trace finished
    pub fn completed(mut self, success: bool) -> Self {
        self.success = success;
        self.completed_at = Some(chrono::Utc::now());
        self
    }

    /// Number of steps (thoughts plus actions)
    pub fn complexity(&self) -> usize {
        self.thoughts.len() + self.actions.len()
    }

    /// Canonical text rendering, used for embedding and hashing
    pub fn render(&self) -> String {
        let mut out = format!("Task: {}\n", self.task);
        for thought in &self.thoughts {
            out.push_str(&format!("[{}] {}\n", thought.thought_type, thought.content));
        }
        for action in &self.actions {
            out.push_str(&format!("Action: {}", action.tool));
            for (key, value) in &action.params {
                out.push_str(&format!(" {}={}", key, value));
            }
            out.push('\n');
            if let Some(observation) = &action.observation {
                out.push_str(&format!("Observation: {}\n", observation));
            }
        }
        out.push_str(if self.success {
            "Outcome: success"
        } else {
            "Outcome: failure"
        });
        out
    }

    /// Reject malformed traces
    pub fn validate(&self) -> SovraResult<()> {
        if self.agent_id.trim().is_empty() {
            return Err(SovraError::validation("agent_id", "must not be empty", ""));
        }
        if self.task.trim().is_empty() {
            return Err(SovraError::validation("task", "must not be empty", ""));
        }
        for thought in &self.thoughts {
            thought.validate()?;
        }
        Ok(())
    }
}

/// Kind of edge between two thoughts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    /// Target was derived from source
    ParentChild,
    /// Siblings at the same level
    Peer,
    /// Source critiques target
    Critique,
    /// Source synthesizes target
    Synthesis,
    /// Source contradicts target
    Contradiction,
    /// Source supports target
    Support,
    /// Source depends on target
    Dependency,
}

impl RelationshipType {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParentChild => "parent_child",
            Self::Peer => "peer",
            Self::Critique => "critique",
            Self::Synthesis => "synthesis",
            Self::Contradiction => "contradiction",
            Self::Support => "support",
            Self::Dependency => "dependency",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = SovraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parent_child" => Ok(Self::ParentChild),
            "peer" => Ok(Self::Peer),
            "critique" => Ok(Self::Critique),
            "synthesis" => Ok(Self::Synthesis),
            "contradiction" => Ok(Self::Contradiction),
            "support" => Ok(Self::Support),
            "dependency" => Ok(Self::Dependency),
            other => Err(SovraError::validation(
                "relationship_type",
                "unknown relationship type",
                other,
            )),
        }
    }
}

/// Typed, append-only edge between two thoughts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtRelationship {
    /// Unique identifier
    pub id: String,

    /// Edge origin
    pub source_id: String,

    /// Edge destination
    pub target_id: String,

    /// Kind of relationship
    pub relationship_type: RelationshipType,

    /// Strength in [0, 1]
    pub strength: f64,

    /// When the edge was created
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ThoughtRelationship {
    /// Create an edge; strength is clamped to [0, 1] (NaN becomes 0)
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relationship_type: RelationshipType,
        strength: f64,
    ) -> Self {
        let strength = if strength.is_nan() {
            0.0
        } else {
            strength.clamp(0.0, 1.0)
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            relationship_type,
            strength,
            created_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_round_trip_after_serialization() {
        let thought = ThoughtUnit::new("agent-1", "The cache should be warmed first", ThoughtType::Plan);
        let json = serde_json::to_string(&thought).unwrap();
        let restored: ThoughtUnit = serde_json::from_str(&json).unwrap();

        assert!(restored.verify_integrity());
        assert_eq!(restored.content_hash, content_hash(&restored.content));
    }

    #[test]
    fn test_tampered_content_fails_validation() {
        let mut thought = ThoughtUnit::new("agent-1", "original", ThoughtType::Observation);
        thought.content = "tampered".to_string();

        assert!(!thought.verify_integrity());
        assert!(matches!(
            thought.validate(),
            Err(SovraError::Validation { ref field, .. }) if field == "content_hash"
        ));
    }

    #[test]
    fn test_revise_links_to_predecessor() {
        let first = ThoughtUnit::new("agent-1", "draft", ThoughtType::Reasoning)
            .with_confidence(0.8)
            .with_session("s-1");
        let second = first.revise("final");

        assert_ne!(first.id, second.id);
        assert_eq!(second.parent_thought_ids, vec![first.id.clone()]);
        assert_eq!(second.session_id.as_deref(), Some("s-1"));
        assert!(second.verify_integrity());
        assert_eq!(first.content, "draft");
    }

    #[test]
    fn test_confidence_is_clamped_and_banded() {
        let thought = ThoughtUnit::new("a", "x", ThoughtType::Plan).with_confidence(1.7);
        assert_eq!(thought.confidence, 1.0);
        assert_eq!(thought.confidence_band, ConfidenceBand::Certain);

        assert_eq!(ConfidenceBand::from_confidence(0.1), ConfidenceBand::Uncertain);
        assert_eq!(ConfidenceBand::from_confidence(0.45), ConfidenceBand::Low);
        assert_eq!(ConfidenceBand::from_confidence(0.6), ConfidenceBand::Moderate);
        assert_eq!(ConfidenceBand::from_confidence(0.75), ConfidenceBand::High);
    }

    #[test]
    fn test_band_must_agree_with_confidence() {
        let mut thought = ThoughtUnit::new("a", "x", ThoughtType::Plan).with_confidence(0.95);
        assert!(thought.validate().is_ok());

        thought.confidence_band = ConfidenceBand::Uncertain;
        assert!(matches!(
            thought.validate(),
            Err(SovraError::Validation { ref field, .. }) if field == "confidence_band"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_and_self_parent() {
        let empty = ThoughtUnit::new("a", "   ", ThoughtType::Plan);
        assert!(empty.validate().is_err());

        let looped = ThoughtUnit::new("a", "x", ThoughtType::Plan).with_id("t1");
        let looped = looped.with_parents(["t1"]);
        assert!(looped.validate().is_err());
    }

    #[test]
    fn test_trace_complexity_and_render() {
        let trace = ReasoningTrace::new("agent-1", "find flights")
            .with_thought(ThoughtUnit::new("agent-1", "search the API", ThoughtType::Plan))
            .with_action(
                TraceAction::new("flight_search")
                    .with_param("from", "DXB")
                    .with_observation("3 results"),
            )
            .completed(true);

        assert_eq!(trace.complexity(), 2);
        let text = trace.render();
        assert!(text.contains("Task: find flights"));
        assert!(text.contains("[plan] search the API"));
        assert!(text.contains("Action: flight_search from=DXB"));
        assert!(text.ends_with("Outcome: success"));
    }

    #[test]
    fn test_relationship_strength_clamped() {
        let rel = ThoughtRelationship::new("a", "b", RelationshipType::Support, 3.0);
        assert_eq!(rel.strength, 1.0);
        let rel = ThoughtRelationship::new("a", "b", RelationshipType::Support, f64::NAN);
        assert_eq!(rel.strength, 0.0);
    }

    #[test]
    fn test_type_names_round_trip() {
        for name in ["observation", "reasoning", "plan", "critique", "synthesis"] {
            assert_eq!(name.parse::<ThoughtType>().unwrap().as_str(), name);
        }
        assert!("musing".parse::<ThoughtType>().is_err());
        assert_eq!(
            "parent_child".parse::<RelationshipType>().unwrap(),
            RelationshipType::ParentChild
        );
    }
}
