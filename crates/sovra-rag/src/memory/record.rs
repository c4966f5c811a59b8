//! Durable memory records and importance scoring

use super::text::extract_keywords;
use crate::error::{SovraError, SovraResult};
use crate::thought::{content_hash, ReasoningTrace, ThoughtType, ThoughtUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Keywords extracted from content into record tags
const MAX_KEYWORDS: usize = 10;

/// Kind of content a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// A single thought
    Thought,
    /// A ReAct trace
    Trace,
    /// Free-form note
    Note,
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Thought => "thought",
            Self::Trace => "trace",
            Self::Note => "note",
        })
    }
}

/// Content handed to the memory store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryContent {
    /// A thought produced by an agent
    Thought(ThoughtUnit),
    /// A completed reasoning episode
    Trace(ReasoningTrace),
    /// Free-form note
    Note {
        /// Note body
        text: String,
        /// Optional grouping label
        category: Option<String>,
    },
}

impl MemoryContent {
    /// Plain note
    pub fn note(text: impl Into<String>) -> Self {
        Self::Note {
            text: text.into(),
            category: None,
        }
    }

    /// Kind of content
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Thought(_) => ContentType::Thought,
            Self::Trace(_) => ContentType::Trace,
            Self::Note { .. } => ContentType::Note,
        }
    }

    /// Text that gets embedded, hashed and searched
    pub fn text(&self) -> String {
        match self {
            Self::Thought(thought) => thought.content.clone(),
            Self::Trace(trace) => trace.render(),
            Self::Note { text, .. } => text.clone(),
        }
    }

    /// Id of the thought or trace the record derives from
    pub fn source_id(&self) -> Option<String> {
        match self {
            Self::Thought(thought) => Some(thought.id.clone()),
            Self::Trace(trace) => Some(trace.id.clone()),
            Self::Note { .. } => None,
        }
    }

    /// Agent that produced the content, when it records one
    pub fn producer(&self) -> Option<&str> {
        match self {
            Self::Thought(thought) => Some(&thought.agent_id),
            Self::Trace(trace) => Some(&trace.agent_id),
            Self::Note { .. } => None,
        }
    }

    /// Default category: thought type, `"trace"`, or the note's category
    pub fn category(&self) -> Option<String> {
        match self {
            Self::Thought(thought) => Some(thought.thought_type.to_string()),
            Self::Trace(_) => Some("trace".to_string()),
            Self::Note { category, .. } => category.clone(),
        }
    }

    /// Explicit tags merged with extracted keywords, deduplicated
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = match self {
            Self::Thought(thought) => thought.tags.clone(),
            _ => Vec::new(),
        };
        for keyword in extract_keywords(&self.text(), MAX_KEYWORDS) {
            if !tags.contains(&keyword) {
                tags.push(keyword);
            }
        }
        tags
    }

    /// Importance score in [0, 1]
    pub fn importance(&self) -> f64 {
        let raw = match self {
            Self::Thought(thought) => {
                0.5 + 0.3 * thought.confidence + type_bonus(thought.thought_type)
            }
            Self::Trace(trace) => {
                let success = if trace.success { 0.2 } else { 0.0 };
                let complexity = (trace.complexity() as f64 / 10.0).min(0.1);
                0.7 + success + complexity
            }
            Self::Note { .. } => 0.5,
        };
        raw.clamp(0.0, 1.0)
    }

    /// Reject malformed content
    pub fn validate(&self) -> SovraResult<()> {
        match self {
            Self::Thought(thought) => thought.validate(),
            Self::Trace(trace) => trace.validate(),
            Self::Note { text, .. } => {
                if text.trim().is_empty() {
                    return Err(SovraError::validation("text", "must not be empty", ""));
                }
                Ok(())
            }
        }
    }
}

fn type_bonus(thought_type: ThoughtType) -> f64 {
    match thought_type {
        ThoughtType::Plan => 0.3,
        ThoughtType::Synthesis => 0.2,
        ThoughtType::Critique => 0.15,
        ThoughtType::Reasoning => 0.1,
        ThoughtType::Observation => 0.0,
    }
}

/// A persisted unit of semantic memory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique identifier
    pub id: String,

    /// Thought or trace this record derives from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,

    /// Owning agent
    pub agent_id: String,

    /// Embedding of `content`
    pub embedding: Vec<f32>,

    /// Length of `embedding`
    pub embedding_dimension: usize,

    /// Model that produced `embedding`
    pub embedding_model: String,

    /// Raw content
    pub content: String,

    /// Kind of content
    pub content_type: ContentType,

    /// Grouping label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Importance in [0, 1]
    pub importance: f64,

    /// Policy governing reads
    pub access_policy_id: String,

    /// Search tags and keywords
    #[serde(default)]
    pub tags: Vec<String>,

    /// SHA-256 of `content`
    pub content_hash: String,

    /// When the record was stored
    pub created_at: DateTime<Utc>,

    /// Last metadata change
    pub updated_at: DateTime<Utc>,

    /// Last read through `get` or `search`
    pub last_accessed: DateTime<Utc>,

    /// Number of reads
    #[serde(default)]
    pub access_count: u64,
}

impl MemoryRecord {
    /// Whether the stored hash still matches the content
    pub fn verify_integrity(&self) -> bool {
        content_hash(&self.content) == self.content_hash
    }

    /// Reject records that violate the storage invariants
    pub fn validate(&self) -> SovraResult<()> {
        if self.embedding_dimension != self.embedding.len() {
            return Err(SovraError::validation(
                "embedding_dimension",
                "must equal the embedding length",
                format!("{} != {}", self.embedding_dimension, self.embedding.len()),
            ));
        }
        if !(0.0..=1.0).contains(&self.importance) {
            return Err(SovraError::validation(
                "importance",
                "must be within [0, 1]",
                self.importance.to_string(),
            ));
        }
        if self.access_policy_id.is_empty() {
            return Err(SovraError::validation("access_policy_id", "must not be empty", ""));
        }
        if !self.verify_integrity() {
            return Err(SovraError::validation(
                "content_hash",
                "must match content",
                self.content_hash.clone(),
            ));
        }
        Ok(())
    }

    /// Whether every tag in `required` is present
    pub fn has_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }
}

/// Metadata changes accepted by `update`; content and hash are immutable
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    /// New importance
    pub importance: Option<f64>,
    /// Replacement tag list
    pub tags: Option<Vec<String>>,
    /// Replacement category
    pub category: Option<String>,
    /// Move the record under another policy
    pub access_policy_id: Option<String>,
}

impl MemoryUpdate {
    /// Empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Set importance
    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = Some(importance);
        self
    }

    /// Replace tags
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Replace category
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Replace access policy
    pub fn access_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.access_policy_id = Some(policy_id.into());
        self
    }

    /// Whether the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.importance.is_none()
            && self.tags.is_none()
            && self.category.is_none()
            && self.access_policy_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thought::TraceAction;

    #[test]
    fn test_plan_importance_is_clamped() {
        let thought = ThoughtUnit::new("agent", "Ship the fix", ThoughtType::Plan).with_confidence(0.9);
        assert_eq!(MemoryContent::Thought(thought).importance(), 1.0);
    }

    #[test]
    fn test_thought_importance_by_type() {
        let observe = ThoughtUnit::new("a", "saw it", ThoughtType::Observation).with_confidence(0.5);
        assert!((MemoryContent::Thought(observe).importance() - 0.65).abs() < 1e-9);

        let critique = ThoughtUnit::new("a", "weak", ThoughtType::Critique).with_confidence(0.0);
        assert!((MemoryContent::Thought(critique).importance() - 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_trace_importance() {
        let failed = ReasoningTrace::new("a", "find the bug").completed(false);
        assert!((MemoryContent::Trace(failed).importance() - 0.7).abs() < 1e-9);

        let small = ReasoningTrace::new("a", "find the bug")
            .with_thought(ThoughtUnit::new("a", "look at logs", ThoughtType::Plan))
            .completed(true);
        // 0.7 + 0.2 + 0.1 * 1 step / 10
        assert!((MemoryContent::Trace(small).importance() - 1.0).abs() < 1e-9);

        let mut big = ReasoningTrace::new("a", "find the bug");
        for i in 0..20 {
            big = big.with_action(TraceAction::new(format!("tool{}", i)));
        }
        assert!((MemoryContent::Trace(big).importance() - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_tags_merge_explicit_and_keywords() {
        let thought = ThoughtUnit::new("a", "Provider latency spikes under load", ThoughtType::Observation)
            .with_tags(["latency", "ops"]);
        let tags = MemoryContent::Thought(thought).tags();
        assert_eq!(&tags[..2], &["latency".to_string(), "ops".to_string()]);
        assert!(tags.contains(&"provider".to_string()));
        assert_eq!(tags.iter().filter(|t| *t == "latency").count(), 1);
    }

    #[test]
    fn test_empty_note_is_rejected() {
        assert!(MemoryContent::note("  ").validate().is_err());
        assert!(MemoryContent::note("remember this").validate().is_ok());
    }

    #[test]
    fn test_memory_update_builder() {
        assert!(MemoryUpdate::new().is_empty());
        let update = MemoryUpdate::new().importance(0.2).tags(["x"]);
        assert!(!update.is_empty());
        assert_eq!(update.tags, Some(vec!["x".to_string()]));
    }
}
