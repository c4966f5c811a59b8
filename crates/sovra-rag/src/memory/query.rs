//! Search queries, filters and ranked results

use super::policy::Requester;
use super::record::{ContentType, MemoryRecord};
use crate::error::{SovraError, SovraResult};
use crate::thought::content_hash;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How relevance is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Token-set Jaccard similarity
    Keyword,
    /// Cosine similarity against the query embedding
    Vector,
    /// Cosine where dimensions agree, keyword relevance otherwise
    Hybrid,
}

/// Hard filters applied before scoring; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Allowed content types (empty = any)
    pub content_types: Vec<ContentType>,
    /// Owning agent
    pub agent_id: Option<String>,
    /// Category
    pub category: Option<String>,
    /// Tags that must all be present
    pub tags: Vec<String>,
    /// Lower importance bound (inclusive)
    pub min_importance: Option<f64>,
    /// Upper importance bound (inclusive)
    pub max_importance: Option<f64>,
    /// Created at or after
    pub created_after: Option<DateTime<Utc>>,
    /// Created at or before
    pub created_before: Option<DateTime<Utc>>,
}

impl SearchFilters {
    /// Whether a record passes every filter
    pub fn matches(&self, record: &MemoryRecord) -> bool {
        if !self.content_types.is_empty() && !self.content_types.contains(&record.content_type) {
            return false;
        }
        if let Some(ref agent) = self.agent_id {
            if &record.agent_id != agent {
                return false;
            }
        }
        if let Some(ref category) = self.category {
            if record.category.as_ref() != Some(category) {
                return false;
            }
        }
        if !record.has_tags(&self.tags) {
            return false;
        }
        if self.min_importance.is_some_and(|min| record.importance < min)
            || self.max_importance.is_some_and(|max| record.importance > max)
        {
            return false;
        }
        if self.created_after.is_some_and(|t| record.created_at < t)
            || self.created_before.is_some_and(|t| record.created_at > t)
        {
            return false;
        }
        true
    }
}

/// A search request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// Relevance model
    pub query_type: QueryType,
    /// Query text
    pub text: String,
    /// Identity the results are filtered for
    pub requester: Requester,
    /// Hard filters
    #[serde(default)]
    pub filters: SearchFilters,
    /// Page size, store default when unset
    pub limit: Option<usize>,
    /// Results to skip
    #[serde(default)]
    pub offset: usize,
    /// Minimum relevance
    #[serde(default)]
    pub threshold: f64,
}

impl MemoryQuery {
    fn new(query_type: QueryType, text: impl Into<String>, requester: Requester) -> Self {
        Self {
            query_type,
            text: text.into(),
            requester,
            filters: SearchFilters::default(),
            limit: None,
            offset: 0,
            threshold: 0.0,
        }
    }

    /// Keyword query
    pub fn keyword(text: impl Into<String>, requester: Requester) -> Self {
        Self::new(QueryType::Keyword, text, requester)
    }

    /// Vector query
    pub fn vector(text: impl Into<String>, requester: Requester) -> Self {
        Self::new(QueryType::Vector, text, requester)
    }

    /// Hybrid query
    pub fn hybrid(text: impl Into<String>, requester: Requester) -> Self {
        Self::new(QueryType::Hybrid, text, requester)
    }

    /// Set page size
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set page offset
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Set minimum relevance
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Replace all filters
    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Restrict to one content type
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.filters.content_types.push(content_type);
        self
    }

    /// Restrict to one owning agent
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.filters.agent_id = Some(agent_id.into());
        self
    }

    /// Restrict to one category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.filters.category = Some(category.into());
        self
    }

    /// Require tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Restrict importance
    pub fn with_importance_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.filters.min_importance = min;
        self.filters.max_importance = max;
        self
    }

    /// Restrict creation time
    pub fn with_time_range(
        mut self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        self.filters.created_after = after;
        self.filters.created_before = before;
        self
    }

    /// Reject malformed queries
    pub fn validate(&self) -> SovraResult<()> {
        if self.limit == Some(0) {
            return Err(SovraError::validation("limit", "must be positive", "0"));
        }
        if !self.threshold.is_finite() || !(-1.0..=1.0).contains(&self.threshold) {
            return Err(SovraError::validation(
                "threshold",
                "must be within [-1, 1]",
                self.threshold.to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.filters.min_importance, self.filters.max_importance) {
            if min > max {
                return Err(SovraError::validation(
                    "min_importance",
                    "must not exceed max_importance",
                    format!("{} > {}", min, max),
                ));
            }
        }
        if let (Some(after), Some(before)) = (self.filters.created_after, self.filters.created_before) {
            if after > before {
                return Err(SovraError::validation(
                    "created_after",
                    "must not be after created_before",
                    after.to_rfc3339(),
                ));
            }
        }
        if self.query_type != QueryType::Keyword && self.text.trim().is_empty() {
            return Err(SovraError::validation(
                "text",
                "must not be empty for vector queries",
                "",
            ));
        }
        Ok(())
    }

    /// Cache key identifying this query for `limit`
    pub(crate) fn signature(&self, limit: usize) -> SovraResult<String> {
        let key = serde_json::json!({
            "type": self.query_type,
            "text": self.text,
            "limit": limit,
            "offset": self.offset,
            "threshold": self.threshold,
            "requester": self.requester,
            "filters": self.filters,
        });
        Ok(content_hash(&serde_json::to_string(&key)?))
    }
}

/// A record with its score breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    /// The matching record
    pub record: MemoryRecord,
    /// Combined score
    pub score: f64,
    /// Query relevance
    pub relevance: f64,
    /// Stored importance
    pub importance: f64,
    /// Recency in [0, 1]
    pub recency: f64,
}

/// One page of ranked results
#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    /// Ranked page
    pub results: Vec<ScoredRecord>,
    /// Matches before pagination
    pub total_matches: usize,
    /// More matches exist past this page
    pub has_more: bool,
    /// Query embedding failed and keyword relevance was used
    pub degraded: bool,
    /// Served from the result cache
    pub from_cache: bool,
}

impl SearchResults {
    /// Ids of the returned records, in rank order
    pub fn ids(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.record.id.as_str()).collect()
    }

    /// Number of results on this page
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the page is empty
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let who = Requester::agent("a");
        assert!(MemoryQuery::keyword("", who.clone()).validate().is_ok());
        assert!(MemoryQuery::vector("", who.clone()).validate().is_err());
        assert!(MemoryQuery::keyword("x", who.clone()).with_limit(0).validate().is_err());
        assert!(MemoryQuery::keyword("x", who.clone())
            .with_threshold(2.0)
            .validate()
            .is_err());
        assert!(MemoryQuery::keyword("x", who)
            .with_importance_range(Some(0.8), Some(0.2))
            .validate()
            .is_err());
    }

    #[test]
    fn test_signature_varies_with_page_and_requester() {
        let base = MemoryQuery::keyword("cache", Requester::agent("a"));
        let same = base.signature(10).unwrap();
        assert_eq!(same, base.clone().signature(10).unwrap());
        assert_ne!(same, base.signature(5).unwrap());
        assert_ne!(same, base.clone().with_offset(2).signature(10).unwrap());
        assert_ne!(
            same,
            MemoryQuery::keyword("cache", Requester::agent("b"))
                .signature(10)
                .unwrap()
        );
    }
}
