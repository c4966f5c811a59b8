//! Semantic memory store: persistence, ranked search and read-time access control

use super::policy::{AccessDecision, AccessPolicy, IdentityResolver, Requester};
use super::query::{MemoryQuery, QueryType, ScoredRecord, SearchResults};
use super::record::{ContentType, MemoryContent, MemoryRecord, MemoryUpdate};
use super::search_cache::SearchCache;
use super::storage::{InMemoryRecordStore, RecordStore};
use super::text::{jaccard, token_set};
use crate::config::SearchConfig;
use crate::embedding::{cache_key, similarity::cosine_similarity, EmbeddingGateway};
use crate::error::{SovraError, SovraResult};
use crate::thought::content_hash;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Summary counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct MemoryStats {
    /// Stored records
    pub total_records: usize,
    /// Records per content type
    pub records_by_type: HashMap<ContentType, usize>,
    /// Stored policies
    pub total_policies: usize,
    /// Mean importance over all records
    pub average_importance: f64,
    /// Cached result pages
    pub cached_searches: usize,
}

/// Durable, access-controlled, searchable memory
pub struct SemanticMemoryStore {
    backend: Arc<dyn RecordStore>,
    gateway: Arc<EmbeddingGateway>,
    identity: Option<Arc<dyn IdentityResolver>>,
    search_cache: SearchCache,
    config: SearchConfig,
}

/// How a query's relevance is evaluated once embedding has been attempted
enum Relevance {
    Keyword(HashSet<String>),
    Vector { query: Vec<f32>, hybrid: bool, tokens: HashSet<String> },
}

impl SemanticMemoryStore {
    /// Store over an in-memory backend
    pub fn new(gateway: Arc<EmbeddingGateway>, config: SearchConfig) -> Self {
        Self::with_backend(Arc::new(InMemoryRecordStore::new()), gateway, config)
    }

    /// Store over a custom backend
    pub fn with_backend(
        backend: Arc<dyn RecordStore>,
        gateway: Arc<EmbeddingGateway>,
        config: SearchConfig,
    ) -> Self {
        let search_cache = SearchCache::new(config.cache_capacity, config.cache_ttl());
        Self {
            backend,
            gateway,
            identity: None,
            search_cache,
            config,
        }
    }

    /// Resolve trust levels through `resolver`
    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.identity = Some(resolver);
        self
    }

    /// Embedding gateway in use
    pub fn gateway(&self) -> &Arc<EmbeddingGateway> {
        &self.gateway
    }

    /// Register a new access policy
    pub async fn create_policy(&self, policy: AccessPolicy) -> SovraResult<String> {
        policy.validate()?;
        if self.backend.get_policy(&policy.id).await?.is_some() {
            return Err(SovraError::validation(
                "id",
                "policy already exists",
                policy.id.clone(),
            ));
        }
        let id = policy.id.clone();
        self.backend.put_policy(policy).await?;
        self.invalidate_searches();
        tracing::info!(policy_id = %id, "Created access policy");
        Ok(id)
    }

    /// Replace an existing policy; only its owner may do so
    pub async fn update_policy(&self, policy: AccessPolicy, requester: &Requester) -> SovraResult<()> {
        policy.validate()?;
        let existing = self
            .backend
            .get_policy(&policy.id)
            .await?
            .ok_or_else(|| SovraError::not_found("access_policy", &policy.id))?;
        if !requester.is_agent(&existing.owner_agent_id) || existing.owner_agent_id != policy.owner_agent_id {
            return Err(SovraError::access_denied(&policy.id, requester.to_string()));
        }
        let id = policy.id.clone();
        self.backend.put_policy(policy).await?;
        self.invalidate_searches();
        tracing::info!(policy_id = %id, "Updated access policy");
        Ok(())
    }

    /// Embed and persist content, returning the new record id
    ///
    /// Without `access_policy_id` a private policy owned by `agent_id` is
    /// created. Nothing is persisted when embedding fails.
    pub async fn store(
        &self,
        content: MemoryContent,
        agent_id: &str,
        access_policy_id: Option<&str>,
    ) -> SovraResult<String> {
        content.validate()?;
        if agent_id.trim().is_empty() {
            return Err(SovraError::validation("agent_id", "must not be empty", ""));
        }
        if let Some(producer) = content.producer() {
            if producer != agent_id {
                return Err(SovraError::validation(
                    "agent_id",
                    "must match the agent that produced the content",
                    agent_id,
                ));
            }
        }

        let (policy_id, new_policy) = match access_policy_id {
            Some(id) => {
                if self.backend.get_policy(id).await?.is_none() {
                    return Err(SovraError::not_found("access_policy", id));
                }
                (id.to_string(), None)
            }
            None => {
                let policy = AccessPolicy::private(agent_id);
                (policy.id.clone(), Some(policy))
            }
        };

        let text = content.text();
        let embedding = self.gateway.embed(&text).await?;

        let now = Utc::now();
        let record = MemoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: content.source_id(),
            agent_id: agent_id.to_string(),
            embedding_dimension: embedding.vector.len(),
            embedding: embedding.vector,
            embedding_model: embedding.model,
            content_hash: content_hash(&text),
            content: text,
            content_type: content.content_type(),
            category: content.category(),
            importance: content.importance(),
            access_policy_id: policy_id,
            tags: content.tags(),
            created_at: now,
            updated_at: now,
            last_accessed: now,
            access_count: 0,
        };
        record.validate()?;

        let created_policy = new_policy.as_ref().map(|p| p.id.clone());
        if let Some(policy) = new_policy {
            self.backend.put_policy(policy).await?;
        }
        let record_id = record.id.clone();
        let content_type = record.content_type;
        let importance = record.importance;
        if let Err(e) = self.backend.put_record(record).await {
            if let Some(policy_id) = created_policy {
                if let Err(cleanup) = self.backend.delete_policy(&policy_id).await {
                    tracing::warn!(policy_id = %policy_id, error = %cleanup, "Failed to remove orphaned policy");
                }
            }
            return Err(e);
        }
        self.invalidate_searches();

        tracing::info!(
            record_id = %record_id,
            agent_id = %agent_id,
            content_type = %content_type,
            importance = importance,
            cache_hit = embedding.cache_hit,
            "Stored memory record"
        );
        Ok(record_id)
    }

    /// Fetch a record on behalf of `requester`
    pub async fn get(&self, record_id: &str, requester: &Requester) -> SovraResult<MemoryRecord> {
        let mut record = self
            .backend
            .get_record(record_id)
            .await?
            .ok_or_else(|| SovraError::not_found("memory_record", record_id))?;

        let now = Utc::now();
        let policy = self.backend.get_policy(&record.access_policy_id).await?;
        if !self.is_readable(policy.as_ref(), requester, now) {
            tracing::debug!(record_id = %record_id, requester = %requester, "Read denied");
            return Err(SovraError::access_denied(record_id, requester.to_string()));
        }

        self.backend.record_access(record_id, now).await?;
        record.access_count += 1;
        record.last_accessed = now;
        Ok(record)
    }

    /// Change record metadata; only the owning agent may do so
    pub async fn update(
        &self,
        record_id: &str,
        requester: &Requester,
        update: MemoryUpdate,
    ) -> SovraResult<MemoryRecord> {
        let mut record = self.owned_record(record_id, requester).await?;
        if update.is_empty() {
            return Ok(record);
        }

        if let Some(importance) = update.importance {
            if !importance.is_finite() || !(0.0..=1.0).contains(&importance) {
                return Err(SovraError::validation(
                    "importance",
                    "must be within [0, 1]",
                    importance.to_string(),
                ));
            }
            record.importance = importance;
        }
        if let Some(policy_id) = update.access_policy_id {
            if self.backend.get_policy(&policy_id).await?.is_none() {
                return Err(SovraError::not_found("access_policy", policy_id));
            }
            record.access_policy_id = policy_id;
        }
        if let Some(tags) = update.tags {
            record.tags = tags;
        }
        if let Some(category) = update.category {
            record.category = Some(category);
        }
        record.updated_at = Utc::now();
        record.validate()?;

        self.backend.put_record(record.clone()).await?;
        self.invalidate_searches();
        tracing::info!(record_id = %record_id, "Updated memory record");
        Ok(record)
    }

    /// Remove a record; only the owning agent may do so
    pub async fn delete(&self, record_id: &str, requester: &Requester) -> SovraResult<()> {
        self.owned_record(record_id, requester).await?;
        self.backend.delete_record(record_id).await?;
        self.invalidate_searches();
        tracing::info!(record_id = %record_id, "Deleted memory record");
        Ok(())
    }

    /// Recompute the content hash of a readable record
    pub async fn verify_integrity(&self, record_id: &str, requester: &Requester) -> SovraResult<bool> {
        let record = self.get(record_id, requester).await?;
        let intact = record.verify_integrity();
        if !intact {
            tracing::warn!(record_id = %record_id, "Memory record failed integrity check");
        }
        Ok(intact)
    }

    /// Ranked, paginated, access-filtered search
    pub async fn search(&self, query: &MemoryQuery) -> SovraResult<SearchResults> {
        query.validate()?;
        let limit = query.limit.unwrap_or(self.config.default_limit).max(1);
        let key = query.signature(limit)?;
        let generation = self.search_cache.generation();
        let now = Utc::now();

        if let Some(mut cached) = self.search_cache.get(&key, now) {
            tracing::debug!(query_type = ?query.query_type, "Search served from cache");
            cached.from_cache = true;
            self.touch(&cached, now).await?;
            return Ok(cached);
        }

        let (relevance, degraded) = self.relevance_model(query).await?;

        let policies: HashMap<String, AccessPolicy> = self
            .backend
            .list_policies()
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut matches: Vec<ScoredRecord> = Vec::new();
        // First validity boundary among candidate policies; the page is only
        // reusable until then
        let mut stale_at: Option<DateTime<Utc>> = None;
        for record in self.backend.list_records().await? {
            if !query.filters.matches(&record) {
                continue;
            }
            if let Some(boundary) = policies
                .get(&record.access_policy_id)
                .and_then(|policy| policy.next_window_change(now))
            {
                stale_at = Some(stale_at.map_or(boundary, |at| at.min(boundary)));
            }
            if !self.is_readable(policies.get(&record.access_policy_id), &query.requester, now) {
                continue;
            }

            let score = match &relevance {
                Relevance::Keyword(tokens) => {
                    let score = jaccard(tokens, &token_set(&record.content));
                    if !tokens.is_empty() && score <= 0.0 {
                        continue;
                    }
                    score
                }
                Relevance::Vector { query: vector, hybrid, tokens } => {
                    if *hybrid && record.embedding_dimension != vector.len() {
                        jaccard(tokens, &token_set(&record.content))
                    } else {
                        f64::from(cosine_similarity(vector, &record.embedding))
                    }
                }
            };
            if score < query.threshold {
                continue;
            }

            matches.push(self.rank(record, score, now));
        }

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.record.created_at.cmp(&a.record.created_at))
                .then_with(|| a.record.id.cmp(&b.record.id))
        });

        let total_matches = matches.len();
        let results: Vec<ScoredRecord> = matches
            .into_iter()
            .skip(query.offset)
            .take(limit)
            .collect();
        let page = SearchResults {
            results,
            total_matches,
            has_more: total_matches > query.offset.saturating_add(limit),
            degraded,
            from_cache: false,
        };

        self.touch(&page, now).await?;
        if !degraded {
            self.search_cache.insert(key, page.clone(), generation, stale_at);
        }

        tracing::debug!(
            query_type = ?query.query_type,
            total_matches = total_matches,
            returned = page.results.len(),
            degraded = degraded,
            "Search completed"
        );
        Ok(page)
    }

    /// Summary counters
    pub async fn stats(&self) -> SovraResult<MemoryStats> {
        let records = self.backend.list_records().await?;
        let mut records_by_type = HashMap::new();
        let mut importance_sum = 0.0;
        for record in &records {
            *records_by_type.entry(record.content_type).or_insert(0) += 1;
            importance_sum += record.importance;
        }
        Ok(MemoryStats {
            total_records: records.len(),
            records_by_type,
            total_policies: self.backend.list_policies().await?.len(),
            average_importance: if records.is_empty() {
                0.0
            } else {
                importance_sum / records.len() as f64
            },
            cached_searches: self.search_cache.len(),
        })
    }

    fn invalidate_searches(&self) {
        let dropped = self.search_cache.invalidate();
        if dropped > 0 {
            tracing::debug!(dropped = dropped, "Invalidated cached searches");
        }
    }

    fn is_readable(&self, policy: Option<&AccessPolicy>, requester: &Requester, now: DateTime<Utc>) -> bool {
        match policy {
            Some(policy) => matches!(
                policy.evaluate(requester, now, self.identity.as_deref()),
                AccessDecision::Granted
            ),
            None => false,
        }
    }

    async fn owned_record(&self, record_id: &str, requester: &Requester) -> SovraResult<MemoryRecord> {
        let record = self
            .backend
            .get_record(record_id)
            .await?
            .ok_or_else(|| SovraError::not_found("memory_record", record_id))?;
        if !requester.is_agent(&record.agent_id) {
            return Err(SovraError::access_denied(record_id, requester.to_string()));
        }
        Ok(record)
    }

    async fn relevance_model(&self, query: &MemoryQuery) -> SovraResult<(Relevance, bool)> {
        let tokens = token_set(&query.text);
        if query.query_type == QueryType::Keyword {
            return Ok((Relevance::Keyword(tokens), false));
        }

        match self.gateway.embed(&query.text).await {
            Ok(embedding) => Ok((
                Relevance::Vector {
                    query: embedding.vector,
                    hybrid: query.query_type == QueryType::Hybrid,
                    tokens,
                },
                false,
            )),
            Err(SovraError::Provider { source, .. }) => {
                tracing::warn!(
                    query_type = ?query.query_type,
                    text_hash = %cache_key(&query.text),
                    error = %source,
                    "Query embedding failed, falling back to keyword relevance"
                );
                Ok((Relevance::Keyword(tokens), true))
            }
            Err(e) => Err(e),
        }
    }

    fn rank(&self, record: MemoryRecord, relevance: f64, now: DateTime<Utc>) -> ScoredRecord {
        let weights = &self.config.weights;
        let window = (self.config.recency_window_days.max(1) * 86_400) as f64;
        let age = (now - record.created_at).num_seconds().max(0) as f64;
        let recency = (1.0 - age / window).max(0.0);
        let importance = record.importance;
        let relevance = relevance.max(0.0);
        ScoredRecord {
            score: weights.relevance * relevance + weights.importance * importance + weights.recency * recency,
            relevance,
            importance,
            recency,
            record,
        }
    }

    async fn touch(&self, page: &SearchResults, now: DateTime<Utc>) -> SovraResult<()> {
        futures::future::try_join_all(
            page.results
                .iter()
                .map(|scored| self.backend.record_access(&scored.record.id, now)),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingProvider, HashEmbeddingProvider, ProviderEmbedding};
    use crate::error::ProviderError;
    use crate::memory::policy::StaticIdentityResolver;
    use crate::thought::{ThoughtType, ThoughtUnit};
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Hash embeddings that can be switched to fail
    struct FlakyProvider {
        inner: HashEmbeddingProvider,
        failing: AtomicBool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ProviderError::Unavailable("offline".to_string()));
            }
            self.inner.embed(text).await
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    fn store() -> SemanticMemoryStore {
        let gateway = Arc::new(EmbeddingGateway::with_provider(Arc::new(HashEmbeddingProvider::new(64))));
        SemanticMemoryStore::new(gateway, SearchConfig::default())
    }

    fn flaky_store() -> (SemanticMemoryStore, Arc<FlakyProvider>) {
        let provider = Arc::new(FlakyProvider {
            inner: HashEmbeddingProvider::new(64),
            failing: AtomicBool::new(false),
        });
        let gateway = Arc::new(EmbeddingGateway::with_provider(provider.clone()));
        (SemanticMemoryStore::new(gateway, SearchConfig::default()), provider)
    }

    #[tokio::test]
    async fn test_store_and_get() {
        let store = store();
        let thought = ThoughtUnit::new("alice", "Ship the fix tonight", ThoughtType::Plan).with_confidence(0.9);
        let source = thought.id.clone();
        let id = store
            .store(MemoryContent::Thought(thought), "alice", None)
            .await
            .unwrap();

        let record = store.get(&id, &Requester::agent("alice")).await.unwrap();
        assert_eq!(record.importance, 1.0);
        assert_eq!(record.source_id.as_deref(), Some(source.as_str()));
        assert_eq!(record.embedding_dimension, 64);
        assert_eq!(record.category.as_deref(), Some("plan"));
        assert_eq!(record.access_count, 1);
        assert!(record.verify_integrity());

        let denied = store.get(&id, &Requester::agent("bob")).await.unwrap_err();
        assert!(matches!(denied, SovraError::AccessDenied { .. }));

        let missing = store.get("nope", &Requester::agent("alice")).await.unwrap_err();
        assert!(matches!(missing, SovraError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_store_rejects_unknown_policy_and_foreign_content() {
        let store = store();
        let err = store
            .store(MemoryContent::note("hello"), "alice", Some("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, SovraError::NotFound { .. }));

        let thought = ThoughtUnit::new("bob", "not mine", ThoughtType::Observation);
        let err = store
            .store(MemoryContent::Thought(thought), "alice", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SovraError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_store() {
        let (store, provider) = flaky_store();
        provider.failing.store(true, Ordering::SeqCst);

        let err = store
            .store(MemoryContent::note("unembeddable"), "alice", None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.total_policies, 0);
    }

    #[tokio::test]
    async fn test_search_degrades_to_keywords() {
        let (store, provider) = flaky_store();
        store
            .store(MemoryContent::note("cache embeddings by content hash"), "alice", None)
            .await
            .unwrap();
        store
            .store(MemoryContent::note("unrelated gardening advice"), "alice", None)
            .await
            .unwrap();

        provider.failing.store(true, Ordering::SeqCst);
        let results = store
            .search(&MemoryQuery::vector("embedding cache", Requester::agent("alice")))
            .await
            .unwrap();

        assert!(results.degraded);
        assert_eq!(results.len(), 1);
        assert!(results.results[0].record.content.contains("cache"));
    }

    #[tokio::test]
    async fn test_update_and_delete_are_owner_only() {
        let store = store();
        let policy = store
            .create_policy(AccessPolicy::public("alice"))
            .await
            .unwrap();
        let id = store
            .store(MemoryContent::note("shared finding"), "alice", Some(&policy))
            .await
            .unwrap();

        // bob may read but not modify
        assert!(store.get(&id, &Requester::agent("bob")).await.is_ok());
        let err = store
            .update(&id, &Requester::agent("bob"), MemoryUpdate::new().importance(0.1))
            .await
            .unwrap_err();
        assert!(matches!(err, SovraError::AccessDenied { .. }));
        assert!(store.delete(&id, &Requester::agent("bob")).await.is_err());

        let updated = store
            .update(
                &id,
                &Requester::agent("alice"),
                MemoryUpdate::new().importance(0.9).tags(["finding"]),
            )
            .await
            .unwrap();
        assert_eq!(updated.importance, 0.9);
        assert_eq!(updated.tags, vec!["finding".to_string()]);
        assert!(updated.verify_integrity());

        let err = store
            .update(&id, &Requester::agent("alice"), MemoryUpdate::new().importance(1.5))
            .await
            .unwrap_err();
        assert!(matches!(err, SovraError::Validation { .. }));

        store.delete(&id, &Requester::agent("alice")).await.unwrap();
        assert!(matches!(
            store.get(&id, &Requester::agent("alice")).await.unwrap_err(),
            SovraError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_trust_level_gates_search() {
        let resolver = StaticIdentityResolver::new().with_trust(Requester::agent("carol"), 0.9);
        let store = store().with_identity_resolver(Arc::new(resolver));
        let policy = store
            .create_policy(AccessPolicy::public("alice").with_min_trust_level(0.5))
            .await
            .unwrap();
        store
            .store(MemoryContent::note("sensitive routing table"), "alice", Some(&policy))
            .await
            .unwrap();

        let query = |who: &str| MemoryQuery::keyword("routing", Requester::agent(who));
        assert_eq!(store.search(&query("carol")).await.unwrap().len(), 1);
        assert_eq!(store.search(&query("dave")).await.unwrap().len(), 0);
        assert_eq!(store.search(&query("alice")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_policy_rejected() {
        let store = store();
        let policy = AccessPolicy::private("alice").with_id("p1");
        store.create_policy(policy.clone()).await.unwrap();
        assert!(store.create_policy(policy).await.is_err());
    }

    #[tokio::test]
    async fn test_stats() {
        let store = store();
        store
            .store(MemoryContent::note("first note"), "alice", None)
            .await
            .unwrap();
        let thought = ThoughtUnit::new("alice", "observed latency", ThoughtType::Observation);
        store
            .store(MemoryContent::Thought(thought), "alice", None)
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.records_by_type.get(&ContentType::Note), Some(&1));
        assert_eq!(stats.records_by_type.get(&ContentType::Thought), Some(&1));
        assert_eq!(stats.total_policies, 2);
    }
}
