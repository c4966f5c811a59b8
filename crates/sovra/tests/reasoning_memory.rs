//! End-to-end recording, recall and analysis through `ReasoningMemory`

use sovra::prelude::*;
use sovra_rag::embedding::ProviderEmbedding;
use std::result::Result;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn reasoning_memory() -> ReasoningMemory {
    ReasoningMemory::new(Arc::new(HashEmbeddingProvider::new(128)), &CoreConfig::default())
}

struct UnreachableProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for UnreachableProvider {
    async fn embed(&self, _text: &str) -> Result<ProviderEmbedding, ProviderError> {
        Err(ProviderError::Network("connection refused".to_string()))
    }

    fn model_name(&self) -> &str {
        "unreachable"
    }

    fn dimensions(&self) -> usize {
        8
    }
}

#[tokio::test]
async fn parents_become_weighted_relationships() {
    init_tracing();
    let memory = reasoning_memory();

    let seen = ThoughtUnit::new("planner", "Disk usage crossed ninety percent", ThoughtType::Observation);
    let plan = ThoughtUnit::new("planner", "Rotate and compress old logs", ThoughtType::Plan)
        .with_confidence(0.75)
        .with_parents([seen.id.clone()]);

    let first = memory.record_thought(seen.clone(), None).await.unwrap();
    assert!(first.relationships.is_empty());
    assert_eq!(first.node.depth, 0);

    let second = memory.record_thought(plan.clone(), None).await.unwrap();
    assert_eq!(second.node.depth, 1);
    assert_eq!(second.node.path, vec![seen.id.clone(), plan.id.clone()]);
    assert_eq!(second.relationships.len(), 1);
    let link = &second.relationships[0];
    assert_eq!(link.relationship_type, RelationshipType::ParentChild);
    assert_eq!(link.source_id, seen.id);
    assert_eq!(link.target_id, plan.id);
    assert!((link.strength - 0.75).abs() < 1e-9);

    let record = memory
        .memory()
        .get(&second.record_id, &Requester::agent("planner"))
        .await
        .unwrap();
    assert_eq!(record.source_id, plan.id);
    assert_eq!(record.content_type, ContentType::Thought);

    let chain: Vec<String> = memory
        .reasoning_chain(&plan.id)
        .unwrap()
        .into_iter()
        .map(|t| t.id)
        .collect();
    assert_eq!(chain, vec![seen.id, plan.id]);
}

#[tokio::test]
async fn recording_twice_is_rejected_before_storage() {
    init_tracing();
    let memory = reasoning_memory();
    let thought = ThoughtUnit::new("planner", "Cache hit ratio dropped", ThoughtType::Observation);

    assert_ok!(memory.record_thought(thought.clone(), None).await);
    let err = assert_err!(memory.record_thought(thought, None).await);
    assert!(matches!(err, Error::Graph(_)));
    assert!(!err.is_retryable());

    let stats = memory.memory().stats().await.unwrap();
    assert_eq!(stats.total_records, 1);
}

#[tokio::test]
async fn provider_failure_leaves_both_stores_untouched() {
    init_tracing();
    let memory = ReasoningMemory::new(Arc::new(UnreachableProvider), &CoreConfig::default());
    let thought = ThoughtUnit::new("planner", "Replica lag is rising", ThoughtType::Observation);

    let err = assert_err!(memory.record_thought(thought.clone(), None).await);
    assert!(matches!(err, Error::Memory(SovraError::Provider { .. })));
    assert!(err.is_retryable());

    assert!(!memory.graph().contains(&thought.id));
    assert_eq!(memory.memory().stats().await.unwrap().total_records, 0);
}

#[tokio::test]
async fn trace_thoughts_are_indexed_once() {
    init_tracing();
    let memory = reasoning_memory();

    let seen = ThoughtUnit::new("oncall", "Nightly export job failed", ThoughtType::Observation);
    memory.record_thought(seen.clone(), None).await.unwrap();

    let retry = ThoughtUnit::new("oncall", "Retry the export with a smaller batch", ThoughtType::Plan)
        .with_parents([seen.id.clone()]);
    let trace = ReasoningTrace::new("oncall", "Recover the nightly export")
        .with_thought(seen.clone())
        .with_thought(retry.clone())
        .with_action(TraceAction::new("rerun_export").with_param("batch", "500"))
        .completed(true);

    let record_id = memory.record_trace(trace, None).await.unwrap();
    assert_eq!(memory.graph().len(), 2);
    assert_eq!(memory.graph().get_thought(&retry.id).unwrap().id, retry.id);

    let record = memory
        .memory()
        .get(&record_id, &Requester::agent("oncall"))
        .await
        .unwrap();
    assert_eq!(record.content_type, ContentType::Trace);
    assert!(record.content.contains("Action: rerun_export batch=500"));
    assert!(record.importance >= 0.9);
}

#[tokio::test]
async fn trace_links_parents_like_single_thoughts() {
    init_tracing();
    let via_trace = reasoning_memory();
    let via_thoughts = reasoning_memory();

    let root = ThoughtUnit::new("oncall", "Disk alarms on the build host", ThoughtType::Observation);
    let fix = ThoughtUnit::new("oncall", "Prune stale build caches", ThoughtType::Plan)
        .with_confidence(0.65)
        .with_parents([root.id.clone()]);

    // child listed before its parent
    let trace = ReasoningTrace::new("oncall", "Free disk on the build host")
        .with_thought(fix.clone())
        .with_thought(root.clone())
        .completed(true);
    via_trace.record_trace(trace, None).await.unwrap();

    via_thoughts.record_thought(root.clone(), None).await.unwrap();
    via_thoughts.record_thought(fix.clone(), None).await.unwrap();

    for memory in [&via_trace, &via_thoughts] {
        let links = memory.graph().relationships_for(&fix.id);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].relationship_type, RelationshipType::ParentChild);
        assert_eq!(links[0].source_id, root.id);
        assert!((links[0].strength - 0.65).abs() < 1e-9);

        let node = memory.graph().get_node(&fix.id).unwrap();
        assert_eq!(node.in_degree, 1);
        assert_eq!(node.depth, 1);
    }
}

/// Yields once before embedding so concurrent writes interleave
struct YieldingProvider(HashEmbeddingProvider);

#[async_trait::async_trait]
impl EmbeddingProvider for YieldingProvider {
    async fn embed(&self, text: &str) -> Result<ProviderEmbedding, ProviderError> {
        tokio::task::yield_now().await;
        self.0.embed(text).await
    }

    fn model_name(&self) -> &str {
        self.0.model_name()
    }

    fn dimensions(&self) -> usize {
        self.0.dimensions()
    }
}

#[tokio::test]
async fn concurrent_duplicate_leaves_one_record() {
    init_tracing();
    let memory = ReasoningMemory::new(
        Arc::new(YieldingProvider(HashEmbeddingProvider::new(64))),
        &CoreConfig::default(),
    );
    let thought = ThoughtUnit::new("planner", "Shard the events table", ThoughtType::Plan);

    let (first, second) = tokio::join!(
        memory.record_thought(thought.clone(), None),
        memory.record_thought(thought.clone(), None)
    );
    assert_eq!(usize::from(first.is_ok()) + usize::from(second.is_ok()), 1);

    assert_eq!(memory.graph().len(), 1);
    assert_eq!(memory.memory().stats().await.unwrap().total_records, 1);
}

#[tokio::test]
async fn search_and_graph_analysis_agree() {
    init_tracing();
    let memory = reasoning_memory();

    let seen = ThoughtUnit::new("analyst", "Signup conversion fell after the pricing change", ThoughtType::Observation);
    let cause = ThoughtUnit::new("analyst", "The pricing page hides the free tier", ThoughtType::Reasoning)
        .with_parents([seen.id.clone()]);
    let doubt = ThoughtUnit::new("analyst", "Conversion also fell on mobile where pricing is unchanged", ThoughtType::Critique)
        .with_parents([seen.id.clone()]);
    for thought in [seen.clone(), cause.clone(), doubt.clone()] {
        memory.record_thought(thought, None).await.unwrap();
    }
    memory
        .relate(&doubt.id, &cause.id, RelationshipType::Contradiction, 0.6)
        .unwrap();
    assert!(memory
        .relate(&doubt.id, "missing", RelationshipType::Support, 0.5)
        .is_err());

    let hits = memory
        .search(&MemoryQuery::keyword("pricing conversion", Requester::agent("analyst")))
        .await
        .unwrap();
    assert_eq!(hits.total_matches, 3);

    let outsider = memory
        .search(&MemoryQuery::keyword("pricing conversion", Requester::agent("intruder")))
        .await
        .unwrap();
    assert!(outsider.is_empty());

    assert_eq!(memory.graph().find_connected_components().len(), 1);
    assert!(memory.graph().detect_cycles().is_empty());
    let stats = memory.graph().stats();
    assert_eq!(stats.node_count, 3);
    assert_eq!(stats.relationship_count, 3);
}
