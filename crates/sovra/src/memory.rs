//! Reasoning memory: the three components wired along the write path
//!
//! A recorded thought is embedded and persisted as a memory record first; only
//! once that succeeds is it indexed in the reasoning graph, so a provider
//! failure leaves both stores untouched. If indexing then fails the record is
//! removed again.

use crate::error::Result;
use sovra_graph::{GraphError, GraphNode, ReasoningGraphStore};
use sovra_rag::config::CoreConfig;
use sovra_rag::embedding::{EmbeddingGateway, EmbeddingProvider};
use sovra_rag::memory::{
    IdentityResolver, MemoryContent, MemoryQuery, Requester, SearchResults, SemanticMemoryStore,
};
use sovra_rag::thought::{ReasoningTrace, RelationshipType, ThoughtRelationship, ThoughtUnit};
use std::sync::Arc;

/// Outcome of [`ReasoningMemory::record_thought`]
#[derive(Debug, Clone)]
pub struct RecordedThought {
    /// Id of the memory record holding the thought
    pub record_id: String,
    /// The thought's place in the reasoning graph
    pub node: GraphNode,
    /// `parent_child` relationships created for parents already in the graph
    pub relationships: Vec<ThoughtRelationship>,
}

/// Embedding gateway, semantic memory and reasoning graph behind one handle
pub struct ReasoningMemory {
    memory: SemanticMemoryStore,
    graph: ReasoningGraphStore,
}

impl ReasoningMemory {
    /// Build all components over in-memory storage
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &CoreConfig) -> Self {
        let gateway = Arc::new(EmbeddingGateway::new(provider, &config.embedding));
        Self {
            memory: SemanticMemoryStore::new(gateway, config.search.clone()),
            graph: ReasoningGraphStore::new(),
        }
    }

    /// Compose pre-built stores
    pub fn from_parts(memory: SemanticMemoryStore, graph: ReasoningGraphStore) -> Self {
        Self { memory, graph }
    }

    /// Resolve trust levels for access policies through `resolver`
    pub fn with_identity_resolver(mut self, resolver: Arc<dyn IdentityResolver>) -> Self {
        self.memory = self.memory.with_identity_resolver(resolver);
        self
    }

    /// The semantic memory store
    pub fn memory(&self) -> &SemanticMemoryStore {
        &self.memory
    }

    /// The reasoning graph
    pub fn graph(&self) -> &ReasoningGraphStore {
        &self.graph
    }

    /// The embedding gateway
    pub fn gateway(&self) -> &EmbeddingGateway {
        self.memory.gateway()
    }

    /// Persist a thought and index it in the reasoning graph
    ///
    /// Each parent already in the graph gets a `parent_child` relationship
    /// whose strength is the thought's confidence.
    pub async fn record_thought(
        &self,
        thought: ThoughtUnit,
        access_policy_id: Option<&str>,
    ) -> Result<RecordedThought> {
        thought.validate()?;
        if self.graph.contains(&thought.id) {
            return Err(GraphError::validation(
                "id",
                format!("thought {} was already recorded", thought.id),
            )
            .into());
        }

        let agent_id = thought.agent_id.clone();
        let record_id = self
            .memory
            .store(MemoryContent::Thought(thought.clone()), &agent_id, access_policy_id)
            .await?;

        let confidence = thought.confidence;
        let parents = thought.parent_thought_ids.clone();
        let node = match self.graph.add_thought(thought) {
            Ok(node) => node,
            Err(e) => {
                self.discard_record(&record_id, &agent_id).await;
                return Err(e.into());
            }
        };
        let relationships = self.link_parents(node.id(), &parents, confidence)?;

        tracing::info!(
            thought_id = %node.id(),
            record_id = %record_id,
            depth = node.depth,
            "Recorded thought"
        );
        Ok(RecordedThought {
            record_id,
            node,
            relationships,
        })
    }

    /// Persist a finished trace and index its thoughts not yet in the graph
    pub async fn record_trace(
        &self,
        trace: ReasoningTrace,
        access_policy_id: Option<&str>,
    ) -> Result<String> {
        trace.validate()?;
        let agent_id = trace.agent_id.clone();
        let thoughts = trace.thoughts.clone();
        let trace_id = trace.id.clone();

        let record_id = self
            .memory
            .store(MemoryContent::Trace(trace), &agent_id, access_policy_id)
            .await?;

        let mut indexed = Vec::new();
        for thought in thoughts {
            if self.graph.contains(&thought.id) {
                continue;
            }
            let links = (thought.parent_thought_ids.clone(), thought.confidence);
            match self.graph.add_thought(thought) {
                Ok(node) => indexed.push((node.thought.id, links)),
                Err(e) => {
                    self.discard_record(&record_id, &agent_id).await;
                    return Err(e.into());
                }
            }
        }
        // parents may appear later in the trace than their children
        for (id, (parents, confidence)) in &indexed {
            self.link_parents(id, parents, *confidence)?;
        }

        tracing::info!(
            trace_id = %trace_id,
            record_id = %record_id,
            indexed_thoughts = indexed.len(),
            "Recorded reasoning trace"
        );
        Ok(record_id)
    }

    /// `parent_child` relationships from each known parent, weighted by confidence
    fn link_parents(
        &self,
        child_id: &str,
        parents: &[String],
        confidence: f64,
    ) -> Result<Vec<ThoughtRelationship>> {
        let mut relationships = Vec::new();
        for parent in parents.iter().filter(|p| self.graph.contains(p)) {
            relationships.push(self.graph.create_relationship(
                parent,
                child_id,
                RelationshipType::ParentChild,
                confidence,
            )?);
        }
        Ok(relationships)
    }

    async fn discard_record(&self, record_id: &str, agent_id: &str) {
        if let Err(e) = self.memory.delete(record_id, &Requester::agent(agent_id)).await {
            tracing::warn!(
                record_id = %record_id,
                error = %e,
                "Failed to remove memory record after graph indexing failed"
            );
        }
    }

    /// Link two recorded thoughts
    pub fn relate(
        &self,
        source_id: &str,
        target_id: &str,
        relationship_type: RelationshipType,
        strength: f64,
    ) -> Result<ThoughtRelationship> {
        Ok(self
            .graph
            .create_relationship(source_id, target_id, relationship_type, strength)?)
    }

    /// Ranked search over memory records
    pub async fn search(&self, query: &MemoryQuery) -> Result<SearchResults> {
        Ok(self.memory.search(query).await?)
    }

    /// The thought and its ancestors, roots first
    pub fn reasoning_chain(&self, thought_id: &str) -> Result<Vec<ThoughtUnit>> {
        Ok(self.graph.get_reasoning_chain(thought_id)?)
    }
}
