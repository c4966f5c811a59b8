//! Record a short incident investigation, then recall and analyze it
//!
//! Run with: `cargo run -p sovra --example reasoning_memory_demo`

use sovra::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sovra=info,sovra_rag=info,sovra_graph=info".into()),
        )
        .init();

    let config = CoreConfig::from_env()?;
    let memory = ReasoningMemory::new(Arc::new(HashEmbeddingProvider::new(256)), &config);

    let seen = ThoughtUnit::new(
        "sre-agent",
        "Checkout latency spiked right after the payments deploy",
        ThoughtType::Observation,
    )
    .with_confidence(0.9)
    .with_tags(["incident", "payments"]);
    let cause = ThoughtUnit::new(
        "sre-agent",
        "The new payments client opens a connection per request",
        ThoughtType::Reasoning,
    )
    .with_confidence(0.7)
    .with_parents([seen.id.clone()]);
    let doubt = ThoughtUnit::new(
        "sre-agent",
        "Latency also rose in regions without the deploy",
        ThoughtType::Critique,
    )
    .with_confidence(0.5)
    .with_parents([seen.id.clone()]);
    let plan = ThoughtUnit::new(
        "sre-agent",
        "Roll back payments and enable connection pooling",
        ThoughtType::Plan,
    )
    .with_confidence(0.85)
    .with_parents([cause.id.clone(), doubt.id.clone()]);

    for thought in [seen.clone(), cause.clone(), doubt.clone(), plan.clone()] {
        let recorded = memory.record_thought(thought, None).await?;
        println!(
            "recorded {} at depth {} ({} parent links)",
            recorded.node.id(),
            recorded.node.depth,
            recorded.relationships.len()
        );
    }
    memory.relate(&doubt.id, &cause.id, RelationshipType::Critique, 0.6)?;

    println!("\nreasoning chain behind the plan:");
    for step in memory.reasoning_chain(&plan.id)? {
        println!("  [{}] {}", step.thought_type, step.content);
    }

    let hits = memory
        .search(
            &MemoryQuery::hybrid("payments connection latency", Requester::agent("sre-agent"))
                .with_limit(3),
        )
        .await?;
    println!("\ntop {} of {} memories:", hits.len(), hits.total_matches);
    for hit in &hits.results {
        println!(
            "  {:.3} (relevance {:.3}, importance {:.2}) {}",
            hit.score,
            hit.relevance,
            hit.importance,
            hit.record.content
        );
    }

    let stats = memory.graph().stats();
    println!(
        "\ngraph: {} nodes, {} edges, max depth {}, {} cycles",
        stats.node_count,
        stats.edge_count,
        stats.max_depth,
        memory.graph().detect_cycles().len()
    );
    println!("{}", memory.graph().export_graph(ExportFormat::Graphviz).render()?);

    Ok(())
}
