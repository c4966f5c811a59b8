//! Graph serializations for downstream visualization tools

use crate::error::{GraphError, GraphResult};
use crate::store::GraphInner;
use serde::Serialize;
use serde_json::{json, Value};
use sovra_rag::thought::RelationshipType;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Characters of content kept in previews
const PREVIEW_CHARS: usize = 100;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `{"nodes": [...], "edges": [...]}`
    Json,
    /// DOT digraph text
    Graphviz,
    /// Cytoscape.js elements array
    Cytoscape,
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Graphviz => "graphviz",
            Self::Cytoscape => "cytoscape",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "graphviz" => Ok(Self::Graphviz),
            "cytoscape" => Ok(Self::Cytoscape),
            _ => Err(GraphError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// An exported graph
#[derive(Debug, Clone, PartialEq)]
pub enum GraphExport {
    /// Nodes and edges document
    Json(Value),
    /// DOT source
    Graphviz(String),
    /// Elements array
    Cytoscape(Value),
}

impl GraphExport {
    /// Format this export was produced in
    pub fn format(&self) -> ExportFormat {
        match self {
            Self::Json(_) => ExportFormat::Json,
            Self::Graphviz(_) => ExportFormat::Graphviz,
            Self::Cytoscape(_) => ExportFormat::Cytoscape,
        }
    }

    /// Text form, pretty-printed for the JSON formats
    pub fn render(&self) -> GraphResult<String> {
        match self {
            Self::Json(value) | Self::Cytoscape(value) => Ok(serde_json::to_string_pretty(value)?),
            Self::Graphviz(dot) => Ok(dot.clone()),
        }
    }
}

struct ExportEdge {
    id: String,
    source: String,
    target: String,
    kind: &'static str,
    strength: f64,
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

fn dot_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Relationships followed by parent links no `parent_child` relationship covers
fn collect_edges(inner: &GraphInner) -> Vec<ExportEdge> {
    let mut edges: Vec<ExportEdge> = inner
        .relationships
        .iter()
        .map(|rel| ExportEdge {
            id: rel.id.clone(),
            source: rel.source_id.clone(),
            target: rel.target_id.clone(),
            kind: rel.relationship_type.as_str(),
            strength: rel.strength,
        })
        .collect();

    let declared: HashSet<(&str, &str)> = inner
        .relationships
        .iter()
        .filter(|rel| rel.relationship_type == RelationshipType::ParentChild)
        .map(|rel| (rel.source_id.as_str(), rel.target_id.as_str()))
        .collect();

    for node in inner.ordered_nodes() {
        for parent in &node.thought.parent_thought_ids {
            if !inner.nodes.contains_key(parent) || declared.contains(&(parent.as_str(), node.id())) {
                continue;
            }
            edges.push(ExportEdge {
                id: format!("{}->{}", parent, node.id()),
                source: parent.clone(),
                target: node.id().to_string(),
                kind: RelationshipType::ParentChild.as_str(),
                strength: 1.0,
            });
        }
    }

    edges
}

pub(crate) fn export(inner: &GraphInner, format: ExportFormat) -> GraphExport {
    let edges = collect_edges(inner);
    match format {
        ExportFormat::Json => GraphExport::Json(to_json(inner, &edges)),
        ExportFormat::Graphviz => GraphExport::Graphviz(to_dot(inner, &edges)),
        ExportFormat::Cytoscape => GraphExport::Cytoscape(to_cytoscape(inner, &edges)),
    }
}

fn to_json(inner: &GraphInner, edges: &[ExportEdge]) -> Value {
    let nodes: Vec<Value> = inner
        .ordered_nodes()
        .map(|node| {
            let thought = &node.thought;
            json!({
                "id": thought.id,
                "content": preview(&thought.content),
                "type": thought.thought_type.as_str(),
                "confidence": thought.confidence,
                "confidenceBand": thought.confidence_band,
                "agentId": thought.agent_id,
                "depth": node.depth,
                "inDegree": node.in_degree,
                "outDegree": node.out_degree,
                "tags": thought.tags,
                "createdAt": thought.created_at.to_rfc3339(),
            })
        })
        .collect();

    let edges: Vec<Value> = edges
        .iter()
        .map(|edge| {
            json!({
                "id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "type": edge.kind,
                "strength": edge.strength,
            })
        })
        .collect();

    json!({ "nodes": nodes, "edges": edges })
}

fn to_dot(inner: &GraphInner, edges: &[ExportEdge]) -> String {
    let mut dot = String::from("digraph ReasoningGraph {\n");
    dot.push_str("  rankdir=TB;\n");
    dot.push_str("  node [shape=box, style=rounded];\n");

    for node in inner.ordered_nodes() {
        let thought = &node.thought;
        dot.push_str(&format!(
            "  \"{}\" [label=\"{}\\n{}\"];\n",
            dot_escape(&thought.id),
            thought.thought_type,
            dot_escape(&preview(&thought.content)),
        ));
    }
    for edge in edges {
        dot.push_str(&format!(
            "  \"{}\" -> \"{}\" [label=\"{}\", weight={:.2}];\n",
            dot_escape(&edge.source),
            dot_escape(&edge.target),
            edge.kind,
            edge.strength,
        ));
    }

    dot.push_str("}\n");
    dot
}

fn to_cytoscape(inner: &GraphInner, edges: &[ExportEdge]) -> Value {
    let mut elements: Vec<Value> = inner
        .ordered_nodes()
        .map(|node| {
            let thought = &node.thought;
            json!({
                "group": "nodes",
                "data": {
                    "id": thought.id,
                    "label": preview(&thought.content),
                    "type": thought.thought_type.as_str(),
                    "confidence": thought.confidence,
                    "depth": node.depth,
                }
            })
        })
        .collect();

    elements.extend(edges.iter().map(|edge| {
        json!({
            "group": "edges",
            "data": {
                "id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "type": edge.kind,
                "strength": edge.strength,
            }
        })
    }));

    Value::Array(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing_is_closed() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("Graphviz".parse::<ExportFormat>().unwrap(), ExportFormat::Graphviz);
        assert_eq!("cytoscape".parse::<ExportFormat>().unwrap(), ExportFormat::Cytoscape);
        assert!(matches!(
            "yaml".parse::<ExportFormat>(),
            Err(GraphError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_dot_escape() {
        assert_eq!(dot_escape("say \"hi\"\nnow"), "say \\\"hi\\\"\\nnow");
    }
}
