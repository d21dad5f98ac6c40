//! Graph Enricher
//!
//! Annotates every knowledge graph node with the learner's mastery level.
//! Nodes without a mastery record get level 0. Edges pass through untouched.

use std::collections::HashMap;

use crate::types::{
    EnrichedKnowledgeGraph, KnowledgeGraph, KnowledgeGraphNode, MasteryLevel, MasteryTable,
};

impl MasteryTable {
    /// Knowledge point to level map consumed by [`enrich`]
    pub fn level_map(&self) -> HashMap<String, MasteryLevel> {
        self.rows
            .iter()
            .map(|row| (row.knowledge_point.clone(), row.mastery_level))
            .collect()
    }
}

/// Total over any mapping; missing entries are level 0
pub fn enrich(
    graph: &KnowledgeGraph,
    mastery: &HashMap<String, MasteryLevel>,
) -> EnrichedKnowledgeGraph {
    let nodes: Vec<KnowledgeGraphNode> = graph
        .nodes
        .iter()
        .map(|id| KnowledgeGraphNode {
            id: id.clone(),
            mastery_level: mastery
                .get(id.as_str())
                .copied()
                .unwrap_or(MasteryLevel::UNATTEMPTED),
        })
        .collect();

    let annotated = nodes.iter().filter(|n| n.mastery_level.is_attempted()).count();
    tracing::debug!(
        nodes = nodes.len(),
        edges = graph.edges.len(),
        annotated,
        "knowledge graph enriched"
    );

    EnrichedKnowledgeGraph {
        nodes,
        edges: graph.edges.clone(),
    }
}

/// Shorthand for `enrich(graph, &table.level_map())`
pub fn enrich_with_table(graph: &KnowledgeGraph, table: &MasteryTable) -> EnrichedKnowledgeGraph {
    enrich(graph, &table.level_map())
}
