//! Weak Point Selector
//!
//! Finds the lowest mastery level above 0 and every knowledge point at that
//! level. Unattempted points (level 0) never take part.

use std::collections::{HashMap, HashSet};

use crate::error::AlgoError;
use crate::types::{EnrichedKnowledgeGraph, MasteryLevel, MasteryTable, WeakestPoints};

/// Anything that can list `(knowledge point, level)` pairs
pub trait MasterySource {
    fn mastery_levels(&self) -> Box<dyn Iterator<Item = (&str, MasteryLevel)> + '_>;
}

impl MasterySource for EnrichedKnowledgeGraph {
    fn mastery_levels(&self) -> Box<dyn Iterator<Item = (&str, MasteryLevel)> + '_> {
        Box::new(self.nodes.iter().map(|n| (n.id.as_str(), n.mastery_level)))
    }
}

impl MasterySource for MasteryTable {
    fn mastery_levels(&self) -> Box<dyn Iterator<Item = (&str, MasteryLevel)> + '_> {
        Box::new(
            self.rows
                .iter()
                .map(|r| (r.knowledge_point.as_str(), r.mastery_level)),
        )
    }
}

impl MasterySource for HashMap<String, MasteryLevel> {
    fn mastery_levels(&self) -> Box<dyn Iterator<Item = (&str, MasteryLevel)> + '_> {
        Box::new(self.iter().map(|(id, level)| (id.as_str(), *level)))
    }
}

pub fn select_weakest<S: MasterySource + ?Sized>(source: &S) -> Result<WeakestPoints, AlgoError> {
    let min_level = source
        .mastery_levels()
        .map(|(_, level)| level)
        .filter(|level| level.is_attempted())
        .min()
        .ok_or(AlgoError::NoEligibleCandidate)?;

    let candidate_ids: HashSet<String> = source
        .mastery_levels()
        .filter(|(_, level)| *level == min_level)
        .map(|(id, _)| id.to_string())
        .collect();

    tracing::debug!(
        min_level = min_level.value(),
        candidates = candidate_ids.len(),
        "weakest knowledge points selected"
    );

    Ok(WeakestPoints {
        min_level,
        candidate_ids,
    })
}

impl WeakestPoints {
    /// Validate an externally chosen knowledge point against the candidate set
    pub fn choose<'a>(&self, knowledge_point: &'a str) -> Result<&'a str, AlgoError> {
        if self.contains(knowledge_point) {
            Ok(knowledge_point)
        } else {
            Err(AlgoError::NotACandidate(knowledge_point.to_string()))
        }
    }
}
