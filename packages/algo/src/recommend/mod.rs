//! Recommendation Pipeline
//!
//! MasteryCalculator → GraphEnricher → WeakPointSelector → (caller picks a
//! candidate) → AbilityScorer.
//!
//! [`plan`] runs the first three stages. The caller chooses one of the
//! weakest knowledge points and passes it to [`recommend`], which resolves
//! that point's items and the learner's ability through an [`ItemCatalog`]
//! and ranks them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::{MasteryConfig, RankingConfig};
use crate::error::{AlgoError, ItemFailureReason};
use crate::graph::enrich_with_table;
use crate::irt::AbilityScorer;
use crate::mastery::MasteryCalculator;
use crate::selection::select_weakest;
use crate::types::{
    EnrichedKnowledgeGraph, IrtItem, ItemFailure, ItemId, KnowledgeGraph, LearnerAbility,
    LearnerId, MasteryTable, RankedItems, ResponseRecord, WeakestPoints,
};

/// One knowledge point to item association
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeLink {
    #[serde(alias = "entity_name")]
    pub knowledge_point: String,
    #[serde(alias = "question_id")]
    pub item_id: ItemId,
}

/// Lookup tables joined from the item bank
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    links: HashMap<String, Vec<ItemId>>,
    items: HashMap<ItemId, IrtItem>,
    abilities: HashMap<LearnerId, LearnerAbility>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        links: impl IntoIterator<Item = KnowledgeLink>,
        items: impl IntoIterator<Item = IrtItem>,
        abilities: impl IntoIterator<Item = LearnerAbility>,
    ) -> Self {
        let mut catalog = Self::new();
        for link in links {
            catalog.link(&link.knowledge_point, link.item_id);
        }
        for item in items {
            catalog.add_item(item);
        }
        for ability in abilities {
            catalog.add_ability(ability);
        }
        catalog
    }

    /// Register a knowledge point that may have no linked items yet
    pub fn add_knowledge_point(&mut self, knowledge_point: &str) {
        self.links.entry(knowledge_point.to_string()).or_default();
    }

    /// Duplicate links are ignored; first-seen order is kept
    pub fn link(&mut self, knowledge_point: &str, item_id: ItemId) {
        let ids = self.links.entry(knowledge_point.to_string()).or_default();
        if !ids.contains(&item_id) {
            ids.push(item_id);
        }
    }

    /// A later row for the same id replaces the earlier one
    pub fn add_item(&mut self, item: IrtItem) {
        self.items.insert(item.item_id.clone(), item);
    }

    pub fn add_ability(&mut self, ability: LearnerAbility) {
        self.abilities.insert(ability.student_id.clone(), ability);
    }

    pub fn linked_item_ids(&self, knowledge_point: &str) -> Result<&[ItemId], AlgoError> {
        let ids = self
            .links
            .get(knowledge_point)
            .ok_or_else(|| AlgoError::KnowledgePointNotFound(knowledge_point.to_string()))?;
        if ids.is_empty() {
            return Err(AlgoError::NoLinkedItems(knowledge_point.to_string()));
        }
        Ok(ids)
    }

    /// Items of a knowledge point. Linked ids without a parameter row are
    /// returned as `MissingParameters` failures.
    pub fn items_for(
        &self,
        knowledge_point: &str,
    ) -> Result<(Vec<IrtItem>, Vec<ItemFailure>), AlgoError> {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for id in self.linked_item_ids(knowledge_point)? {
            match self.items.get(id) {
                Some(item) => found.push(item.clone()),
                None => missing.push(ItemFailure {
                    item_id: id.clone(),
                    reason: ItemFailureReason::MissingParameters,
                }),
            }
        }
        Ok((found, missing))
    }

    pub fn ability(&self, student_id: &LearnerId) -> Result<&LearnerAbility, AlgoError> {
        self.abilities
            .get(student_id)
            .ok_or_else(|| AlgoError::AbilityNotFound(student_id.clone()))
    }

    pub fn item(&self, item_id: &ItemId) -> Option<&IrtItem> {
        self.items.get(item_id)
    }
}

/// Output of the first three pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationPlan {
    pub mastery: MasteryTable,
    pub graph: EnrichedKnowledgeGraph,
    pub weakest: WeakestPoints,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub student_id: LearnerId,
    pub knowledge_point: String,
    pub ability: LearnerAbility,
    #[serde(flatten)]
    pub items: RankedItems,
}

pub fn plan(
    records: &[ResponseRecord],
    graph: &KnowledgeGraph,
    student_id: &LearnerId,
    config: &MasteryConfig,
) -> Result<RecommendationPlan, AlgoError> {
    let mastery = MasteryCalculator::new(config.clone()).compute(records, student_id)?;
    let enriched = enrich_with_table(graph, &mastery);
    let weakest = select_weakest(&enriched)?;

    tracing::info!(
        student_id = %student_id,
        knowledge_points = mastery.len(),
        min_level = weakest.min_level.value(),
        candidates = weakest.candidate_ids.len(),
        "recommendation plan ready"
    );

    Ok(RecommendationPlan {
        mastery,
        graph: enriched,
        weakest,
    })
}

/// Rank the items of an already chosen weakest knowledge point
pub fn recommend(
    plan: &RecommendationPlan,
    chosen: &str,
    catalog: &ItemCatalog,
    config: &RankingConfig,
) -> Result<Recommendation, AlgoError> {
    let knowledge_point = plan.weakest.choose(chosen)?;
    let student_id = &plan.mastery.student_id;
    let ability = catalog.ability(student_id)?;
    let (items, missing) = catalog.items_for(knowledge_point)?;

    let mut ranked = AbilityScorer::new(config.clone()).rank(&items, ability);
    ranked.failures.extend(missing);

    Ok(Recommendation {
        student_id: student_id.clone(),
        knowledge_point: knowledge_point.to_string(),
        ability: ability.clone(),
        items: ranked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnowledgeEdge, RawOutcome};

    fn records() -> Vec<ResponseRecord> {
        vec![
            ResponseRecord::new("s1", "时态", Some(RawOutcome::Code(1))),
            ResponseRecord::new("s1", "从句,时态", Some(RawOutcome::Code(-1))),
            ResponseRecord::new("s1", "定语从句", Some(RawOutcome::Code(-1))),
        ]
    }

    fn graph() -> KnowledgeGraph {
        KnowledgeGraph {
            nodes: vec![
                "时态".into(),
                "从句".into(),
                "定语从句".into(),
                "非谓语动词".into(),
            ],
            edges: vec![KnowledgeEdge::new("从句", "prerequisite", "定语从句")],
        }
    }

    fn catalog() -> ItemCatalog {
        ItemCatalog::from_parts(
            vec![
                KnowledgeLink { knowledge_point: "从句".into(), item_id: "q1".into() },
                KnowledgeLink { knowledge_point: "从句".into(), item_id: "q2".into() },
                KnowledgeLink { knowledge_point: "从句".into(), item_id: "q1".into() },
                KnowledgeLink { knowledge_point: "从句".into(), item_id: "q9".into() },
                KnowledgeLink { knowledge_point: "时态".into(), item_id: "q3".into() },
            ],
            vec![
                IrtItem::new("q1", 1.0, 1.0, 0.2),
                IrtItem::new("q2", 1.0, -1.0, 0.2),
                IrtItem::new("q3", 1.0, 0.0, 0.2),
            ],
            vec![LearnerAbility::new("s1", 0.0)],
        )
    }

    #[test]
    fn test_plan_finds_weakest_attempted() {
        let plan = plan(&records(), &graph(), &"s1".into(), &MasteryConfig::default()).unwrap();
        assert_eq!(plan.weakest.min_level.value(), 1);
        assert_eq!(plan.weakest.sorted_ids(), vec!["从句", "定语从句"]);
        assert_eq!(plan.graph.node("非谓语动词").unwrap().mastery_level.value(), 0);
    }

    #[test]
    fn test_plan_unknown_student() {
        let err = plan(&records(), &graph(), &"s2".into(), &MasteryConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::StudentNotFound("s2".into()));
    }

    #[test]
    fn test_plan_no_attempted_node_in_graph() {
        let g = KnowledgeGraph { nodes: vec!["虚拟语气".into()], edges: vec![] };
        let err = plan(&records(), &g, &"s1".into(), &MasteryConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::NoEligibleCandidate);
    }

    #[test]
    fn test_recommend_ranks_and_reports_missing() {
        let plan = plan(&records(), &graph(), &"s1".into(), &MasteryConfig::default()).unwrap();
        let rec = recommend(&plan, "从句", &catalog(), &RankingConfig::default()).unwrap();

        let order: Vec<&str> = rec.items.ranked.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(order, vec!["q2", "q1"]);
        assert_eq!(rec.items.failures.len(), 1);
        assert_eq!(rec.items.failures[0].item_id.as_str(), "q9");
        assert_eq!(rec.items.failures[0].reason, ItemFailureReason::MissingParameters);
    }

    #[test]
    fn test_recommend_rejects_non_candidate() {
        let plan = plan(&records(), &graph(), &"s1".into(), &MasteryConfig::default()).unwrap();
        let err = recommend(&plan, "时态", &catalog(), &RankingConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::NotACandidate("时态".into()));
    }

    #[test]
    fn test_recommend_candidate_without_links() {
        let plan = plan(&records(), &graph(), &"s1".into(), &MasteryConfig::default()).unwrap();
        let err = recommend(&plan, "定语从句", &catalog(), &RankingConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::KnowledgePointNotFound("定语从句".into()));

        let mut catalog = catalog();
        catalog.add_knowledge_point("定语从句");
        let err = recommend(&plan, "定语从句", &catalog, &RankingConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::NoLinkedItems("定语从句".into()));
    }

    #[test]
    fn test_recommend_missing_ability() {
        let plan = plan(&records(), &graph(), &"s1".into(), &MasteryConfig::default()).unwrap();
        let mut catalog = catalog();
        catalog.abilities.clear();
        let err = recommend(&plan, "从句", &catalog, &RankingConfig::default()).unwrap_err();
        assert_eq!(err, AlgoError::AbilityNotFound("s1".into()));
    }
}
