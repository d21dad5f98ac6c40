//! Runner commands. Each takes the explicit [`Config`] plus file paths,
//! calls into `kgrec_algo`, and returns the result for rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use kgrec_algo::{
    enrich_with_table, plan, rank_candidates, recommend, select_weakest, AlgoError,
    EnrichedKnowledgeGraph, ItemCatalog, ItemId, LearnerId, MasteryCalculator, MasteryTable,
    RankedItems, Recommendation, RecommendationPlan, WeakestPoints,
};

use crate::config::Config;
use crate::io::{self, IoError};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Algo(#[from] AlgoError),
    #[error("item {0} not found in item parameters")]
    ItemNotFound(String),
}

pub fn run_mastery(
    config: &Config,
    responses: &Path,
    student_id: &LearnerId,
    output: Option<&Path>,
) -> Result<MasteryTable, CommandError> {
    let records = io::load_responses(&config.resolve(responses))?;
    let table = MasteryCalculator::new(config.mastery_config()).compute(&records, student_id)?;

    let out = output
        .map(|p| config.resolve(p))
        .unwrap_or_else(|| io::default_mastery_path(&config.data_dir, student_id));
    io::write_json(&out, &table)?;
    Ok(table)
}

pub fn run_enrich(
    config: &Config,
    graph: &Path,
    mastery: &Path,
    output: Option<&Path>,
) -> Result<EnrichedKnowledgeGraph, CommandError> {
    let graph = io::load_graph(&config.resolve(graph))?;
    let table: MasteryTable = io::read_json(&config.resolve(mastery))?;
    let enriched = enrich_with_table(&graph, &table);

    let out = output
        .map(|p| config.resolve(p))
        .unwrap_or_else(|| io::default_enriched_path(&config.data_dir));
    io::write_json(&out, &enriched)?;
    Ok(enriched)
}

pub fn run_weakest(config: &Config, enriched: &Path) -> Result<WeakestPoints, CommandError> {
    let enriched: EnrichedKnowledgeGraph = io::read_json(&config.resolve(enriched))?;
    Ok(select_weakest(&enriched)?)
}

/// Rank the given items (all items when `item_ids` is empty)
pub fn run_rank(
    config: &Config,
    items: &Path,
    abilities: &Path,
    student_id: &LearnerId,
    item_ids: &[String],
) -> Result<RankedItems, CommandError> {
    let all_items = io::load_items(&config.resolve(items))?;
    let catalog = ItemCatalog::from_parts(
        Vec::new(),
        all_items.iter().cloned(),
        io::load_abilities(&config.resolve(abilities))?,
    );
    let ability = catalog.ability(student_id)?;

    let pool = if item_ids.is_empty() {
        all_items
    } else {
        item_ids
            .iter()
            .map(|id| {
                let id = ItemId::new(id);
                catalog
                    .item(&id)
                    .cloned()
                    .ok_or_else(|| CommandError::ItemNotFound(id.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(rank_candidates(&pool, ability))
}

#[derive(Debug, Clone)]
pub struct RecommendInputs {
    pub responses: PathBuf,
    pub graph: PathBuf,
    pub links: PathBuf,
    pub items: PathBuf,
    pub abilities: PathBuf,
}

#[derive(Debug)]
pub enum RecommendOutcome {
    /// No knowledge point chosen yet; the caller picks from the candidates
    Candidates(RecommendationPlan),
    Ranked(Recommendation),
}

pub fn run_recommend(
    config: &Config,
    inputs: &RecommendInputs,
    student_id: &LearnerId,
    chosen: Option<&str>,
) -> Result<RecommendOutcome, CommandError> {
    let records = io::load_responses(&config.resolve(&inputs.responses))?;
    let graph = io::load_graph(&config.resolve(&inputs.graph))?;
    let plan = plan(&records, &graph, student_id, &config.mastery_config())?;

    let Some(chosen) = chosen else {
        return Ok(RecommendOutcome::Candidates(plan));
    };

    let catalog = io::load_catalog(
        &config.resolve(&inputs.links),
        &config.resolve(&inputs.items),
        &config.resolve(&inputs.abilities),
        Some(&graph),
    )?;
    let rec = recommend(&plan, chosen, &catalog, &config.ranking_config())?;
    Ok(RecommendOutcome::Ranked(rec))
}

// ============================================================================
// Text rendering
// ============================================================================

pub fn render_mastery(table: &MasteryTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "student {}", table.student_id);
    let _ = writeln!(out, "{:<24} | {:>12} | {:>5}", "knowledge_point", "correct_rate", "level");
    for row in &table.rows {
        let rate = row
            .correct_rate
            .map_or_else(|| "-".to_string(), |r| format!("{r:.4}"));
        let _ = writeln!(
            out,
            "{:<24} | {:>12} | {:>5}",
            row.knowledge_point, rate, row.mastery_level
        );
    }
    for flagged in &table.flagged_rows {
        let counted = flagged
            .counted_as
            .map_or_else(|| "not counted".to_string(), |o| format!("counted as {o:?}"));
        let _ = writeln!(out, "row {}: outcome {} {}", flagged.row, flagged.raw, counted);
    }
    out
}

pub fn render_histogram(graph: &EnrichedKnowledgeGraph) -> String {
    let mut out = String::new();
    for (level, count) in graph.level_histogram().iter().enumerate() {
        let label = kgrec_algo::MasteryLevel::new(level as u8)
            .map(|l| l.band_label())
            .unwrap_or_default();
        let _ = writeln!(out, "level {level} ({label}): {count}");
    }
    out
}

pub fn render_weakest(weakest: &WeakestPoints) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "weakest mastery level: {}", weakest.min_level);
    for id in weakest.sorted_ids() {
        let _ = writeln!(out, "  {id}");
    }
    out
}

pub fn render_ranked(ranked: &RankedItems) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<30} | {:<12}", "item_id", "P(theta)");
    let _ = writeln!(out, "{}", "-".repeat(45));
    for item in &ranked.ranked {
        let _ = writeln!(out, "{:<30} | {:<12.4}", item.item_id.as_str(), item.probability);
    }
    for failure in &ranked.failures {
        let _ = writeln!(out, "{:<30} | failed: {}", failure.item_id.as_str(), failure.reason);
    }
    out
}
