//! JSON file loaders and writers for the batch runner.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use kgrec_algo::{
    IrtItem, ItemCatalog, KnowledgeGraph, KnowledgeLink, LearnerAbility, LearnerId,
    ResponseRecord,
};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, IoError> {
    let raw = fs::read_to_string(path).map_err(|source| IoError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pretty JSON, non-ASCII kept as is; parent directories are created
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IoError> {
    let write_err = |source| IoError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(write_err)?;
    tracing::info!(path = %path.display(), "written");
    Ok(())
}

pub fn load_responses(path: &Path) -> Result<Vec<ResponseRecord>, IoError> {
    let records: Vec<ResponseRecord> = read_json(path)?;
    tracing::info!(path = %path.display(), rows = records.len(), "responses loaded");
    Ok(records)
}

pub fn load_graph(path: &Path) -> Result<KnowledgeGraph, IoError> {
    let graph: KnowledgeGraph = read_json(path)?;
    tracing::info!(
        path = %path.display(),
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "knowledge graph loaded"
    );
    Ok(graph)
}

pub fn load_items(path: &Path) -> Result<Vec<IrtItem>, IoError> {
    let items: Vec<IrtItem> = read_json(path)?;
    tracing::info!(path = %path.display(), items = items.len(), "item parameters loaded");
    Ok(items)
}

pub fn load_abilities(path: &Path) -> Result<Vec<LearnerAbility>, IoError> {
    read_json(path)
}

pub fn load_links(path: &Path) -> Result<Vec<KnowledgeLink>, IoError> {
    read_json(path)
}

/// Catalog from the link, item and ability files. Graph nodes, when given,
/// are registered as known knowledge points even without linked items.
pub fn load_catalog(
    links: &Path,
    items: &Path,
    abilities: &Path,
    graph: Option<&KnowledgeGraph>,
) -> Result<ItemCatalog, IoError> {
    let mut catalog =
        ItemCatalog::from_parts(load_links(links)?, load_items(items)?, load_abilities(abilities)?);
    if let Some(graph) = graph {
        for node in &graph.nodes {
            catalog.add_knowledge_point(node);
        }
    }
    Ok(catalog)
}

pub fn default_mastery_path(data_dir: &Path, student_id: &LearnerId) -> PathBuf {
    data_dir.join(format!("student_{student_id}_knowledge_mastery.json"))
}

pub fn default_enriched_path(data_dir: &Path) -> PathBuf {
    data_dir.join("enhanced_knowledge_graph.json")
}
