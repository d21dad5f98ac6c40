//! Common Types and Constants
//!
//! Shared data structures used across all algorithm modules.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{InvalidMasteryLevel, ItemFailureReason};
use crate::sanitize;

// ==================== Constants ====================

/// Credit given to a partially correct response
pub const PARTIAL_CREDIT: f64 = 0.5;

/// Upper bounds (exclusive) of mastery bands 1..=4; band 5 covers the rest
pub const MASTERY_BAND_UPPER: [f64; 4] = [0.2, 0.4, 0.6, 0.8];

/// Highest mastery level
pub const MAX_MASTERY_LEVEL: u8 = 5;

/// Largest float magnitude that still prints as an exact integer id
const MAX_EXACT_ID_FLOAT: f64 = 9.007_199_254_740_992e15;

// ==================== Identifiers ====================

/// Identifier normalized to a canonical trimmed string.
///
/// Source tables store learner and item ids as strings, integers or floats
/// (`5583697`, `"5583697 "`, `5583697.0`); all of them compare equal here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedId(String);

pub type LearnerId = NormalizedId;
pub type ItemId = NormalizedId;

impl NormalizedId {
    /// Integral float text (`"5583697.0"`) is normalized like a float id
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.contains('.') {
            if let Ok(value) = trimmed.parse::<f64>() {
                if value.is_finite() && value.fract() == 0.0 {
                    return Self::from_float(value);
                }
            }
        }
        Self(trimmed.to_string())
    }

    pub fn from_float(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_ID_FLOAT {
            Self(format!("{value:.0}"))
        } else {
            Self(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NormalizedId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for NormalizedId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<i64> for NormalizedId {
    fn from(raw: i64) -> Self {
        Self(raw.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl<'de> Deserialize<'de> for NormalizedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self::new(&s),
            RawId::Signed(v) => Self(v.to_string()),
            RawId::Unsigned(v) => Self(v.to_string()),
            RawId::Float(v) => Self::from_float(v),
        })
    }
}

// ==================== Responses ====================

/// Outcome of a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Correct,
    Partial,
    Incorrect,
}

impl Outcome {
    /// Numeric code used by source tables
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Outcome::Correct),
            0 => Some(Outcome::Partial),
            -1 => Some(Outcome::Incorrect),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "correct" => Some(Outcome::Correct),
            "partial" => Some(Outcome::Partial),
            "incorrect" | "wrong" => Some(Outcome::Incorrect),
            _ => None,
        }
    }

    pub fn credit(self) -> f64 {
        match self {
            Outcome::Correct => 1.0,
            Outcome::Partial => PARTIAL_CREDIT,
            Outcome::Incorrect => 0.0,
        }
    }
}

/// Outcome cell as stored in a source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawOutcome {
    Code(i64),
    Number(f64),
    Label(String),
}

impl fmt::Display for RawOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawOutcome::Code(code) => write!(f, "{code}"),
            RawOutcome::Number(value) => write!(f, "{value}"),
            RawOutcome::Label(label) => write!(f, "{label:?}"),
        }
    }
}

/// Knowledge point cell: a delimited string or an already split list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnowledgePointField {
    Delimited(String),
    List(Vec<String>),
}

impl Default for KnowledgePointField {
    fn default() -> Self {
        KnowledgePointField::Delimited(String::new())
    }
}

impl KnowledgePointField {
    /// Cleaned tokens, one per knowledge point. Empty tokens are kept.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            KnowledgePointField::Delimited(raw) => sanitize::split_knowledge_points(raw),
            KnowledgePointField::List(items) => items
                .iter()
                .map(|item| sanitize::clean_token(item))
                .collect(),
        }
    }
}

/// One response row for a learner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    #[serde(alias = "学生ID")]
    pub student_id: LearnerId,
    #[serde(default, alias = "知识点")]
    pub knowledge_points: KnowledgePointField,
    #[serde(default, alias = "result")]
    pub outcome: Option<RawOutcome>,
}

impl ResponseRecord {
    pub fn new(
        student_id: impl Into<LearnerId>,
        knowledge_points: &str,
        outcome: Option<RawOutcome>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            knowledge_points: KnowledgePointField::Delimited(knowledge_points.to_string()),
            outcome,
        }
    }
}

// ==================== Mastery ====================

/// Discrete mastery level: 0 means no record, 1..=5 bucket the correct rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MasteryLevel(u8);

impl TryFrom<u8> for MasteryLevel {
    type Error = InvalidMasteryLevel;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MasteryLevel::new(value).ok_or(InvalidMasteryLevel(value))
    }
}

impl From<MasteryLevel> for u8 {
    fn from(level: MasteryLevel) -> Self {
        level.0
    }
}

impl MasteryLevel {
    pub const UNATTEMPTED: MasteryLevel = MasteryLevel(0);
    pub const LOWEST: MasteryLevel = MasteryLevel(1);
    pub const HIGHEST: MasteryLevel = MasteryLevel(MAX_MASTERY_LEVEL);

    /// Level from a raw value, `None` when above the highest band
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_MASTERY_LEVEL).then_some(MasteryLevel(value))
    }

    /// Bucket a correct rate into bands 1..=5. An undefined rate is band 1.
    pub fn from_rate(rate: Option<f64>) -> Self {
        let Some(rate) = rate.filter(|r| !r.is_nan()) else {
            return MasteryLevel::LOWEST;
        };
        let band = MASTERY_BAND_UPPER
            .iter()
            .position(|upper| rate < *upper)
            .unwrap_or(MASTERY_BAND_UPPER.len());
        MasteryLevel(band as u8 + 1)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_attempted(self) -> bool {
        self.0 > 0
    }

    /// Display label of the band
    pub fn band_label(self) -> &'static str {
        match self.0 {
            0 => "无数据",
            1 => "0～19%",
            2 => "20%～39%",
            3 => "40%～59%",
            4 => "60%～79%",
            _ => "80%～100%",
        }
    }
}

impl fmt::Display for MasteryLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mastery of one knowledge point for one learner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgePointMastery {
    pub knowledge_point: String,
    /// `None` when no response in the group carries an outcome
    pub correct_rate: Option<f64>,
    pub mastery_level: MasteryLevel,
}

/// Response row whose outcome cell is missing or outside the known encodings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedRow {
    /// Index of the row in the input
    pub row: usize,
    pub raw: String,
    /// Outcome the row was tallied as, `None` when it was not counted
    pub counted_as: Option<Outcome>,
}

/// Per-learner mastery table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasteryTable {
    pub student_id: LearnerId,
    pub rows: Vec<KnowledgePointMastery>,
    #[serde(default)]
    pub flagged_rows: Vec<FlaggedRow>,
}

impl MasteryTable {
    pub fn get(&self, knowledge_point: &str) -> Option<&KnowledgePointMastery> {
        self.rows.iter().find(|row| row.knowledge_point == knowledge_point)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ==================== Knowledge Graph ====================

/// Edge triple `[source, relation, target]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KnowledgeEdge(pub String, pub String, pub String);

impl KnowledgeEdge {
    pub fn new(source: &str, relation: &str, target: &str) -> Self {
        Self(source.to_string(), relation.to_string(), target.to_string())
    }

    pub fn source(&self) -> &str {
        &self.0
    }

    pub fn relation(&self) -> &str {
        &self.1
    }

    pub fn target(&self) -> &str {
        &self.2
    }
}

/// Knowledge graph as exported by the graph builder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<String>,
    #[serde(default)]
    pub edges: Vec<KnowledgeEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraphNode {
    pub id: String,
    pub mastery_level: MasteryLevel,
}

/// Knowledge graph with a mastery annotation per node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedKnowledgeGraph {
    pub nodes: Vec<KnowledgeGraphNode>,
    pub edges: Vec<KnowledgeEdge>,
}

impl EnrichedKnowledgeGraph {
    /// Node count per level, index 0 is "no record"
    pub fn level_histogram(&self) -> [usize; MAX_MASTERY_LEVEL as usize + 1] {
        let mut histogram = [0usize; MAX_MASTERY_LEVEL as usize + 1];
        for node in &self.nodes {
            histogram[node.mastery_level.value() as usize] += 1;
        }
        histogram
    }

    pub fn node(&self, id: &str) -> Option<&KnowledgeGraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

// ==================== Weak Point Selection ====================

/// Weakest attempted knowledge points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakestPoints {
    pub min_level: MasteryLevel,
    pub candidate_ids: HashSet<String>,
}

impl WeakestPoints {
    pub fn contains(&self, id: &str) -> bool {
        self.candidate_ids.contains(id)
    }

    /// Candidates sorted for display
    pub fn sorted_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.candidate_ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

// ==================== IRT Types ====================

/// IRT parameter cell as stored in a source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(value) => write!(f, "{value}"),
            ParamValue::Text(text) => write!(f, "{text:?}"),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Three-parameter logistic item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrtItem {
    #[serde(alias = "试题ID")]
    pub item_id: ItemId,
    /// Discrimination
    #[serde(default, alias = "a_param")]
    pub a: Option<ParamValue>,
    /// Difficulty
    #[serde(default, alias = "b_param")]
    pub b: Option<ParamValue>,
    /// Guessing, expected in [0, 1]
    #[serde(default, alias = "c_param")]
    pub c: Option<ParamValue>,
}

impl IrtItem {
    pub fn new(item_id: impl Into<ItemId>, a: f64, b: f64, c: f64) -> Self {
        Self {
            item_id: item_id.into(),
            a: Some(a.into()),
            b: Some(b.into()),
            c: Some(c.into()),
        }
    }
}

/// Externally estimated learner ability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerAbility {
    #[serde(alias = "学生ID")]
    pub student_id: LearnerId,
    #[serde(default)]
    pub theta: Option<ParamValue>,
}

impl LearnerAbility {
    pub fn new(student_id: impl Into<LearnerId>, theta: f64) -> Self {
        Self {
            student_id: student_id.into(),
            theta: Some(theta.into()),
        }
    }
}

/// Successfully scored item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub probability: f64,
}

/// Item excluded from ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub item_id: ItemId,
    pub reason: ItemFailureReason,
}

/// Ranking output: scored items by probability descending, failures in input order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RankedItems {
    pub ranked: Vec<ScoredItem>,
    pub failures: Vec<ItemFailure>,
}
