//! Error types
//!
//! `AlgoError` is terminal for the current call. `ItemFailureReason` is
//! local to one item and is collected next to successful results instead
//! of being propagated.

use serde::Serialize;

use crate::types::LearnerId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AlgoError {
    #[error("student not found: {0}")]
    StudentNotFound(LearnerId),
    #[error("no knowledge point with mastery level above 0")]
    NoEligibleCandidate,
    #[error("knowledge point {0:?} is not one of the weakest candidates")]
    NotACandidate(String),
    #[error("knowledge point not found: {0:?}")]
    KnowledgePointNotFound(String),
    #[error("no items linked to knowledge point {0:?}")]
    NoLinkedItems(String),
    #[error("ability estimate not found for student {0}")]
    AbilityNotFound(LearnerId),
}

/// Raw value rejected when reading a mastery level
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mastery level {0} is outside 0..=5")]
pub struct InvalidMasteryLevel(pub u8);

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemFailureReason {
    #[error("parameter {name} is not a finite number: {raw}")]
    MalformedParameter { name: &'static str, raw: String },
    #[error("no parameter row for item")]
    MissingParameters,
    #[error("guessing parameter {value} is outside [0, 1]")]
    GuessingOutOfRange { value: f64 },
    #[error("exponent overflow")]
    Overflow,
    #[error("probability is not finite")]
    NonFiniteProbability,
}
