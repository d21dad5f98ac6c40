use serde::{Deserialize, Serialize};

const DEFAULT_PARALLEL_THRESHOLD: usize = 64;

/// How outcome cells outside the known encodings are tallied.
/// Either way such rows are listed in `MasteryTable::flagged_rows`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// Unknown codes count as incorrect, missing outcomes are skipped
    #[default]
    Lenient,
    /// Unknown codes and missing outcomes are both left out of the tally
    Strict,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasteryConfig {
    pub outcome_policy: OutcomePolicy,
}

impl MasteryConfig {
    pub fn strict() -> Self {
        Self {
            outcome_policy: OutcomePolicy::Strict,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Pools at least this large are scored with a parallel map
    pub parallel_threshold: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}
