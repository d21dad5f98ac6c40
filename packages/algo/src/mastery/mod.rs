//! Mastery Calculator
//!
//! Turns one learner's response rows into a per-knowledge-point mastery table:
//!
//! 1. keep rows whose normalized learner id matches
//! 2. split each row's knowledge point field, one logical record per token
//! 3. group by token, `correct_rate = (correct + 0.5 × partial) / total`
//! 4. bucket the rate into levels 1..=5
//!
//! Groups are emitted in lexicographic order of the knowledge point label.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::{MasteryConfig, OutcomePolicy};
use crate::error::AlgoError;
use crate::types::{
    FlaggedRow, KnowledgePointMastery, LearnerId, MasteryLevel, MasteryTable, Outcome, RawOutcome,
    ResponseRecord, PARTIAL_CREDIT,
};

/// Response counts for one knowledge point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    pub total: usize,
    pub correct: usize,
    pub partial: usize,
}

impl OutcomeTally {
    /// Missing outcomes create the group but do not count toward the total
    pub fn record(&mut self, outcome: Option<Outcome>) {
        let Some(outcome) = outcome else {
            return;
        };
        self.total += 1;
        match outcome {
            Outcome::Correct => self.correct += 1,
            Outcome::Partial => self.partial += 1,
            Outcome::Incorrect => {}
        }
    }

    pub fn correct_rate(&self) -> Option<f64> {
        correct_rate(self.correct, self.partial, self.total)
    }
}

/// `(correct + 0.5 × partial) / total`, undefined for an empty group
pub fn correct_rate(correct: usize, partial: usize, total: usize) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((correct as f64 + PARTIAL_CREDIT * partial as f64) / total as f64)
}

enum Cell {
    Known(Outcome),
    Unknown,
    Missing,
}

fn classify(raw: Option<&RawOutcome>) -> Cell {
    let from_code = |code: i64| Outcome::from_code(code).map_or(Cell::Unknown, Cell::Known);
    match raw {
        None => Cell::Missing,
        Some(RawOutcome::Code(code)) => from_code(*code),
        Some(RawOutcome::Number(value)) if value.is_nan() => Cell::Missing,
        Some(RawOutcome::Number(value)) if value.fract() == 0.0 && value.abs() < 1e15 => {
            from_code(*value as i64)
        }
        Some(RawOutcome::Number(_)) => Cell::Unknown,
        Some(RawOutcome::Label(label)) if label.trim().is_empty() => Cell::Missing,
        Some(RawOutcome::Label(label)) => match label.trim().parse::<i64>() {
            Ok(code) => from_code(code),
            Err(_) => Outcome::from_label(label).map_or(Cell::Unknown, Cell::Known),
        },
    }
}

/// Outcome used for tallying, plus whether the cell was missing or unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOutcome {
    pub outcome: Option<Outcome>,
    pub flagged: bool,
}

/// Map a raw outcome cell to an outcome under the given policy.
///
/// `outcome: None` means the row is not counted toward its groups.
pub fn resolve_outcome(raw: Option<&RawOutcome>, policy: OutcomePolicy) -> ResolvedOutcome {
    let (outcome, flagged) = match (classify(raw), policy) {
        (Cell::Known(outcome), _) => (Some(outcome), false),
        (Cell::Unknown, OutcomePolicy::Lenient) => (Some(Outcome::Incorrect), true),
        (Cell::Unknown, OutcomePolicy::Strict) | (Cell::Missing, _) => (None, true),
    };
    ResolvedOutcome { outcome, flagged }
}

/// Per-knowledge-point tallies of one learner
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedResponses {
    pub groups: BTreeMap<String, OutcomeTally>,
    pub flagged_rows: Vec<FlaggedRow>,
}

pub struct MasteryCalculator {
    config: MasteryConfig,
}

impl Default for MasteryCalculator {
    fn default() -> Self {
        Self::new(MasteryConfig::default())
    }
}

impl MasteryCalculator {
    pub fn new(config: MasteryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MasteryConfig {
        &self.config
    }

    /// Group tallies for one learner, keyed by knowledge point
    pub fn tally(
        &self,
        records: &[ResponseRecord],
        student_id: &LearnerId,
    ) -> Result<GroupedResponses, AlgoError> {
        let mut grouped = GroupedResponses::default();
        let mut matched = 0usize;

        for (row, record) in records.iter().enumerate() {
            if record.student_id != *student_id {
                continue;
            }
            matched += 1;

            let resolved = resolve_outcome(record.outcome.as_ref(), self.config.outcome_policy);
            if resolved.flagged {
                grouped.flagged_rows.push(FlaggedRow {
                    row,
                    raw: record
                        .outcome
                        .as_ref()
                        .map_or_else(|| "<missing>".to_string(), ToString::to_string),
                    counted_as: resolved.outcome,
                });
            }

            for token in record.knowledge_points.tokens() {
                grouped.groups.entry(token).or_default().record(resolved.outcome);
            }
        }

        if matched == 0 {
            return Err(AlgoError::StudentNotFound(student_id.clone()));
        }
        if !grouped.flagged_rows.is_empty() {
            tracing::warn!(
                student_id = %student_id,
                flagged = grouped.flagged_rows.len(),
                policy = ?self.config.outcome_policy,
                "rows with missing or unknown outcomes"
            );
        }

        tracing::debug!(
            student_id = %student_id,
            rows = matched,
            knowledge_points = grouped.groups.len(),
            "responses grouped"
        );
        Ok(grouped)
    }

    /// Mastery table for one learner
    pub fn compute(
        &self,
        records: &[ResponseRecord],
        student_id: &LearnerId,
    ) -> Result<MasteryTable, AlgoError> {
        let GroupedResponses {
            groups,
            flagged_rows,
        } = self.tally(records, student_id)?;

        let rows = groups
            .into_iter()
            .map(|(knowledge_point, tally)| {
                let correct_rate = tally.correct_rate();
                KnowledgePointMastery {
                    knowledge_point,
                    correct_rate,
                    mastery_level: MasteryLevel::from_rate(correct_rate),
                }
            })
            .collect();

        Ok(MasteryTable {
            student_id: student_id.clone(),
            rows,
            flagged_rows,
        })
    }

    /// Tables for several learners, computed in parallel.
    /// Results keep the order of `student_ids`.
    pub fn compute_many(
        &self,
        records: &[ResponseRecord],
        student_ids: &[LearnerId],
    ) -> Vec<(LearnerId, Result<MasteryTable, AlgoError>)> {
        student_ids
            .par_iter()
            .map(|id| (id.clone(), self.compute(records, id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(student: &str, kps: &str, code: i64) -> ResponseRecord {
        ResponseRecord::new(student, kps, Some(RawOutcome::Code(code)))
    }

    #[test]
    fn test_correct_rate_empty_group_is_undefined() {
        assert_eq!(correct_rate(0, 0, 0), None);
    }

    #[test]
    fn test_correct_rate_half_credit() {
        assert_eq!(correct_rate(1, 1, 2), Some(0.75));
        assert_eq!(correct_rate(0, 2, 4), Some(0.25));
    }

    #[test]
    fn test_multi_point_rows_expand() {
        let records = vec![row("s1", "\"a,b\"", 1), row("s1", "a", -1)];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("a").unwrap().correct_rate, Some(0.5));
        assert_eq!(table.get("b").unwrap().correct_rate, Some(1.0));
        assert_eq!(table.get("b").unwrap().mastery_level.value(), 5);
    }

    #[test]
    fn test_other_learners_are_ignored() {
        let records = vec![row("s1", "a", 1), row("s2", "a", -1)];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();
        assert_eq!(table.get("a").unwrap().correct_rate, Some(1.0));
    }

    #[test]
    fn test_student_id_matching_trims_and_normalizes() {
        let records: Vec<ResponseRecord> = serde_json::from_str(
            r#"[{"student_id": 5583697.0, "knowledge_points": "a", "outcome": 1},
                {"student_id": " 5583697 ", "knowledge_points": "a", "outcome": 0}]"#,
        )
        .unwrap();
        let table = MasteryCalculator::default()
            .compute(&records, &LearnerId::from(5583697))
            .unwrap();
        assert_eq!(table.get("a").unwrap().correct_rate, Some(0.75));
    }

    #[test]
    fn test_student_not_found() {
        let records = vec![row("s1", "a", 1)];
        let err = MasteryCalculator::default()
            .compute(&records, &"s9".into())
            .unwrap_err();
        assert_eq!(err, AlgoError::StudentNotFound("s9".into()));
    }

    #[test]
    fn test_empty_token_is_a_group() {
        let records = vec![row("s1", "a,", 1)];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.get("").is_some());
    }

    #[test]
    fn test_unknown_code_counts_as_incorrect_and_is_flagged() {
        let records = vec![row("s1", "a", 1), row("s1", "b", 2)];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();

        assert_eq!(table.get("a").unwrap().correct_rate, Some(1.0));
        assert_eq!(table.get("a").unwrap().mastery_level.value(), 5);
        assert_eq!(table.get("b").unwrap().correct_rate, Some(0.0));
        assert_eq!(
            table.flagged_rows,
            vec![FlaggedRow {
                row: 1,
                raw: "2".to_string(),
                counted_as: Some(Outcome::Incorrect),
            }]
        );
    }

    #[test]
    fn test_strict_policy_leaves_unknown_code_out() {
        let records = vec![row("s1", "a", 1), row("s1", "a", 7), row("s1", "b", 7)];
        let table = MasteryCalculator::new(MasteryConfig::strict())
            .compute(&records, &"s1".into())
            .unwrap();

        assert_eq!(table.get("a").unwrap().correct_rate, Some(1.0));
        // 只有异常编码的知识点：比例未定义，等级为 1
        assert_eq!(table.get("b").unwrap().correct_rate, None);
        assert_eq!(table.get("b").unwrap().mastery_level, MasteryLevel::LOWEST);
        let flagged: Vec<(usize, Option<Outcome>)> =
            table.flagged_rows.iter().map(|f| (f.row, f.counted_as)).collect();
        assert_eq!(flagged, vec![(1, None), (2, None)]);
    }

    #[test]
    fn test_missing_outcomes_give_undefined_rate() {
        let records = vec![
            ResponseRecord::new("s1", "a", None),
            ResponseRecord::new("s1", "b", Some(RawOutcome::Code(1))),
            ResponseRecord::new("s1", "b", None),
        ];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();

        let a = table.get("a").unwrap();
        assert_eq!(a.correct_rate, None);
        assert_eq!(a.mastery_level, MasteryLevel::LOWEST);
        assert_eq!(table.get("b").unwrap().correct_rate, Some(1.0));
        assert_eq!(table.flagged_rows.len(), 2);
        assert_eq!(table.flagged_rows[0].raw, "<missing>");
    }

    #[test]
    fn test_known_outcomes_are_not_flagged() {
        let records = vec![row("s1", "a", 1), row("s1", "a", 0), row("s1", "a", -1)];
        let table = MasteryCalculator::new(MasteryConfig::strict())
            .compute(&records, &"s1".into())
            .unwrap();
        assert!(table.flagged_rows.is_empty());
        assert_eq!(table.get("a").unwrap().correct_rate, Some(0.5));
    }

    #[test]
    fn test_resolve_outcome_encodings() {
        let known = |raw: RawOutcome| resolve_outcome(Some(&raw), OutcomePolicy::Strict);
        assert_eq!(known(RawOutcome::Number(1.0)).outcome, Some(Outcome::Correct));
        assert_eq!(known(RawOutcome::Label("partial".into())).outcome, Some(Outcome::Partial));
        assert_eq!(known(RawOutcome::Label(" -1 ".into())).outcome, Some(Outcome::Incorrect));
        assert!(!known(RawOutcome::Label("wrong".into())).flagged);

        let half = resolve_outcome(Some(&RawOutcome::Number(0.5)), OutcomePolicy::Lenient);
        assert_eq!(
            half,
            ResolvedOutcome {
                outcome: Some(Outcome::Incorrect),
                flagged: true
            }
        );
        let nan = resolve_outcome(Some(&RawOutcome::Number(f64::NAN)), OutcomePolicy::Lenient);
        assert_eq!(
            nan,
            ResolvedOutcome {
                outcome: None,
                flagged: true
            }
        );
    }

    #[test]
    fn test_compute_many_reports_each_learner() {
        let records = vec![row("s1", "a", 1), row("s2", "a", 0)];
        let ids: Vec<LearnerId> = vec!["s1".into(), "s3".into(), "s2".into()];
        let results = MasteryCalculator::default().compute_many(&records, &ids);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].0.as_str(), "s1");
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(AlgoError::StudentNotFound(_))));
        assert_eq!(
            results[2].1.as_ref().unwrap().get("a").unwrap().correct_rate,
            Some(0.5)
        );
    }

    #[test]
    fn test_output_is_lexicographic() {
        let records = vec![row("s1", "c,a,b", 1)];
        let table = MasteryCalculator::default()
            .compute(&records, &"s1".into())
            .unwrap();
        let order: Vec<&str> = table.rows.iter().map(|r| r.knowledge_point.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }
}
