//! Ability Scorer (3PL IRT)
//!
//! Probability that a learner of ability θ answers an item correctly:
//!
//! ```text
//! P(θ) = c + (1 − c) / (1 + exp(−a · (θ − b)))
//! ```
//!
//! a = discrimination, b = difficulty, c = guessing. Parameters are supplied
//! externally; nothing here calibrates them.
//!
//! Failures are per item. A malformed item is reported next to the ranking
//! and never stops the rest of the batch.

use std::cmp::Ordering;

use rayon::prelude::*;

use crate::config::RankingConfig;
use crate::error::ItemFailureReason;
use crate::sanitize::{has_invalid_values, parse_finite};
use crate::types::{
    IrtItem, ItemFailure, LearnerAbility, ParamValue, RankedItems, ScoredItem,
};

/// Parsed, validated item parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrtParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

fn parse_param(
    name: &'static str,
    value: Option<&ParamValue>,
) -> Result<f64, ItemFailureReason> {
    let malformed = |raw: String| ItemFailureReason::MalformedParameter { name, raw };
    let value = value.ok_or_else(|| malformed("<missing>".to_string()))?;
    parse_finite(value).ok_or_else(|| malformed(value.to_string()))
}

/// θ of a learner, validated the same way as item parameters
pub fn parse_theta(ability: &LearnerAbility) -> Result<f64, ItemFailureReason> {
    parse_param("theta", ability.theta.as_ref())
}

impl IrtParams {
    pub fn new(a: f64, b: f64, c: f64) -> Result<Self, ItemFailureReason> {
        if has_invalid_values(&[a, b, c]) {
            let (name, value) = [("a", a), ("b", b), ("c", c)]
                .into_iter()
                .find(|(_, v)| !v.is_finite())
                .unwrap_or(("a", a));
            return Err(ItemFailureReason::MalformedParameter {
                name,
                raw: value.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&c) {
            return Err(ItemFailureReason::GuessingOutOfRange { value: c });
        }
        Ok(Self { a, b, c })
    }

    pub fn from_item(item: &IrtItem) -> Result<Self, ItemFailureReason> {
        let a = parse_param("a", item.a.as_ref())?;
        let b = parse_param("b", item.b.as_ref())?;
        let c = parse_param("c", item.c.as_ref())?;
        Self::new(a, b, c)
    }

    /// P(θ), within [c, 1]
    pub fn probability(&self, theta: f64) -> Result<f64, ItemFailureReason> {
        if !theta.is_finite() {
            return Err(ItemFailureReason::MalformedParameter {
                name: "theta",
                raw: theta.to_string(),
            });
        }

        let exponent = -self.a * (theta - self.b);
        let denominator = 1.0 + exponent.exp();
        if !denominator.is_finite() {
            return Err(ItemFailureReason::Overflow);
        }

        let p = self.c + (1.0 - self.c) / denominator;
        if !p.is_finite() {
            return Err(ItemFailureReason::NonFiniteProbability);
        }
        // 舍入误差可能让结果略超出区间
        Ok(p.clamp(self.c, 1.0))
    }
}

/// Probability of a correct response, or the reason the item cannot be scored
pub fn probability_correct(
    item: &IrtItem,
    ability: &LearnerAbility,
) -> Result<f64, ItemFailureReason> {
    let params = IrtParams::from_item(item)?;
    let theta = parse_theta(ability)?;
    params.probability(theta)
}

/// Higher probability first, then item id ascending
fn compare_scored(x: &ScoredItem, y: &ScoredItem) -> Ordering {
    y.probability
        .partial_cmp(&x.probability)
        .unwrap_or(Ordering::Equal)
        .then_with(|| x.item_id.cmp(&y.item_id))
}

pub struct AbilityScorer {
    config: RankingConfig,
}

impl Default for AbilityScorer {
    fn default() -> Self {
        Self::new(RankingConfig::default())
    }
}

impl AbilityScorer {
    pub fn new(config: RankingConfig) -> Self {
        Self { config }
    }

    /// Score every item, keep failures separate, sort the rest
    pub fn rank(&self, items: &[IrtItem], ability: &LearnerAbility) -> RankedItems {
        let score = |item: &IrtItem| (item.item_id.clone(), probability_correct(item, ability));

        let evaluated: Vec<_> = if items.len() >= self.config.parallel_threshold {
            items.par_iter().map(score).collect()
        } else {
            items.iter().map(score).collect()
        };

        let mut result = RankedItems::default();
        for (item_id, outcome) in evaluated {
            match outcome {
                Ok(probability) => result.ranked.push(ScoredItem {
                    item_id,
                    probability,
                }),
                Err(reason) => {
                    tracing::warn!(
                        item_id = %item_id,
                        student_id = %ability.student_id,
                        error = %reason,
                        "item excluded from ranking"
                    );
                    result.failures.push(ItemFailure { item_id, reason });
                }
            }
        }
        result.ranked.sort_by(compare_scored);

        tracing::info!(
            student_id = %ability.student_id,
            ranked = result.ranked.len(),
            failed = result.failures.len(),
            "candidate items ranked"
        );
        result
    }
}

/// [`AbilityScorer::rank`] with the default configuration
pub fn rank_candidates(items: &[IrtItem], ability: &LearnerAbility) -> RankedItems {
    AbilityScorer::default().rank(items, ability)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_at_difficulty() {
        let item = IrtItem::new("q1", 1.2, 0.0, 0.2);
        let ability = LearnerAbility::new("s1", 0.0);
        let p = probability_correct(&item, &ability).unwrap();
        assert!((p - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_probability_bounds() {
        let params = IrtParams::new(1.5, 0.5, 0.25).unwrap();
        let low = params.probability(-30.0).unwrap();
        let high = params.probability(30.0).unwrap();
        assert!(low >= 0.25 && low < 0.2501);
        assert!(high <= 1.0 && high > 0.999);
    }

    #[test]
    fn test_probability_increases_with_theta() {
        let params = IrtParams::new(0.8, 1.0, 0.1).unwrap();
        let mut prev = 0.0;
        for step in -20..=20 {
            let p = params.probability(step as f64 * 0.25).unwrap();
            assert!(p >= prev);
            prev = p;
        }
    }

    #[test]
    fn test_zero_discrimination_is_flat() {
        let params = IrtParams::new(0.0, 2.0, 0.2).unwrap();
        assert!((params.probability(-3.0).unwrap() - 0.6).abs() < 1e-12);
        assert!((params.probability(3.0).unwrap() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_overflow_is_item_failure() {
        let params = IrtParams::new(10.0, 100.0, 0.2).unwrap();
        assert_eq!(params.probability(-100.0), Err(ItemFailureReason::Overflow));
    }

    #[test]
    fn test_non_numeric_parameter() {
        let mut item = IrtItem::new("q1", 1.0, 0.0, 0.2);
        item.b = Some("N/A".into());
        let err = probability_correct(&item, &LearnerAbility::new("s1", 0.0)).unwrap_err();
        assert_eq!(
            err,
            ItemFailureReason::MalformedParameter {
                name: "b",
                raw: "\"N/A\"".to_string()
            }
        );
    }

    #[test]
    fn test_missing_parameter() {
        let mut item = IrtItem::new("q1", 1.0, 0.0, 0.2);
        item.c = None;
        let err = probability_correct(&item, &LearnerAbility::new("s1", 0.0)).unwrap_err();
        assert!(matches!(err, ItemFailureReason::MalformedParameter { name: "c", .. }));
    }

    #[test]
    fn test_numeric_text_parameters_parse() {
        let item = IrtItem {
            item_id: "q1".into(),
            a: Some("1.2".into()),
            b: Some("0".into()),
            c: Some(" 0.2 ".into()),
        };
        let p = probability_correct(&item, &LearnerAbility::new("s1", 0.0)).unwrap();
        assert!((p - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_guessing_out_of_range() {
        assert_eq!(
            IrtParams::new(1.0, 0.0, 1.5),
            Err(ItemFailureReason::GuessingOutOfRange { value: 1.5 })
        );
    }

    #[test]
    fn test_malformed_theta_fails_items() {
        let ability = LearnerAbility {
            student_id: "s1".into(),
            theta: Some("unknown".into()),
        };
        let ranked = rank_candidates(&[IrtItem::new("q1", 1.0, 0.0, 0.2)], &ability);
        assert!(ranked.ranked.is_empty());
        assert_eq!(ranked.failures.len(), 1);
    }

    #[test]
    fn test_rank_orders_by_probability_then_id() {
        let items = vec![
            IrtItem::new("q3", 1.0, 1.0, 0.2),
            IrtItem::new("q2", 1.0, -1.0, 0.2),
            IrtItem::new("q1", 1.0, -1.0, 0.2),
            IrtItem::new("q4", 1.0, 0.0, 0.2),
        ];
        let ranked = rank_candidates(&items, &LearnerAbility::new("s1", 0.0));
        let order: Vec<&str> = ranked.ranked.iter().map(|s| s.item_id.as_str()).collect();
        assert_eq!(order, vec!["q1", "q2", "q4", "q3"]);
    }

    #[test]
    fn test_rank_parallel_matches_sequential() {
        let items: Vec<IrtItem> = (0..200)
            .map(|i| {
                let a = 0.5 + (i % 7) as f64 * 0.2;
                let b = (i % 11) as f64 - 5.0;
                IrtItem::new(format!("q{i:03}"), a, b, 0.1)
            })
            .collect();
        let ability = LearnerAbility::new("s1", 0.3);
        let sequential = AbilityScorer::new(RankingConfig { parallel_threshold: usize::MAX })
            .rank(&items, &ability);
        let parallel =
            AbilityScorer::new(RankingConfig { parallel_threshold: 1 }).rank(&items, &ability);
        assert_eq!(sequential, parallel);
    }
}
