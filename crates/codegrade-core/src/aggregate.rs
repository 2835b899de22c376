//! Combining sub-scores into one overall score.
//!
//! The overall score is the mean of the sub-scores that are present. Failed
//! or unscored evaluators are left out entirely; they never count as zero.

use std::collections::{BTreeMap, HashMap};

use crate::model::OverallScore;

/// Per-evaluator weights. Identities without an explicit weight count 1.0,
/// so the default policy is the plain arithmetic mean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationPolicy {
    weights: HashMap<String, f64>,
}

impl AggregationPolicy {
    pub fn unweighted() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: HashMap<String, f64>) -> Self {
        Self { weights }
    }

    pub fn weight(&self, identity: &str) -> f64 {
        self.weights.get(identity).copied().unwrap_or(1.0)
    }
}

/// Aggregate sub-scores into an overall score.
///
/// Returns [`OverallScore::Absent`] when no sub-score is present.
pub fn aggregate(scores: &BTreeMap<String, Option<f64>>, policy: &AggregationPolicy) -> OverallScore {
    let (weighted_sum, total_weight) = scores
        .iter()
        .filter_map(|(identity, score)| score.map(|s| (policy.weight(identity), s)))
        .fold((0.0f64, 0.0f64), |(sum, total), (w, s)| (sum + w * s, total + w));

    if total_weight > 0.0 {
        OverallScore::Computed(weighted_sum / total_weight)
    } else {
        OverallScore::Absent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(entries: &[(&str, Option<f64>)]) -> BTreeMap<String, Option<f64>> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn mean_of_present_scores() {
        let s = scores(&[
            ("correctness", Some(100.0)),
            ("maintainability", Some(70.0)),
            ("security", Some(40.0)),
        ]);
        assert_eq!(aggregate(&s, &AggregationPolicy::unweighted()), OverallScore::Computed(70.0));
    }

    #[test]
    fn absent_scores_are_excluded_not_zeroed() {
        let s = scores(&[("correctness", Some(100.0)), ("security", None)]);
        assert_eq!(aggregate(&s, &AggregationPolicy::unweighted()), OverallScore::Computed(100.0));
    }

    #[test]
    fn no_present_scores_is_absent() {
        let s = scores(&[("correctness", None), ("security", None)]);
        assert!(aggregate(&s, &AggregationPolicy::unweighted()).is_absent());
        assert!(aggregate(&BTreeMap::new(), &AggregationPolicy::unweighted()).is_absent());
    }

    #[test]
    fn no_rounding_is_applied() {
        let s = scores(&[("a", Some(100.0)), ("b", Some(0.0)), ("c", Some(0.0))]);
        let overall = aggregate(&s, &AggregationPolicy::unweighted()).value().unwrap();
        assert!((overall - 100.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn weights_shift_the_mean() {
        let s = scores(&[("correctness", Some(100.0)), ("security", Some(40.0))]);
        let policy = AggregationPolicy::with_weights(HashMap::from([("security".to_string(), 2.0)]));
        assert_eq!(aggregate(&s, &policy), OverallScore::Computed(60.0));
    }
}
