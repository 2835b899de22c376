//! Result normalization onto the common 0-100 scale.
//!
//! Each evaluator reports in its own schema. The normalizer holds one
//! [`ScoreRule`] per evaluator identity and reads a single field out of the
//! payload. Anything it cannot read yields `None`, so an evaluator without
//! a rule is unscored rather than fatal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How to turn one payload field into a sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "lowercase")]
pub enum ScoreRule {
    /// Boolean compliance flag: `true` is 100, `false` is 0.
    Flag { field: String },
    /// Numeric index intended to lie in [0, 100]; clamped into range.
    Index { field: String },
    /// Score the evaluator already bounded itself; out-of-range values are
    /// rejected instead of clamped.
    Bounded { field: String },
}

impl ScoreRule {
    pub fn flag(field: impl Into<String>) -> Self {
        ScoreRule::Flag { field: field.into() }
    }

    pub fn index(field: impl Into<String>) -> Self {
        ScoreRule::Index { field: field.into() }
    }

    pub fn bounded(field: impl Into<String>) -> Self {
        ScoreRule::Bounded { field: field.into() }
    }

    pub fn field(&self) -> &str {
        match self {
            ScoreRule::Flag { field } | ScoreRule::Index { field } | ScoreRule::Bounded { field } => {
                field
            }
        }
    }

    /// Apply the rule to a payload.
    pub fn apply(&self, payload: &serde_json::Value) -> Option<f64> {
        let value = lookup(payload, self.field())?;
        match self {
            ScoreRule::Flag { .. } => value.as_bool().map(|b| if b { 100.0 } else { 0.0 }),
            ScoreRule::Index { .. } => {
                let v = value.as_f64().filter(|v| v.is_finite())?;
                Some(v.clamp(0.0, 100.0))
            }
            ScoreRule::Bounded { .. } => {
                let v = value.as_f64().filter(|v| v.is_finite())?;
                if (0.0..=100.0).contains(&v) {
                    Some(v)
                } else {
                    tracing::warn!(field = self.field(), value = v, "bounded score out of range");
                    None
                }
            }
        }
    }
}

impl std::fmt::Display for ScoreRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreRule::Flag { field } => write!(f, "flag({field})"),
            ScoreRule::Index { field } => write!(f, "index({field})"),
            ScoreRule::Bounded { field } => write!(f, "bounded({field})"),
        }
    }
}

/// Follow a dotted path (`a.b.c`) into a JSON object.
fn lookup<'a>(payload: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(payload, |node, segment| node.get(segment))
}

/// Per-identity dispatch table of score rules.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    rules: HashMap<String, ScoreRule>,
}

impl Normalizer {
    /// An empty table: every evaluator is unscored.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the three built-in evaluators under their usual names.
    pub fn with_defaults() -> Self {
        Self::new()
            .with_rule("correctness", ScoreRule::flag("syntax_valid"))
            .with_rule("maintainability", ScoreRule::index("maintainability_index"))
            .with_rule("security", ScoreRule::bounded("security_score"))
    }

    pub fn with_rule(mut self, identity: impl Into<String>, rule: ScoreRule) -> Self {
        self.rules.insert(identity.into(), rule);
        self
    }

    pub fn rule(&self, identity: &str) -> Option<&ScoreRule> {
        self.rules.get(identity)
    }

    /// Sub-score for `identity`, or `None` if it cannot be derived.
    pub fn normalize(&self, identity: &str, payload: &serde_json::Value) -> Option<f64> {
        let Some(rule) = self.rules.get(identity) else {
            tracing::debug!(evaluator = identity, "no score rule, result is unscored");
            return None;
        };
        let score = rule.apply(payload);
        if score.is_none() {
            tracing::warn!(evaluator = identity, rule = %rule, "payload has no usable score");
        }
        score
    }
}
