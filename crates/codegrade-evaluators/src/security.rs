//! Pattern-based security scanner.
//!
//! Each rule is a line-level regular expression over the source with
//! comments removed. Findings are weighted by severity and subtracted from
//! 100 to give a bounded `security_score`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use codegrade_core::{analyze_blocking, CodeArtifact, EvaluationError, Evaluator};

use crate::lexer::{tokenize, LexError, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        };
        f.write_str(s)
    }
}

/// How much one finding of each severity costs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityWeights {
    #[serde(default = "default_high")]
    pub high: f64,
    #[serde(default = "default_medium")]
    pub medium: f64,
    #[serde(default = "default_low")]
    pub low: f64,
}

fn default_high() -> f64 {
    30.0
}
fn default_medium() -> f64 {
    15.0
}
fn default_low() -> f64 {
    5.0
}

impl Default for SeverityWeights {
    fn default() -> Self {
        Self {
            high: default_high(),
            medium: default_medium(),
            low: default_low(),
        }
    }
}

impl SeverityWeights {
    pub fn weight(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    /// Weights must be finite and non-negative.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("high", self.high), ("medium", self.medium), ("low", self.low)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("severity weight '{name}' must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }
}

struct RuleSpec {
    id: &'static str,
    pattern: &'static str,
    /// Lines that also match this are not findings.
    unless: Option<&'static str>,
    text: &'static str,
    severity: Severity,
    confidence: Severity,
}

const RULES: &[RuleSpec] = &[
    RuleSpec {
        id: "B101",
        pattern: r"^\s*assert\b",
        unless: None,
        text: "Use of assert detected. The enclosed code will be removed when compiling to optimised byte code.",
        severity: Severity::Low,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B102",
        pattern: r"(?:^|[^.\w])exec\s*\(",
        unless: None,
        text: "Use of exec detected.",
        severity: Severity::Medium,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B104",
        pattern: r#"["']0\.0\.0\.0["']"#,
        unless: None,
        text: "Possible binding to all interfaces.",
        severity: Severity::Medium,
        confidence: Severity::Medium,
    },
    RuleSpec {
        id: "B105",
        pattern: r#"(?i)\b\w*(?:password|passwd|pwd|secret|token)\w*\s*=\s*["'][^"']+["']"#,
        unless: None,
        text: "Possible hardcoded password.",
        severity: Severity::Low,
        confidence: Severity::Medium,
    },
    RuleSpec {
        id: "B108",
        pattern: r#"["']/(?:tmp|var/tmp|dev/shm)(?:/[^"']*)?["']"#,
        unless: None,
        text: "Probable insecure usage of temp file/directory.",
        severity: Severity::Medium,
        confidence: Severity::Medium,
    },
    RuleSpec {
        id: "B201",
        pattern: r"\.run\s*\(.*\bdebug\s*=\s*True",
        unless: None,
        text: "A Flask app appears to be run with debug=True, which exposes the Werkzeug debugger and allows the execution of arbitrary code.",
        severity: Severity::High,
        confidence: Severity::Medium,
    },
    RuleSpec {
        id: "B301",
        pattern: r"\b(?:c?pickle|dill|shelve|marshal)\.(?:loads?|Unpickler|open)\b",
        unless: None,
        text: "Pickle and modules that wrap it can be unsafe when used to deserialize untrusted data, possible security issue.",
        severity: Severity::Medium,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B306",
        pattern: r"\btempfile\.mktemp\s*\(",
        unless: None,
        text: "Use of insecure and deprecated function (mktemp).",
        severity: Severity::Medium,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B307",
        pattern: r"(?:^|[^.\w])eval\s*\(",
        unless: None,
        text: "Use of possibly insecure function - consider using safer ast.literal_eval.",
        severity: Severity::Medium,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B311",
        pattern: r"\brandom\.(?:random|randint|randrange|choice|choices|uniform|shuffle|sample)\s*\(",
        unless: None,
        text: "Standard pseudo-random generators are not suitable for security/cryptographic purposes.",
        severity: Severity::Low,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B324",
        pattern: r"\bhashlib\.(?:md4|md5|sha1)\s*\(",
        unless: Some(r"usedforsecurity\s*=\s*False"),
        text: "Use of weak MD4, MD5, or SHA1 hash for security. Consider usedforsecurity=False",
        severity: Severity::High,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B404",
        pattern: r"^\s*(?:import\s+subprocess\b|from\s+subprocess\s+import\b)",
        unless: None,
        text: "Consider possible security implications associated with the subprocess module.",
        severity: Severity::Low,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B501",
        pattern: r"\brequests\.\w+\s*\(.*\bverify\s*=\s*False",
        unless: None,
        text: "Call to requests with verify=False disabling SSL certificate checks, security issue.",
        severity: Severity::High,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B506",
        pattern: r"\byaml\.load\s*\(",
        unless: Some(r"SafeLoader|CSafeLoader"),
        text: "Use of unsafe yaml load. Allows instantiation of arbitrary objects. Consider yaml.safe_load().",
        severity: Severity::Medium,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B602",
        pattern: r"\bsubprocess\.\w+\s*\(.*\bshell\s*=\s*True",
        unless: None,
        text: "subprocess call with shell=True identified, security issue.",
        severity: Severity::High,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B605",
        pattern: r"\bos\.(?:system|popen[234]?|spawn\w*|exec\w*)\s*\(",
        unless: None,
        text: "Starting a process with a shell, possible injection detected, security issue.",
        severity: Severity::High,
        confidence: Severity::High,
    },
    RuleSpec {
        id: "B608",
        pattern: r#"(?i)(?:["']\s*(?:select|insert|update|delete)\s[^"']*["']\s*(?:%|\+|\.format\s*\()|\bf["']\s*(?:select|insert|update|delete)\s[^"']*\{)"#,
        unless: None,
        text: "Possible SQL injection vector through string-based query construction.",
        severity: Severity::Medium,
        confidence: Severity::Low,
    },
];

struct Rule {
    id: &'static str,
    pattern: Regex,
    unless: Option<Regex>,
    text: &'static str,
    severity: Severity,
    confidence: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityIssue {
    pub test_id: &'static str,
    pub issue_text: &'static str,
    pub severity: Severity,
    pub confidence: Severity,
    pub line_number: usize,
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityReport {
    pub security_issues: Vec<SecurityIssue>,
    pub severity_counts: SeverityCounts,
    pub security_score: f64,
}

/// Scans source for risky constructs.
#[derive(Clone)]
pub struct SecurityEvaluator {
    rules: Arc<Vec<Rule>>,
    weights: SeverityWeights,
}

impl SecurityEvaluator {
    pub fn new(weights: SeverityWeights) -> Result<Self, regex::Error> {
        let rules = RULES
            .iter()
            .map(|spec| {
                Ok(Rule {
                    id: spec.id,
                    pattern: Regex::new(spec.pattern)?,
                    unless: spec.unless.map(Regex::new).transpose()?,
                    text: spec.text,
                    severity: spec.severity,
                    confidence: spec.confidence,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self {
            rules: Arc::new(rules),
            weights,
        })
    }

    pub fn weights(&self) -> &SeverityWeights {
        &self.weights
    }

    pub fn scan(&self, source: &str) -> Result<SecurityReport, LexError> {
        scan(source, &self.rules, &self.weights)
    }
}

impl fmt::Debug for SecurityEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityEvaluator")
            .field("rules", &self.rules.len())
            .field("weights", &self.weights)
            .finish()
    }
}

fn scan(source: &str, rules: &[Rule], weights: &SeverityWeights) -> Result<SecurityReport, LexError> {
    let code = strip_comments(source)?;

    let mut issues = Vec::new();
    for (idx, line) in code.lines().enumerate() {
        for rule in rules {
            if !rule.pattern.is_match(line) {
                continue;
            }
            if rule.unless.as_ref().is_some_and(|u| u.is_match(line)) {
                continue;
            }
            issues.push(SecurityIssue {
                test_id: rule.id,
                issue_text: rule.text,
                severity: rule.severity,
                confidence: rule.confidence,
                line_number: idx + 1,
                code: line.trim().to_string(),
            });
        }
    }

    let mut counts = SeverityCounts::default();
    let mut penalty = 0.0;
    for issue in &issues {
        match issue.severity {
            Severity::High => counts.high += 1,
            Severity::Medium => counts.medium += 1,
            Severity::Low => counts.low += 1,
        }
        penalty += weights.weight(issue.severity);
    }

    Ok(SecurityReport {
        security_issues: issues,
        severity_counts: counts,
        security_score: (100.0 - penalty).max(0.0),
    })
}

/// Blank out comments, keeping line structure intact.
fn strip_comments(source: &str) -> Result<String, LexError> {
    let tokens = tokenize(source)?;
    let mut lines: Vec<String> = source.lines().map(str::to_string).collect();
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Comment) {
        if let Some(line) = lines.get_mut(token.line - 1) {
            line.truncate(token.col);
        }
    }
    Ok(lines.join("\n"))
}

#[async_trait]
impl Evaluator for SecurityEvaluator {
    fn kind(&self) -> &str {
        "security"
    }

    #[instrument(skip_all, fields(bytes = artifact.as_str().len()))]
    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError> {
        let source = artifact.shared();
        let rules = Arc::clone(&self.rules);
        let weights = self.weights;
        analyze_blocking(move || {
            let report = scan(&source, &rules, &weights)
                .map_err(|e| EvaluationError::Analysis(format!("cannot tokenize source: {e}")))?;
            tracing::debug!(
                issues = report.security_issues.len(),
                score = report.security_score,
                "security scanned"
            );
            serde_json::to_value(report)
                .map_err(|e| EvaluationError::Internal(format!("failed to encode report: {e}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> SecurityEvaluator {
        SecurityEvaluator::new(SeverityWeights::default()).unwrap()
    }

    fn ids(report: &SecurityReport) -> Vec<&'static str> {
        report.security_issues.iter().map(|i| i.test_id).collect()
    }

    #[test]
    fn all_rules_compile() {
        assert_eq!(scanner().rules.len(), RULES.len());
    }

    #[test]
    fn clean_code_scores_100() {
        let report = scanner().scan("def add(a, b):\n    return a + b\n").unwrap();
        assert!(report.security_issues.is_empty());
        assert_eq!(report.security_score, 100.0);
    }

    #[test]
    fn shell_execution_is_high_severity() {
        let report = scanner()
            .scan("import os\ndef execute_command(cmd):\n    os.system(cmd)")
            .unwrap();
        assert_eq!(ids(&report), vec!["B605"]);
        let issue = &report.security_issues[0];
        assert_eq!(issue.severity, Severity::High);
        assert_eq!(issue.line_number, 3);
        assert_eq!(issue.code, "os.system(cmd)");
        assert_eq!(report.security_score, 70.0);
    }

    #[test]
    fn penalties_accumulate_and_floor_at_zero() {
        let source = "\
import subprocess
subprocess.call(cmd, shell=True)
eval(user_input)
password = 'hunter2'
";
        let report = scanner().scan(source).unwrap();
        assert_eq!(ids(&report), vec!["B404", "B602", "B307", "B105"]);
        assert_eq!(
            report.severity_counts,
            SeverityCounts {
                high: 1,
                medium: 1,
                low: 2
            }
        );
        // 100 - (30 + 15 + 5 + 5)
        assert_eq!(report.security_score, 45.0);

        let many = "os.system(a)\n".repeat(5);
        assert_eq!(scanner().scan(&many).unwrap().security_score, 0.0);
    }

    #[test]
    fn comments_are_ignored() {
        let report = scanner().scan("x = 1  # eval(x) would be bad\n# os.system('ls')\n").unwrap();
        assert!(report.security_issues.is_empty());
    }

    #[test]
    fn hash_in_string_is_not_a_comment() {
        let report = scanner().scan("q = '#'; eval(q)\n").unwrap();
        assert_eq!(ids(&report), vec!["B307"]);
    }

    #[test]
    fn method_named_eval_is_not_builtin_eval() {
        let report = scanner().scan("model.eval()\nliteral_eval(x)\n").unwrap();
        assert!(report.security_issues.is_empty());
    }

    #[test]
    fn exemptions() {
        let s = scanner();
        assert!(s.scan("yaml.load(f, Loader=yaml.SafeLoader)\n").unwrap().security_issues.is_empty());
        assert_eq!(ids(&s.scan("yaml.load(f)\n").unwrap()), vec!["B506"]);
        assert!(s
            .scan("hashlib.md5(data, usedforsecurity=False)\n")
            .unwrap()
            .security_issues
            .is_empty());
    }

    #[test]
    fn sql_built_from_strings() {
        let s = scanner();
        assert_eq!(ids(&s.scan("q = 'SELECT * FROM t WHERE id = %s' % uid\n").unwrap()), vec!["B608"]);
        assert_eq!(ids(&s.scan("q = f\"DELETE FROM t WHERE id = {uid}\"\n").unwrap()), vec!["B608"]);
        assert!(s
            .scan("cur.execute('SELECT * FROM t WHERE id = ?', (uid,))\n")
            .unwrap()
            .security_issues
            .is_empty());
    }

    #[test]
    fn custom_weights() {
        let weights = SeverityWeights {
            high: 50.0,
            medium: 10.0,
            low: 0.0,
        };
        let s = SecurityEvaluator::new(weights).unwrap();
        let report = s.scan("assert x\nos.system(y)\n").unwrap();
        assert_eq!(report.security_score, 50.0);
    }

    #[test]
    fn weights_validate() {
        assert!(SeverityWeights::default().validate().is_ok());
        let bad = SeverityWeights {
            high: f64::NAN,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let negative = SeverityWeights {
            low: -1.0,
            ..Default::default()
        };
        assert!(negative.validate().unwrap_err().contains("'low'"));
    }

    #[tokio::test]
    async fn payload_shape() {
        let payload = scanner()
            .evaluate(&CodeArtifact::new("import pickle\ndata = pickle.loads(blob)\n"))
            .await
            .unwrap();
        assert_eq!(payload["security_issues"][0]["test_id"], "B301");
        assert_eq!(payload["security_issues"][0]["severity"], "MEDIUM");
        assert_eq!(payload["security_score"], 85.0);
    }

    #[tokio::test]
    async fn untokenizable_source_is_an_analysis_error() {
        let err = scanner()
            .evaluate(&CodeArtifact::new("def f(:\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Analysis(_)));
    }
}
