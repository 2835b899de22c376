//! Configuration and registry bootstrap.
//!
//! The evaluator table is declared in TOML, one `[evaluators.<name>]` table
//! per registered identity, and turned into a registry, a normalizer and an
//! engine at startup. Any entry that cannot be constructed rejects startup.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use codegrade_core::engine::{DEFAULT_EVALUATOR_TIMEOUT, DEFAULT_MAX_CODE_LENGTH};
use codegrade_core::{
    AggregationPolicy, EngineConfig, EvaluationEngine, Evaluator, EvaluatorRegistry, Normalizer,
    ScoreRule,
};

use crate::command::CommandEvaluator;
use crate::correctness::{CorrectnessEvaluator, DEFAULT_MAX_LINE_LENGTH};
use crate::error::InitError;
use crate::maintainability::MaintainabilityEvaluator;
use crate::security::{SecurityEvaluator, SeverityWeights};

/// File name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "codegrade.toml";

/// Starter configuration written by `codegrade init`.
pub const STARTER_CONFIG: &str = r#"# codegrade configuration

# Maximum accepted code length, in characters.
max_code_length = 100000

# Time budget for each evaluator, in milliseconds.
evaluator_timeout_ms = 30000

# Address the HTTP service listens on.
listen = "127.0.0.1:8000"

[evaluators.correctness]
type = "correctness"
max_line_length = 79

[evaluators.maintainability]
type = "maintainability"

[evaluators.security]
type = "security"

[evaluators.security.severity_weights]
high = 30.0
medium = 15.0
low = 5.0

# An external analyzer: receives the code on stdin, prints a JSON object.
# [evaluators.lint]
# type = "command"
# program = "my-linter"
# args = ["--json"]
# env = { LINT_TOKEN = "${LINT_TOKEN}" }
# score = { rule = "bounded", field = "score" }

# Aggregation weights; evaluators not listed weigh 1.0.
# [weights]
# security = 2.0
"#;

/// How one configured evaluator is constructed.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EvaluatorKind {
    Correctness {
        #[serde(default = "default_max_line_length")]
        max_line_length: usize,
    },
    Maintainability,
    Security {
        #[serde(default)]
        severity_weights: SeverityWeights,
    },
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
}

impl std::fmt::Debug for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorKind::Correctness { max_line_length } => f
                .debug_struct("Correctness")
                .field("max_line_length", max_line_length)
                .finish(),
            EvaluatorKind::Maintainability => f.write_str("Maintainability"),
            EvaluatorKind::Security { severity_weights } => f
                .debug_struct("Security")
                .field("severity_weights", severity_weights)
                .finish(),
            EvaluatorKind::Command { program, args, env } => {
                let env: BTreeMap<&str, &str> = env.keys().map(|k| (k.as_str(), "***")).collect();
                f.debug_struct("Command")
                    .field("program", program)
                    .field("args", args)
                    .field("env", &env)
                    .finish()
            }
        }
    }
}

impl EvaluatorKind {
    /// The `type` tag as written in configuration.
    pub fn type_name(&self) -> &'static str {
        match self {
            EvaluatorKind::Correctness { .. } => "correctness",
            EvaluatorKind::Maintainability => "maintainability",
            EvaluatorKind::Security { .. } => "security",
            EvaluatorKind::Command { .. } => "command",
        }
    }

    /// Score rule used when the entry does not declare one.
    ///
    /// Command evaluators report in an arbitrary schema, so they are
    /// unscored unless configured otherwise.
    pub fn default_rule(&self) -> Option<ScoreRule> {
        match self {
            EvaluatorKind::Correctness { .. } => Some(ScoreRule::flag("syntax_valid")),
            EvaluatorKind::Maintainability => Some(ScoreRule::index("maintainability_index")),
            EvaluatorKind::Security { .. } => Some(ScoreRule::bounded("security_score")),
            EvaluatorKind::Command { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorEntry {
    #[serde(flatten)]
    pub kind: EvaluatorKind,
    /// Overrides the kind's default score rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreRule>,
}

impl EvaluatorEntry {
    pub fn new(kind: EvaluatorKind) -> Self {
        Self { kind, score: None }
    }

    pub fn score_rule(&self) -> Option<ScoreRule> {
        self.score.clone().or_else(|| self.kind.default_rule())
    }
}

/// Top-level codegrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegradeConfig {
    /// Maximum accepted code length, in characters.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,
    /// Per-evaluator time budget in milliseconds.
    #[serde(default = "default_evaluator_timeout_ms")]
    pub evaluator_timeout_ms: u64,
    /// HTTP listen address.
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Registered evaluators keyed by identity.
    #[serde(default = "default_evaluators")]
    pub evaluators: BTreeMap<String, EvaluatorEntry>,
    /// Aggregation weights keyed by identity.
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
fn default_max_code_length() -> usize {
    DEFAULT_MAX_CODE_LENGTH
}
fn default_evaluator_timeout_ms() -> u64 {
    DEFAULT_EVALUATOR_TIMEOUT.as_millis() as u64
}
fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_evaluators() -> BTreeMap<String, EvaluatorEntry> {
    BTreeMap::from([
        (
            "correctness".to_string(),
            EvaluatorEntry::new(EvaluatorKind::Correctness {
                max_line_length: DEFAULT_MAX_LINE_LENGTH,
            }),
        ),
        (
            "maintainability".to_string(),
            EvaluatorEntry::new(EvaluatorKind::Maintainability),
        ),
        (
            "security".to_string(),
            EvaluatorEntry::new(EvaluatorKind::Security {
                severity_weights: SeverityWeights::default(),
            }),
        ),
    ])
}

impl Default for CodegradeConfig {
    fn default() -> Self {
        Self {
            max_code_length: default_max_code_length(),
            evaluator_timeout_ms: default_evaluator_timeout_ms(),
            listen: default_listen(),
            evaluators: default_evaluators(),
            weights: BTreeMap::new(),
        }
    }
}

/// Resolve `${VAR_NAME}` references using `lookup`. Unset variables resolve
/// to the empty string.
pub fn resolve_env_vars_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = s.to_string();
    let mut from = 0;
    while let Some(offset) = result[from..].find("${") {
        let start = from + offset;
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let value = lookup(&result[start + 2..start + end]).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
        // Substituted text is not scanned again.
        from = start + value.len();
    }
    result
}

/// Resolve `${VAR_NAME}` references from the process environment.
pub fn resolve_env_vars(s: &str) -> String {
    resolve_env_vars_with(s, |name| std::env::var(name).ok())
}

fn resolve_entry(entry: &mut EvaluatorEntry, lookup: &impl Fn(&str) -> Option<String>) {
    if let EvaluatorKind::Command { program, args, env } = &mut entry.kind {
        *program = resolve_env_vars_with(program, lookup);
        for arg in args.iter_mut() {
            *arg = resolve_env_vars_with(arg, lookup);
        }
        for value in env.values_mut() {
            *value = resolve_env_vars_with(value, lookup);
        }
    }
}

/// Apply `CODEGRADE_*` overrides and resolve `${VAR}` references.
pub fn apply_env_overrides(
    config: &mut CodegradeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(value) = lookup("CODEGRADE_MAX_CODE_LENGTH") {
        config.max_code_length = value
            .trim()
            .parse()
            .with_context(|| format!("invalid CODEGRADE_MAX_CODE_LENGTH: {value}"))?;
    }
    if let Some(value) = lookup("CODEGRADE_EVALUATOR_TIMEOUT_MS") {
        config.evaluator_timeout_ms = value
            .trim()
            .parse()
            .with_context(|| format!("invalid CODEGRADE_EVALUATOR_TIMEOUT_MS: {value}"))?;
    }
    if let Some(value) = lookup("CODEGRADE_LISTEN") {
        config.listen = value;
    }
    for entry in config.evaluators.values_mut() {
        resolve_entry(entry, &lookup);
    }
    Ok(())
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `codegrade.toml` in the current directory
/// 2. `~/.config/codegrade/config.toml`
///
/// Falls back to the built-in defaults when neither exists.
pub fn load_config() -> Result<CodegradeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<CodegradeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                global_config_path().filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            parse_config_file(&path)?
        }
        None => CodegradeConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<CodegradeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str::<CodegradeConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("codegrade")
            .join("config.toml")
    })
}

/// Create an evaluator instance from its configuration.
pub fn create_evaluator(name: &str, kind: &EvaluatorKind) -> Result<Arc<dyn Evaluator>, InitError> {
    let invalid = |reason: String| InitError::InvalidEvaluator {
        name: name.to_string(),
        reason,
    };
    match kind {
        EvaluatorKind::Correctness { max_line_length } => {
            if *max_line_length == 0 {
                return Err(invalid("max_line_length must be at least 1".into()));
            }
            Ok(Arc::new(CorrectnessEvaluator::new(*max_line_length)))
        }
        EvaluatorKind::Maintainability => Ok(Arc::new(MaintainabilityEvaluator::new())),
        EvaluatorKind::Security { severity_weights } => {
            severity_weights.validate().map_err(invalid)?;
            let evaluator = SecurityEvaluator::new(*severity_weights)
                .map_err(|e| invalid(format!("bad rule pattern: {e}")))?;
            Ok(Arc::new(evaluator))
        }
        EvaluatorKind::Command { program, args, env } => {
            if program.trim().is_empty() {
                return Err(invalid("program must not be empty".into()));
            }
            Ok(Arc::new(
                CommandEvaluator::new(program.clone())
                    .with_args(args.iter().cloned())
                    .with_env(env.clone()),
            ))
        }
    }
}

/// Construct and register every configured evaluator.
pub fn build_registry(config: &CodegradeConfig) -> Result<EvaluatorRegistry, InitError> {
    if config.evaluators.is_empty() {
        return Err(InitError::NoEvaluators);
    }
    let mut registry = EvaluatorRegistry::new();
    for (name, entry) in &config.evaluators {
        let evaluator = create_evaluator(name, &entry.kind)?;
        registry.register(name.clone(), evaluator)?;
    }
    Ok(registry)
}

/// Score rules for every configured evaluator.
pub fn build_normalizer(config: &CodegradeConfig) -> Normalizer {
    config
        .evaluators
        .iter()
        .filter_map(|(name, entry)| entry.score_rule().map(|rule| (name, rule)))
        .fold(Normalizer::new(), |normalizer, (name, rule)| {
            normalizer.with_rule(name.clone(), rule)
        })
}

/// Validate top-level settings and weights into an engine configuration.
pub fn engine_config(config: &CodegradeConfig) -> Result<EngineConfig, InitError> {
    if config.max_code_length == 0 {
        return Err(InitError::InvalidSetting {
            setting: "max_code_length",
            reason: "must be at least 1".into(),
        });
    }
    if config.evaluator_timeout_ms == 0 {
        return Err(InitError::InvalidSetting {
            setting: "evaluator_timeout_ms",
            reason: "must be at least 1".into(),
        });
    }

    let mut weights = HashMap::new();
    for (name, &weight) in &config.weights {
        if !config.evaluators.contains_key(name) {
            return Err(InitError::UnknownWeight(name.clone()));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(InitError::InvalidWeight {
                name: name.clone(),
                weight,
            });
        }
        weights.insert(name.clone(), weight);
    }

    Ok(EngineConfig {
        max_code_length: config.max_code_length,
        evaluator_timeout: Duration::from_millis(config.evaluator_timeout_ms),
        aggregation: AggregationPolicy::with_weights(weights),
    })
}

/// Build a ready-to-serve engine from configuration.
pub fn build_engine(config: &CodegradeConfig) -> Result<EvaluationEngine, InitError> {
    let engine_config = engine_config(config)?;
    let registry = build_registry(config)?;
    let normalizer = build_normalizer(config);
    tracing::info!(
        evaluators = registry.len(),
        timeout_ms = config.evaluator_timeout_ms,
        "evaluation engine ready"
    );
    Ok(EvaluationEngine::new(Arc::new(registry), normalizer, engine_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn resolve_env_vars_basic() {
        let lookup = lookup_from(&[("_CODEGRADE_TEST_VAR", "hello")]);
        assert_eq!(resolve_env_vars_with("${_CODEGRADE_TEST_VAR}", &lookup), "hello");
        assert_eq!(
            resolve_env_vars_with("prefix_${_CODEGRADE_TEST_VAR}_suffix", &lookup),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars_with("${MISSING}x", &lookup), "x");
        assert_eq!(resolve_env_vars_with("${unclosed", &lookup), "${unclosed");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let lookup = lookup_from(&[("A", "${B}"), ("B", "oops")]);
        assert_eq!(resolve_env_vars_with("${A}", lookup), "${B}");
    }

    #[test]
    fn default_config() {
        let config = CodegradeConfig::default();
        assert_eq!(config.max_code_length, 100_000);
        assert_eq!(config.evaluator_timeout_ms, 30_000);
        assert_eq!(config.listen, "127.0.0.1:8000");
        assert_eq!(
            config.evaluators.keys().collect::<Vec<_>>(),
            vec!["correctness", "maintainability", "security"]
        );
        assert!(config.weights.is_empty());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: CodegradeConfig = toml::from_str("").unwrap();
        assert_eq!(config.evaluators.len(), 3);
        assert_eq!(config.evaluator_timeout_ms, 30_000);
    }

    #[test]
    fn starter_config_matches_defaults() {
        let config: CodegradeConfig = toml::from_str(STARTER_CONFIG).unwrap();
        let defaults = CodegradeConfig::default();
        assert_eq!(config.evaluators, defaults.evaluators);
        assert_eq!(config.max_code_length, defaults.max_code_length);
        assert_eq!(config.listen, defaults.listen);
    }

    #[test]
    fn parse_evaluator_table() {
        let toml_str = r#"
max_code_length = 5000
evaluator_timeout_ms = 1500

[evaluators.style]
type = "correctness"
max_line_length = 100

[evaluators.sec]
type = "security"
severity_weights = { high = 50.0 }

[evaluators.lint]
type = "command"
program = "my-linter"
args = ["--json"]
score = { rule = "bounded", field = "score" }

[weights]
sec = 2.0
"#;
        let config: CodegradeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_code_length, 5000);
        assert_eq!(config.evaluators.len(), 3);
        assert_eq!(
            config.evaluators["style"].kind,
            EvaluatorKind::Correctness { max_line_length: 100 }
        );
        let EvaluatorKind::Security { severity_weights } = &config.evaluators["sec"].kind else {
            panic!("expected security entry");
        };
        assert_eq!(severity_weights.high, 50.0);
        assert_eq!(severity_weights.medium, 15.0);
        assert_eq!(
            config.evaluators["lint"].score_rule(),
            Some(ScoreRule::bounded("score"))
        );
        assert_eq!(config.weights["sec"], 2.0);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let toml_str = "[evaluators.x]\ntype = \"pylint\"\n";
        assert!(toml::from_str::<CodegradeConfig>(toml_str).is_err());
    }

    #[test]
    fn env_overrides() {
        let mut config = CodegradeConfig::default();
        config.evaluators.insert(
            "lint".into(),
            EvaluatorEntry::new(EvaluatorKind::Command {
                program: "${LINT_BIN}".into(),
                args: vec!["--token=${LINT_TOKEN}".into()],
                env: BTreeMap::from([("KEY".to_string(), "${LINT_TOKEN}".to_string())]),
            }),
        );
        let lookup = lookup_from(&[
            ("CODEGRADE_MAX_CODE_LENGTH", "42"),
            ("CODEGRADE_EVALUATOR_TIMEOUT_MS", " 250 "),
            ("CODEGRADE_LISTEN", "0.0.0.0:9000"),
            ("LINT_BIN", "/usr/bin/lint"),
            ("LINT_TOKEN", "abc"),
        ]);
        apply_env_overrides(&mut config, lookup).unwrap();
        assert_eq!(config.max_code_length, 42);
        assert_eq!(config.evaluator_timeout_ms, 250);
        assert_eq!(config.listen, "0.0.0.0:9000");
        let EvaluatorKind::Command { program, args, env } = &config.evaluators["lint"].kind else {
            panic!("expected command entry");
        };
        assert_eq!(program, "/usr/bin/lint");
        assert_eq!(args, &vec!["--token=abc".to_string()]);
        assert_eq!(env["KEY"], "abc");
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = CodegradeConfig::default();
        let err = apply_env_overrides(&mut config, lookup_from(&[("CODEGRADE_MAX_CODE_LENGTH", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("CODEGRADE_MAX_CODE_LENGTH"));
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codegrade.toml");
        std::fs::write(&path, "evaluator_timeout_ms = 1234\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.evaluator_timeout_ms, 1234);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "max_code_length = \"many\"\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("failed to parse config"));
    }

    #[test]
    fn debug_masks_command_env() {
        let kind = EvaluatorKind::Command {
            program: "lint".into(),
            args: vec![],
            env: BTreeMap::from([("LINT_TOKEN".to_string(), "s3cr3t".to_string())]),
        };
        let debug = format!("{kind:?}");
        assert!(debug.contains("LINT_TOKEN"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[test]
    fn build_default_registry() {
        let registry = build_registry(&CodegradeConfig::default()).unwrap();
        let entries: Vec<_> = registry.entries().collect();
        assert_eq!(
            entries,
            vec![
                ("correctness", "correctness"),
                ("maintainability", "maintainability"),
                ("security", "security"),
            ]
        );
    }

    #[test]
    fn invalid_entries_reject_startup() {
        let mut config = CodegradeConfig::default();
        config.evaluators.insert(
            "lint".into(),
            EvaluatorEntry::new(EvaluatorKind::Command {
                program: "  ".into(),
                args: vec![],
                env: BTreeMap::new(),
            }),
        );
        let err = build_registry(&config).unwrap_err();
        assert!(matches!(err, InitError::InvalidEvaluator { ref name, .. } if name == "lint"));

        let mut config = CodegradeConfig::default();
        config.evaluators.insert(
            "narrow".into(),
            EvaluatorEntry::new(EvaluatorKind::Correctness { max_line_length: 0 }),
        );
        assert!(build_registry(&config).is_err());

        let config = CodegradeConfig {
            evaluators: BTreeMap::new(),
            ..Default::default()
        };
        assert!(matches!(build_registry(&config), Err(InitError::NoEvaluators)));
    }

    #[test]
    fn normalizer_follows_entries() {
        let mut config = CodegradeConfig::default();
        config.evaluators.insert(
            "lint".into(),
            EvaluatorEntry::new(EvaluatorKind::Command {
                program: "lint".into(),
                args: vec![],
                env: BTreeMap::new(),
            }),
        );
        config.evaluators.get_mut("correctness").unwrap().score =
            Some(ScoreRule::index("pep8_compliance"));

        let normalizer = build_normalizer(&config);
        assert_eq!(
            normalizer.rule("correctness"),
            Some(&ScoreRule::index("pep8_compliance"))
        );
        assert_eq!(
            normalizer.rule("security"),
            Some(&ScoreRule::bounded("security_score"))
        );
        assert!(normalizer.rule("lint").is_none());
    }

    #[test]
    fn engine_settings_are_validated() {
        let config = CodegradeConfig {
            evaluator_timeout_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            engine_config(&config),
            Err(InitError::InvalidSetting { setting: "evaluator_timeout_ms", .. })
        ));

        let mut config = CodegradeConfig::default();
        config.weights.insert("ghost".into(), 1.0);
        assert!(matches!(engine_config(&config), Err(InitError::UnknownWeight(_))));

        let mut config = CodegradeConfig::default();
        config.weights.insert("security".into(), -2.0);
        assert!(matches!(engine_config(&config), Err(InitError::InvalidWeight { .. })));

        let mut config = CodegradeConfig::default();
        config.weights.insert("correctness".into(), 0.0);
        assert!(matches!(engine_config(&config), Err(InitError::InvalidWeight { .. })));

        let mut config = CodegradeConfig::default();
        config.weights.insert("correctness".into(), f64::NAN);
        assert!(matches!(engine_config(&config), Err(InitError::InvalidWeight { .. })));

        let mut config = CodegradeConfig::default();
        config.weights.insert("security".into(), 3.0);
        let built = engine_config(&config).unwrap();
        assert_eq!(built.aggregation.weight("security"), 3.0);
        assert_eq!(built.aggregation.weight("correctness"), 1.0);
        assert_eq!(built.evaluator_timeout, Duration::from_secs(30));
    }
}
