//! Evaluators backed by an external program.
//!
//! The program receives the source on stdin and must print a single JSON
//! object on stdout, which becomes the evaluator's payload. The child is
//! killed when the evaluation future is dropped, so engine timeouts and
//! request cancellation also stop the process.

use std::collections::BTreeMap;
use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::instrument;

use codegrade_core::{CodeArtifact, EvaluationError, Evaluator};

/// Environment variables never passed through to a child program.
const SCRUBBED_ENV: &[&str] = &[
    "SSH_AUTH_SOCK",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "CARGO_REGISTRY_TOKEN",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "DOCKER_HOST",
    "DOCKER_CONFIG",
    "KUBECONFIG",
    "DATABASE_URL",
    "NPM_TOKEN",
];

const SCRUBBED_SUFFIXES: &[&str] = &["_TOKEN", "_SECRET", "_KEY", "_PASSWORD"];

/// Longest stderr excerpt carried into a tool failure message.
const STDERR_EXCERPT: usize = 2000;

fn is_scrubbed(name: &str) -> bool {
    SCRUBBED_ENV.contains(&name) || SCRUBBED_SUFFIXES.iter().any(|s| name.ends_with(s))
}

#[derive(Clone)]
pub struct CommandEvaluator {
    program: String,
    args: Vec<String>,
    env: BTreeMap<String, String>,
}

impl CommandEvaluator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Variables set explicitly here are passed even if their names would
    /// otherwise be scrubbed.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, _) in std::env::vars_os() {
            if key.to_str().is_some_and(is_scrubbed) {
                cmd.env_remove(&key);
            }
        }
        cmd.envs(&self.env);
        cmd
    }
}

// Configured env values may hold credentials.
impl fmt::Debug for CommandEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let env: BTreeMap<&str, &str> = self.env.keys().map(|k| (k.as_str(), "***")).collect();
        f.debug_struct("CommandEvaluator")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env", &env)
            .finish()
    }
}

#[async_trait]
impl Evaluator for CommandEvaluator {
    fn kind(&self) -> &str {
        "command"
    }

    #[instrument(skip_all, fields(program = %self.program, bytes = artifact.as_str().len()))]
    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError> {
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| EvaluationError::Tool(format!("failed to start '{}': {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EvaluationError::Internal("child stdin was not captured".into()))?;
        let input = artifact.as_str().as_bytes().to_vec();

        // Feed stdin while draining stdout so large inputs cannot deadlock.
        let write = async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            match result {
                Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let (written, output) = tokio::join!(write, child.wait_with_output());

        let output = output
            .map_err(|e| EvaluationError::Tool(format!("failed to wait for '{}': {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let excerpt: String = stderr.chars().take(STDERR_EXCERPT).collect();
            return Err(EvaluationError::Tool(if excerpt.is_empty() {
                format!("'{}' exited with {}", self.program, output.status)
            } else {
                format!("'{}' exited with {}: {excerpt}", self.program, output.status)
            }));
        }
        written.map_err(|e| EvaluationError::Tool(format!("failed to write source to '{}': {e}", self.program)))?;

        let payload: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| EvaluationError::Analysis(format!("output of '{}' is not valid JSON: {e}", self.program)))?;
        if !payload.is_object() {
            return Err(EvaluationError::Analysis(format!(
                "output of '{}' must be a JSON object",
                self.program
            )));
        }
        tracing::debug!(program = %self.program, "command evaluator finished");
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrub_rules() {
        assert!(is_scrubbed("GITHUB_TOKEN"));
        assert!(is_scrubbed("MY_SERVICE_PASSWORD"));
        assert!(is_scrubbed("STRIPE_SECRET"));
        assert!(is_scrubbed("SOME_API_KEY"));
        assert!(!is_scrubbed("PATH"));
        assert!(!is_scrubbed("HOME"));
        assert!(!is_scrubbed("KEYBOARD"));
    }

    #[test]
    fn debug_masks_env_values() {
        let mut env = BTreeMap::new();
        env.insert("LINT_TOKEN".to_string(), "s3cr3t".to_string());
        let eval = CommandEvaluator::new("lint").with_env(env);
        let debug = format!("{eval:?}");
        assert!(debug.contains("LINT_TOKEN"));
        assert!(!debug.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn missing_program_is_a_tool_error() {
        let eval = CommandEvaluator::new("codegrade-definitely-not-installed");
        let err = eval.evaluate(&CodeArtifact::new("x = 1")).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Tool(_)), "{err:?}");
    }

    #[cfg(unix)]
    mod unix {
        use super::*;

        fn sh(script: &str) -> CommandEvaluator {
            CommandEvaluator::new("sh").with_args(["-c", script])
        }

        #[tokio::test]
        async fn json_object_becomes_payload() {
            let eval = sh(r#"wc -c | awk '{ printf "{\"bytes\": %d}", $1 }'"#);
            let payload = eval.evaluate(&CodeArtifact::new("x = 1\n")).await.unwrap();
            assert_eq!(payload["bytes"], 6);
        }

        #[tokio::test]
        async fn nonzero_exit_reports_stderr() {
            let eval = sh("echo 'linter exploded' >&2; exit 3");
            let err = eval.evaluate(&CodeArtifact::new("x = 1")).await.unwrap_err();
            match err {
                EvaluationError::Tool(msg) => assert!(msg.contains("linter exploded"), "{msg}"),
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn invalid_output_is_an_analysis_error() {
            let err = sh("echo not json").evaluate(&CodeArtifact::new("x")).await.unwrap_err();
            assert!(matches!(err, EvaluationError::Analysis(_)));

            let err = sh("echo '[1, 2]'").evaluate(&CodeArtifact::new("x")).await.unwrap_err();
            assert!(matches!(err, EvaluationError::Analysis(_)));
        }

        #[tokio::test]
        async fn program_that_ignores_stdin_still_succeeds() {
            let eval = sh(r#"echo '{"ok": true}'"#);
            let big = "x = 1\n".repeat(100_000);
            let payload = eval.evaluate(&CodeArtifact::new(big)).await.unwrap();
            assert_eq!(payload["ok"], true);
        }

        #[tokio::test]
        async fn configured_env_is_passed() {
            let mut env = BTreeMap::new();
            env.insert("CODEGRADE_LEVEL".to_string(), "7".to_string());
            let eval = sh(r#"cat > /dev/null; echo "{\"level\": $CODEGRADE_LEVEL}""#).with_env(env);
            let payload = eval.evaluate(&CodeArtifact::new("x")).await.unwrap();
            assert_eq!(payload["level"], 7);
        }
    }
}
