//! Syntax validation and PEP 8 style checks.

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use codegrade_core::{analyze_blocking, CodeArtifact, EvaluationError, Evaluator};

use crate::lexer::{logical_lines, tokenize, LogicalLine, TokenKind};

pub const DEFAULT_MAX_LINE_LENGTH: usize = 79;

/// Operators and keywords that cannot end a statement.
const DANGLING: &[&str] = &[
    "=", "+", "-", "/", "//", "%", "**", "==", "!=", "<", ">", "<=", ">=", "|", "&", "^", "<<",
    ">>", "+=", "-=", "*=", "/=", "//=", "%=", "**=", ".", "and", "or", "not", "is", "in",
];

/// Checks that source parses and follows PEP 8.
#[derive(Debug, Clone)]
pub struct CorrectnessEvaluator {
    max_line_length: usize,
}

impl CorrectnessEvaluator {
    pub fn new(max_line_length: usize) -> Self {
        Self { max_line_length }
    }
}

impl Default for CorrectnessEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxIssue {
    pub message: String,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleViolation {
    pub code: &'static str,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrectnessReport {
    pub syntax_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_error: Option<SyntaxIssue>,
    pub style_errors: Vec<StyleViolation>,
    pub pep8_compliance: bool,
}

impl CorrectnessReport {
    fn invalid(issue: SyntaxIssue) -> Self {
        Self {
            syntax_valid: false,
            syntax_error: Some(issue),
            style_errors: Vec::new(),
            pep8_compliance: false,
        }
    }
}

/// Check `source`. Style is only checked once the syntax is valid.
pub fn check(source: &str, max_line_length: usize) -> CorrectnessReport {
    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(e) => {
            return CorrectnessReport::invalid(SyntaxIssue {
                message: e.message,
                line: e.line,
            })
        }
    };
    let lines = logical_lines(&tokens);
    if let Err(issue) = check_structure(&lines) {
        return CorrectnessReport::invalid(issue);
    }

    let style_errors = check_style(source, &lines, max_line_length);
    CorrectnessReport {
        syntax_valid: true,
        syntax_error: None,
        pep8_compliance: style_errors.is_empty(),
        style_errors,
    }
}

#[async_trait]
impl Evaluator for CorrectnessEvaluator {
    fn kind(&self) -> &str {
        "correctness"
    }

    #[instrument(skip_all, fields(bytes = artifact.as_str().len()))]
    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError> {
        let source = artifact.shared();
        let max_line_length = self.max_line_length;
        analyze_blocking(move || {
            let report = check(&source, max_line_length);
            tracing::debug!(
                syntax_valid = report.syntax_valid,
                style_errors = report.style_errors.len(),
                "correctness checked"
            );
            serde_json::to_value(report)
                .map_err(|e| EvaluationError::Internal(format!("failed to encode report: {e}")))
        })
        .await
    }
}

// --- syntax ---

fn check_structure(lines: &[LogicalLine<'_, '_>]) -> Result<(), SyntaxIssue> {
    let mut awaiting_block: Option<(&'static str, usize)> = None;

    for line in lines {
        let Some(first) = line.first() else { continue };

        match awaiting_block.take() {
            Some((keyword, header_line)) if !line.indented => {
                return Err(SyntaxIssue {
                    message: format!(
                        "expected an indented block after {} on line {header_line}",
                        describe(keyword)
                    ),
                    line: first.line,
                });
            }
            None if line.indented => {
                return Err(SyntaxIssue {
                    message: "unexpected indent".into(),
                    line: first.line,
                });
            }
            _ => {}
        }

        if let Some(keyword) = line.compound_keyword() {
            check_header_name(line, keyword)?;
            match top_level_colon(line) {
                None => {
                    return Err(SyntaxIssue {
                        message: "expected ':'".into(),
                        line: line.end_line(),
                    });
                }
                Some(i) if i + 1 == line.tokens.len() => awaiting_block = Some((keyword, first.line)),
                // `if x: return y` carries its suite on the same line.
                Some(_) => {}
            }
        } else if let Some(last) = line.last() {
            let dangling = matches!(last.kind, TokenKind::Op | TokenKind::Name)
                && DANGLING.contains(&last.text);
            if dangling {
                return Err(SyntaxIssue {
                    message: "invalid syntax".into(),
                    line: last.line,
                });
            }
        }
    }

    match awaiting_block {
        Some((keyword, header_line)) => Err(SyntaxIssue {
            message: format!(
                "expected an indented block after {} on line {header_line}",
                describe(keyword)
            ),
            line: header_line + 1,
        }),
        None => Ok(()),
    }
}

fn check_header_name(line: &LogicalLine<'_, '_>, keyword: &str) -> Result<(), SyntaxIssue> {
    if keyword != "def" && keyword != "class" {
        return Ok(());
    }
    let position = line.tokens.iter().position(|t| t.is_keyword(keyword));
    let name = position.and_then(|i| line.tokens.get(i + 1));
    let after = position.and_then(|i| line.tokens.get(i + 2));

    let valid = match (name, keyword) {
        (Some(name), "def") => name.is_identifier() && after.is_some_and(|t| t.is_op("(")),
        (Some(name), _) => name.is_identifier(),
        (None, _) => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SyntaxIssue {
            message: "invalid syntax".into(),
            line: line.line(),
        })
    }
}

/// Index of the `:` that ends a compound statement header, skipping colons
/// inside brackets and those belonging to a lambda.
fn top_level_colon(line: &LogicalLine<'_, '_>) -> Option<usize> {
    let mut depth = 0i32;
    let mut lambdas = 0usize;
    for (i, token) in line.tokens.iter().enumerate() {
        match token.kind {
            TokenKind::Op => match token.text {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth -= 1,
                ":" if depth == 0 => {
                    if lambdas > 0 {
                        lambdas -= 1;
                    } else {
                        return Some(i);
                    }
                }
                _ => {}
            },
            TokenKind::Name if depth == 0 && token.text == "lambda" => lambdas += 1,
            _ => {}
        }
    }
    None
}

fn describe(keyword: &str) -> String {
    match keyword {
        "def" => "function definition".to_string(),
        "class" => "class definition".to_string(),
        other => format!("'{other}' statement"),
    }
}

// --- style ---

fn violation(code: &'static str, line: usize, column: usize, message: impl Into<String>) -> StyleViolation {
    StyleViolation {
        code,
        line,
        column,
        message: message.into(),
    }
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn is_comment_only(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

fn check_style(source: &str, lines: &[LogicalLine<'_, '_>], max_line_length: usize) -> Vec<StyleViolation> {
    let physical: Vec<&str> = source.lines().collect();
    let mut out = Vec::new();

    for (idx, raw) in physical.iter().enumerate() {
        let number = idx + 1;

        let length = raw.chars().count();
        if length > max_line_length {
            out.push(violation(
                "E501",
                number,
                max_line_length + 1,
                format!("line too long ({length} > {max_line_length} characters)"),
            ));
        }

        let stripped = raw.trim_end_matches([' ', '\t', '\x0c']);
        if stripped.len() != raw.len() {
            if stripped.is_empty() {
                out.push(violation("W293", number, 1, "whitespace on blank line"));
            } else {
                out.push(violation(
                    "W291",
                    number,
                    stripped.chars().count() + 1,
                    "trailing whitespace",
                ));
            }
        }

        let indent_len = raw.len() - raw.trim_start_matches([' ', '\t']).len();
        if !stripped.is_empty() && raw[..indent_len].contains('\t') {
            out.push(violation("W191", number, 1, "indentation contains tabs"));
        }
    }

    for (i, line) in lines.iter().enumerate() {
        let Some(first) = line.first() else { continue };
        let text = physical.get(first.line - 1).copied().unwrap_or("");

        let leading = &text[..text.len() - text.trim_start_matches([' ', '\t']).len()];
        if !leading.contains('\t') && leading.len() % 4 != 0 {
            out.push(violation(
                "E111",
                first.line,
                leading.len() + 1,
                "indentation is not a multiple of 4",
            ));
        }

        if first.is_keyword("import") {
            if let Some(comma) = line.tokens.iter().find(|t| t.is_op(",")) {
                out.push(violation("E401", comma.line, comma.col + 1, "multiple imports on one line"));
            }
        }

        for pair in line.tokens.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if !(a.is_op(",") || a.is_op(";")) {
                continue;
            }
            let adjacent = b.line == a.line && b.col == a.col + a.text.len();
            let closes_tuple = a.text == "," && (b.is_op(")") || b.is_op("]"));
            if adjacent && !closes_tuple {
                out.push(violation(
                    "E231",
                    a.line,
                    a.col + 1,
                    format!("missing whitespace after '{}'", a.text),
                ));
            }
        }

        if i > 0 && line.depth == 0 && is_definition_start(line) && !is_decorator(&lines[i - 1]) {
            let blanks = blank_lines_before(&physical, first.line);
            if blanks < 2 {
                out.push(violation(
                    "E302",
                    first.line,
                    first.col + 1,
                    format!("expected 2 blank lines, found {blanks}"),
                ));
            }
        }
    }

    if let Some(last) = physical.last() {
        if !source.ends_with('\n') {
            out.push(violation(
                "W292",
                physical.len(),
                last.chars().count() + 1,
                "no newline at end of file",
            ));
        }
    }

    out.sort_by(|a, b| (a.line, a.column, a.code).cmp(&(b.line, b.column, b.code)));
    out
}

fn is_decorator(line: &LogicalLine<'_, '_>) -> bool {
    line.first().is_some_and(|t| t.is_op("@"))
}

fn is_definition_start(line: &LogicalLine<'_, '_>) -> bool {
    let mut tokens = line.tokens.iter();
    let Some(first) = tokens.next() else {
        return false;
    };
    if first.is_op("@") || first.is_keyword("def") || first.is_keyword("class") {
        return true;
    }
    first.is_keyword("async") && tokens.next().is_some_and(|t| t.is_keyword("def"))
}

/// Blank lines directly above `line` (1-based), looking through comments.
fn blank_lines_before(physical: &[&str], line: usize) -> usize {
    physical[..line.saturating_sub(1)]
        .iter()
        .rev()
        .take_while(|text| is_blank(text) || is_comment_only(text))
        .filter(|text| is_blank(text))
        .count()
}
