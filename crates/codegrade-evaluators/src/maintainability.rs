//! Cyclomatic complexity, Halstead metrics and the maintainability index.
//!
//! Complexity follows the usual decision-point counting: every `if`,
//! `elif`, loop, `except`, `with`, `assert`, boolean operator and
//! comprehension clause adds one, as does an `else` attached to a loop or a
//! `try`. Nested functions fold into their parent; methods are reported on
//! their own and their class averages them.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use codegrade_core::{analyze_blocking, CodeArtifact, EvaluationError, Evaluator};

use crate::lexer::{logical_lines, tokenize, LexError, LogicalLine, Token, TokenKind};

/// Measures how hard source is to maintain.
#[derive(Debug, Clone, Default)]
pub struct MaintainabilityEvaluator;

impl MaintainabilityEvaluator {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Function,
    Method,
    Class,
}

/// Complexity of one function, method or class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classname: Option<String>,
    pub lineno: usize,
    pub endline: usize,
    pub complexity: u32,
    pub rank: char,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplexitySummary {
    pub average: f64,
    pub total: u32,
    pub blocks: usize,
    pub functions: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Halstead {
    pub h1: usize,
    pub h2: usize,
    #[serde(rename = "N1")]
    pub n1: usize,
    #[serde(rename = "N2")]
    pub n2: usize,
    pub vocabulary: usize,
    pub length: usize,
    pub calculated_length: f64,
    pub volume: f64,
    pub difficulty: f64,
    pub effort: f64,
    pub time: f64,
    pub bugs: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawMetrics {
    pub loc: usize,
    pub lloc: usize,
    pub sloc: usize,
    pub comments: usize,
    pub multi: usize,
    pub blank: usize,
    pub single_comments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MaintainabilityReport {
    pub cyclomatic_complexity: ComplexitySummary,
    pub maintainability_index: f64,
    pub rank: char,
    pub halstead: Halstead,
    pub code_metrics: RawMetrics,
}

/// Analyze `source`. Fails only when the source cannot be tokenized.
pub fn analyze(source: &str) -> Result<MaintainabilityReport, LexError> {
    let tokens = tokenize(source)?;
    let lines = logical_lines(&tokens);

    let (functions, module_total) = cyclomatic(&lines);
    let block_sum: u32 = functions.iter().map(|b| b.complexity).sum();
    let average = if functions.is_empty() {
        0.0
    } else {
        f64::from(block_sum) / functions.len() as f64
    };

    let halstead = halstead(&lines);
    let raw = raw_metrics(source, &tokens, &lines);

    let comment_lines = raw.comments + raw.multi;
    let comment_percent = if raw.sloc == 0 {
        0.0
    } else {
        comment_lines as f64 / raw.sloc as f64 * 100.0
    };
    let mi = maintainability_index(halstead.volume, module_total, raw.sloc, comment_percent);

    Ok(MaintainabilityReport {
        cyclomatic_complexity: ComplexitySummary {
            average,
            total: block_sum,
            blocks: functions.len(),
            functions,
        },
        maintainability_index: mi,
        rank: mi_rank(mi),
        halstead,
        code_metrics: raw,
    })
}

/// The maintainability index on a 0-100 scale.
///
/// `complexity` is the total cyclomatic complexity of the module and
/// `comment_percent` the share of comment lines over source lines.
pub fn maintainability_index(volume: f64, complexity: u32, sloc: usize, comment_percent: f64) -> f64 {
    if volume <= 0.0 || sloc == 0 {
        return 100.0;
    }
    let comments_scale = (2.46 * comment_percent.to_radians()).sqrt();
    let raw = 171.0 - 5.2 * volume.ln() - 0.23 * f64::from(complexity) - 16.2 * (sloc as f64).ln()
        + 50.0 * comments_scale.sin();
    (raw * 100.0 / 171.0).clamp(0.0, 100.0)
}

/// Rank a cyclomatic complexity: A (1-5) through F (41+).
pub fn cc_rank(complexity: u32) -> char {
    match complexity {
        0..=5 => 'A',
        6..=10 => 'B',
        11..=20 => 'C',
        21..=30 => 'D',
        31..=40 => 'E',
        _ => 'F',
    }
}

/// Rank a maintainability index: A (20-100), B (10-19), C (0-9).
pub fn mi_rank(mi: f64) -> char {
    if mi > 19.0 {
        'A'
    } else if mi > 9.0 {
        'B'
    } else {
        'C'
    }
}

#[async_trait]
impl Evaluator for MaintainabilityEvaluator {
    fn kind(&self) -> &str {
        "maintainability"
    }

    #[instrument(skip_all, fields(bytes = artifact.as_str().len()))]
    async fn evaluate(&self, artifact: &CodeArtifact) -> Result<serde_json::Value, EvaluationError> {
        let source = artifact.shared();
        analyze_blocking(move || {
            let report = analyze(&source)
                .map_err(|e| EvaluationError::Analysis(format!("cannot tokenize source: {e}")))?;
            tracing::debug!(
                mi = report.maintainability_index,
                blocks = report.cyclomatic_complexity.blocks,
                "maintainability measured"
            );
            serde_json::to_value(report)
                .map_err(|e| EvaluationError::Internal(format!("failed to encode report: {e}")))
        })
        .await
    }
}

// --- cyclomatic complexity ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Class,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    name: String,
    classname: Option<String>,
    depth: usize,
    lineno: usize,
    endline: usize,
    complexity: u32,
    methods: u32,
}

/// Returns the reported blocks and the total complexity of the module.
fn cyclomatic(lines: &[LogicalLine<'_, '_>]) -> (Vec<Block>, u32) {
    let mut stack: Vec<Scope> = Vec::new();
    let mut blocks = Vec::new();
    let mut module = 0u32;
    let mut last_header: HashMap<usize, &'static str> = HashMap::new();

    for line in lines {
        while stack.last().is_some_and(|s| line.depth <= s.depth) {
            if let Some(scope) = stack.pop() {
                close(scope, &mut stack, &mut blocks, &mut module);
            }
        }

        let decisions = decisions(line, last_header.get(&line.depth).copied());
        match stack.last_mut() {
            Some(scope) => scope.complexity += decisions,
            None => module += decisions,
        }

        let keyword = line.compound_keyword();
        if let Some(keyword) = keyword {
            last_header.insert(line.depth, keyword);
        }
        if let Some(kind) = keyword.and_then(|kw| match kw {
            "def" => Some(ScopeKind::Function),
            "class" => Some(ScopeKind::Class),
            _ => None,
        }) {
            let name = definition_name(line).unwrap_or("<anonymous>").to_string();
            let classname = stack
                .last()
                .filter(|s| s.kind == ScopeKind::Class)
                .map(|s| s.name.clone());
            stack.push(Scope {
                kind,
                name,
                classname,
                depth: line.depth,
                lineno: line.line(),
                endline: line.end_line(),
                complexity: 1,
                methods: 0,
            });
        }

        let end = line.end_line();
        for scope in &mut stack {
            scope.endline = end;
        }
    }

    while let Some(scope) = stack.pop() {
        close(scope, &mut stack, &mut blocks, &mut module);
    }

    blocks.sort_by_key(|b: &Block| b.lineno);
    (blocks, module)
}

fn close(scope: Scope, stack: &mut [Scope], blocks: &mut Vec<Block>, module: &mut u32) {
    let real = scope.complexity;
    match stack.last_mut() {
        // Closures and classes defined inside a function count towards it.
        Some(parent) if parent.kind == ScopeKind::Function => {
            parent.complexity += real;
            return;
        }
        Some(parent) => {
            parent.complexity += real;
            if scope.kind == ScopeKind::Function {
                parent.methods += 1;
            }
        }
        None => *module += real,
    }

    let (kind, complexity) = match scope.kind {
        ScopeKind::Class if scope.methods == 0 => (BlockKind::Class, real),
        ScopeKind::Class => (
            BlockKind::Class,
            real / scope.methods + u32::from(scope.methods > 1),
        ),
        ScopeKind::Function if scope.classname.is_some() => (BlockKind::Method, real),
        ScopeKind::Function => (BlockKind::Function, real),
    };
    blocks.push(Block {
        name: scope.name,
        kind,
        classname: scope.classname,
        lineno: scope.lineno,
        endline: scope.endline,
        complexity,
        rank: cc_rank(complexity),
    });
}

fn definition_name<'a>(line: &LogicalLine<'_, 'a>) -> Option<&'a str> {
    let position = line
        .tokens
        .iter()
        .position(|t| t.is_keyword("def") || t.is_keyword("class"))?;
    line.tokens.get(position + 1).map(|t| t.text)
}

/// Decision points on one logical line. `previous_header` is the last
/// compound keyword seen at the same depth, used to tell a loop's `else`
/// from an `if`'s.
fn decisions(line: &LogicalLine<'_, '_>, previous_header: Option<&str>) -> u32 {
    let mut count = 0;
    for (i, token) in line.tokens.iter().enumerate() {
        if token.kind != TokenKind::Name {
            continue;
        }
        match token.text {
            "if" | "elif" | "for" | "while" | "except" | "with" | "assert" | "and" | "or" => count += 1,
            "else" if i == 0 && matches!(previous_header, Some("for" | "while" | "except")) => {
                count += 1
            }
            _ => {}
        }
    }
    count
}

// --- Halstead ---

const BINARY_ONLY: &[&str] = &[
    "*", "/", "//", "%", "**", "<<", ">>", "&", "|", "^", "@", "<", ">", "<=", ">=", "==", "!=",
    "+=", "-=", "*=", "/=", "//=", "%=", "**=", ">>=", "<<=", "&=", "|=", "^=", "@=",
];

const UNARY_OR_BINARY: &[&str] = &["+", "-"];

fn is_operand(token: &Token<'_>) -> bool {
    match token.kind {
        TokenKind::Number | TokenKind::Str => true,
        TokenKind::Name => !crate::lexer::is_keyword(token.text) || matches!(token.text, "True" | "False" | "None"),
        TokenKind::Op => matches!(token.text, ")" | "]" | "}"),
        _ => false,
    }
}

fn operand_key(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::Name | TokenKind::Number | TokenKind::Str => token.text.to_string(),
        // Compound expressions are distinct operands.
        _ => format!("<expr {}:{}>", token.line, token.col),
    }
}

fn halstead(lines: &[LogicalLine<'_, '_>]) -> Halstead {
    let mut operators = HashSet::new();
    let mut operands = HashSet::new();
    let (mut n1, mut n2) = (0usize, 0usize);

    for line in lines {
        let tokens = &line.tokens;
        let mut pending_for = 0usize;
        let mut i = 0;
        while i < tokens.len() {
            let token = tokens[i];
            let prev = i.checked_sub(1).map(|p| tokens[p]);
            let next = tokens.get(i + 1).copied();
            let after_operand = prev.is_some_and(is_operand);

            // (operator text, has left operand, tokens consumed)
            let op: Option<(String, bool, usize)> = match token.kind {
                TokenKind::Op if i == 0 && token.text == "@" => None,
                TokenKind::Op if BINARY_ONLY.contains(&token.text) => {
                    after_operand.then(|| (token.text.to_string(), true, 1))
                }
                TokenKind::Op if UNARY_OR_BINARY.contains(&token.text) || token.text == "~" => {
                    Some((token.text.to_string(), after_operand && token.text != "~", 1))
                }
                TokenKind::Name => match token.text {
                    "for" => {
                        pending_for += 1;
                        None
                    }
                    "in" if pending_for > 0 => {
                        pending_for -= 1;
                        None
                    }
                    "and" | "or" | "in" => Some((token.text.to_string(), true, 1)),
                    "is" if next.is_some_and(|n| n.is_keyword("not")) => Some(("is not".into(), true, 2)),
                    "is" => Some(("is".into(), true, 1)),
                    "not" if next.is_some_and(|n| n.is_keyword("in")) => Some(("not in".into(), true, 2)),
                    "not" => Some(("not".into(), false, 1)),
                    _ => None,
                },
                _ => None,
            };

            let Some((text, binary, consumed)) = op else {
                i += 1;
                continue;
            };

            n1 += 1;
            operators.insert(text);
            if binary {
                if let Some(left) = prev {
                    n2 += 1;
                    operands.insert(operand_key(left));
                }
            }
            if let Some(right) = tokens.get(i + consumed) {
                n2 += 1;
                operands.insert(operand_key(right));
            }
            i += consumed;
        }
    }

    halstead_metrics(operators.len(), operands.len(), n1, n2)
}

fn halstead_metrics(h1: usize, h2: usize, n1: usize, n2: usize) -> Halstead {
    let log2 = |x: usize| if x == 0 { 0.0 } else { (x as f64).log2() };
    let vocabulary = h1 + h2;
    let length = n1 + n2;
    let calculated_length = h1 as f64 * log2(h1) + h2 as f64 * log2(h2);
    let volume = length as f64 * log2(vocabulary);
    let difficulty = if h2 == 0 {
        0.0
    } else {
        h1 as f64 / 2.0 * (n2 as f64 / h2 as f64)
    };
    let effort = difficulty * volume;
    Halstead {
        h1,
        h2,
        n1,
        n2,
        vocabulary,
        length,
        calculated_length,
        volume,
        difficulty,
        effort,
        time: effort / 18.0,
        bugs: volume / 3000.0,
    }
}

// --- raw metrics ---

fn raw_metrics(source: &str, tokens: &[Token<'_>], lines: &[LogicalLine<'_, '_>]) -> RawMetrics {
    let physical: Vec<&str> = source.lines().collect();
    let loc = physical.len();

    // Interior lines of multi-line strings are neither blank nor comments.
    let mut in_string = vec![false; loc + 1];
    for token in tokens.iter().filter(|t| t.kind == TokenKind::Str) {
        for line in token.line + 1..=token.end_line().min(loc) {
            in_string[line] = true;
        }
    }

    let blank = physical
        .iter()
        .enumerate()
        .filter(|(idx, text)| text.trim().is_empty() && !in_string[idx + 1])
        .count();

    let comments = tokens.iter().filter(|t| t.kind == TokenKind::Comment).count();
    let mut single_comments = physical
        .iter()
        .enumerate()
        .filter(|(idx, text)| text.trim_start().starts_with('#') && !in_string[idx + 1])
        .count();

    let mut multi = 0;
    for line in lines {
        if let [only] = line.tokens.as_slice() {
            if only.kind == TokenKind::Str {
                let span = only.end_line() - only.line + 1;
                if span > 1 {
                    multi += span;
                } else {
                    single_comments += 1;
                }
            }
        }
    }

    RawMetrics {
        loc,
        lloc: lines.len(),
        sloc: loc.saturating_sub(blank + single_comments + multi),
        comments,
        multi,
        blank,
        single_comments,
    }
}
