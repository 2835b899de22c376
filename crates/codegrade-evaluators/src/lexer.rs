//! A small Python tokenizer.
//!
//! Produces the token stream the built-in analyzers work from: names,
//! numbers, strings, operators and comments, plus the `Newline`, `Nl`,
//! `Indent` and `Dedent` structure tokens that delimit logical lines. It does
//! not build a syntax tree. Errors are the ones a tokenizer can detect:
//! unterminated strings, unbalanced brackets, inconsistent dedents and stray
//! characters.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Op,
    Comment,
    /// End of a logical line.
    Newline,
    /// Line break that does not end a logical line (blank lines, comments,
    /// breaks inside brackets).
    Nl,
    Indent,
    Dedent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// 1-based line of the first character.
    pub line: usize,
    /// 0-based byte offset within that line.
    pub col: usize,
}

impl Token<'_> {
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.kind == TokenKind::Name && self.text == keyword
    }

    pub fn is_op(&self, op: &str) -> bool {
        self.kind == TokenKind::Op && self.text == op
    }

    /// True for names that are not reserved words.
    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Name && !is_keyword(self.text)
    }

    /// Last line the token touches; differs from `line` for multi-line strings.
    pub fn end_line(&self) -> usize {
        self.line + self.text.matches('\n').count()
    }
}

pub const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Keywords that open a compound statement.
pub const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "elif", "else", "for", "while", "try", "except", "finally", "with", "def", "class",
];

/// Soft keywords that open a compound statement only in header position.
pub const SOFT_COMPOUND_KEYWORDS: &[&str] = &["match", "case"];

/// Operators that make a leading `match`/`case` an ordinary name.
const NAME_FOLLOWERS: &[&str] = &[
    "=", ".", ",", ":", ")", "]", "}", ";", ":=", "+=", "-=", "*=", "/=", "//=", "%=", "**=",
    ">>=", "<<=", "&=", "|=", "^=", "@=",
];

/// Longest match first.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "**", "//", ">>", "<<", "<=", ">=", "==",
    "!=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@",
    "&", "|", "^", "~", "<", ">", "=", ".", ",", ":", ";",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

/// Tokenize Python source.
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    at_line_start: bool,
    indents: Vec<usize>,
    brackets: Vec<(char, usize)>,
    line_has_tokens: bool,
    tokens: Vec<Token<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            at_line_start: true,
            indents: vec![0],
            brackets: Vec::new(),
            line_has_tokens: false,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<Token<'a>>, LexError> {
        loop {
            if self.at_line_start {
                self.at_line_start = false;
                if self.brackets.is_empty() {
                    self.indentation()?;
                }
            }

            let Some(c) = self.peek() else { break };
            let start = self.pos;
            match c {
                ' ' | '\t' | '\x0c' | '\r' => self.bump(),
                '\n' => self.newline(),
                '#' => {
                    self.pos = self.src[start..]
                        .find('\n')
                        .map_or(self.src.len(), |i| start + i);
                    let text = self.src[start..self.pos].trim_end_matches('\r');
                    self.tokens.push(Token {
                        kind: TokenKind::Comment,
                        text,
                        line: self.line,
                        col: start - self.line_start,
                    });
                }
                '\\' => {
                    self.bump();
                    if !self.eat_line_break() {
                        return Err(match self.peek() {
                            None => self.error("unexpected EOF while parsing"),
                            Some(_) => {
                                self.error("unexpected character after line continuation character")
                            }
                        });
                    }
                }
                '"' | '\'' => self.string(start)?,
                c if c.is_ascii_digit() => self.number(start),
                '.' if self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => self.number(start),
                c if is_ident_start(c) => self.name(start)?,
                '(' | '[' | '{' => {
                    self.brackets.push((c, self.line));
                    self.bump();
                    self.push(TokenKind::Op, start);
                }
                ')' | ']' | '}' => self.close_bracket(c, start)?,
                _ => self.operator(start)?,
            }
        }
        self.finish()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError {
            message: message.into(),
            line: self.line,
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            line: self.line,
            col: start - self.line_start,
        });
        self.line_has_tokens = true;
    }

    fn structural(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            text: "",
            line: self.line,
            col: 0,
        });
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.line_start = self.pos;
    }

    /// Consume `\n` or `\r\n` if one is next.
    fn eat_line_break(&mut self) -> bool {
        let rest = &self.src[self.pos..];
        let len = if rest.starts_with("\r\n") {
            2
        } else if rest.starts_with('\n') {
            1
        } else {
            return false;
        };
        self.pos += len;
        self.next_line();
        true
    }

    fn newline(&mut self) {
        let start = self.pos;
        self.bump();
        let kind = if self.brackets.is_empty() && self.line_has_tokens {
            TokenKind::Newline
        } else {
            TokenKind::Nl
        };
        self.tokens.push(Token {
            kind,
            text: &self.src[start..self.pos],
            line: self.line,
            col: start - self.line_start,
        });
        if self.brackets.is_empty() {
            self.line_has_tokens = false;
        }
        self.next_line();
        self.at_line_start = true;
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn indentation(&mut self) -> Result<(), LexError> {
        let mut width = 0;
        let mut end = self.pos;
        for c in self.src[self.pos..].chars() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            end += c.len_utf8();
        }

        // Blank and comment-only lines do not take part in indentation.
        if matches!(self.src[end..].chars().next(), None | Some('\n' | '\r' | '#')) {
            return Ok(());
        }
        self.pos = end;

        if width > self.current_indent() {
            self.indents.push(width);
            self.structural(TokenKind::Indent);
            return Ok(());
        }
        while width < self.current_indent() {
            self.indents.pop();
            self.structural(TokenKind::Dedent);
        }
        if width != self.current_indent() {
            return Err(self.error("unindent does not match any outer indentation level"));
        }
        Ok(())
    }

    fn name(&mut self, start: usize) -> Result<(), LexError> {
        while self.peek().is_some_and(is_ident_continue) {
            self.bump();
        }
        if matches!(self.peek(), Some('"' | '\'')) && is_string_prefix(&self.src[start..self.pos]) {
            return self.string(start);
        }
        self.push(TokenKind::Name, start);
        Ok(())
    }

    fn number(&mut self, start: usize) {
        let hex_like = {
            let rest = &self.src[start..];
            rest.len() > 1 && rest.starts_with('0') && matches!(rest.as_bytes()[1], b'x' | b'X')
        };
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = matches!(c, '+' | '-') && matches!(prev, 'e' | 'E') && !hex_like;
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                prev = c;
                self.bump();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start);
    }

    /// `start` is the beginning of the prefix, if any; `pos` is on the quote.
    fn string(&mut self, start: usize) -> Result<(), LexError> {
        let line = self.line;
        let col = start - self.line_start;
        let Some(quote) = self.peek() else {
            return Err(self.error("unexpected EOF while parsing"));
        };
        let delimiter = if quote == '"' { "\"\"\"" } else { "'''" };
        let triple = self.src[self.pos..].starts_with(delimiter);
        self.pos += if triple { 3 } else { 1 };

        loop {
            let Some(c) = self.peek() else {
                let message = if triple {
                    format!("unterminated triple-quoted string literal (detected at line {})", self.line)
                } else {
                    format!("unterminated string literal (detected at line {line})")
                };
                return Err(LexError { message, line });
            };
            match c {
                '\\' => {
                    self.bump();
                    if !self.eat_line_break() {
                        self.bump();
                    }
                }
                '\n' | '\r' if !triple => {
                    return Err(LexError {
                        message: format!("unterminated string literal (detected at line {line})"),
                        line,
                    });
                }
                '\n' => {
                    self.bump();
                    self.next_line();
                }
                c if c == quote => {
                    if !triple {
                        self.bump();
                        break;
                    }
                    if self.src[self.pos..].starts_with(delimiter) {
                        self.pos += 3;
                        break;
                    }
                    self.bump();
                }
                _ => self.bump(),
            }
        }

        self.tokens.push(Token {
            kind: TokenKind::Str,
            text: &self.src[start..self.pos],
            line,
            col,
        });
        self.line_has_tokens = true;
        Ok(())
    }

    fn close_bracket(&mut self, close: char, start: usize) -> Result<(), LexError> {
        let expected = match close {
            ')' => '(',
            ']' => '[',
            _ => '{',
        };
        match self.brackets.pop() {
            Some((open, _)) if open == expected => {}
            Some((open, open_line)) if open_line == self.line => {
                return Err(self.error(format!(
                    "closing parenthesis '{close}' does not match opening parenthesis '{open}'"
                )));
            }
            Some((open, open_line)) => {
                return Err(self.error(format!(
                    "closing parenthesis '{close}' does not match opening parenthesis '{open}' on line {open_line}"
                )));
            }
            None => return Err(self.error(format!("unmatched '{close}'"))),
        }
        self.bump();
        self.push(TokenKind::Op, start);
        Ok(())
    }

    fn operator(&mut self, start: usize) -> Result<(), LexError> {
        let rest = &self.src[self.pos..];
        let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
            let c = rest.chars().next().unwrap_or('?');
            return Err(self.error(format!("invalid character '{c}' (U+{:04X})", c as u32)));
        };
        self.pos += op.len();
        self.push(TokenKind::Op, start);
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Token<'a>>, LexError> {
        if let Some(&(open, line)) = self.brackets.last() {
            return Err(LexError {
                message: format!("'{open}' was never closed"),
                line,
            });
        }
        if self.line_has_tokens {
            self.structural(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.structural(TokenKind::Dedent);
        }
        Ok(self.tokens)
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn is_string_prefix(word: &str) -> bool {
    matches!(
        word.to_ascii_lowercase().as_str(),
        "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf" | "t" | "tr" | "rt"
    )
}

/// One logical line: its significant tokens and its block nesting.
#[derive(Debug)]
pub struct LogicalLine<'t, 'a> {
    /// Tokens other than comments and structure tokens.
    pub tokens: Vec<&'t Token<'a>>,
    /// Indentation nesting level, 0 at module level.
    pub depth: usize,
    /// Whether this line opened a new indentation level.
    pub indented: bool,
}

impl<'t, 'a> LogicalLine<'t, 'a> {
    pub fn first(&self) -> Option<&'t Token<'a>> {
        self.tokens.first().copied()
    }

    pub fn last(&self) -> Option<&'t Token<'a>> {
        self.tokens.last().copied()
    }

    /// Line of the first token.
    pub fn line(&self) -> usize {
        self.first().map_or(0, |t| t.line)
    }

    /// Last line touched by the statement.
    pub fn end_line(&self) -> usize {
        self.last().map_or(0, |t| t.end_line())
    }

    pub fn starts_with_keyword(&self, keyword: &str) -> bool {
        self.first().is_some_and(|t| t.is_keyword(keyword))
    }

    /// The compound statement keyword this line opens with, looking past
    /// `async`.
    pub fn compound_keyword(&self) -> Option<&'static str> {
        let mut tokens = self.tokens.iter();
        let mut first = tokens.next()?;
        if first.is_keyword("async") {
            first = tokens.next()?;
        }
        if first.kind != TokenKind::Name {
            return None;
        }
        if let Some(keyword) = COMPOUND_KEYWORDS.iter().copied().find(|kw| *kw == first.text) {
            return Some(keyword);
        }
        let soft = SOFT_COMPOUND_KEYWORDS.iter().copied().find(|kw| *kw == first.text)?;
        let operand = tokens.next()?;
        let is_name_use = operand.kind == TokenKind::Op && NAME_FOLLOWERS.contains(&operand.text);
        let ends_header = self.last().is_some_and(|t| t.is_op(":"));
        (!is_name_use && ends_header).then_some(soft)
    }
}

/// Group a token stream into logical lines.
pub fn logical_lines<'t, 'a>(tokens: &'t [Token<'a>]) -> Vec<LogicalLine<'t, 'a>> {
    let mut lines = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    let mut indented = false;

    for token in tokens {
        match token.kind {
            TokenKind::Indent => {
                depth += 1;
                indented = true;
            }
            TokenKind::Dedent => depth = depth.saturating_sub(1),
            TokenKind::Comment | TokenKind::Nl => {}
            TokenKind::Newline => {
                if !current.is_empty() {
                    lines.push(LogicalLine {
                        tokens: std::mem::take(&mut current),
                        depth,
                        indented,
                    });
                    indented = false;
                }
            }
            _ => current.push(token),
        }
    }
    if !current.is_empty() {
        lines.push(LogicalLine {
            tokens: current,
            depth,
            indented,
        });
    }
    lines
}
