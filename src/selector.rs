// src/selector.rs

//! Line selectors
//!
//! Recipe lines and variant values may carry a trailing selector comment,
//! `# [linux and python >= "3.10"]`, that decides whether the line applies
//! to a given platform and variant. Evaluation sits behind the
//! [`SelectorEvaluator`] trait; [`PlatformSelectors`] is the built-in
//! evaluator bound to one target platform.
//!
//! Grammar:
//!
//! ```text
//! expr    := and ("or" and)*
//! and     := unary ("and" unary)*
//! unary   := "not" unary | compare
//! compare := operand (("==" | "!=" | "<" | "<=" | ">" | ">=") operand)?
//! operand := "(" expr ")" | identifier | "string" | number
//! ```

use crate::platform::Platform;
use crate::variant::VariantCombination;
use regex::Regex;
use std::cmp::Ordering;
use std::sync::LazyLock;
use tracing::warn;

/// Trailing `# [expr]` selector on a line
static SELECTOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\s*#\s*\[(.*)\]\s*$").expect("valid regex"));

/// Every selector flag a platform can set
const PLATFORM_FLAGS: &[&str] = &[
    "linux", "osx", "win", "unix", "x86", "x86_64", "aarch64", "arm64", "ppc64le", "s390x",
    "armv7l", "linux64", "linux32", "osx64", "win64", "win32", "noarch",
];

/// Decides whether a selector expression holds for a variant
pub trait SelectorEvaluator: Send + Sync {
    fn evaluate(&self, expr: &str, variant: &VariantCombination) -> bool;
}

impl<F> SelectorEvaluator for F
where
    F: Fn(&str, &VariantCombination) -> bool + Send + Sync,
{
    fn evaluate(&self, expr: &str, variant: &VariantCombination) -> bool {
        self(expr, variant)
    }
}

/// Split a line into its content and optional trailing selector
pub fn split_selector(line: &str) -> (&str, Option<&str>) {
    match SELECTOR_RE.captures(line) {
        Some(caps) => {
            let content = caps.get(1).map_or("", |m| m.as_str());
            let selector = caps.get(2).map(|m| m.as_str().trim());
            (content.trim(), selector)
        }
        None => (line.trim(), None),
    }
}

/// Identifiers a selector expression refers to
///
/// Malformed expressions yield no identifiers.
pub fn identifiers(expr: &str) -> Vec<String> {
    let Ok(tokens) = tokenize(expr) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for token in tokens {
        if let Token::Ident(name) = token
            && !names.contains(&name)
        {
            names.push(name);
        }
    }
    names
}

/// Selector evaluator for one target platform
#[derive(Debug, Clone)]
pub struct PlatformSelectors {
    platform: Platform,
}

impl PlatformSelectors {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    pub fn for_subdir(subdir: &str) -> Self {
        Self::new(Platform::from_subdir(subdir))
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    fn try_evaluate(&self, expr: &str, variant: &VariantCombination) -> Result<bool, String> {
        let tokens = tokenize(expr)?;
        if tokens.is_empty() {
            return Err("empty selector".to_string());
        }
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            scope: Scope {
                platform: &self.platform,
                variant,
            },
        };
        let value = parser.expr()?;
        if parser.pos != tokens.len() {
            return Err(format!("unexpected token {:?}", tokens[parser.pos]));
        }
        Ok(value.truthy())
    }
}

impl SelectorEvaluator for PlatformSelectors {
    fn evaluate(&self, expr: &str, variant: &VariantCombination) -> bool {
        match self.try_evaluate(expr, variant) {
            Ok(result) => result,
            Err(reason) => {
                warn!("Treating malformed selector [{}] as false: {}", expr, reason);
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Text(String),
    Number(String),
    Compare(CompareOp),
    And,
    Or,
    Not,
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
        }
    }
}

fn tokenize(expr: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = expr.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == c)
                    .ok_or_else(|| "unterminated string".to_string())?;
                tokens.push(Token::Text(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '=' | '!' | '<' | '>' => {
                let next = chars.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    ('=', Some('=')) => (CompareOp::Eq, 2),
                    ('!', Some('=')) => (CompareOp::Ne, 2),
                    ('<', Some('=')) => (CompareOp::Le, 2),
                    ('>', Some('=')) => (CompareOp::Ge, 2),
                    ('<', _) => (CompareOp::Lt, 1),
                    ('>', _) => (CompareOp::Gt, 1),
                    _ => return Err(format!("unexpected '{}'", c)),
                };
                tokens.push(Token::Compare(op));
                i += width;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                tokens.push(Token::Number(chars[start..i].iter().collect()));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected '{}'", other)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Bool(bool),
    Text(String),
}

impl Value {
    fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Text(s) => !s.is_empty(),
        }
    }

    fn as_text(&self) -> String {
        match self {
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Text(s) => s.clone(),
        }
    }
}

/// Numeric components of a dotted version, if it is one
fn numeric_parts(s: &str) -> Option<Vec<u64>> {
    let trimmed = s.trim_end_matches(".*");
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|p| p.parse::<u64>().ok()).collect()
}

fn compare_values(left: &Value, right: &Value) -> Ordering {
    let (l, r) = (left.as_text(), right.as_text());
    match (numeric_parts(&l), numeric_parts(&r)) {
        (Some(mut a), Some(mut b)) => {
            let len = a.len().max(b.len());
            a.resize(len, 0);
            b.resize(len, 0);
            a.cmp(&b)
        }
        _ => l.cmp(&r),
    }
}

struct Scope<'a> {
    platform: &'a Platform,
    variant: &'a VariantCombination,
}

impl Scope<'_> {
    fn resolve(&self, name: &str) -> Value {
        if let Some(value) = self.variant.get(name) {
            return Value::Text(value.to_string());
        }
        match name {
            "True" | "true" => Value::Bool(true),
            "False" | "false" => Value::Bool(false),
            "target_platform" => Value::Text(self.platform.subdir().to_string()),
            "py" => match self.variant.get("python").and_then(python_tag) {
                Some(tag) => Value::Text(tag),
                None => Value::Bool(false),
            },
            flag if PLATFORM_FLAGS.contains(&flag) => Value::Bool(self.platform.has_flag(flag)),
            _ => Value::Bool(false),
        }
    }
}

/// Compact python tag: `3.10` becomes `310`
pub(crate) fn python_tag(version: &str) -> Option<String> {
    let mut parts = version.split('.');
    let major = parts.next()?.trim();
    let minor = parts.next()?.trim();
    if major.chars().all(|c| c.is_ascii_digit()) && minor.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}{}", major, minor))
    } else {
        None
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    scope: Scope<'a>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Value, String> {
        let mut value = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            value = Value::Bool(value.truthy() || rhs.truthy());
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<Value, String> {
        let mut value = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.unary()?;
            value = Value::Bool(value.truthy() && rhs.truthy());
        }
        Ok(value)
    }

    fn unary(&mut self) -> Result<Value, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let value = self.unary()?;
            return Ok(Value::Bool(!value.truthy()));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Value, String> {
        let left = self.operand()?;
        if let Some(Token::Compare(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Value::Bool(op.holds(compare_values(&left, &right))));
        }
        Ok(left)
    }

    fn operand(&mut self) -> Result<Value, String> {
        match self.next().cloned() {
            Some(Token::Open) => {
                let value = self.expr()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("missing ')'".to_string()),
                }
            }
            Some(Token::Ident(name)) => Ok(self.scope.resolve(&name)),
            Some(Token::Text(text)) | Some(Token::Number(text)) => Ok(Value::Text(text)),
            Some(other) => Err(format!("unexpected token {:?}", other)),
            None => Err("unexpected end of selector".to_string()),
        }
    }
}
