use std::sync::OnceLock;

use regex::RegexBuilder;

use super::error::MatchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Eq,
    Ne,
    RegexMatch,
    RegexNoMatch,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    ContainsNot,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Text(String),
    Range(i64, i64),
}

impl Literal {
    pub fn as_text(&self) -> String {
        match self {
            Literal::Text(s) => s.clone(),
            Literal::Range(lo, hi) => format!("{lo}:{hi}"),
        }
    }
}

#[derive(Debug)]
pub struct MatchExpr {
    pub attribute: String,
    pub op: MatchOp,
    pub literal: Literal,
    regex_cache: OnceLock<Result<regex::Regex, String>>,
}

impl MatchExpr {
    pub fn new(attribute: String, op: MatchOp, literal: Literal) -> Self {
        Self { attribute, op, literal, regex_cache: OnceLock::new() }
    }

    /// Compiles (once) and caches the POSIX-style case-insensitive regex
    /// backing `RegexMatch`/`RegexNoMatch`.
    pub fn compiled_regex(&self) -> Result<&regex::Regex, MatchError> {
        let pattern = self.literal.as_text();
        let cached = self.regex_cache.get_or_init(|| {
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| e.to_string())
        });
        cached.as_ref().map_err(|e| MatchError::InvalidRegex(e.clone()))
    }
}

impl Clone for MatchExpr {
    fn clone(&self) -> Self {
        Self::new(self.attribute.clone(), self.op, self.literal.clone())
    }
}

#[derive(Debug, Clone)]
pub struct LogicExpr {
    pub op: LogicOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Match(MatchExpr),
    Logic(LogicExpr),
}

impl Expr {
    pub fn matches(attribute: impl Into<String>, op: MatchOp, literal: Literal) -> Self {
        Expr::Match(MatchExpr::new(attribute.into(), op, literal))
    }

    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::Logic(LogicExpr { op: LogicOp::And, left: Box::new(left), right: Box::new(right) })
    }

    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Logic(LogicExpr { op: LogicOp::Or, left: Box::new(left), right: Box::new(right) })
    }
}
