use super::ast::{Expr, Literal, LogicOp, MatchOp};
use super::error::MatchError;

/// Anything a filter expression can be evaluated against: feed attributes,
/// item attributes, or a synthetic record assembled for query-feed matching.
pub trait Record {
    fn has_attribute(&self, name: &str) -> bool;
    fn get_attribute(&self, name: &str) -> String;
}

pub fn eval(expr: &Expr, record: &dyn Record) -> Result<bool, MatchError> {
    match expr {
        Expr::Match(m) => eval_match(&m.attribute, m.op, &m.literal, record, m),
        Expr::Logic(l) => eval_logic(l.op, &l.left, &l.right, record),
    }
}

fn eval_logic(op: LogicOp, left: &Expr, right: &Expr, record: &dyn Record) -> Result<bool, MatchError> {
    let lhs = eval(left, record)?;
    match op {
        LogicOp::And => {
            if !lhs {
                return Ok(false);
            }
            eval(right, record)
        }
        LogicOp::Or => {
            if lhs {
                return Ok(true);
            }
            eval(right, record)
        }
    }
}

fn eval_match(
    attribute: &str,
    op: MatchOp,
    literal: &Literal,
    record: &dyn Record,
    node: &super::ast::MatchExpr,
) -> Result<bool, MatchError> {
    if !record.has_attribute(attribute) {
        return Err(MatchError::AttributeUnavailable(attribute.to_string()));
    }
    let value = record.get_attribute(attribute);

    match op {
        MatchOp::Eq => Ok(compare_eq(&value, literal)),
        MatchOp::Ne => Ok(!compare_eq(&value, literal)),
        MatchOp::RegexMatch => Ok(node.compiled_regex()?.is_match(&value)),
        MatchOp::RegexNoMatch => Ok(!node.compiled_regex()?.is_match(&value)),
        MatchOp::Lt | MatchOp::Gt | MatchOp::Le | MatchOp::Ge => compare_numeric(op, &value, literal, attribute),
        MatchOp::Contains => Ok(contains_token(&value, literal)),
        MatchOp::ContainsNot => Ok(!contains_token(&value, literal)),
        MatchOp::Between => compare_between(&value, literal, attribute),
    }
}

fn compare_eq(value: &str, literal: &Literal) -> bool {
    let text = literal.as_text();
    match (value.parse::<i64>(), text.parse::<i64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => value == text,
    }
}

fn compare_numeric(op: MatchOp, value: &str, literal: &Literal, attribute: &str) -> Result<bool, MatchError> {
    let a: i64 = value
        .parse()
        .map_err(|_| MatchError::AttributeUnavailable(attribute.to_string()))?;
    let b: i64 = literal
        .as_text()
        .parse()
        .map_err(|_| MatchError::AttributeUnavailable(attribute.to_string()))?;
    Ok(match op {
        MatchOp::Lt => a < b,
        MatchOp::Gt => a > b,
        MatchOp::Le => a <= b,
        MatchOp::Ge => a >= b,
        _ => unreachable!(),
    })
}

fn contains_token(value: &str, literal: &Literal) -> bool {
    let needle = literal.as_text();
    value.split_whitespace().any(|tok| tok == needle)
}

fn compare_between(value: &str, literal: &Literal, attribute: &str) -> Result<bool, MatchError> {
    let v: i64 = value
        .parse()
        .map_err(|_| MatchError::AttributeUnavailable(attribute.to_string()))?;
    let (lo, hi) = match literal {
        Literal::Range(lo, hi) => (*lo, *hi),
        Literal::Text(s) => {
            let mut parts = s.splitn(2, ':');
            let lo: i64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| MatchError::AttributeUnavailable(attribute.to_string()))?;
            let hi: i64 = parts
                .next()
                .and_then(|p| p.parse().ok())
                .ok_or_else(|| MatchError::AttributeUnavailable(attribute.to_string()))?;
            (lo, hi)
        }
    };
    let (lo, hi) = if lo > hi { (hi, lo) } else { (lo, hi) };
    Ok(v >= lo && v <= hi)
}
