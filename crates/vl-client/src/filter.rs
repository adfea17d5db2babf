//! Boolean filter expressions for the in-memory store.
//!
//! Grammar: comparisons (`==`, `!=`, `>`, `>=`, `<`, `<=`) and `in` / `not in`
//! lists, joined by `and`/`&&` and `or`/`||` (`and` binds tighter). No
//! parentheses. Separators inside quoted literals are part of the literal.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::OnceLock;

use anyhow::{anyhow, bail};
use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare { field: String, op: CmpOp, value: Value },
    In { field: String, values: Vec<Value>, negated: bool },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

fn or_split() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+or\s+|\s*\|\|\s*").expect("static pattern"))
}

fn and_split() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\s+and\s+|\s*&&\s*").expect("static pattern"))
}

fn comma_split() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*,\s*").expect("static pattern"))
}

fn compare_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(==|!=|>=|<=|>|<)\s*(.+?)\s*$").expect("static pattern")
    })
}

fn in_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*([A-Za-z_][A-Za-z0-9_]*)\s+(not\s+)?in\s*\[(.*)\]\s*$").expect("static pattern")
    })
}

impl Filter {
    pub fn parse(expr: &str) -> anyhow::Result<Self> {
        let mut alternatives = Vec::new();
        for part in split_unquoted(expr.trim(), or_split()) {
            let conjuncts = split_unquoted(part, and_split())
                .into_iter()
                .map(parse_term)
                .collect::<anyhow::Result<Vec<_>>>()?;
            alternatives.push(collapse(conjuncts, Filter::And));
        }
        Ok(collapse(alternatives, Filter::Or))
    }

    /// Evaluate against a row. Missing fields never match a comparison.
    pub fn matches(&self, row: &HashMap<String, Value>) -> bool {
        match self {
            Filter::Compare { field, op, value } => match row.get(field) {
                Some(v) => compare(v, *op, value),
                None => false,
            },
            Filter::In { field, values, negated } => match row.get(field) {
                Some(v) => values.iter().any(|c| values_match(v, c)) != *negated,
                None => *negated,
            },
            Filter::And(fs) => fs.iter().all(|f| f.matches(row)),
            Filter::Or(fs) => fs.iter().any(|f| f.matches(row)),
        }
    }
}

fn collapse(mut parts: Vec<Filter>, join: fn(Vec<Filter>) -> Filter) -> Filter {
    if parts.len() == 1 {
        parts.remove(0)
    } else {
        join(parts)
    }
}

/// Split on `sep` matches that start outside a quoted literal.
fn split_unquoted<'a>(input: &'a str, sep: &Regex) -> Vec<&'a str> {
    let mut quoted = vec![false; input.len()];
    let mut open: Option<char> = None;
    for (i, c) in input.char_indices() {
        match open {
            Some(q) if c == q => open = None,
            None if c == '"' || c == '\'' => open = Some(c),
            _ => {}
        }
        quoted[i] = open.is_some() && !(c == '"' || c == '\'');
    }

    let mut parts = Vec::new();
    let mut last = 0;
    for m in sep.find_iter(input) {
        if m.start() < last || quoted[m.start()] {
            continue;
        }
        parts.push(&input[last..m.start()]);
        last = m.end();
    }
    parts.push(&input[last..]);
    parts
}

fn parse_term(term: &str) -> anyhow::Result<Filter> {
    if let Some(caps) = in_re().captures(term) {
        let values = split_unquoted(&caps[3], comma_split())
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_literal)
            .collect::<anyhow::Result<Vec<_>>>()?;
        return Ok(Filter::In { field: caps[1].to_string(), values, negated: caps.get(2).is_some() });
    }

    let caps = compare_re().captures(term).ok_or_else(|| anyhow!("unsupported filter term '{}'", term.trim()))?;
    let op = match &caps[2] {
        "==" => CmpOp::Eq,
        "!=" => CmpOp::Ne,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        "<" => CmpOp::Lt,
        _ => CmpOp::Le,
    };
    Ok(Filter::Compare { field: caps[1].to_string(), op, value: parse_literal(&caps[3])? })
}

fn parse_literal(raw: &str) -> anyhow::Result<Value> {
    let raw = raw.trim();
    for quote in ['"', '\''] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return Ok(Value::String(raw[1..raw.len() - 1].to_string()));
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ Value::Number(_)) => Ok(v),
        _ => bail!("invalid literal '{}'", raw),
    }
}

fn values_match(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => {
            if let (Some(ia), Some(ib)) = (na.as_i64(), nb.as_i64()) {
                return ia == ib;
            }
            match (na.as_f64(), nb.as_f64()) {
                (Some(fa), Some(fb)) => (fa - fb).abs() < 1e-9,
                _ => false,
            }
        }
        _ => a == b,
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(na), Value::Number(nb)) => na.as_f64()?.partial_cmp(&nb.as_f64()?),
        (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
        _ => None,
    }
}

fn compare(v: &Value, op: CmpOp, literal: &Value) -> bool {
    match op {
        CmpOp::Eq => values_match(v, literal),
        CmpOp::Ne => !values_match(v, literal),
        CmpOp::Gt => compare_values(v, literal) == Some(Ordering::Greater),
        CmpOp::Ge => matches!(compare_values(v, literal), Some(Ordering::Greater | Ordering::Equal)),
        CmpOp::Lt => compare_values(v, literal) == Some(Ordering::Less),
        CmpOp::Le => matches!(compare_values(v, literal), Some(Ordering::Less | Ordering::Equal)),
    }
}
