//! Minimal message selector support
//!
//! Accepts conjunctions of property comparisons:
//!
//! ```text
//! color = 'red' AND JMSXGroupID <> 'audit'
//! ```
//!
//! Values are quoted strings or bare numbers, compared as text. A message
//! without the referenced property never matches.

use crate::client::error::{ClientError, ClientResult};
use crate::client::types::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Clause {
    property: String,
    comparison: Comparison,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    clauses: Vec<Clause>,
}

impl Selector {
    pub fn parse(source: &str) -> ClientResult<Self> {
        let invalid = |reason: &str| ClientError::InvalidSelector {
            selector: source.to_string(),
            reason: reason.to_string(),
        };

        if source.trim().is_empty() {
            return Err(invalid("empty selector"));
        }

        let clauses = split_conjunction(source)
            .into_iter()
            .map(|clause| parse_clause(clause).map_err(|reason| invalid(&reason)))
            .collect::<ClientResult<Vec<_>>>()?;

        Ok(Self {
            source: source.to_string(),
            clauses,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.clauses.iter().all(|clause| {
            message
                .property(&clause.property)
                .is_some_and(|actual| match clause.comparison {
                    Comparison::Equal => actual == clause.value,
                    Comparison::NotEqual => actual != clause.value,
                })
        })
    }
}

/// Split on the `AND` keyword (any case) outside quoted literals
fn split_conjunction(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quote = false;
    let mut start = 0;
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            _ if !in_quote && is_and_keyword(source, i) => {
                parts.push(&source[start..i]);
                i += 3;
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&source[start..]);
    parts
}

fn is_and_keyword(source: &str, at: usize) -> bool {
    let bytes = source.as_bytes();
    let boundary = |b: Option<&u8>| b.map_or(true, |b| b.is_ascii_whitespace());

    source
        .get(at..at + 3)
        .is_some_and(|word| word.eq_ignore_ascii_case("and"))
        && at > 0
        && boundary(bytes.get(at - 1))
        && boundary(bytes.get(at + 3))
}

fn parse_clause(clause: &str) -> Result<Clause, String> {
    let clause = clause.trim();
    let (property, comparison, value) = if let Some((left, right)) = clause.split_once("<>") {
        (left, Comparison::NotEqual, right)
    } else if let Some((left, right)) = clause.split_once('=') {
        (left, Comparison::Equal, right)
    } else {
        return Err(format!("expected '=' or '<>' in '{clause}'"));
    };

    let property = property.trim();
    if property.is_empty() || !property.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(format!("invalid property name '{property}'"));
    }

    Ok(Clause {
        property: property.to_string(),
        comparison,
        value: parse_literal(value.trim())?,
    })
}

fn parse_literal(literal: &str) -> Result<String, String> {
    if let Some(inner) = literal
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(inner.replace("''", "'"));
    }
    if !literal.is_empty() && literal.parse::<f64>().is_ok() {
        return Ok(literal.to_string());
    }
    Err(format!("invalid literal '{literal}'"))
}
