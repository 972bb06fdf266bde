//! Structured filter expressions
//!
//! Predicates are collected as data and serialized to the backend filter
//! language in one place. Values are always emitted as quoted literals through
//! [`quote`], never interpolated raw.

use serde::Serialize;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Op {
    /// `=`
    Eq,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gte => ">=",
            Op::Lte => "<=",
        }
    }
}

/// One `field op "value"` clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub field: &'static str,
    pub op: Op,
    pub value: String,
}

impl Predicate {
    fn render(&self) -> String {
        format!("{} {} {}", self.field, self.op.as_str(), quote(&self.value))
    }
}

/// Conjunction of predicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    /// Create a new empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field = value` when the value is present and non-empty
    pub fn eq<V: Into<String>>(self, field: &'static str, value: Option<V>) -> Self {
        self.push(field, Op::Eq, value)
    }

    /// Add `field >= value` when the value is present and non-empty
    pub fn gte<V: Into<String>>(self, field: &'static str, value: Option<V>) -> Self {
        self.push(field, Op::Gte, value)
    }

    /// Add `field <= value` when the value is present and non-empty
    pub fn lte<V: Into<String>>(self, field: &'static str, value: Option<V>) -> Self {
        self.push(field, Op::Lte, value)
    }

    fn push<V: Into<String>>(mut self, field: &'static str, op: Op, value: Option<V>) -> Self {
        if let Some(value) = value.map(Into::into).filter(|v| !v.is_empty()) {
            self.predicates.push(Predicate { field, op, value });
        }
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Render as a backend filter expression.
    ///
    /// Returns `None` for an empty filter so that no `filter` argument is sent
    /// at all.
    pub fn to_expression(&self) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        let clauses: Vec<String> = self.predicates.iter().map(Predicate::render).collect();
        Some(clauses.join(" && "))
    }
}

/// Quote a value as a filter string literal.
///
/// Embedded double quotes are backslash-escaped so a value can never close the
/// literal early.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}
