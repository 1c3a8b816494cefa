//! Structured filter and sort expressions.
//!
//! Filters are built from typed values and only turned into the record
//! store's expression language at the edge, so user-supplied strings are
//! always quoted and escaped. The same tree can be evaluated in-process
//! against a record, which is what [`SqliteStore`](super::SqliteStore) does.

use std::cmp::Ordering;

use serde_json::Value;

use super::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        field: String,
        op: Op,
        value: Value,
    },
    And(Vec<Filter>),
}

impl Filter {
    fn compare(field: &str, op: Op, value: impl Into<Value>) -> Self {
        Filter::Compare {
            field: field.to_string(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Eq, value)
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Ne, value)
    }

    pub fn gt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Gt, value)
    }

    pub fn gte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Gte, value)
    }

    pub fn lt(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Lt, value)
    }

    pub fn lte(field: &str, value: impl Into<Value>) -> Self {
        Self::compare(field, Op::Lte, value)
    }

    /// Conjunction; nested `And`s are flattened.
    pub fn and(self, other: Filter) -> Self {
        let mut parts = match self {
            Filter::And(parts) => parts,
            single => vec![single],
        };
        match other {
            Filter::And(more) => parts.extend(more),
            single => parts.push(single),
        }
        Filter::And(parts)
    }

    /// First field whose value cannot be written as a quoted literal. The
    /// store's scanner ends a literal at any quote not preceded by a
    /// backslash and has no escape for the backslash itself, so values
    /// holding one are refused rather than rendered.
    pub fn unquotable_field(&self) -> Option<&str> {
        match self {
            Filter::Compare { field, value, .. } => {
                let unquotable = match value {
                    Value::String(text) => text.contains('\\'),
                    Value::Array(_) | Value::Object(_) => value.to_string().contains('\\'),
                    _ => false,
                };
                unquotable.then_some(field.as_str())
            }
            Filter::And(parts) => parts.iter().find_map(Filter::unquotable_field),
        }
    }

    /// Render in the record store's filter syntax.
    pub fn render(&self) -> String {
        match self {
            Filter::Compare { field, op, value } => {
                format!("{} {} {}", field, op.symbol(), render_value(value))
            }
            Filter::And(parts) => parts
                .iter()
                .map(|part| match part {
                    Filter::And(_) => format!("({})", part.render()),
                    _ => part.render(),
                })
                .collect::<Vec<_>>()
                .join(" && "),
        }
    }

    /// Evaluate against a record in-process.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Compare { field, op, value } => {
                let actual = record.value(field);
                let ordering = compare_values(&actual, value);
                match op {
                    Op::Eq => ordering == Some(Ordering::Equal),
                    Op::Ne => ordering != Some(Ordering::Equal),
                    Op::Gt => ordering == Some(Ordering::Greater),
                    Op::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                    Op::Lt => ordering == Some(Ordering::Less),
                    Op::Lte => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                }
            }
            Filter::And(parts) => parts.iter().all(|part| part.matches(record)),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => quote(text),
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        // Arrays and objects have no literal form; compare against their JSON text.
        other => quote(&other.to_string()),
    }
}

fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        if ch == '\'' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Ordering between two JSON values of the same kind; `None` when they
/// are not comparable.
pub(crate) fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub descending: bool,
}

impl Sort {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    pub fn render(&self) -> String {
        let sign = if self.descending { '-' } else { '+' };
        format!("{sign}{}", self.field)
    }

    pub(crate) fn cmp_records(&self, a: &Record, b: &Record) -> Ordering {
        let ordering = compare_values(&a.value(&self.field), &b.value(&self.field))
            .unwrap_or(Ordering::Equal);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}
