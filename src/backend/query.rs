//! Query and mutation descriptions sent to the data service.
//!
//! These are plain values; each `DataService` implementation decides how to
//! execute them (HTTP query string, in-memory scan).

use std::cmp::Ordering;

use serde_json::Value;

use crate::cache::Pagination;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Exact equality
    Eq,
    /// Case-insensitive pattern match, `%` is the wildcard
    ILike,
    /// Greater than or equal
    Gte,
    /// Less than or equal
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::ILike,
            value: Value::String(pattern.into()),
        }
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Gte,
            value: value.into(),
        }
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op: FilterOp::Lte,
            value: value.into(),
        }
    }

    /// Whether `row` satisfies this filter. Missing columns never match.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(&self.column) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => field == &self.value,
            FilterOp::ILike => match (field.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => ilike(text, pattern),
                _ => false,
            },
            FilterOp::Gte => matches!(
                compare(field, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            FilterOp::Lte => matches!(
                compare(field, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

// == Query ==
/// A filtered, ordered, optionally paginated select on one table.
///
/// `filters` are AND-ed; `any_of`, when non-empty, is one OR group AND-ed
/// with the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub any_of: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<Pagination>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            any_of: Vec::new(),
            order: None,
            range: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    /// Adds an equality filter only when `value` is present.
    pub fn eq_opt(self, column: impl Into<String>, value: Option<&str>) -> Self {
        match value {
            Some(value) => self.eq(column, value),
            None => self,
        }
    }

    pub fn any_of(mut self, filters: Vec<Filter>) -> Self {
        self.any_of = filters;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn range(mut self, page: Pagination) -> Self {
        self.range = Some(page);
        self
    }

    /// Whether `row` passes every filter of this query.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
            && (self.any_of.is_empty() || self.any_of.iter().any(|f| f.matches(row)))
    }
}

// == Mutation ==
/// A write against one table.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        table: String,
        rows: Vec<Value>,
    },
    Update {
        table: String,
        filters: Vec<Filter>,
        patch: Value,
    },
    Delete {
        table: String,
        filters: Vec<Filter>,
    },
}

impl Mutation {
    pub fn table(&self) -> &str {
        match self {
            Mutation::Insert { table, .. }
            | Mutation::Update { table, .. }
            | Mutation::Delete { table, .. } => table,
        }
    }
}

/// Numbers compare numerically and strings lexically, which orders ISO
/// dates correctly. Mixed or other types do not compare.
fn compare(field: &Value, bound: &Value) -> Option<Ordering> {
    match (field, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}

/// Case-insensitive match of `text` against a `%` wildcard pattern.
fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();

    let (first, rest) = match parts.split_first() {
        Some(split) => split,
        None => return text.is_empty(),
    };
    if !text.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    let Some((last, middle)) = rest.split_last() else {
        // No wildcard at all
        return text == *first;
    };
    for part in middle {
        match text[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }
    text.len() - pos >= last.len() && text[pos..].ends_with(last)
}
