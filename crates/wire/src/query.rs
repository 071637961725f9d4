// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validated find queries.
//!
//! All `find` queries are validated before reaching the repository layer:
//! the operator set is closed (`$limit`, `$skip`, `$sort`, `$select`),
//! string values are coerced to numbers/bools where the operator expects
//! them, and unknown `$`-prefixed keys are rejected outright.

use agor_core::{AgorError, ErrorKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hard ceiling on `$limit`; larger requests are clamped.
pub const MAX_QUERY_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    fn from_value(v: &Value) -> Option<SortDirection> {
        let n = match v {
            Value::Number(n) => n.as_i64()?,
            Value::String(s) => s.parse::<i64>().ok()?,
            _ => return None,
        };
        match n {
            1 => Some(SortDirection::Ascending),
            -1 => Some(SortDirection::Descending),
            _ => None,
        }
    }
}

/// A validated query: operators plus equality filters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: u64,
    /// Sort fields in application order, ±1 semantics.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub sort: IndexMap<String, SortDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// Field → exact-match value.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub filters: IndexMap<String, Value>,
}

impl FindQuery {
    /// Validate a raw JSON query object.
    pub fn validate(raw: &Value) -> Result<FindQuery, AgorError> {
        let obj = match raw {
            Value::Null => return Ok(FindQuery::default()),
            Value::Object(obj) => obj,
            other => {
                return Err(AgorError::validation(format!(
                    "query must be an object, got {}",
                    type_name(other)
                )))
            }
        };

        let mut query = FindQuery::default();
        for (key, value) in obj {
            match key.as_str() {
                "$limit" => {
                    let n = coerce_u64(value).ok_or_else(|| bad_operator("$limit", value))?;
                    query.limit = Some(n.min(MAX_QUERY_LIMIT));
                }
                "$skip" => {
                    query.skip =
                        coerce_u64(value).ok_or_else(|| bad_operator("$skip", value))?;
                }
                "$sort" => {
                    let fields = value.as_object().ok_or_else(|| bad_operator("$sort", value))?;
                    for (field, dir) in fields {
                        let dir = SortDirection::from_value(dir).ok_or_else(|| {
                            AgorError::validation(format!(
                                "$sort values must be 1 or -1, got {dir} for {field:?}"
                            ))
                        })?;
                        query.sort.insert(field.clone(), dir);
                    }
                }
                "$select" => {
                    let fields =
                        value.as_array().ok_or_else(|| bad_operator("$select", value))?;
                    let mut select = Vec::with_capacity(fields.len());
                    for field in fields {
                        match field.as_str() {
                            Some(s) => select.push(s.to_string()),
                            None => return Err(bad_operator("$select", field)),
                        }
                    }
                    query.select = Some(select);
                }
                other if other.starts_with('$') => {
                    return Err(AgorError::new(
                        ErrorKind::ValidationFailed,
                        format!("unknown query operator {other:?}"),
                    ));
                }
                field => {
                    query.filters.insert(field.to_string(), coerce_filter(value));
                }
            }
        }
        Ok(query)
    }

    /// True when `record` satisfies every equality filter.
    pub fn matches(&self, record: &Value) -> bool {
        self.filters.iter().all(|(field, expected)| record.get(field) == Some(expected))
    }

    /// Apply filters, sort, skip/limit, and select to a record set.
    pub fn apply(&self, records: Vec<Value>) -> Vec<Value> {
        let mut rows: Vec<Value> = records.into_iter().filter(|r| self.matches(r)).collect();

        for (field, dir) in self.sort.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(field), b.get(field));
                match dir {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        let skip = self.skip as usize;
        let rows: Vec<Value> = match self.limit {
            Some(limit) => rows.into_iter().skip(skip).take(limit as usize).collect(),
            None => rows.into_iter().skip(skip).collect(),
        };

        match &self.select {
            None => rows,
            Some(fields) => rows
                .into_iter()
                .map(|row| {
                    let mut out = serde_json::Map::new();
                    if let Value::Object(obj) = row {
                        for field in fields {
                            if let Some(v) = obj.get(field) {
                                out.insert(field.clone(), v.clone());
                            }
                        }
                    }
                    Value::Object(out)
                })
                .collect(),
        }
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn bad_operator(op: &str, value: &Value) -> AgorError {
    AgorError::validation(format!("invalid value for {op}: {value}"))
}

fn coerce_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Coerce obvious string encodings in filter values (query strings carry
/// everything as text). `"true"`/`"false"` become bools; pure integers
/// become numbers; everything else passes through.
fn coerce_filter(v: &Value) -> Value {
    if let Value::String(s) = v {
        match s.as_str() {
            "true" => return Value::Bool(true),
            "false" => return Value::Bool(false),
            _ => {
                if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                    if let Ok(n) = s.parse::<u64>() {
                        return Value::Number(n.into());
                    }
                }
            }
        }
    }
    v.clone()
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
