pub mod filters;

use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use crate::error::Error;

/// Always-true first condition so the joined WHERE clause is never empty.
pub const BASE_CONDITION: &str = "1=1";

/// Text form used when binding timestamps (accepted by SQLite date functions).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn ident_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

/// A table or column name that is safe to splice into SQL text.
///
/// Only configuration goes through [`Ident::parse`]; filter values are bound
/// as [`ParamValue`]s and never become identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Ident(String);

impl Ident {
    /// Validate `value` as a plain identifier. `role` names the config slot for error messages.
    pub fn parse(role: &str, value: &str) -> Result<Self, Error> {
        if ident_re().is_match(value) {
            Ok(Ident(value.to_string()))
        } else {
            Err(Error::InvalidIdentifier {
                role: role.to_string(),
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value bound to a named placeholder at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Integer(i64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "{s:?}"),
            ParamValue::Integer(i) => write!(f, "{i}"),
            ParamValue::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl ToSql for ParamValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            ParamValue::Text(s) => ToSqlOutput::from(s.as_str()),
            ParamValue::Integer(i) => ToSqlOutput::from(*i),
            ParamValue::Timestamp(ts) => {
                ToSqlOutput::Owned(Value::Text(ts.format(TIMESTAMP_FORMAT).to_string()))
            }
        })
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Integer(i)
    }
}

impl From<NaiveDateTime> for ParamValue {
    fn from(ts: NaiveDateTime) -> Self {
        ParamValue::Timestamp(ts)
    }
}

/// Named-parameter mapping, keyed without the leading `:`.
///
/// Ordered so two mappings with the same entries compare and hash equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, returning the value it replaced (if any).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Build `column IN (:prefix0,:prefix1,...)` and bind one parameter per value.
///
/// Returns `None` (and binds nothing) when `values` is empty.
pub fn in_clause(column: &Ident, prefix: &str, values: &[String], params: &mut Params) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let mut keys = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let key = format!("{prefix}{i}");
        let replaced = params.insert(key.clone(), value.as_str());
        debug_assert!(replaced.is_none(), "parameter {key} bound twice");
        keys.push(format!(":{key}"));
    }
    Some(format!("{column} IN ({})", keys.join(",")))
}

/// Conditions ANDed into one WHERE clause, plus the parameters they reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Params,
}

impl Default for WhereClause {
    fn default() -> Self {
        Self::new()
    }
}

impl WhereClause {
    pub fn new() -> Self {
        WhereClause {
            conditions: vec![BASE_CONDITION.to_string()],
            params: Params::new(),
        }
    }

    /// Add a membership condition. Empty `values` adds nothing and returns false.
    pub fn push_in(&mut self, column: &Ident, prefix: &str, values: &[String]) -> bool {
        match in_clause(column, prefix, values, &mut self.params) {
            Some(cond) => {
                self.conditions.push(cond);
                true
            }
            None => false,
        }
    }

    /// Add `julianday(column) BETWEEN julianday(:date_start) AND julianday(:date_end)`.
    ///
    /// Both sides compare as day numbers, so a bare `YYYY-MM-DD` value counts
    /// as midnight instead of sorting before a `YYYY-MM-DD HH:MM:SS.fff` bound.
    pub fn push_datetime_range(&mut self, column: &Ident, start: NaiveDateTime, end: NaiveDateTime) {
        self.conditions.push(format!(
            "julianday({column}) BETWEEN julianday(:date_start) AND julianday(:date_end)"
        ));
        self.params.insert("date_start", start);
        self.params.insert("date_end", end);
    }

    /// Add `column = 1` for a boolean flag column.
    pub fn push_flag(&mut self, column: &Ident) {
        self.conditions.push(format!("{column} = 1"));
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The conditions joined with ` AND ` (without the `WHERE` keyword).
    pub fn sql(&self) -> String {
        self.conditions.join(" AND ")
    }
}
