//! Conversion of result rows into generic [`Record`]s.

use std::collections::hash_map;
use std::collections::HashMap;

use rusqlite::types::ValueRef;
use rusqlite::{Row, Statement};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::value::{parse_timestamp, Value};

/// One result row: lower-cased column name → value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record(HashMap<String, Value>);

impl Record {
    /// Returns the value of `column`, matched case-insensitively.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(&column.to_lowercase())
    }

    /// Returns `true` if the row has a column named `column`.
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(&column.to_lowercase())
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(column, value)` pairs in no particular order.
    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.0.iter()
    }

    /// Unwraps the underlying map.
    pub fn into_map(self) -> HashMap<String, Value> {
        self.0
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = hash_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// How a column's content is read, decided by its declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// `BLOB`-like: the payload is copied whole, NULL stays NULL.
    LargeBinary,
    /// `DATE` / `DATETIME` / `TIMESTAMP`: text is parsed when possible.
    Temporal,
    /// Storage class as returned by SQLite.
    Native,
}

impl ColumnKind {
    fn from_decl_type(decl_type: Option<&str>) -> Self {
        let Some(decl_type) = decl_type else {
            return Self::Native;
        };
        let decl_type = decl_type.to_ascii_uppercase();
        if decl_type.contains("BLOB") || decl_type == "BYTEA" {
            Self::LargeBinary
        } else if decl_type.contains("DATE") || decl_type.contains("TIME") {
            Self::Temporal
        } else {
            Self::Native
        }
    }
}

/// Column names and kinds of a prepared statement, computed once per query.
#[derive(Debug, Clone)]
pub(crate) struct ColumnLayout {
    columns: Vec<(String, ColumnKind)>,
}

impl ColumnLayout {
    pub(crate) fn of(stmt: &Statement<'_>) -> Self {
        let columns = stmt
            .columns()
            .iter()
            .map(|column| {
                (
                    column.name().to_lowercase(),
                    ColumnKind::from_decl_type(column.decl_type()),
                )
            })
            .collect();
        Self { columns }
    }
}

/// Reads every column of `row` into a [`Record`].
///
/// Used for both single-row and multi-row queries.
pub(crate) fn materialize(row: &Row<'_>, layout: &ColumnLayout) -> Result<Record> {
    let mut record = HashMap::with_capacity(layout.columns.len());
    for (idx, (name, kind)) in layout.columns.iter().enumerate() {
        let raw = row.get_ref(idx).map_err(|err| Error::Materialization {
            column: name.clone(),
            message: err.to_string(),
        })?;
        let value = read_column(name, *kind, raw).inspect_err(|err| log::error!("{err}"))?;
        record.insert(name.clone(), value);
    }
    Ok(Record(record))
}

fn read_column(name: &str, kind: ColumnKind, raw: ValueRef<'_>) -> Result<Value> {
    match (kind, raw) {
        (ColumnKind::LargeBinary, ValueRef::Null) => Ok(Value::Null),
        (ColumnKind::LargeBinary, ValueRef::Blob(bytes) | ValueRef::Text(bytes)) => {
            Ok(Value::Blob(bytes.to_vec()))
        }
        (ColumnKind::LargeBinary, other) => Err(Error::Materialization {
            column: name.to_string(),
            message: format!("expected binary content, found {}", other.data_type()),
        }),
        (ColumnKind::Temporal, ValueRef::Text(bytes)) => {
            let text = String::from_utf8_lossy(bytes);
            Ok(parse_timestamp(&text).map_or_else(|| Value::Text(text.into_owned()), Value::Timestamp))
        }
        (_, other) => Ok(Value::from(other)),
    }
}
