//! Row representation.

use std::collections::HashMap;
use std::sync::Arc;

use driftdb_protocol::{RowObject, Value};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// A single result row.
///
/// Values are stored in column order: the server-reported columns first,
/// followed by any keys the row carried that the column list did not name.
/// Rows of the same result share their column list.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row from parallel column and value lists.
    pub fn new(columns: impl Into<Arc<[String]>>, values: Vec<Value>) -> Self {
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Arrange a wire row object into column order.
    ///
    /// Columns missing from the object read as [`Value::Null`]. Keys the
    /// column list does not name follow in the order the server sent them.
    pub(crate) fn from_object(columns: &Arc<[String]>, mut object: RowObject) -> Self {
        let mut values: Vec<Value> = columns
            .iter()
            .map(|name| object.remove(name).unwrap_or_default())
            .collect();

        if object.is_empty() {
            return Self {
                columns: Arc::clone(columns),
                values,
            };
        }

        let mut names = columns.to_vec();
        for (name, value) in object {
            names.push(name);
            values.push(value);
        }
        Self::new(names, values)
    }

    /// Get a value by column name.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).and_then(|idx| self.values.get(idx))
    }

    /// Get a value by position.
    #[must_use]
    pub fn get_idx(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Whether the row has a column named `column`.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    /// Column names in order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Consume the row, returning its values.
    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Copy the row into a map keyed by column name.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// Deserialize the row into any type implementing `Deserialize`,
    /// matching fields by column name.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone().into_json()))
            .collect();
        serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| Error::Decode(format!("row does not match target type: {e}")))
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

impl std::ops::Index<&str> for Row {
    type Output = Value;

    /// Returns [`Value::Null`] for unknown columns.
    fn index(&self, column: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.get(column).unwrap_or(&NULL)
    }
}
