//! Query results.

use std::collections::HashMap;
use std::sync::Arc;

use driftdb_protocol::{QueryResponse, Value};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::row::Row;

/// The decoded reply to a successful query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    columns: Vec<String>,
    rows: Vec<Row>,
    execution_time_ms: Option<f64>,
}

impl QueryResult {
    /// Column names reported by the server.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows returned.
    ///
    /// This is also what [`Client::execute`](crate::Client::execute) reports
    /// as the affected row count.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Server-side execution time, when reported.
    #[must_use]
    pub fn execution_time_ms(&self) -> Option<f64> {
        self.execution_time_ms
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no rows were returned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The first row, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// The first column of the first row, if any.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.first().and_then(|row| row.get_idx(0))
    }

    /// Iterate over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    /// Consume the result, returning its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Copy every row into a map keyed by column name.
    #[must_use]
    pub fn to_maps(&self) -> Vec<HashMap<String, Value>> {
        self.rows.iter().map(Row::to_map).collect()
    }

    /// Deserialize every row into `T`.
    pub fn deserialize_rows<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows.iter().map(Row::deserialize).collect()
    }
}

impl From<QueryResponse> for QueryResult {
    fn from(response: QueryResponse) -> Self {
        let shared: Arc<[String]> = response.columns.iter().cloned().collect();
        let rows = response
            .rows
            .into_iter()
            .map(|object| Row::from_object(&shared, object))
            .collect();

        Self {
            columns: response.columns,
            rows,
            execution_time_ms: response.execution_time_ms,
        }
    }
}

impl std::ops::Index<usize> for QueryResult {
    type Output = Row;

    fn index(&self, idx: usize) -> &Row {
        &self.rows[idx]
    }
}

impl IntoIterator for QueryResult {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use driftdb_protocol::RowObject;

    fn response() -> QueryResponse {
        QueryResponse {
            columns: vec!["id".into(), "name".into()],
            rows: vec![
                RowObject::from([("name", Value::from("alice")), ("id", Value::Int(1))]),
                RowObject::from([("name", Value::from("bob")), ("id", Value::Int(2))]),
            ],
            execution_time_ms: Some(1.5),
        }
    }

    #[test]
    fn test_from_response() {
        let result = QueryResult::from(response());
        assert_eq!(result.columns(), ["id", "name"]);
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.execution_time_ms(), Some(1.5));
        assert_eq!(result[1]["name"], Value::from("bob"));
        assert_eq!(result.scalar(), Some(&Value::Int(1)));
    }

    #[test]
    fn test_empty_result() {
        let result = QueryResult::from(QueryResponse::default());
        assert!(result.is_empty());
        assert!(result.first().is_none());
        assert!(result.scalar().is_none());
        assert!(result.to_maps().is_empty());
    }

    #[test]
    fn test_iteration() {
        let result = QueryResult::from(response());
        let ids: Vec<i64> = (&result)
            .into_iter()
            .filter_map(|row| row["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2]);

        let owned: Vec<Row> = result.into_iter().collect();
        assert_eq!(owned.len(), 2);
    }

    #[test]
    fn test_deserialize_rows() {
        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }

        let result = QueryResult::from(response());
        let names: Vec<Named> = result.deserialize_rows().unwrap();
        assert_eq!(names[1].name, "bob");
    }
}
