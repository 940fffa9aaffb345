//! Fluent SELECT builder.

use std::fmt;

use driftdb_protocol::{TimeTravel, Value};
use serde::de::DeserializeOwned;

use crate::client::Client;
use crate::error::Result;
use crate::result::QueryResult;

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Direction {
    /// The SQL keyword.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Builds `SELECT` statements with positional `?` parameters.
///
/// Identifiers and operators are interpolated verbatim; only `where_`
/// values travel as parameters.
///
/// # Example
///
/// ```rust
/// use driftdb_client::{Direction, QueryBuilder, TimeTravel};
///
/// let query = QueryBuilder::new("users")
///     .select(["id", "name"])
///     .where_("age", ">", 18)
///     .order_by("name", Direction::Asc)
///     .limit(10)
///     .as_of(TimeTravel::Sequence(7));
///
/// assert_eq!(
///     query.build(),
///     "SELECT id, name FROM users FOR SYSTEM_TIME AS OF @SEQ:7 \
///      WHERE age > ? ORDER BY name ASC LIMIT 10"
/// );
/// assert_eq!(query.params().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    table: String,
    columns: Vec<String>,
    filters: Vec<(String, String)>,
    order: Vec<(String, Direction)>,
    limit: Option<u64>,
    offset: Option<u64>,
    time_travel: Option<TimeTravel>,
    params: Vec<Value>,
}

impl QueryBuilder {
    /// Start a query against `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Add columns to the select list. With none, `*` is selected.
    #[must_use]
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add a `column op ?` condition, AND-ed with the others.
    #[must_use]
    pub fn where_(
        mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.filters.push((column.into(), op.into()));
        self.params.push(value.into());
        self
    }

    /// Add an `ORDER BY` key.
    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    /// Set `LIMIT`.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set `OFFSET`.
    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Read the table as of a point in its history.
    #[must_use]
    pub fn as_of(mut self, time_travel: TimeTravel) -> Self {
        self.time_travel = Some(time_travel);
        self
    }

    /// Render the SQL text.
    #[must_use]
    pub fn build(&self) -> String {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);

        if let Some(tt) = &self.time_travel {
            sql = tt.apply(&sql);
        }

        if !self.filters.is_empty() {
            let conditions: Vec<String> = self
                .filters
                .iter()
                .map(|(column, op)| format!("{column} {op} ?"))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|(column, direction)| format!("{column} {direction}"))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&keys.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        sql
    }

    /// Parameters collected by `where_`, in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Run the query.
    pub async fn fetch(&self, client: &Client) -> Result<QueryResult> {
        client.query(&self.build(), self.params()).await
    }

    /// Run the query and deserialize every row into `T`.
    pub async fn fetch_as<T: DeserializeOwned>(&self, client: &Client) -> Result<Vec<T>> {
        client.query_as(&self.build(), self.params()).await
    }
}
