//! The statement-execution surface the session delegates to.
//!
//! Opening connections, running parameterized statements, reporting generated
//! keys and cursoring over results are the database driver's business; the
//! mapping engine only consumes this trait.

use crate::core::{Result, Row, Value};

/// Database connection handle, implemented by a driver adapter.
///
/// All calls are synchronous and blocking. Errors are surfaced as
/// `DaoError::Connectivity` and never retried by the engine.
pub trait Connection: Send {
    /// Executes DML or DDL; returns the affected-row count (0 for DDL).
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Executes a SELECT; returns the full result set in cursor order.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Rows>;

    /// Executes an INSERT and reports the key the database generated,
    /// `Value::Null` when it generated none.
    fn insert_returning_key(&mut self, sql: &str, params: &[Value]) -> Result<Value>;

    /// Releases the underlying handle. Called once by an owning session.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Finite, in-order result set.
///
/// Not restartable: this is a materialized snapshot of the cursor, iterated
/// front to back.
#[derive(Debug)]
pub struct Rows {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Rows {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|row| RowView {
            columns: &self.columns,
            values: row,
        })
    }

    pub fn first(&self) -> Option<RowView<'_>> {
        self.iter().next()
    }
}

/// One row of a result set with column-name-indexed access.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a Row,
}

impl<'a> RowView<'a> {
    /// Looks a value up by column label, case-insensitively.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values.get(idx))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}
