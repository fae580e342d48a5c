//! Framework boundary traits.
//!
//! A host database-access framework drives a driver through two handles:
//!
//! - [`DatabaseHandle`] - one per session: prepare, exec, transactions, attributes
//! - [`StatementHandle`] - one per prepared statement: bind, execute, fetch, decode
//!
//! Slots a driver intentionally does not support have default bodies that
//! return [`Error::NotImplemented`], so an unsupported call is always a typed
//! failure rather than a silent no-op.

use crate::error::{Error, ErrorDescriptor, Result};
use crate::param::ParamValue;
use crate::row::{ColumnInfo, Row};
use crate::sqlstate::SqlState;
use crate::types::ColumnDescription;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Cursor capability requested when a statement is prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorKind {
    /// Only `FetchOrientation::Next` is honored.
    #[default]
    ForwardOnly,
    /// Every orientation is honored.
    Scrollable,
}

/// Direction of a fetch relative to the cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrientation {
    Next,
    Prior,
    First,
    Last,
    /// Row number given by the fetch offset (1-based; negative counts from the end)
    Absolute,
    /// Row offset from the current position
    Relative,
}

/// Access mode used when a transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionMode {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl TransactionMode {
    /// Human-readable form reported through the attribute interface.
    pub const fn describe(&self) -> &'static str {
        match self {
            TransactionMode::ReadWrite => "Read and write",
            TransactionMode::ReadOnly => "Read-only",
        }
    }
}

/// Session-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Autocommit,
    /// Default cursor kind for statements prepared without one
    CursorKind,
    TransactionMode,
    ClientVersion,
    DriverName,
    ConnectionStatus,
    DefaultStringParam,
}

impl Attribute {
    pub const fn name(&self) -> &'static str {
        match self {
            Attribute::Autocommit => "autocommit",
            Attribute::CursorKind => "cursor",
            Attribute::TransactionMode => "transaction mode",
            Attribute::ClientVersion => "client version",
            Attribute::DriverName => "driver name",
            Attribute::ConnectionStatus => "connection status",
            Attribute::DefaultStringParam => "default string parameter",
        }
    }
}

/// Value read from or written to an [`Attribute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Cursor(CursorKind),
    Transaction(TransactionMode),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Int(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => f.write_str(v),
            AttributeValue::Cursor(v) => write!(f, "{:?}", v),
            AttributeValue::Transaction(v) => f.write_str(v.describe()),
        }
    }
}

/// Result of running a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteOutcome {
    /// A cursor is open over `columns` result columns.
    ResultSet { columns: usize },
    /// The statement ran to completion.
    RowsAffected(u64),
}

impl ExecuteOutcome {
    pub const fn rows_affected(&self) -> u64 {
        match self {
            ExecuteOutcome::ResultSet { .. } => 0,
            ExecuteOutcome::RowsAffected(n) => *n,
        }
    }
}

/// How a column value should be handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnRequest {
    /// Fully materialized [`Value`]
    #[default]
    Value,
    /// Pull-based reader for LOB columns; other types are returned as values
    Stream,
}

/// A decoded column.
#[derive(Debug)]
pub enum ColumnData<S> {
    Value(Value),
    Stream(S),
}

impl<S> ColumnData<S> {
    /// The materialized value, or `None` for a stream.
    pub fn into_value(self) -> Option<Value> {
        match self {
            ColumnData::Value(v) => Some(v),
            ColumnData::Stream(_) => None,
        }
    }
}

/// Last error in the shape the framework's fetch-error hook reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub sqlstate: SqlState,
    pub code: i32,
    pub message: String,
}

impl From<&ErrorDescriptor> for ErrorInfo {
    fn from(d: &ErrorDescriptor) -> Self {
        Self {
            sqlstate: d.sqlstate,
            code: d.code,
            message: d.message.clone(),
        }
    }
}

/// A session as seen by the framework.
pub trait DatabaseHandle {
    type Statement<'h>: StatementHandle
    where
        Self: 'h;

    /// End the session. Safe to call more than once.
    fn close(&self) -> Result<()>;

    /// Prepare a statement; `None` uses the session's default cursor kind.
    fn prepare<'h>(&'h self, sql: &str, cursor: Option<CursorKind>)
    -> Result<Self::Statement<'h>>;

    /// Run a statement without a result set, returning affected rows.
    fn exec(&self, sql: &str) -> Result<u64>;

    fn begin(&self) -> Result<()>;

    fn commit(&self) -> Result<()>;

    fn rollback(&self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    fn get_attribute(&self, attribute: Attribute) -> Result<AttributeValue>;

    fn set_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()>;

    fn error_info(&self) -> Option<ErrorInfo>;

    fn check_liveness(&self) -> Result<()>;

    fn quote(&self, _unquoted: &str) -> Result<String> {
        Err(Error::NotImplemented("quote"))
    }

    fn last_insert_id(&self, _name: Option<&str>) -> Result<String> {
        Err(Error::NotImplemented("last_insert_id"))
    }
}

/// A prepared statement as seen by the framework.
pub trait StatementHandle {
    type Stream<'s>: std::io::Read
    where
        Self: 's;

    /// Bind a value to a 0-based parameter position.
    fn bind_param(&mut self, index: usize, value: ParamValue) -> Result<()>;

    fn execute(&mut self) -> Result<ExecuteOutcome>;

    /// Move the cursor; `Ok(false)` when no row is there.
    fn fetch(&mut self, orientation: FetchOrientation, offset: i64) -> Result<bool>;

    /// Describe a 0-based result column.
    fn describe(&self, index: usize) -> Result<ColumnDescription>;

    /// Decode a 0-based column of the current row.
    fn get_column(&self, index: usize, request: ColumnRequest)
    -> Result<ColumnData<Self::Stream<'_>>>;

    fn close_cursor(&mut self) -> Result<()>;

    fn column_count(&self) -> usize;

    fn rows_affected(&self) -> u64;

    fn error_info(&self) -> Option<ErrorInfo>;

    /// Column names of the current result set.
    ///
    /// Implementations that cache this per cursor let every fetched row
    /// share one [`ColumnInfo`].
    fn column_info(&self) -> Result<Arc<ColumnInfo>> {
        let names = (0..self.column_count())
            .map(|index| self.describe(index).map(|d| d.name))
            .collect::<Result<Vec<_>>>()?;
        Ok(Arc::new(ColumnInfo::new(names)))
    }

    /// Decode every column of the current row.
    fn fetch_row(&self) -> Result<Row> {
        let columns = self.column_info()?;
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            let value = self
                .get_column(index, ColumnRequest::Value)?
                .into_value()
                .unwrap_or(Value::Null);
            values.push(value);
        }
        Ok(Row::with_columns(columns, values))
    }

    fn next_rowset(&mut self) -> Result<bool> {
        Err(Error::NotImplemented("next_rowset"))
    }

    fn get_attribute(&self, _attribute: Attribute) -> Result<AttributeValue> {
        Err(Error::NotImplemented("statement get_attribute"))
    }

    fn set_attribute(&mut self, _attribute: Attribute, _value: AttributeValue) -> Result<()> {
        Err(Error::NotImplemented("statement set_attribute"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_mode_text() {
        assert_eq!(TransactionMode::ReadWrite.describe(), "Read and write");
        assert_eq!(TransactionMode::ReadOnly.describe(), "Read-only");
        assert_eq!(TransactionMode::default(), TransactionMode::ReadWrite);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(CursorKind::default(), CursorKind::ForwardOnly);
        assert_eq!(ColumnRequest::default(), ColumnRequest::Value);
    }

    #[test]
    fn test_outcome_rows() {
        assert_eq!(ExecuteOutcome::RowsAffected(3).rows_affected(), 3);
        assert_eq!(ExecuteOutcome::ResultSet { columns: 2 }.rows_affected(), 0);
    }

    #[test]
    fn test_error_info_from_descriptor() {
        let d = ErrorDescriptor::new(-1, "boom", SqlState::GENERAL_ERROR);
        let info = ErrorInfo::from(&d);
        assert_eq!(info.code, -1);
        assert_eq!(info.sqlstate.as_str(), "HY000");
    }

    #[test]
    fn test_attribute_value_display() {
        assert_eq!(
            AttributeValue::Transaction(TransactionMode::ReadOnly).to_string(),
            "Read-only"
        );
        assert_eq!(AttributeValue::Bool(true).to_string(), "true");
    }
}
