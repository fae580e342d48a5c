//! Core types and traits for the Mimer SQL driver.
//!
//! This crate holds everything a host framework and the driver agree on:
//!
//! - `Value` for dynamically typed parameters and columns
//! - `ParamValue` for immediate, deferred and streamed bindings
//! - `Error` with a structured `ErrorDescriptor` (code, message, SQLSTATE)
//! - `DatabaseHandle` / `StatementHandle` traits for the framework boundary
//! - `Row` and `FromValue` for typed access to fetched rows

pub mod connection;
pub mod error;
pub mod param;
pub mod row;
pub mod sqlstate;
pub mod types;
pub mod value;

pub use connection::{
    Attribute, AttributeValue, ColumnData, ColumnRequest, CursorKind, DatabaseHandle,
    ErrorInfo, ExecuteOutcome, FetchOrientation, StatementHandle, TransactionMode,
};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, ConversionError, ConversionErrorKind,
    DatabaseError, EncodingError, Error, ErrorDescriptor, ResourceError, ResourceErrorKind,
    Result, SequenceError, SequenceErrorKind,
};
pub use param::{LobStream, ParamValue, ReadSeek};
pub use row::{ColumnInfo, FromValue, Row};
pub use sqlstate::SqlState;
pub use types::{ColumnDescription, Nullability, ParamMode, SqlType, TypeFamily};
pub use value::Value;
