//! Mimer SQL driver.
//!
//! This crate marshals the framework model of `mimer-pdo-core` (sessions,
//! prepared statements, bound parameters, decoded columns) onto a native
//! Mimer SQL client reached through the [`NativeClient`] trait.
//!
//! # Clients
//!
//! - [`MemoryEngine`] - in-process engine emulation driven by registered
//!   statement definitions; needs no server
//! - `ffi::MimerApi` - links `libmimerapi` (cargo feature `native`)
//!
//! # Example
//!
//! ```rust,ignore
//! use mimer_pdo::{MemoryEngine, MimerConfig, Session, StatementDef};
//! use mimer_pdo_core::{FetchOrientation, ParamValue, SqlType, Value};
//!
//! let engine = MemoryEngine::new();
//! engine.define(
//!     StatementDef::query("SELECT name FROM users WHERE id = ?")
//!         .param(SqlType::Integer)
//!         .column("NAME", SqlType::VarChar)
//!         .rows(|params| Ok(vec![vec![Value::Text(format!("user {:?}", params[0]))]])),
//! );
//!
//! let session = Session::connect(engine, &MimerConfig::new().database("testdb"))?;
//! let mut stmt = session.prepare("SELECT name FROM users WHERE id = ?", None)?;
//! stmt.bind(0, ParamValue::from(Value::Int(42)))?;
//! stmt.execute()?;
//! while stmt.fetch(FetchOrientation::Next, 0)? {
//!     println!("{:?}", stmt.fetch_row()?);
//! }
//! stmt.finalize()?;
//! session.close()?;
//! ```
//!
//! # Type Mapping
//!
//! | Native type | `Value` |
//! |-------------|---------|
//! | SMALLINT | `SmallInt` |
//! | INTEGER | `Int` |
//! | BIGINT | `BigInt` |
//! | REAL | `Float` |
//! | DOUBLE PRECISION | `Double` |
//! | DECIMAL | `Decimal` (text) |
//! | BOOLEAN | `Bool` |
//! | CHAR, VARCHAR, NCHAR, NVARCHAR | `Text` |
//! | BINARY, VARBINARY, BLOB | `Bytes` |
//! | CLOB, NCLOB | `Text` |
//! | DATE, TIME, TIMESTAMP, INTERVAL | `Date`, `Time`, `Timestamp`, `Interval` (text) |
//!
//! # Thread Safety
//!
//! Sessions and statements use interior mutability and are not `Sync`.
//! Share them across threads only behind the caller's own serialization.

pub mod binder;
pub mod config;
pub mod decoder;
pub mod diagnostics;
#[cfg(feature = "native")]
#[allow(unsafe_code)]
pub mod ffi;
pub mod lob;
pub mod memory;
pub mod native;
pub mod session;
pub mod statement;
pub mod types;

pub use config::{DEFAULT_LOB_CHUNK_SIZE, MimerConfig};
pub use diagnostics::{sqlstate_for, translate};
pub use lob::LobReader;
pub use memory::{EngineStats, MemoryEngine, MemoryError, StatementDef};
pub use native::{NativeClient, NativeHandle, NativeResult, TransactionEnd};
pub use session::Session;
pub use statement::{Statement, StatementState};

#[cfg(feature = "native")]
pub use ffi::MimerApi;
