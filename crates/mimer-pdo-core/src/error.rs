//! Error types for driver operations.
//!
//! Every failure a caller can observe carries an [`ErrorDescriptor`]: the
//! native (or custom) code, a message and a SQLSTATE. Native failures are
//! translated into a descriptor by the driver; conditions the native layer
//! cannot describe itself use the sentinel codes in [`codes`].

use crate::sqlstate::SqlState;
use serde::Serialize;
use std::fmt;

/// Sentinel codes for driver-detected conditions.
///
/// These sit outside the range the native client returns, so a caller can
/// always tell a custom descriptor from a passthrough one.
pub mod codes {
    /// Success return of every native call.
    pub const SUCCESS: i32 = 0;
    /// Native code for rejected credentials.
    pub const LOGIN_FAILED: i32 = -14006;
    /// Base of the custom range; every custom code is strictly below it.
    pub const CUSTOM_BASE: i32 = -100_000;
    /// Framework slot the driver intentionally does not provide.
    pub const NOT_IMPLEMENTED: i32 = -100_001;
    /// Value (or parameter position) larger than the native type allows.
    pub const VALUE_TOO_LARGE: i32 = -100_002;
    /// Operation attempted in the wrong state.
    pub const SEQUENCE_ERROR: i32 = -100_003;
    /// Parameter category the binder does not handle.
    pub const UNSUPPORTED_PARAMETER: i32 = -100_004;
    /// A LOB handle could not be created or used.
    pub const LOB_HANDLE: i32 = -100_005;
    /// Character boundary could not be resolved inside the lookback window.
    pub const ENCODING: i32 = -100_006;
    /// Value has the wrong shape for the target native type.
    pub const CONVERSION: i32 = -100_007;
    /// The session has already been closed.
    pub const SESSION_CLOSED: i32 = -100_008;
    /// Source stream I/O failure.
    pub const IO: i32 = -100_009;
    /// Invalid driver configuration.
    pub const CONFIG: i32 = -100_010;
    /// Native type code the decoder does not recognize.
    pub const UNSUPPORTED_TYPE: i32 = -100_011;

    /// Is this one of the driver's own sentinel codes?
    pub const fn is_custom(code: i32) -> bool {
        code < CUSTOM_BASE
    }
}

/// Code, message and SQLSTATE of one failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDescriptor {
    pub code: i32,
    pub message: String,
    pub sqlstate: SqlState,
}

impl ErrorDescriptor {
    pub fn new(code: i32, message: impl Into<String>, sqlstate: SqlState) -> Self {
        Self {
            code,
            message: message.into(),
            sqlstate,
        }
    }

    /// Does this descriptor carry a driver sentinel code?
    pub fn is_custom(&self) -> bool {
        codes::is_custom(self.code)
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ({}) {}", self.sqlstate, self.code, self.message)
    }
}

/// The primary error type for all driver operations.
#[derive(Debug)]
pub enum Error {
    /// Failure to open or keep a session
    Connection(ConnectionError),
    /// Operation attempted in the wrong state
    Sequence(SequenceError),
    /// Value cannot be represented in the target type
    Conversion(ConversionError),
    /// Limits and handles (parameter index, LOB handle, unsupported category)
    Resource(ResourceError),
    /// Multi-byte boundary failures during chunked LOB transfer
    Encoding(EncodingError),
    /// Passthrough failure reported by the native client
    Database(DatabaseError),
    /// Invalid configuration
    Config(ConfigError),
    /// I/O errors from LOB source streams
    Io(std::io::Error),
    /// Framework slot the driver does not implement
    NotImplemented(&'static str),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish the session
    Connect,
    /// Liveness check failed
    Disconnected,
    /// Operation on a session that was already closed
    Closed,
    /// Ending the native session failed
    Teardown,
}

#[derive(Debug)]
pub struct SequenceError {
    pub kind: SequenceErrorKind,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceErrorKind {
    /// `begin` while a transaction is active
    AlreadyInTransaction,
    /// `commit`/`rollback` without an active transaction
    NotInTransaction,
    /// Fetch or describe without an open cursor
    NoOpenCursor,
    /// Scroll orientation on a forward-only cursor
    FetchOrientation,
    /// Operation on a finalized statement
    StatementFinalized,
    /// Output value requested before the statement ran
    NotExecuted,
}

#[derive(Debug)]
pub struct ConversionError {
    pub kind: ConversionErrorKind,
    /// What the target expected
    pub expected: &'static str,
    /// What was supplied
    pub actual: String,
    /// Parameter or column the value belonged to
    pub target: Option<String>,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionErrorKind {
    /// Numeric value out of range for the target type
    Overflow,
    /// Value has the wrong shape for the target type
    InvalidValue,
    /// Native type code not recognized
    UnsupportedType,
}

#[derive(Debug)]
pub struct ResourceError {
    pub kind: ResourceErrorKind,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceErrorKind {
    /// Parameter position exceeds the native maximum
    ParameterIndexOutOfRange,
    /// Parameter category not handled by the binder
    UnsupportedParameter,
    /// A LOB handle could not be allocated or used
    LobHandle,
}

#[derive(Debug)]
pub struct EncodingError {
    /// Byte offset into the source where the failure was detected
    pub offset: u64,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug)]
pub struct DatabaseError {
    /// SQL text involved, if any
    pub sql: Option<String>,
    pub descriptor: ErrorDescriptor,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn connection(kind: ConnectionErrorKind, descriptor: ErrorDescriptor) -> Self {
        Error::Connection(ConnectionError { kind, descriptor })
    }

    /// Operation on a session whose native handle is already released.
    pub fn closed() -> Self {
        Error::connection(
            ConnectionErrorKind::Closed,
            ErrorDescriptor::new(
                codes::SESSION_CLOSED,
                "session is closed",
                SqlState::CONNECTION_DOES_NOT_EXIST,
            ),
        )
    }

    pub fn sequence(kind: SequenceErrorKind, message: impl Into<String>) -> Self {
        let sqlstate = match kind {
            SequenceErrorKind::AlreadyInTransaction | SequenceErrorKind::NotInTransaction => {
                SqlState::INVALID_TRANSACTION_STATE
            }
            SequenceErrorKind::FetchOrientation => SqlState::FETCH_TYPE_OUT_OF_RANGE,
            SequenceErrorKind::NoOpenCursor
            | SequenceErrorKind::StatementFinalized
            | SequenceErrorKind::NotExecuted => SqlState::FUNCTION_SEQUENCE_ERROR,
        };
        Error::Sequence(SequenceError {
            kind,
            descriptor: ErrorDescriptor::new(codes::SEQUENCE_ERROR, message, sqlstate),
        })
    }

    pub fn conversion(
        kind: ConversionErrorKind,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        let actual = actual.into();
        let (code, sqlstate) = match kind {
            ConversionErrorKind::Overflow => {
                (codes::VALUE_TOO_LARGE, SqlState::NUMERIC_VALUE_OUT_OF_RANGE)
            }
            ConversionErrorKind::InvalidValue => {
                (codes::CONVERSION, SqlState::INVALID_CHARACTER_VALUE_FOR_CAST)
            }
            ConversionErrorKind::UnsupportedType => {
                (codes::UNSUPPORTED_TYPE, SqlState::INVALID_SQL_DATA_TYPE)
            }
        };
        let message = format!("expected {}, found {}", expected, actual);
        Error::Conversion(ConversionError {
            kind,
            expected,
            actual,
            target: None,
            descriptor: ErrorDescriptor::new(code, message, sqlstate),
        })
    }

    pub fn resource(kind: ResourceErrorKind, message: impl Into<String>) -> Self {
        let (code, sqlstate) = match kind {
            ResourceErrorKind::ParameterIndexOutOfRange => (
                codes::VALUE_TOO_LARGE,
                SqlState::INVALID_PARAMETER_NUMBER,
            ),
            ResourceErrorKind::UnsupportedParameter => (
                codes::UNSUPPORTED_PARAMETER,
                SqlState::OPTIONAL_FEATURE_NOT_IMPLEMENTED,
            ),
            ResourceErrorKind::LobHandle => {
                (codes::LOB_HANDLE, SqlState::MEMORY_ALLOCATION_ERROR)
            }
        };
        Error::Resource(ResourceError {
            kind,
            descriptor: ErrorDescriptor::new(code, message, sqlstate),
        })
    }

    pub fn encoding(offset: u64, message: impl Into<String>) -> Self {
        Error::Encoding(EncodingError {
            offset,
            descriptor: ErrorDescriptor::new(
                codes::ENCODING,
                message,
                SqlState::NONCHARACTER_IN_UCS_STRING,
            ),
        })
    }

    pub fn database(descriptor: ErrorDescriptor, sql: Option<&str>) -> Self {
        Error::Database(DatabaseError {
            sql: sql.map(str::to_string),
            descriptor,
        })
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            message: message.into(),
            source: None,
        })
    }

    /// Attach the parameter or column name to a conversion error.
    pub fn with_target(self, target: impl Into<String>) -> Self {
        match self {
            Error::Conversion(mut e) => {
                let target = target.into();
                e.descriptor.message = format!("{}: {}", target, e.descriptor.message);
                e.target = Some(target);
                Error::Conversion(e)
            }
            other => other,
        }
    }

    /// The structured descriptor a caller sees for this error.
    pub fn descriptor(&self) -> ErrorDescriptor {
        match self {
            Error::Connection(e) => e.descriptor.clone(),
            Error::Sequence(e) => e.descriptor.clone(),
            Error::Conversion(e) => e.descriptor.clone(),
            Error::Resource(e) => e.descriptor.clone(),
            Error::Encoding(e) => e.descriptor.clone(),
            Error::Database(e) => e.descriptor.clone(),
            Error::Config(e) => {
                ErrorDescriptor::new(codes::CONFIG, e.message.clone(), SqlState::GENERAL_ERROR)
            }
            Error::Io(e) => ErrorDescriptor::new(codes::IO, e.to_string(), SqlState::GENERAL_ERROR),
            Error::NotImplemented(slot) => ErrorDescriptor::new(
                codes::NOT_IMPLEMENTED,
                format!("driver does not support {}", slot),
                SqlState::DRIVER_DOES_NOT_SUPPORT_FUNCTION,
            ),
        }
    }

    /// SQLSTATE of this error.
    pub fn sqlstate(&self) -> SqlState {
        match self {
            Error::Connection(e) => e.descriptor.sqlstate,
            Error::Sequence(e) => e.descriptor.sqlstate,
            Error::Conversion(e) => e.descriptor.sqlstate,
            Error::Resource(e) => e.descriptor.sqlstate,
            Error::Encoding(e) => e.descriptor.sqlstate,
            Error::Database(e) => e.descriptor.sqlstate,
            Error::Config(_) | Error::Io(_) => SqlState::GENERAL_ERROR,
            Error::NotImplemented(_) => SqlState::DRIVER_DOES_NOT_SUPPORT_FUNCTION,
        }
    }

    /// Native or custom code of this error.
    pub fn code(&self) -> i32 {
        self.descriptor().code
    }

    /// Is this a connection error that likely requires reconnection?
    pub fn is_connection_error(&self) -> bool {
        match self {
            Error::Connection(c) => matches!(
                c.kind,
                ConnectionErrorKind::Connect
                    | ConnectionErrorKind::Disconnected
                    | ConnectionErrorKind::Closed
            ),
            Error::Database(d) => d.descriptor.sqlstate.class() == "08",
            _ => false,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Database(d) => d.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e),
            Error::Sequence(e) => write!(f, "Sequence error: {}", e),
            Error::Conversion(e) => write!(f, "Conversion error: {}", e),
            Error::Resource(e) => write!(f, "Resource error: {}", e),
            Error::Encoding(e) => write!(f, "Encoding error: {}", e),
            Error::Database(e) => write!(f, "Database error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NotImplemented(slot) => write!(f, "Not implemented: {}", slot),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl fmt::Display for SequenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.descriptor, self.offset)
    }
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.descriptor)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<SequenceError> for Error {
    fn from(err: SequenceError) -> Self {
        Error::Sequence(err)
    }
}

impl From<ConversionError> for Error {
    fn from(err: ConversionError) -> Self {
        Error::Conversion(err)
    }
}

impl From<ResourceError> for Error {
    fn from(err: ResourceError) -> Self {
        Error::Resource(err)
    }
}

impl From<DatabaseError> for Error {
    fn from(err: DatabaseError) -> Self {
        Error::Database(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_sqlstates() {
        let err = Error::sequence(SequenceErrorKind::AlreadyInTransaction, "already active");
        assert_eq!(err.sqlstate(), SqlState::INVALID_TRANSACTION_STATE);
        assert_eq!(err.code(), codes::SEQUENCE_ERROR);

        let err = Error::sequence(SequenceErrorKind::FetchOrientation, "forward only");
        assert_eq!(err.sqlstate(), SqlState::FETCH_TYPE_OUT_OF_RANGE);
    }

    #[test]
    fn test_conversion_with_target() {
        let err = Error::conversion(ConversionErrorKind::Overflow, "INTEGER", "5000000000")
            .with_target("parameter 1");
        match &err {
            Error::Conversion(c) => {
                assert_eq!(c.target.as_deref(), Some("parameter 1"));
                assert!(c.descriptor.message.starts_with("parameter 1: "));
            }
            other => panic!("expected conversion error, got {other:?}"),
        }
        assert_eq!(err.sqlstate(), SqlState::NUMERIC_VALUE_OUT_OF_RANGE);
    }

    #[test]
    fn test_unsupported_type_code() {
        let err = Error::conversion(ConversionErrorKind::UnsupportedType, "known type", "9999");
        assert_eq!(err.code(), codes::UNSUPPORTED_TYPE);
        assert!(err.descriptor().is_custom());
    }

    #[test]
    fn test_native_descriptor_is_not_custom() {
        let descriptor =
            ErrorDescriptor::new(-12200, "table not found", SqlState::BASE_TABLE_OR_VIEW_NOT_FOUND);
        assert!(!descriptor.is_custom());
        let err = Error::database(descriptor, Some("SELECT * FROM nope"));
        assert_eq!(err.sql(), Some("SELECT * FROM nope"));
        assert_eq!(err.code(), -12200);
    }

    #[test]
    fn test_not_implemented_descriptor() {
        let err = Error::NotImplemented("quote");
        let descriptor = err.descriptor();
        assert_eq!(descriptor.sqlstate, SqlState::DRIVER_DOES_NOT_SUPPORT_FUNCTION);
        assert_eq!(descriptor.code, codes::NOT_IMPLEMENTED);
        assert!(err.to_string().contains("quote"));
    }

    #[test]
    fn test_connection_flags() {
        let err = Error::connection(
            ConnectionErrorKind::Disconnected,
            ErrorDescriptor::new(-18500, "lost", SqlState::COMMUNICATION_LINK_FAILURE),
        );
        assert!(err.is_connection_error());
        assert!(!Error::config("bad").is_connection_error());
    }
}
