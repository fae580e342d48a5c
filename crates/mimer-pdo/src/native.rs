//! The native client boundary.
//!
//! [`NativeClient`] is the complete set of calls the driver makes into a
//! Mimer-style client library. Every call returns the library's raw return
//! code on failure; the driver turns those into [`ErrorDescriptor`]s through
//! the diagnostics module, never the client itself.
//!
//! [`ErrorDescriptor`]: mimer_pdo_core::ErrorDescriptor

use mimer_pdo_core::{CursorKind, FetchOrientation, ParamMode, TransactionMode};

/// Raw result of a native call: the value, or the native error code.
pub type NativeResult<T> = std::result::Result<T, i32>;

/// Status returned by a successful fetch that found a row.
pub const SUCCESS: i32 = 0;
/// Status returned by a fetch that ran off the end of the result set.
pub const NO_DATA: i32 = 100;
/// Call made in the wrong cursor or statement state.
pub const SEQUENCE_ERROR: i32 = -24101;
/// Cursor operation on a statement with no open cursor.
pub const CURSOR_NOT_OPEN: i32 = -24102;
/// Direct execution of a statement that returns a result set.
pub const CURSOR_SPECIFICATION_EXECUTED: i32 = -24103;
/// Cursor opened on a statement without a result set.
pub const NOT_A_CURSOR_SPECIFICATION: i32 = -24104;
/// Numeric value does not fit the target.
pub const VALUE_OUT_OF_RANGE: i32 = -24004;
/// Text could not be converted to the target type.
pub const INVALID_CHARACTER_VALUE: i32 = -24005;
/// Value truncated on assignment.
pub const STRING_TRUNCATED: i32 = -24006;
/// An input parameter was not given a value before execution.
pub const PARAMETER_NOT_SET: i32 = -24008;
/// Parameter or column position out of range.
pub const INVALID_INDEX: i32 = -24010;
/// Setter or getter not compatible with the declared type.
pub const INCOMPATIBLE_TYPE: i32 = -24011;
/// LOB written with more or fewer units than declared.
pub const LOB_SIZE_MISMATCH: i32 = -24020;
/// Character LOB chunk is not whole UTF-8 characters.
pub const INVALID_UTF8: i32 = -24021;
/// Syntax error in SQL text.
pub const SYNTAX_ERROR: i32 = -12101;
/// Referenced table does not exist.
pub const TABLE_NOT_FOUND: i32 = -12200;
/// Table already exists.
pub const TABLE_EXISTS: i32 = -12517;
/// Unique or primary key constraint violated.
pub const DUPLICATE_KEY: i32 = -10101;
/// Transaction aborted because of a conflicting concurrent transaction.
pub const TRANSACTION_CONFLICT: i32 = -10001;
/// Update attempted in a read-only transaction.
pub const READ_ONLY_TRANSACTION: i32 = -16001;
/// Database name not known to the client.
pub const DATABASE_NOT_FOUND: i32 = -14001;
/// Login rejected.
pub const LOGIN_FAILED: i32 = -14006;
/// Server communication lost.
pub const COMMUNICATION_FAILURE: i32 = -18500;

/// How a transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionEnd {
    Commit,
    Rollback,
}

/// A native handle of either shape, for calls that accept both.
pub enum NativeHandle<'a, C: NativeClient + ?Sized> {
    Session(&'a C::Session),
    Statement(&'a C::Statement),
}

impl<C: NativeClient + ?Sized> Clone for NativeHandle<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: NativeClient + ?Sized> Copy for NativeHandle<'_, C> {}

/// Calls into the native SQL client library.
///
/// Column and parameter positions are 1-based. Variable-length getters
/// follow a two-phase protocol: called with `None` they return the value's
/// length in bytes; called with a buffer of at least `length + 1` bytes they
/// fill it and return the number of bytes written, terminator excluded.
/// Use [`read_sized`] rather than driving the protocol by hand.
pub trait NativeClient {
    type Session;
    type Statement;
    type Lob;

    // Sessions
    fn begin_session(
        &self,
        database: Option<&str>,
        user: &str,
        password: &str,
    ) -> NativeResult<Self::Session>;
    fn end_session(&self, session: Self::Session) -> NativeResult<()>;
    fn ping(&self, session: &Self::Session) -> NativeResult<()>;
    fn begin_transaction(&self, session: &Self::Session, mode: TransactionMode)
    -> NativeResult<()>;
    fn end_transaction(&self, session: &Self::Session, end: TransactionEnd) -> NativeResult<()>;
    fn api_version(&self) -> String;

    // Statements
    fn begin_statement(
        &self,
        session: &Self::Session,
        sql: &str,
        cursor: CursorKind,
    ) -> NativeResult<Self::Statement>;
    fn end_statement(&self, statement: Self::Statement) -> NativeResult<()>;
    fn statement_has_result_set(&self, statement: &Self::Statement) -> NativeResult<bool>;
    /// Run a statement without a result set; returns affected rows.
    fn execute(&self, statement: &Self::Statement) -> NativeResult<u64>;

    // Cursors
    fn open_cursor(&self, statement: &Self::Statement) -> NativeResult<()>;
    /// Returns [`SUCCESS`] on a row and [`NO_DATA`] at the end.
    fn fetch(&self, statement: &Self::Statement) -> NativeResult<i32>;
    fn fetch_scroll(
        &self,
        statement: &Self::Statement,
        orientation: FetchOrientation,
        offset: i64,
    ) -> NativeResult<i32>;
    fn close_cursor(&self, statement: &Self::Statement) -> NativeResult<()>;

    // Metadata
    fn column_count(&self, statement: &Self::Statement) -> NativeResult<usize>;
    fn column_type(&self, statement: &Self::Statement, index: i16) -> NativeResult<i32>;
    fn column_name(
        &self,
        statement: &Self::Statement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize>;
    fn parameter_count(&self, statement: &Self::Statement) -> NativeResult<usize>;
    fn parameter_type(&self, statement: &Self::Statement, index: i16) -> NativeResult<i32>;
    fn parameter_mode(&self, statement: &Self::Statement, index: i16) -> NativeResult<ParamMode>;

    // Getters: columns while a cursor is open, output parameters otherwise
    fn is_null(&self, statement: &Self::Statement, index: i16) -> NativeResult<bool>;
    fn get_int32(&self, statement: &Self::Statement, index: i16) -> NativeResult<i32>;
    fn get_int64(&self, statement: &Self::Statement, index: i16) -> NativeResult<i64>;
    fn get_boolean(&self, statement: &Self::Statement, index: i16) -> NativeResult<bool>;
    fn get_float(&self, statement: &Self::Statement, index: i16) -> NativeResult<f32>;
    fn get_double(&self, statement: &Self::Statement, index: i16) -> NativeResult<f64>;
    fn get_string(
        &self,
        statement: &Self::Statement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize>;
    fn get_binary(
        &self,
        statement: &Self::Statement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize>;
    /// Open a LOB for reading. The size is in bytes for binary LOBs and in
    /// characters for character LOBs.
    fn get_lob(&self, statement: &Self::Statement, index: i16)
    -> NativeResult<(u64, Self::Lob)>;
    /// Read the next chunk of a binary LOB; returns bytes written, 0 at end.
    fn get_blob_data(&self, lob: &mut Self::Lob, buf: &mut [u8]) -> NativeResult<usize>;
    /// Read the next chunk of a character LOB as UTF-8. Only whole characters
    /// are written; returns bytes written, 0 at end.
    fn get_nclob_data(&self, lob: &mut Self::Lob, buf: &mut [u8]) -> NativeResult<usize>;

    // Setters
    fn set_null(&self, statement: &Self::Statement, index: i16) -> NativeResult<()>;
    fn set_int32(&self, statement: &Self::Statement, index: i16, value: i32) -> NativeResult<()>;
    fn set_int64(&self, statement: &Self::Statement, index: i16, value: i64) -> NativeResult<()>;
    fn set_boolean(&self, statement: &Self::Statement, index: i16, value: bool)
    -> NativeResult<()>;
    fn set_float(&self, statement: &Self::Statement, index: i16, value: f32) -> NativeResult<()>;
    fn set_double(&self, statement: &Self::Statement, index: i16, value: f64)
    -> NativeResult<()>;
    fn set_string(&self, statement: &Self::Statement, index: i16, value: &str)
    -> NativeResult<()>;
    fn set_binary(&self, statement: &Self::Statement, index: i16, value: &[u8])
    -> NativeResult<()>;
    /// Open a LOB for writing. `size` is bytes for binary LOBs and characters
    /// for character LOBs.
    fn set_lob(&self, statement: &Self::Statement, index: i16, size: u64)
    -> NativeResult<Self::Lob>;
    fn set_blob_data(&self, lob: &mut Self::Lob, data: &[u8]) -> NativeResult<()>;
    /// Write the next chunk of a character LOB. The chunk must hold whole
    /// UTF-8 characters.
    fn set_nclob_data(&self, lob: &mut Self::Lob, data: &str) -> NativeResult<()>;

    // Diagnostics
    /// Two-phase lookup of the last error on a handle: returns the native
    /// error code and the message length (sizing call) or bytes written (fetch).
    fn get_error(
        &self,
        handle: NativeHandle<'_, Self>,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<(i32, usize)>;
}

/// Run a two-phase variable-length call and return an exact-size buffer.
///
/// The first call passes no buffer and learns the length; the second fills a
/// buffer of `length + 1` bytes, room for a terminator the client may write.
pub fn read_sized<F>(mut call: F) -> NativeResult<Vec<u8>>
where
    F: FnMut(Option<&mut [u8]>) -> NativeResult<usize>,
{
    let len = call(None)?;
    let mut buf = vec![0u8; len + 1];
    let written = call(Some(&mut buf))?;
    buf.truncate(written.min(len));
    Ok(buf)
}

/// [`read_sized`] for text; invalid UTF-8 is replaced rather than rejected.
pub fn read_sized_string<F>(call: F) -> NativeResult<String>
where
    F: FnMut(Option<&mut [u8]>) -> NativeResult<usize>,
{
    let bytes = read_sized(call)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(data: &'static [u8]) -> impl FnMut(Option<&mut [u8]>) -> NativeResult<usize> {
        move |buf| match buf {
            None => Ok(data.len()),
            Some(buf) => {
                assert!(buf.len() > data.len(), "buffer must leave room for a terminator");
                buf[..data.len()].copy_from_slice(data);
                buf[data.len()] = 0;
                Ok(data.len())
            }
        }
    }

    #[test]
    fn test_read_sized_exact() {
        let out = read_sized(source(b"hello")).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_read_sized_empty() {
        assert!(read_sized(source(b"")).unwrap().is_empty());
    }

    #[test]
    fn test_read_sized_propagates_sizing_error() {
        let err = read_sized(|_| Err(-24101)).unwrap_err();
        assert_eq!(err, -24101);
    }

    #[test]
    fn test_read_sized_string_lossy() {
        let s = read_sized_string(source(b"caf\xc3\xa9")).unwrap();
        assert_eq!(s, "café");
        let s = read_sized_string(source(b"ab\xff")).unwrap();
        assert_eq!(s, "ab\u{fffd}");
    }
}
