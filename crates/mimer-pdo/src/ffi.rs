//! Bindings to libmimerapi and the [`NativeClient`] built on them.
//!
//! Only the entry points the driver calls are declared. All strings cross
//! the boundary as UTF-8 through the `8`-suffixed variants.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use crate::native::{self, NativeClient, NativeHandle, NativeResult, TransactionEnd};
use mimer_pdo_core::{CursorKind, FetchOrientation, ParamMode, TransactionMode};
use std::ffi::{CStr, CString, c_char, c_double, c_float, c_int, c_void};
use std::ptr;

#[repr(C)]
pub struct MimerSessionStruct {
    _private: [u8; 0],
}

#[repr(C)]
pub struct MimerStatementStruct {
    _private: [u8; 0],
}

#[repr(C)]
pub struct MimerLobStruct {
    _private: [u8; 0],
}

pub type MimerSession = *mut MimerSessionStruct;
pub type MimerStatement = *mut MimerStatementStruct;
pub type MimerLob = *mut MimerLobStruct;
/// Any of the handle types, for calls that accept each.
pub type MimerHandle = *mut c_void;

pub const MIMER_COMMIT: c_int = 0;
pub const MIMER_ROLLBACK: c_int = 1;

pub const MIMER_FORWARD_ONLY: c_int = 0;
pub const MIMER_SCROLLABLE: c_int = 1;

pub const MIMER_TRANS_READWRITE: c_int = 0;
pub const MIMER_TRANS_READONLY: c_int = 1;

// MimerFetchScroll operations
pub const MIMER_NEXT: c_int = 0;
pub const MIMER_PREVIOUS: c_int = 1;
pub const MIMER_FIRST: c_int = 2;
pub const MIMER_LAST: c_int = 3;
pub const MIMER_ABSOLUTE: c_int = 4;
pub const MIMER_RELATIVE: c_int = 5;

// MimerParameterMode results
pub const MIMER_PARAM_INPUT: c_int = 1;
pub const MIMER_PARAM_OUTPUT: c_int = 2;
pub const MIMER_PARAM_INPUT_OUTPUT: c_int = 3;

#[link(name = "mimerapi")]
unsafe extern "C" {
    // Sessions
    pub fn MimerBeginSession8(
        database: *const c_char,
        ident: *const c_char,
        password: *const c_char,
        session: *mut MimerSession,
    ) -> c_int;
    pub fn MimerEndSession(session: *mut MimerSession) -> c_int;
    pub fn MimerPing(session: MimerSession) -> c_int;
    pub fn MimerBeginTransaction(session: MimerSession, option: c_int) -> c_int;
    pub fn MimerEndTransaction(session: MimerSession, commit_rollback: c_int) -> c_int;

    // Statements and cursors
    pub fn MimerBeginStatement8(
        session: MimerSession,
        sql: *const c_char,
        options: c_int,
        statement: *mut MimerStatement,
    ) -> c_int;
    pub fn MimerEndStatement(statement: *mut MimerStatement) -> c_int;
    pub fn MimerExecute(statement: MimerStatement) -> c_int;
    pub fn MimerOpenCursor(statement: MimerStatement) -> c_int;
    pub fn MimerFetch(statement: MimerStatement) -> c_int;
    pub fn MimerFetchScroll(statement: MimerStatement, operation: c_int, value: c_int) -> c_int;
    pub fn MimerCloseCursor(statement: MimerStatement) -> c_int;

    // Metadata
    pub fn MimerColumnCount(statement: MimerStatement) -> c_int;
    pub fn MimerColumnType(statement: MimerStatement, column: i16) -> c_int;
    pub fn MimerColumnName8(
        statement: MimerStatement,
        column: i16,
        value: *mut c_char,
        maxlen: usize,
    ) -> c_int;
    pub fn MimerParameterCount(statement: MimerStatement) -> c_int;
    pub fn MimerParameterType(statement: MimerStatement, parameter: i16) -> c_int;
    pub fn MimerParameterMode(statement: MimerStatement, parameter: i16) -> c_int;

    // Getters
    pub fn MimerIsNull(statement: MimerStatement, index: i16) -> c_int;
    pub fn MimerGetInt32(statement: MimerStatement, index: i16, value: *mut i32) -> c_int;
    pub fn MimerGetInt64(statement: MimerStatement, index: i16, value: *mut i64) -> c_int;
    pub fn MimerGetBoolean(statement: MimerStatement, index: i16) -> c_int;
    pub fn MimerGetFloat(statement: MimerStatement, index: i16, value: *mut c_float) -> c_int;
    pub fn MimerGetDouble(statement: MimerStatement, index: i16, value: *mut c_double) -> c_int;
    pub fn MimerGetString8(
        statement: MimerStatement,
        index: i16,
        value: *mut c_char,
        maxlen: usize,
    ) -> c_int;
    pub fn MimerGetBinary(
        statement: MimerStatement,
        index: i16,
        value: *mut c_void,
        maxlen: usize,
    ) -> c_int;
    pub fn MimerGetLob(
        statement: MimerStatement,
        index: i16,
        length: *mut usize,
        lob: *mut MimerLob,
    ) -> c_int;
    pub fn MimerGetBlobData(lob: *mut MimerLob, data: *mut c_void, length: usize) -> c_int;
    pub fn MimerGetNclobData8(lob: *mut MimerLob, data: *mut c_char, length: usize) -> c_int;

    // Setters
    pub fn MimerSetNull(statement: MimerStatement, index: i16) -> c_int;
    pub fn MimerSetInt32(statement: MimerStatement, index: i16, value: i32) -> c_int;
    pub fn MimerSetInt64(statement: MimerStatement, index: i16, value: i64) -> c_int;
    pub fn MimerSetBoolean(statement: MimerStatement, index: i16, value: c_int) -> c_int;
    pub fn MimerSetFloat(statement: MimerStatement, index: i16, value: c_float) -> c_int;
    pub fn MimerSetDouble(statement: MimerStatement, index: i16, value: c_double) -> c_int;
    pub fn MimerSetString8(statement: MimerStatement, index: i16, value: *const c_char) -> c_int;
    pub fn MimerSetBinary(
        statement: MimerStatement,
        index: i16,
        value: *const c_void,
        length: usize,
    ) -> c_int;
    pub fn MimerSetLob(
        statement: MimerStatement,
        index: i16,
        length: usize,
        lob: *mut MimerLob,
    ) -> c_int;
    pub fn MimerSetBlobData(lob: *mut MimerLob, data: *const c_void, length: usize) -> c_int;
    pub fn MimerSetNclobData8(lob: *mut MimerLob, data: *const c_char, length: usize) -> c_int;

    // Diagnostics
    pub fn MimerGetError8(
        handle: MimerHandle,
        code: *mut i32,
        buffer: *mut c_char,
        size: usize,
    ) -> c_int;
    pub fn MimerAPIVersion() -> *const c_char;
}

/// Negative return codes are errors; everything else is a result.
fn check(rc: c_int) -> NativeResult<c_int> {
    if rc < 0 { Err(rc) } else { Ok(rc) }
}

fn to_len(rc: c_int) -> NativeResult<usize> {
    usize::try_from(check(rc)?).map_err(|_| native::VALUE_OUT_OF_RANGE)
}

fn c_string(s: &str) -> NativeResult<CString> {
    CString::new(s).map_err(|_| native::INVALID_CHARACTER_VALUE)
}

fn buffer_parts<T>(buf: Option<&mut [u8]>) -> (*mut T, usize) {
    match buf {
        Some(buf) => (buf.as_mut_ptr().cast(), buf.len()),
        None => (ptr::null_mut(), 0),
    }
}

/// Session handle owned by [`MimerApi`].
#[derive(Debug)]
pub struct RawSession(MimerSession);

/// Statement handle owned by [`MimerApi`].
#[derive(Debug)]
pub struct RawStatement(MimerStatement);

/// LOB handle; tracks how much of the LOB is left to read.
#[derive(Debug)]
pub struct RawLob {
    handle: MimerLob,
    /// Bytes (binary) or characters (character) not yet read
    remaining: u64,
}

/// [`NativeClient`] backed by the Mimer SQL C API.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimerApi;

impl MimerApi {
    pub fn new() -> Self {
        Self
    }
}

impl NativeClient for MimerApi {
    type Session = RawSession;
    type Statement = RawStatement;
    type Lob = RawLob;

    fn begin_session(
        &self,
        database: Option<&str>,
        user: &str,
        password: &str,
    ) -> NativeResult<RawSession> {
        let database = database.map(c_string).transpose()?;
        let user = c_string(user)?;
        let password = c_string(password)?;
        let mut session: MimerSession = ptr::null_mut();
        // SAFETY: the strings outlive the call; a null database selects the default
        let rc = unsafe {
            MimerBeginSession8(
                database.as_ref().map_or(ptr::null(), |d| d.as_ptr()),
                user.as_ptr(),
                password.as_ptr(),
                &mut session,
            )
        };
        check(rc)?;
        Ok(RawSession(session))
    }

    fn end_session(&self, mut session: RawSession) -> NativeResult<()> {
        // SAFETY: the handle came from MimerBeginSession8 and is consumed here
        check(unsafe { MimerEndSession(&mut session.0) }).map(drop)
    }

    fn ping(&self, session: &RawSession) -> NativeResult<()> {
        // SAFETY: session is live
        check(unsafe { MimerPing(session.0) }).map(drop)
    }

    fn begin_transaction(&self, session: &RawSession, mode: TransactionMode) -> NativeResult<()> {
        let option = match mode {
            TransactionMode::ReadWrite => MIMER_TRANS_READWRITE,
            TransactionMode::ReadOnly => MIMER_TRANS_READONLY,
        };
        // SAFETY: session is live
        check(unsafe { MimerBeginTransaction(session.0, option) }).map(drop)
    }

    fn end_transaction(&self, session: &RawSession, end: TransactionEnd) -> NativeResult<()> {
        let op = match end {
            TransactionEnd::Commit => MIMER_COMMIT,
            TransactionEnd::Rollback => MIMER_ROLLBACK,
        };
        // SAFETY: session is live
        check(unsafe { MimerEndTransaction(session.0, op) }).map(drop)
    }

    fn api_version(&self) -> String {
        // SAFETY: MimerAPIVersion returns a static string
        unsafe {
            let ptr = MimerAPIVersion();
            if ptr.is_null() {
                return "unknown".to_string();
            }
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    }

    fn begin_statement(
        &self,
        session: &RawSession,
        sql: &str,
        cursor: CursorKind,
    ) -> NativeResult<RawStatement> {
        let sql = c_string(sql)?;
        let options = match cursor {
            CursorKind::ForwardOnly => MIMER_FORWARD_ONLY,
            CursorKind::Scrollable => MIMER_SCROLLABLE,
        };
        let mut statement: MimerStatement = ptr::null_mut();
        // SAFETY: session is live and sql outlives the call
        check(unsafe { MimerBeginStatement8(session.0, sql.as_ptr(), options, &mut statement) })?;
        Ok(RawStatement(statement))
    }

    fn end_statement(&self, mut statement: RawStatement) -> NativeResult<()> {
        // SAFETY: the handle came from MimerBeginStatement8 and is consumed here
        check(unsafe { MimerEndStatement(&mut statement.0) }).map(drop)
    }

    /// The C API has no direct query; a statement has a result set when it
    /// describes columns.
    fn statement_has_result_set(&self, statement: &RawStatement) -> NativeResult<bool> {
        Ok(self.column_count(statement)? > 0)
    }

    fn execute(&self, statement: &RawStatement) -> NativeResult<u64> {
        // SAFETY: statement is live
        let rc = check(unsafe { MimerExecute(statement.0) })?;
        Ok(u64::from(rc.unsigned_abs()))
    }

    fn open_cursor(&self, statement: &RawStatement) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerOpenCursor(statement.0) }).map(drop)
    }

    fn fetch(&self, statement: &RawStatement) -> NativeResult<i32> {
        // SAFETY: statement is live
        check(unsafe { MimerFetch(statement.0) })
    }

    fn fetch_scroll(
        &self,
        statement: &RawStatement,
        orientation: FetchOrientation,
        offset: i64,
    ) -> NativeResult<i32> {
        let operation = match orientation {
            FetchOrientation::Next => MIMER_NEXT,
            FetchOrientation::Prior => MIMER_PREVIOUS,
            FetchOrientation::First => MIMER_FIRST,
            FetchOrientation::Last => MIMER_LAST,
            FetchOrientation::Absolute => MIMER_ABSOLUTE,
            FetchOrientation::Relative => MIMER_RELATIVE,
        };
        let value = c_int::try_from(offset).map_err(|_| native::VALUE_OUT_OF_RANGE)?;
        // SAFETY: statement is live
        check(unsafe { MimerFetchScroll(statement.0, operation, value) })
    }

    fn close_cursor(&self, statement: &RawStatement) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerCloseCursor(statement.0) }).map(drop)
    }

    fn column_count(&self, statement: &RawStatement) -> NativeResult<usize> {
        // SAFETY: statement is live
        to_len(unsafe { MimerColumnCount(statement.0) })
    }

    fn column_type(&self, statement: &RawStatement, index: i16) -> NativeResult<i32> {
        // SAFETY: statement is live
        check(unsafe { MimerColumnType(statement.0, index) })
    }

    fn column_name(
        &self,
        statement: &RawStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (ptr, len) = buffer_parts(buf);
        // SAFETY: ptr is null with len 0, or points at len writable bytes
        to_len(unsafe { MimerColumnName8(statement.0, index, ptr, len) })
    }

    fn parameter_count(&self, statement: &RawStatement) -> NativeResult<usize> {
        // SAFETY: statement is live
        to_len(unsafe { MimerParameterCount(statement.0) })
    }

    fn parameter_type(&self, statement: &RawStatement, index: i16) -> NativeResult<i32> {
        // SAFETY: statement is live
        check(unsafe { MimerParameterType(statement.0, index) })
    }

    fn parameter_mode(&self, statement: &RawStatement, index: i16) -> NativeResult<ParamMode> {
        // SAFETY: statement is live
        match check(unsafe { MimerParameterMode(statement.0, index) })? {
            MIMER_PARAM_OUTPUT => Ok(ParamMode::Output),
            MIMER_PARAM_INPUT_OUTPUT => Ok(ParamMode::InOut),
            _ => Ok(ParamMode::Input),
        }
    }

    fn is_null(&self, statement: &RawStatement, index: i16) -> NativeResult<bool> {
        // SAFETY: statement is live
        check(unsafe { MimerIsNull(statement.0, index) }).map(|rc| rc > 0)
    }

    fn get_int32(&self, statement: &RawStatement, index: i16) -> NativeResult<i32> {
        let mut value = 0i32;
        // SAFETY: statement is live and value is a valid out pointer
        check(unsafe { MimerGetInt32(statement.0, index, &mut value) })?;
        Ok(value)
    }

    fn get_int64(&self, statement: &RawStatement, index: i16) -> NativeResult<i64> {
        let mut value = 0i64;
        // SAFETY: statement is live and value is a valid out pointer
        check(unsafe { MimerGetInt64(statement.0, index, &mut value) })?;
        Ok(value)
    }

    fn get_boolean(&self, statement: &RawStatement, index: i16) -> NativeResult<bool> {
        // SAFETY: statement is live
        check(unsafe { MimerGetBoolean(statement.0, index) }).map(|rc| rc > 0)
    }

    fn get_float(&self, statement: &RawStatement, index: i16) -> NativeResult<f32> {
        let mut value: c_float = 0.0;
        // SAFETY: statement is live and value is a valid out pointer
        check(unsafe { MimerGetFloat(statement.0, index, &mut value) })?;
        Ok(value)
    }

    fn get_double(&self, statement: &RawStatement, index: i16) -> NativeResult<f64> {
        let mut value: c_double = 0.0;
        // SAFETY: statement is live and value is a valid out pointer
        check(unsafe { MimerGetDouble(statement.0, index, &mut value) })?;
        Ok(value)
    }

    fn get_string(
        &self,
        statement: &RawStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (ptr, len) = buffer_parts(buf);
        // SAFETY: ptr is null with len 0, or points at len writable bytes
        to_len(unsafe { MimerGetString8(statement.0, index, ptr, len) })
    }

    fn get_binary(
        &self,
        statement: &RawStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (ptr, len) = buffer_parts(buf);
        // SAFETY: ptr is null with len 0, or points at len writable bytes
        to_len(unsafe { MimerGetBinary(statement.0, index, ptr, len) })
    }

    fn get_lob(&self, statement: &RawStatement, index: i16) -> NativeResult<(u64, RawLob)> {
        let mut length = 0usize;
        let mut handle: MimerLob = ptr::null_mut();
        // SAFETY: statement is live and both out pointers are valid
        check(unsafe { MimerGetLob(statement.0, index, &mut length, &mut handle) })?;
        let size = length as u64;
        Ok((
            size,
            RawLob {
                handle,
                remaining: size,
            },
        ))
    }

    fn get_blob_data(&self, lob: &mut RawLob, buf: &mut [u8]) -> NativeResult<usize> {
        let n = usize::try_from(lob.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if n == 0 {
            return Ok(0);
        }
        // SAFETY: lob is open for reading and buf holds at least n bytes
        check(unsafe { MimerGetBlobData(&mut lob.handle, buf.as_mut_ptr().cast(), n) })?;
        lob.remaining -= n as u64;
        Ok(n)
    }

    fn get_nclob_data(&self, lob: &mut RawLob, buf: &mut [u8]) -> NativeResult<usize> {
        if lob.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        buf.fill(0);
        // SAFETY: lob is open for reading and buf holds buf.len() bytes
        check(unsafe {
            MimerGetNclobData8(&mut lob.handle, buf.as_mut_ptr().cast(), buf.len())
        })?;
        // The chunk is NUL terminated when it does not fill the buffer
        let n = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let characters = buf[..n].iter().filter(|&&b| b & 0xC0 != 0x80).count();
        lob.remaining = lob.remaining.saturating_sub(characters as u64);
        Ok(n)
    }

    fn set_null(&self, statement: &RawStatement, index: i16) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetNull(statement.0, index) }).map(drop)
    }

    fn set_int32(&self, statement: &RawStatement, index: i16, value: i32) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetInt32(statement.0, index, value) }).map(drop)
    }

    fn set_int64(&self, statement: &RawStatement, index: i16, value: i64) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetInt64(statement.0, index, value) }).map(drop)
    }

    fn set_boolean(&self, statement: &RawStatement, index: i16, value: bool) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetBoolean(statement.0, index, c_int::from(value)) }).map(drop)
    }

    fn set_float(&self, statement: &RawStatement, index: i16, value: f32) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetFloat(statement.0, index, value) }).map(drop)
    }

    fn set_double(&self, statement: &RawStatement, index: i16, value: f64) -> NativeResult<()> {
        // SAFETY: statement is live
        check(unsafe { MimerSetDouble(statement.0, index, value) }).map(drop)
    }

    fn set_string(&self, statement: &RawStatement, index: i16, value: &str) -> NativeResult<()> {
        let value = c_string(value)?;
        // SAFETY: statement is live and value outlives the call
        check(unsafe { MimerSetString8(statement.0, index, value.as_ptr()) }).map(drop)
    }

    fn set_binary(&self, statement: &RawStatement, index: i16, value: &[u8]) -> NativeResult<()> {
        // SAFETY: statement is live and value points at value.len() bytes
        check(unsafe { MimerSetBinary(statement.0, index, value.as_ptr().cast(), value.len()) })
            .map(drop)
    }

    fn set_lob(&self, statement: &RawStatement, index: i16, size: u64) -> NativeResult<RawLob> {
        let length = usize::try_from(size).map_err(|_| native::VALUE_OUT_OF_RANGE)?;
        let mut handle: MimerLob = ptr::null_mut();
        // SAFETY: statement is live and handle is a valid out pointer
        check(unsafe { MimerSetLob(statement.0, index, length, &mut handle) })?;
        Ok(RawLob { handle, remaining: 0 })
    }

    fn set_blob_data(&self, lob: &mut RawLob, data: &[u8]) -> NativeResult<()> {
        // SAFETY: lob is open for writing and data points at data.len() bytes
        check(unsafe { MimerSetBlobData(&mut lob.handle, data.as_ptr().cast(), data.len()) })
            .map(drop)
    }

    fn set_nclob_data(&self, lob: &mut RawLob, data: &str) -> NativeResult<()> {
        // SAFETY: lob is open for writing and data points at data.len() bytes
        check(unsafe { MimerSetNclobData8(&mut lob.handle, data.as_ptr().cast(), data.len()) })
            .map(drop)
    }

    fn get_error(
        &self,
        handle: NativeHandle<'_, Self>,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<(i32, usize)> {
        let raw: MimerHandle = match handle {
            NativeHandle::Session(s) => s.0.cast(),
            NativeHandle::Statement(s) => s.0.cast(),
        };
        let mut code = 0i32;
        let (ptr, len) = buffer_parts(buf);
        // SAFETY: raw is a live handle; ptr is null with len 0, or points at len writable bytes
        let rc = unsafe { MimerGetError8(raw, &mut code, ptr, len) };
        Ok((code, to_len(rc)?))
    }
}
