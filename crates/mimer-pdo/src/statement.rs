//! Prepared statements and their cursor.
//!
//! A [`Statement`] moves through
//!
//! ```text
//! Prepared -> Done                        (no result set)
//! Prepared -> CursorOpen <-> CursorClosed (result set)
//! any      -> Finalized
//! ```
//!
//! Binding or re-executing with an open cursor closes it first.

use crate::binder;
use crate::decoder;
use crate::diagnostics::{self, ErrorSlot, StatementScope};
use crate::lob::LobReader;
use crate::native::{self, NativeClient, read_sized_string};
use crate::session::Session;
use crate::types;
use mimer_pdo_core::{
    ColumnData, ColumnDescription, ColumnInfo, ColumnRequest, ConnectionErrorKind,
    ConversionErrorKind, CursorKind, Error, ErrorDescriptor, ErrorInfo, ExecuteOutcome,
    FetchOrientation, ParamMode, ParamValue, ResourceErrorKind, Result, Row, SequenceErrorKind,
    SqlType, StatementHandle, Value,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle state of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    /// Prepared, not yet executed
    Prepared,
    /// Executed without a result set
    Done,
    CursorOpen,
    CursorClosed,
    Finalized,
}

/// A parameter as bound by the caller, with its resolved native type.
struct BoundParam {
    value: ParamValue,
    sql_type: SqlType,
    mode: ParamMode,
}

/// A prepared statement borrowing its [`Session`].
pub struct Statement<'s, C: NativeClient> {
    session: &'s Session<C>,
    handle: Option<C::Statement>,
    sql: String,
    cursor_kind: CursorKind,
    has_result_set: bool,
    state: StatementState,
    column_count: usize,
    rows_affected: u64,
    /// Keyed by 1-based native position
    params: BTreeMap<i16, BoundParam>,
    columns: RefCell<Vec<Option<ColumnDescription>>>,
    /// Column names shared by every row of the open cursor
    row_columns: RefCell<Option<Arc<ColumnInfo>>>,
    errors: ErrorSlot,
}

fn scope_of<'a, C: NativeClient>(
    session: &'a Session<C>,
    handle: Option<&'a C::Statement>,
    sql: &'a str,
) -> Result<StatementScope<'a, C>> {
    let handle = handle.ok_or_else(|| {
        Error::sequence(
            SequenceErrorKind::StatementFinalized,
            "statement has been finalized",
        )
    })?;
    Ok(StatementScope {
        client: session.client(),
        handle,
        sql,
    })
}

/// Map a native fetch status to "row present".
///
/// Anything other than success or no-data is handed back as an error code.
fn fetch_outcome(status: i32) -> std::result::Result<bool, i32> {
    match status {
        native::SUCCESS => Ok(true),
        native::NO_DATA => Ok(false),
        other => Err(other),
    }
}

fn unsupported_type(code: i32) -> Error {
    Error::conversion(
        ConversionErrorKind::UnsupportedType,
        "a known Mimer SQL type",
        format!("native type {}", code),
    )
}

impl<'s, C: NativeClient> Statement<'s, C> {
    /// Prepare `sql` on `session`.
    ///
    /// Whether the statement yields a result set is asked of the native
    /// layer once, here.
    #[tracing::instrument(level = "debug", skip(session))]
    pub(crate) fn prepare(
        session: &'s Session<C>,
        sql: &str,
        cursor_kind: CursorKind,
    ) -> Result<Self> {
        let handle = session
            .with_native(|client, handle| client.begin_statement(handle, sql, cursor_kind))
            .map_err(|e| match e {
                Error::Database(mut d) => {
                    d.sql = Some(sql.to_string());
                    Error::Database(d)
                }
                other => other,
            })?;

        let mut statement = Self {
            session,
            handle: Some(handle),
            sql: sql.to_string(),
            cursor_kind,
            has_result_set: false,
            state: StatementState::Prepared,
            column_count: 0,
            rows_affected: 0,
            params: BTreeMap::new(),
            columns: RefCell::new(Vec::new()),
            row_columns: RefCell::new(None),
            errors: ErrorSlot::default(),
        };

        let scope = scope_of(session, statement.handle.as_ref(), &statement.sql)?;
        let has_result_set = scope.check(session.client().statement_has_result_set(scope.handle));
        statement.has_result_set = has_result_set?;

        tracing::debug!(
            has_result_set = statement.has_result_set,
            cursor = ?cursor_kind,
            "statement prepared"
        );
        Ok(statement)
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn state(&self) -> StatementState {
        self.state
    }

    /// Does executing this statement open a cursor?
    pub fn has_result_set(&self) -> bool {
        self.has_result_set
    }

    pub fn is_scrollable(&self) -> bool {
        self.cursor_kind == CursorKind::Scrollable
    }

    /// Result columns published by the last execute.
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Rows affected by the last execute; 0 for result-set statements.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn last_error(&self) -> Option<ErrorDescriptor> {
        self.errors.get()
    }

    pub fn error_info(&self) -> Option<ErrorInfo> {
        self.errors.info()
    }

    fn capture<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.errors.record(e.descriptor());
        }
        result
    }

    fn chunk_size(&self) -> usize {
        self.session.lob_chunk_size()
    }

    /// Native statement handles die with their session.
    fn ensure_session_open(&self) -> Result<()> {
        if self.session.is_open() {
            Ok(())
        } else {
            Err(Error::closed())
        }
    }

    /// Bind a value to the 0-based parameter `index`.
    ///
    /// Immediate values and streams are converted and sent now; deferred
    /// cells are read during [`execute`](Self::execute). Output-only
    /// parameters are never written, only read back.
    pub fn bind(&mut self, index: usize, value: ParamValue) -> Result<()> {
        let result = self.bind_once(index, value);
        self.capture(result)
    }

    /// Bind an immediate value.
    pub fn bind_value(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.bind(index, ParamValue::Immediate(value.into()))
    }

    fn bind_once(&mut self, index: usize, mut value: ParamValue) -> Result<()> {
        let position = binder::native_position(index)?;
        self.ensure_session_open()?;
        self.close_cursor_once()?;

        let chunk_size = self.chunk_size();
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        let client = scope.client;

        let declared = scope.check(client.parameter_count(scope.handle))?;
        if index >= declared {
            let mut descriptor = diagnostics::describe_code(native::INVALID_INDEX);
            descriptor.message = format!(
                "parameter index {} is past the {} parameters of the statement",
                index, declared
            );
            return Err(Error::database(descriptor, Some(&self.sql)));
        }

        let code = scope.check(client.parameter_type(scope.handle, position))?;
        let (sql_type, _) = types::from_native(code).ok_or_else(|| unsupported_type(code))?;
        let mode = scope.check(client.parameter_mode(scope.handle, position))?;

        match &mut value {
            ParamValue::Immediate(v) if mode.is_input() => {
                binder::write_value(scope, position, sql_type, v)?;
            }
            ParamValue::Stream(_) if mode.is_output() => {
                return Err(Error::resource(
                    ResourceErrorKind::UnsupportedParameter,
                    format!("parameter {} is an output parameter and cannot take a stream", index),
                ));
            }
            ParamValue::Stream(stream) => {
                binder::write_stream(scope, position, sql_type, stream, chunk_size)?;
            }
            ParamValue::Immediate(_) | ParamValue::Deferred(_) => {}
        }

        tracing::trace!(index, ?mode, sql_type = sql_type.sql_name(), "parameter bound");
        self.params.insert(
            position,
            BoundParam {
                value,
                sql_type,
                mode,
            },
        );
        Ok(())
    }

    /// Execute the statement.
    ///
    /// Result-set statements open a cursor; others run to completion and
    /// read output parameters back into their deferred cells.
    pub fn execute(&mut self) -> Result<ExecuteOutcome> {
        let result = self.execute_once();
        self.capture(result)
    }

    fn execute_once(&mut self) -> Result<ExecuteOutcome> {
        self.ensure_session_open()?;
        self.close_cursor_once()?;

        let chunk_size = self.chunk_size();
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        let client = scope.client;

        for (&position, param) in &self.params {
            if let ParamValue::Deferred(cell) = &param.value {
                if param.mode.is_input() {
                    let value = cell.borrow().clone();
                    binder::write_value(scope, position, param.sql_type, &value)?;
                }
            }
        }

        if self.has_result_set {
            scope.check(client.open_cursor(scope.handle))?;
            let columns = scope.check(client.column_count(scope.handle))?;
            *self.columns.get_mut() = vec![None; columns];
            *self.row_columns.get_mut() = None;
            self.column_count = columns;
            self.rows_affected = 0;
            self.state = StatementState::CursorOpen;
            tracing::debug!(columns, "cursor opened");
            return Ok(ExecuteOutcome::ResultSet { columns });
        }

        let rows = scope.check(client.execute(scope.handle))?;
        self.column_count = 0;
        self.rows_affected = rows;
        self.state = StatementState::Done;

        for (&position, param) in &self.params {
            if !param.mode.is_output() {
                continue;
            }
            if let ParamValue::Deferred(cell) = &param.value {
                let value =
                    decoder::decode_value(scope, &self.errors, position, param.sql_type, chunk_size)?;
                tracing::trace!(position, "output parameter read back");
                *cell.borrow_mut() = value;
            }
        }

        tracing::debug!(rows, "statement executed");
        Ok(ExecuteOutcome::RowsAffected(rows))
    }

    /// Run the statement directly, without opening a cursor.
    pub(crate) fn execute_direct(&self) -> Result<u64> {
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        let result = scope.check(scope.client.execute(scope.handle));
        self.capture(result)
    }

    /// Move the cursor. Returns `Ok(false)` when no row is there.
    ///
    /// Forward-only cursors accept only [`FetchOrientation::Next`].
    pub fn fetch(&mut self, orientation: FetchOrientation, offset: i64) -> Result<bool> {
        let result = self.fetch_once(orientation, offset);
        self.capture(result)
    }

    fn fetch_once(&mut self, orientation: FetchOrientation, offset: i64) -> Result<bool> {
        if self.state != StatementState::CursorOpen {
            return Err(Error::sequence(
                SequenceErrorKind::NoOpenCursor,
                "fetch requires an open cursor",
            ));
        }
        self.ensure_session_open()?;
        if self.cursor_kind == CursorKind::ForwardOnly && orientation != FetchOrientation::Next {
            return Err(Error::sequence(
                SequenceErrorKind::FetchOrientation,
                format!("{:?} fetch on a forward-only cursor", orientation),
            ));
        }

        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        let status = if self.cursor_kind == CursorKind::ForwardOnly {
            scope.check(scope.client.fetch(scope.handle))?
        } else {
            scope.check(scope.client.fetch_scroll(scope.handle, orientation, offset))?
        };

        fetch_outcome(status).map_err(|code| {
            tracing::warn!(status = code, "unexpected fetch status");
            scope.fail(code)
        })
    }

    /// Describe the 0-based result column `index`.
    pub fn describe_column(&self, index: usize) -> Result<ColumnDescription> {
        let result = self.describe_once(index);
        self.capture(result)
    }

    fn describe_once(&self, index: usize) -> Result<ColumnDescription> {
        self.ensure_session_open()?;
        if let Some(Some(cached)) = self.columns.borrow().get(index) {
            return Ok(cached.clone());
        }

        let position = binder::native_position(index)?;
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        let client = scope.client;

        let code = scope.check(client.column_type(scope.handle, position))?;
        let (sql_type, nullability) =
            types::from_native(code).ok_or_else(|| unsupported_type(code))?;
        let name = scope.check(read_sized_string(|buf| {
            client.column_name(scope.handle, position, buf)
        }))?;

        let description = ColumnDescription {
            index,
            name,
            sql_type,
            nullability,
        };
        if let Some(slot) = self.columns.borrow_mut().get_mut(index) {
            *slot = Some(description.clone());
        }
        Ok(description)
    }

    /// Decode the 0-based column `index` of the current row.
    ///
    /// LOB columns requested as [`ColumnRequest::Stream`] come back as a
    /// [`LobReader`] borrowing this statement.
    pub fn get_column(
        &self,
        index: usize,
        request: ColumnRequest,
    ) -> Result<ColumnData<LobReader<'_, C>>> {
        let result = self.get_column_once(index, request);
        self.capture(result)
    }

    fn get_column_once(
        &self,
        index: usize,
        request: ColumnRequest,
    ) -> Result<ColumnData<LobReader<'_, C>>> {
        if self.state != StatementState::CursorOpen {
            return Err(Error::sequence(
                SequenceErrorKind::NoOpenCursor,
                "columns are only readable while a cursor is open",
            ));
        }
        self.ensure_session_open()?;
        let description = self.describe_once(index)?;
        let position = binder::native_position(index)?;
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        decoder::decode(
            scope,
            &self.errors,
            position,
            description.sql_type,
            request,
            self.chunk_size(),
        )
        .map_err(|e| e.with_target(description.name))
    }

    /// Decode every column of the current row.
    pub fn fetch_row(&self) -> Result<Row> {
        StatementHandle::fetch_row(self)
    }

    /// Column names of the open cursor, built once per cursor.
    pub fn column_info(&self) -> Result<Arc<ColumnInfo>> {
        if let Some(info) = self.row_columns.borrow().as_ref() {
            return Ok(Arc::clone(info));
        }
        let names = (0..self.column_count)
            .map(|index| self.describe_column(index).map(|d| d.name))
            .collect::<Result<Vec<_>>>()?;
        let info = Arc::new(ColumnInfo::new(names));
        *self.row_columns.borrow_mut() = Some(Arc::clone(&info));
        Ok(info)
    }

    /// Close the cursor. Closing a closed cursor does nothing.
    pub fn close_cursor(&mut self) -> Result<()> {
        let result = self.close_cursor_once();
        self.capture(result)
    }

    fn close_cursor_once(&mut self) -> Result<()> {
        if self.state != StatementState::CursorOpen {
            return Ok(());
        }
        self.ensure_session_open()?;
        let scope = scope_of(self.session, self.handle.as_ref(), &self.sql)?;
        match scope.client.close_cursor(scope.handle) {
            Ok(()) => {}
            Err(native::SEQUENCE_ERROR) => {
                tracing::warn!("cursor was already closed by the native client");
            }
            Err(code) => return Err(scope.fail(code)),
        }
        self.state = StatementState::CursorClosed;
        self.columns.get_mut().iter_mut().for_each(|c| *c = None);
        *self.row_columns.get_mut() = None;
        tracing::debug!("cursor closed");
        Ok(())
    }

    /// End the native statement.
    ///
    /// Local state is released first; a native failure is recorded on the
    /// session, logged and returned. After the session has closed there is
    /// no native statement left to end.
    pub fn finalize(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.state = StatementState::Finalized;
        self.params.clear();
        self.columns.get_mut().clear();
        *self.row_columns.get_mut() = None;
        self.column_count = 0;

        if !self.session.is_open() {
            tracing::debug!(sql = %self.sql, "session already closed; statement handle dropped");
            return Ok(());
        }
        match self.session.client().end_statement(handle) {
            Ok(()) => {
                tracing::debug!("statement finalized");
                Ok(())
            }
            Err(code) => {
                let descriptor = diagnostics::describe_code(code);
                tracing::warn!(code, sql = %self.sql, "native statement teardown failed");
                self.errors.record(descriptor.clone());
                self.session.record_error(descriptor.clone());
                Err(Error::connection(ConnectionErrorKind::Teardown, descriptor))
            }
        }
    }
}

impl<C: NativeClient> Drop for Statement<'_, C> {
    fn drop(&mut self) {
        // Failures are logged by release
        let _ = self.release();
    }
}

impl<C: NativeClient> std::fmt::Debug for Statement<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("state", &self.state)
            .field("cursor_kind", &self.cursor_kind)
            .field("has_result_set", &self.has_result_set)
            .field("column_count", &self.column_count)
            .field("rows_affected", &self.rows_affected)
            .finish_non_exhaustive()
    }
}

impl<C: NativeClient> StatementHandle for Statement<'_, C> {
    type Stream<'a>
        = LobReader<'a, C>
    where
        Self: 'a;

    fn bind_param(&mut self, index: usize, value: ParamValue) -> Result<()> {
        self.bind(index, value)
    }

    fn execute(&mut self) -> Result<ExecuteOutcome> {
        Statement::execute(self)
    }

    fn fetch(&mut self, orientation: FetchOrientation, offset: i64) -> Result<bool> {
        Statement::fetch(self, orientation, offset)
    }

    fn describe(&self, index: usize) -> Result<ColumnDescription> {
        self.describe_column(index)
    }

    fn get_column(
        &self,
        index: usize,
        request: ColumnRequest,
    ) -> Result<ColumnData<Self::Stream<'_>>> {
        Statement::get_column(self, index, request)
    }

    fn close_cursor(&mut self) -> Result<()> {
        Statement::close_cursor(self)
    }

    fn column_count(&self) -> usize {
        self.column_count
    }

    fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        self.errors.info()
    }

    fn column_info(&self) -> Result<Arc<ColumnInfo>> {
        Statement::column_info(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MimerConfig;
    use crate::memory::{MemoryEngine, StatementDef};

    fn engine() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.define(
            StatementDef::query("SELECT n FROM numbers")
                .column("N", SqlType::Integer)
                .rows(|_| Ok((1..=3).map(|n| vec![Value::Int(n)]).collect())),
        );
        engine.define(
            StatementDef::update("UPDATE t SET a = ?")
                .param(SqlType::Integer)
                .run(|_| Ok(1)),
        );
        engine
    }

    fn session(engine: &MemoryEngine) -> Session<MemoryEngine> {
        Session::connect(engine.clone(), &MimerConfig::new()).unwrap()
    }

    #[test]
    fn test_state_transitions() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
        assert_eq!(stmt.state(), StatementState::Prepared);
        assert!(stmt.has_result_set());

        let outcome = stmt.execute().unwrap();
        assert_eq!(outcome, ExecuteOutcome::ResultSet { columns: 1 });
        assert_eq!(stmt.state(), StatementState::CursorOpen);

        stmt.close_cursor().unwrap();
        assert_eq!(stmt.state(), StatementState::CursorClosed);
        stmt.close_cursor().unwrap();

        stmt.finalize().unwrap();
        assert_eq!(engine.stats().statements_ended, 1);
    }

    #[test]
    fn test_fetch_without_cursor() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
        let err = stmt.fetch(FetchOrientation::Next, 0).unwrap_err();
        assert_eq!(err.sqlstate().as_str(), "HY010");
        assert_eq!(stmt.error_info().unwrap().sqlstate.as_str(), "HY010");
    }

    #[test]
    fn test_forward_only_rejects_scrolling() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session
            .prepare("SELECT n FROM numbers", Some(CursorKind::ForwardOnly))
            .unwrap();
        stmt.execute().unwrap();
        let err = stmt.fetch(FetchOrientation::Last, 0).unwrap_err();
        assert_eq!(err.sqlstate().as_str(), "HY106");
        assert!(stmt.fetch(FetchOrientation::Next, 0).unwrap());
    }

    #[test]
    fn test_scrollable_cursor() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session
            .prepare("SELECT n FROM numbers", Some(CursorKind::Scrollable))
            .unwrap();
        assert!(stmt.is_scrollable());
        stmt.execute().unwrap();

        let current = |stmt: &Statement<'_, MemoryEngine>| {
            stmt.get_column(0, ColumnRequest::Value).unwrap().into_value().unwrap()
        };

        assert!(stmt.fetch(FetchOrientation::Last, 0).unwrap());
        assert_eq!(current(&stmt), Value::Int(3));
        assert!(stmt.fetch(FetchOrientation::Prior, 0).unwrap());
        assert_eq!(current(&stmt), Value::Int(2));
        assert!(stmt.fetch(FetchOrientation::Absolute, 1).unwrap());
        assert_eq!(current(&stmt), Value::Int(1));
        assert!(stmt.fetch(FetchOrientation::Relative, 2).unwrap());
        assert_eq!(current(&stmt), Value::Int(3));
        assert!(!stmt.fetch(FetchOrientation::Next, 0).unwrap());
        assert!(stmt.fetch(FetchOrientation::Absolute, -3).unwrap());
        assert_eq!(current(&stmt), Value::Int(1));
        assert!(stmt.fetch(FetchOrientation::First, 0).unwrap());
        assert_eq!(current(&stmt), Value::Int(1));
    }

    #[test]
    fn test_describe_column_cached() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
        stmt.execute().unwrap();
        let first = stmt.describe_column(0).unwrap();
        assert_eq!(first.name, "N");
        assert_eq!(first.sql_type, SqlType::Integer);
        assert_eq!(stmt.describe_column(0).unwrap(), first);
        assert!(stmt.describe_column(5).is_err());
    }

    #[test]
    fn test_update_reports_rows() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("UPDATE t SET a = ?", None).unwrap();
        assert!(!stmt.has_result_set());
        stmt.bind_value(0, 7).unwrap();
        assert_eq!(stmt.execute().unwrap(), ExecuteOutcome::RowsAffected(1));
        assert_eq!(stmt.rows_affected(), 1);
        assert_eq!(stmt.state(), StatementState::Done);
        assert_eq!(stmt.column_count(), 0);
    }

    #[test]
    fn test_unknown_statement() {
        let engine = engine();
        let session = session(&engine);
        let err = session.prepare("SELECT * FROM nowhere", None).unwrap_err();
        assert_eq!(err.code(), native::SYNTAX_ERROR);
        assert_eq!(err.sql(), Some("SELECT * FROM nowhere"));
        assert_eq!(session.error_info().unwrap().code, native::SYNTAX_ERROR);
    }

    #[test]
    fn test_drop_finalizes() {
        let engine = engine();
        let session = session(&engine);
        {
            let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
            stmt.execute().unwrap();
        }
        assert_eq!(engine.stats().statements_begun, 1);
        assert_eq!(engine.stats().statements_ended, 1);
    }

    #[test]
    fn test_rows_share_column_info() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
        stmt.execute().unwrap();

        assert!(stmt.fetch(FetchOrientation::Next, 0).unwrap());
        let first = stmt.fetch_row().unwrap();
        assert!(stmt.fetch(FetchOrientation::Next, 0).unwrap());
        let second = stmt.fetch_row().unwrap();
        assert_eq!(second.get_named::<i32>("N").unwrap(), 2);
        assert!(Arc::ptr_eq(&first.column_info(), &second.column_info()));

        // A new cursor gets fresh column info
        stmt.execute().unwrap();
        assert!(stmt.fetch(FetchOrientation::Next, 0).unwrap());
        let third = stmt.fetch_row().unwrap();
        assert!(!Arc::ptr_eq(&first.column_info(), &third.column_info()));
    }

    #[test]
    fn test_bind_past_declared_parameters() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("UPDATE t SET a = ?", None).unwrap();
        let err = stmt.bind_value(1, 7).unwrap_err();
        assert_eq!(err.code(), native::INVALID_INDEX);
        assert_eq!(err.sqlstate().as_str(), "07009");
        assert_eq!(err.sql(), Some("UPDATE t SET a = ?"));
        assert!(stmt.last_error().unwrap().message.contains("1 parameters"));
        stmt.bind_value(0, 7).unwrap();
    }

    #[test]
    fn test_fetch_outcome() {
        assert_eq!(fetch_outcome(native::SUCCESS), Ok(true));
        assert_eq!(fetch_outcome(native::NO_DATA), Ok(false));
        assert_eq!(fetch_outcome(native::CURSOR_NOT_OPEN), Err(native::CURSOR_NOT_OPEN));
        assert_eq!(fetch_outcome(7), Err(7));
    }

    #[test]
    fn test_closed_session_stops_native_calls() {
        let engine = engine();
        let session = session(&engine);
        let mut stmt = session.prepare("SELECT n FROM numbers", None).unwrap();
        stmt.execute().unwrap();
        session.close().unwrap();

        let closed = mimer_pdo_core::error::codes::SESSION_CLOSED;
        assert_eq!(stmt.fetch(FetchOrientation::Next, 0).unwrap_err().code(), closed);
        assert_eq!(stmt.describe_column(0).unwrap_err().code(), closed);
        assert_eq!(
            stmt.get_column(0, ColumnRequest::Value).unwrap_err().code(),
            closed
        );
        assert_eq!(stmt.close_cursor().unwrap_err().code(), closed);
        assert_eq!(stmt.bind_value(0, 1).unwrap_err().code(), closed);

        stmt.finalize().unwrap();
        assert_eq!(engine.stats().statements_ended, 0);
    }
}
