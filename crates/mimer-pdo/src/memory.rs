//! In-process engine emulation.
//!
//! [`MemoryEngine`] implements [`NativeClient`] without a server. SQL text is
//! matched (whitespace-normalized) against [`StatementDef`]s registered up
//! front; each definition declares its parameters, its result columns and a
//! behavior closure that produces rows (queries) or an affected-row count
//! (updates). Handles keep their own last error and answer the two-phase
//! error lookup like the native library does.
//!
//! ```rust,ignore
//! let engine = MemoryEngine::new();
//! engine.define(
//!     StatementDef::update("UPDATE accounts SET balance = ? WHERE id = ?")
//!         .param(SqlType::Decimal)
//!         .param(SqlType::Integer)
//!         .run(|_| Ok(1)),
//! );
//! ```

use crate::lob::complete_prefix_len;
use crate::native::{self, NativeClient, NativeHandle, NativeResult, TransactionEnd};
use crate::types;
use mimer_pdo_core::{
    CursorKind, FetchOrientation, Nullability, ParamMode, SqlType, TransactionMode, TypeFamily,
    Value,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Failure returned by a statement behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryError {
    pub code: i32,
    pub message: String,
}

impl MemoryError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn duplicate_key(message: impl Into<String>) -> Self {
        Self::new(native::DUPLICATE_KEY, message)
    }

    pub fn transaction_conflict(message: impl Into<String>) -> Self {
        Self::new(native::TRANSACTION_CONFLICT, message)
    }
}

type QueryFn = dyn Fn(&[Value]) -> Result<Vec<Vec<Value>>, MemoryError>;
type UpdateFn = dyn Fn(&mut [Value]) -> Result<u64, MemoryError>;

enum Behavior {
    Query(Box<QueryFn>),
    Update(Box<UpdateFn>),
}

struct ParamDef {
    sql_type: SqlType,
    mode: ParamMode,
}

struct ColumnDef {
    name: String,
    sql_type: SqlType,
    nullability: Nullability,
}

/// A statement the engine recognizes.
pub struct StatementDef {
    sql: String,
    params: Vec<ParamDef>,
    columns: Vec<ColumnDef>,
    behavior: Behavior,
}

impl StatementDef {
    /// A statement yielding a result set; returns no rows until [`rows`](Self::rows) is set.
    pub fn query(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            columns: Vec::new(),
            behavior: Behavior::Query(Box::new(|_| Ok(Vec::new()))),
        }
    }

    /// A statement without a result set; affects no rows until [`run`](Self::run) is set.
    pub fn update(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            columns: Vec::new(),
            behavior: Behavior::Update(Box::new(|_| Ok(0))),
        }
    }

    /// Declare the next input parameter.
    pub fn param(self, sql_type: SqlType) -> Self {
        self.param_with_mode(sql_type, ParamMode::Input)
    }

    pub fn param_with_mode(mut self, sql_type: SqlType, mode: ParamMode) -> Self {
        self.params.push(ParamDef { sql_type, mode });
        self
    }

    /// Declare the next (nullable) result column.
    pub fn column(self, name: impl Into<String>, sql_type: SqlType) -> Self {
        self.column_with_nullability(name, sql_type, Nullability::Nullable)
    }

    pub fn column_with_nullability(
        mut self,
        name: impl Into<String>,
        sql_type: SqlType,
        nullability: Nullability,
    ) -> Self {
        self.columns.push(ColumnDef {
            name: name.into(),
            sql_type,
            nullability,
        });
        self
    }

    /// Produce the result rows from the parameter values.
    pub fn rows(
        mut self,
        f: impl Fn(&[Value]) -> Result<Vec<Vec<Value>>, MemoryError> + 'static,
    ) -> Self {
        self.behavior = Behavior::Query(Box::new(f));
        self
    }

    /// Run the update. Output parameters are read back from the slice after
    /// the closure returns.
    pub fn run(mut self, f: impl Fn(&mut [Value]) -> Result<u64, MemoryError> + 'static) -> Self {
        self.behavior = Behavior::Update(Box::new(f));
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_query(&self) -> bool {
        matches!(self.behavior, Behavior::Query(_))
    }
}

impl std::fmt::Debug for StatementDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatementDef")
            .field("sql", &self.sql)
            .field("params", &self.params.len())
            .field("columns", &self.columns.len())
            .field("query", &self.is_query())
            .finish()
    }
}

/// Counters of native calls made against an engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub sessions_begun: u64,
    pub sessions_ended: u64,
    pub statements_begun: u64,
    pub statements_ended: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub executions: u64,
    pub cursors_opened: u64,
}

struct EngineState {
    definitions: HashMap<String, Rc<StatementDef>>,
    database: Option<String>,
    credentials: Option<(String, String)>,
    reachable: bool,
    stats: EngineStats,
    /// Chunk sizes of every LOB written, in order
    lob_writes: Vec<Vec<usize>>,
}

/// In-process [`NativeClient`]. Clones share the same engine.
#[derive(Clone)]
pub struct MemoryEngine {
    state: Rc<RefCell<EngineState>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryEngine")
            .field("definitions", &state.definitions.len())
            .field("database", &state.database)
            .field("reachable", &state.reachable)
            .field("stats", &state.stats)
            .finish_non_exhaustive()
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(EngineState {
                definitions: HashMap::new(),
                database: None,
                credentials: None,
                reachable: true,
                stats: EngineStats::default(),
                lob_writes: Vec::new(),
            })),
        }
    }

    /// Only accept sessions naming this database (or the default).
    pub fn with_database(self, name: impl Into<String>) -> Self {
        self.state.borrow_mut().database = Some(name.into());
        self
    }

    /// Require these credentials at session start.
    pub fn with_credentials(self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.state.borrow_mut().credentials = Some((user.into(), password.into()));
        self
    }

    /// Register a statement definition, replacing one with the same SQL.
    pub fn define(&self, def: StatementDef) {
        let key = normalize(&def.sql);
        self.state.borrow_mut().definitions.insert(key, Rc::new(def));
    }

    /// Simulate losing (or regaining) the server.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.borrow_mut().reachable = reachable;
    }

    pub fn stats(&self) -> EngineStats {
        self.state.borrow().stats.clone()
    }

    /// Chunk sizes of every LOB written so far.
    pub fn lob_writes(&self) -> Vec<Vec<usize>> {
        self.state.borrow().lob_writes.clone()
    }
}

type LastError = Rc<RefCell<Option<(i32, String)>>>;

fn fail<T>(slot: &LastError, code: i32, message: impl Into<String>) -> NativeResult<T> {
    *slot.borrow_mut() = Some((code, message.into()));
    Err(code)
}

/// Two-phase copy: `None` reports the length; a buffer must hold the value
/// and a terminator.
fn write_sized(slot: &LastError, bytes: &[u8], buf: Option<&mut [u8]>) -> NativeResult<usize> {
    match buf {
        None => Ok(bytes.len()),
        Some(buf) if buf.len() > bytes.len() => {
            buf[..bytes.len()].copy_from_slice(bytes);
            buf[bytes.len()] = 0;
            Ok(bytes.len())
        }
        Some(buf) => fail(
            slot,
            native::STRING_TRUNCATED,
            format!("buffer of {} bytes cannot hold {} bytes", buf.len(), bytes.len()),
        ),
    }
}

/// Native session handle of a [`MemoryEngine`].
pub struct MemorySession {
    last_error: LastError,
    transaction: Rc<Cell<Option<TransactionMode>>>,
}

struct Cursor {
    rows: Vec<Vec<Value>>,
    /// -1 before the first row, `rows.len()` after the last
    pos: isize,
}

impl Cursor {
    fn current(&self) -> Option<&Vec<Value>> {
        usize::try_from(self.pos).ok().and_then(|p| self.rows.get(p))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn move_to(&mut self, target: i64) -> i32 {
        let len = self.rows.len() as i64;
        self.pos = target.clamp(-1, len) as isize;
        if self.current().is_some() {
            native::SUCCESS
        } else {
            native::NO_DATA
        }
    }
}

/// Native statement handle of a [`MemoryEngine`].
pub struct MemoryStatement {
    def: Rc<StatementDef>,
    cursor_kind: CursorKind,
    params: Rc<RefCell<Vec<Option<Value>>>>,
    cursor: RefCell<Option<Cursor>>,
    last_error: LastError,
    transaction: Rc<Cell<Option<TransactionMode>>>,
}

struct LobTarget {
    params: Rc<RefCell<Vec<Option<Value>>>>,
    index: usize,
    declared: u64,
    written: u64,
    log: usize,
}

enum LobState {
    Read { data: Vec<u8>, offset: usize },
    WriteBinary { target: LobTarget, data: Vec<u8> },
    WriteText { target: LobTarget, data: String },
}

/// Native LOB handle of a [`MemoryEngine`].
pub struct MemoryLob {
    state: LobState,
    last_error: LastError,
}

impl MemoryStatement {
    fn param_def(&self, index: i16) -> NativeResult<(usize, &ParamDef)> {
        let slot = usize::try_from(index).ok().and_then(|i| i.checked_sub(1));
        match slot.and_then(|i| self.def.params.get(i).map(|d| (i, d))) {
            Some(found) => Ok(found),
            None => fail(
                &self.last_error,
                native::INVALID_INDEX,
                format!("parameter {} does not exist", index),
            ),
        }
    }

    fn column_def(&self, index: i16) -> NativeResult<(usize, &ColumnDef)> {
        let slot = usize::try_from(index).ok().and_then(|i| i.checked_sub(1));
        match slot.and_then(|i| self.def.columns.get(i).map(|d| (i, d))) {
            Some(found) => Ok(found),
            None => fail(
                &self.last_error,
                native::INVALID_INDEX,
                format!("column {} does not exist", index),
            ),
        }
    }

    /// The value a getter reads: the current row while a cursor is open,
    /// otherwise the parameter (output parameters after execute).
    fn value_at(&self, index: i16) -> NativeResult<(SqlType, Value)> {
        if let Some(cursor) = self.cursor.borrow().as_ref() {
            let (i, def) = self.column_def(index)?;
            let Some(row) = cursor.current() else {
                return fail(&self.last_error, native::SEQUENCE_ERROR, "no current row");
            };
            return Ok((def.sql_type, row.get(i).cloned().unwrap_or(Value::Null)));
        }
        let (i, def) = self.param_def(index)?;
        if !def.mode.is_output() {
            return fail(
                &self.last_error,
                native::SEQUENCE_ERROR,
                format!("parameter {} is not an output parameter", index),
            );
        }
        let value = self.params.borrow().get(i).cloned().flatten();
        Ok((def.sql_type, value.unwrap_or(Value::Null)))
    }

    /// Check a parameter can be written and return its slot and type.
    fn writable(&self, index: i16) -> NativeResult<(usize, SqlType)> {
        if self.cursor.borrow().is_some() {
            return fail(
                &self.last_error,
                native::SEQUENCE_ERROR,
                "parameters cannot be set while a cursor is open",
            );
        }
        let (i, def) = self.param_def(index)?;
        if !def.mode.is_input() {
            return fail(
                &self.last_error,
                native::INCOMPATIBLE_TYPE,
                format!("parameter {} is output only", index),
            );
        }
        Ok((i, def.sql_type))
    }

    fn store(&self, index: i16, value: Value) -> NativeResult<()> {
        let (i, sql_type) = self.writable(index)?;
        let value = match coerce(sql_type, value) {
            Ok(v) => v,
            Err((code, message)) => return fail(&self.last_error, code, message),
        };
        self.params.borrow_mut()[i] = Some(value);
        Ok(())
    }

    /// Parameter values for a run; every input parameter must be set.
    fn arguments(&self) -> NativeResult<Vec<Value>> {
        let params = self.params.borrow();
        let mut values = Vec::with_capacity(self.def.params.len());
        for (i, def) in self.def.params.iter().enumerate() {
            match params.get(i).cloned().flatten() {
                Some(v) => values.push(v),
                None if def.mode.is_input() => {
                    return fail(
                        &self.last_error,
                        native::PARAMETER_NOT_SET,
                        format!("parameter {} has no value", i + 1),
                    );
                }
                None => values.push(Value::Null),
            }
        }
        Ok(values)
    }

    fn incompatible<T>(&self, index: i16, getter: &str, sql_type: SqlType) -> NativeResult<T> {
        fail(
            &self.last_error,
            native::INCOMPATIBLE_TYPE,
            format!("{} cannot read {} at position {}", getter, sql_type.sql_name(), index),
        )
    }
}

/// Convert a value set through a native setter to the declared type.
fn coerce(sql_type: SqlType, value: Value) -> Result<Value, (i32, String)> {
    let incompatible = |value: &Value| {
        (
            native::INCOMPATIBLE_TYPE,
            format!("{} value not assignable to {}", value.type_name(), sql_type.sql_name()),
        )
    };
    let out_of_range = |v: &dyn std::fmt::Display| {
        (
            native::VALUE_OUT_OF_RANGE,
            format!("{} out of range for {}", v, sql_type.sql_name()),
        )
    };
    let parse_error = |s: &str| {
        (
            native::INVALID_CHARACTER_VALUE,
            format!("'{}' is not a valid {}", s, sql_type.sql_name()),
        )
    };

    if value.is_null() {
        return Ok(Value::Null);
    }

    match sql_type.family() {
        TypeFamily::Int32 | TypeFamily::Int64 => {
            let v = match &value {
                Value::Text(s) => s.trim().parse::<i64>().map_err(|_| parse_error(s))?,
                other => other.as_i64().ok_or_else(|| incompatible(other))?,
            };
            match sql_type {
                SqlType::SmallInt => i16::try_from(v)
                    .map(Value::SmallInt)
                    .map_err(|_| out_of_range(&v)),
                SqlType::Integer => i32::try_from(v).map(Value::Int).map_err(|_| out_of_range(&v)),
                _ => Ok(Value::BigInt(v)),
            }
        }
        TypeFamily::Boolean => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| incompatible(&value)),
        TypeFamily::Real | TypeFamily::Double => {
            let v = match &value {
                Value::Text(s) => s.trim().parse::<f64>().map_err(|_| parse_error(s))?,
                other => other.as_f64().ok_or_else(|| incompatible(other))?,
            };
            if sql_type == SqlType::Real {
                #[allow(clippy::cast_possible_truncation)]
                let narrowed = v as f32;
                if narrowed.is_infinite() && v.is_finite() {
                    return Err(out_of_range(&v));
                }
                Ok(Value::Float(narrowed))
            } else {
                Ok(Value::Double(v))
            }
        }
        TypeFamily::Decimal => match &value {
            Value::Text(s) | Value::Decimal(s) => {
                let trimmed = s.trim();
                trimmed.parse::<f64>().map_err(|_| parse_error(s))?;
                Ok(Value::Decimal(trimmed.to_string()))
            }
            other => other
                .to_sql_text()
                .filter(|_| other.as_f64().is_some())
                .map(Value::Decimal)
                .ok_or_else(|| incompatible(other)),
        },
        TypeFamily::Character | TypeFamily::Clob | TypeFamily::NClob => match value {
            Value::Text(s) => Ok(Value::Text(s)),
            other => Err(incompatible(&other)),
        },
        TypeFamily::Datetime => match value {
            Value::Text(s) if s.trim().is_empty() => Err(parse_error(&s)),
            Value::Text(s) => Ok(match sql_type {
                SqlType::Date => Value::Date(s),
                SqlType::Time => Value::Time(s),
                _ => Value::Timestamp(s),
            }),
            other => Err(incompatible(&other)),
        },
        TypeFamily::Interval => match value {
            Value::Text(s) => Ok(Value::Interval(s)),
            other => Err(incompatible(&other)),
        },
        TypeFamily::Binary | TypeFamily::Blob => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            other => Err(incompatible(&other)),
        },
    }
}

impl MemoryEngine {
    fn write_lob_chunk(&self, lob: &mut MemoryLob, units: u64, len: usize) -> NativeResult<bool> {
        let target = match &mut lob.state {
            LobState::WriteBinary { target, .. } | LobState::WriteText { target, .. } => target,
            LobState::Read { .. } => {
                return fail(
                    &lob.last_error,
                    native::SEQUENCE_ERROR,
                    "LOB was opened for reading",
                );
            }
        };
        let written = target.written + units;
        if written > target.declared {
            return fail(
                &lob.last_error,
                native::LOB_SIZE_MISMATCH,
                format!("LOB declared as {} units, {} written", target.declared, written),
            );
        }
        target.written = written;
        if let Some(log) = self.state.borrow_mut().lob_writes.get_mut(target.log) {
            log.push(len);
        }
        Ok(written == target.declared)
    }
}

fn complete_lob(target: &LobTarget, value: Value) {
    if let Some(slot) = target.params.borrow_mut().get_mut(target.index) {
        *slot = Some(value);
    }
}

impl NativeClient for MemoryEngine {
    type Session = MemorySession;
    type Statement = MemoryStatement;
    type Lob = MemoryLob;

    fn begin_session(
        &self,
        database: Option<&str>,
        user: &str,
        password: &str,
    ) -> NativeResult<MemorySession> {
        let mut state = self.state.borrow_mut();
        if !state.reachable {
            return Err(native::COMMUNICATION_FAILURE);
        }
        if let (Some(requested), Some(known)) = (database, state.database.as_deref()) {
            if requested != known {
                return Err(native::DATABASE_NOT_FOUND);
            }
        }
        if let Some((u, p)) = &state.credentials {
            if u != user || p != password {
                return Err(native::LOGIN_FAILED);
            }
        }
        state.stats.sessions_begun += 1;
        Ok(MemorySession {
            last_error: LastError::default(),
            transaction: Rc::new(Cell::new(None)),
        })
    }

    fn end_session(&self, session: MemorySession) -> NativeResult<()> {
        let mut state = self.state.borrow_mut();
        if session.transaction.take().is_some() {
            state.stats.rollbacks += 1;
        }
        state.stats.sessions_ended += 1;
        Ok(())
    }

    fn ping(&self, session: &MemorySession) -> NativeResult<()> {
        if self.state.borrow().reachable {
            Ok(())
        } else {
            fail(
                &session.last_error,
                native::COMMUNICATION_FAILURE,
                "communication link to the server lost",
            )
        }
    }

    fn begin_transaction(&self, session: &MemorySession, mode: TransactionMode) -> NativeResult<()> {
        if session.transaction.get().is_some() {
            return fail(
                &session.last_error,
                native::SEQUENCE_ERROR,
                "transaction already started",
            );
        }
        session.transaction.set(Some(mode));
        Ok(())
    }

    fn end_transaction(&self, session: &MemorySession, end: TransactionEnd) -> NativeResult<()> {
        if session.transaction.take().is_none() {
            return fail(&session.last_error, native::SEQUENCE_ERROR, "no active transaction");
        }
        // The server rolls back on its own once the link is gone
        if !self.state.borrow().reachable {
            return fail(
                &session.last_error,
                native::COMMUNICATION_FAILURE,
                "communication link lost while ending the transaction",
            );
        }
        let mut state = self.state.borrow_mut();
        match end {
            TransactionEnd::Commit => state.stats.commits += 1,
            TransactionEnd::Rollback => state.stats.rollbacks += 1,
        }
        Ok(())
    }

    fn api_version(&self) -> String {
        format!("{} (memory engine)", env!("CARGO_PKG_VERSION"))
    }

    fn begin_statement(
        &self,
        session: &MemorySession,
        sql: &str,
        cursor: CursorKind,
    ) -> NativeResult<MemoryStatement> {
        let def = {
            let mut state = self.state.borrow_mut();
            let def = state.definitions.get(&normalize(sql)).cloned();
            if def.is_some() {
                state.stats.statements_begun += 1;
            }
            def
        };
        let Some(def) = def else {
            return fail(
                &session.last_error,
                native::SYNTAX_ERROR,
                format!("statement not recognized: {}", sql),
            );
        };
        let params = vec![None; def.params.len()];
        Ok(MemoryStatement {
            def,
            cursor_kind: cursor,
            params: Rc::new(RefCell::new(params)),
            cursor: RefCell::new(None),
            last_error: LastError::default(),
            transaction: Rc::clone(&session.transaction),
        })
    }

    fn end_statement(&self, _statement: MemoryStatement) -> NativeResult<()> {
        self.state.borrow_mut().stats.statements_ended += 1;
        Ok(())
    }

    fn statement_has_result_set(&self, statement: &MemoryStatement) -> NativeResult<bool> {
        Ok(statement.def.is_query())
    }

    fn execute(&self, statement: &MemoryStatement) -> NativeResult<u64> {
        let Behavior::Update(run) = &statement.def.behavior else {
            return fail(
                &statement.last_error,
                native::CURSOR_SPECIFICATION_EXECUTED,
                "statement returns a result set and must be opened as a cursor",
            );
        };
        if statement.transaction.get() == Some(TransactionMode::ReadOnly) {
            return fail(
                &statement.last_error,
                native::READ_ONLY_TRANSACTION,
                "update attempted in a read-only transaction",
            );
        }
        let mut values = statement.arguments()?;
        let rows = match run(&mut values) {
            Ok(rows) => rows,
            Err(e) => return fail(&statement.last_error, e.code, e.message),
        };

        let mut params = statement.params.borrow_mut();
        for (i, def) in statement.def.params.iter().enumerate() {
            if def.mode.is_output() {
                params[i] = values.get(i).cloned();
            }
        }
        self.state.borrow_mut().stats.executions += 1;
        Ok(rows)
    }

    fn open_cursor(&self, statement: &MemoryStatement) -> NativeResult<()> {
        let Behavior::Query(rows) = &statement.def.behavior else {
            return fail(
                &statement.last_error,
                native::NOT_A_CURSOR_SPECIFICATION,
                "statement does not return a result set",
            );
        };
        if statement.cursor.borrow().is_some() {
            return fail(&statement.last_error, native::SEQUENCE_ERROR, "cursor already open");
        }
        let values = statement.arguments()?;
        let rows = match rows(&values) {
            Ok(rows) => rows,
            Err(e) => return fail(&statement.last_error, e.code, e.message),
        };
        *statement.cursor.borrow_mut() = Some(Cursor { rows, pos: -1 });
        let mut state = self.state.borrow_mut();
        state.stats.executions += 1;
        state.stats.cursors_opened += 1;
        Ok(())
    }

    fn fetch(&self, statement: &MemoryStatement) -> NativeResult<i32> {
        self.fetch_scroll(statement, FetchOrientation::Next, 0)
    }

    fn fetch_scroll(
        &self,
        statement: &MemoryStatement,
        orientation: FetchOrientation,
        offset: i64,
    ) -> NativeResult<i32> {
        let mut guard = statement.cursor.borrow_mut();
        let Some(cursor) = guard.as_mut() else {
            return fail(&statement.last_error, native::CURSOR_NOT_OPEN, "no open cursor");
        };
        if statement.cursor_kind == CursorKind::ForwardOnly
            && orientation != FetchOrientation::Next
        {
            return fail(
                &statement.last_error,
                native::SEQUENCE_ERROR,
                "cursor is forward-only",
            );
        }
        let pos = cursor.pos as i64;
        #[allow(clippy::cast_possible_wrap)]
        let len = cursor.rows.len() as i64;
        let target = match orientation {
            FetchOrientation::Next => pos + 1,
            FetchOrientation::Prior => pos - 1,
            FetchOrientation::First => 0,
            FetchOrientation::Last => len - 1,
            FetchOrientation::Absolute if offset > 0 => offset - 1,
            FetchOrientation::Absolute if offset < 0 => len + offset,
            FetchOrientation::Absolute => -1,
            FetchOrientation::Relative => pos.saturating_add(offset),
        };
        Ok(cursor.move_to(target))
    }

    fn close_cursor(&self, statement: &MemoryStatement) -> NativeResult<()> {
        if statement.cursor.borrow_mut().take().is_none() {
            return fail(&statement.last_error, native::SEQUENCE_ERROR, "cursor is not open");
        }
        Ok(())
    }

    fn column_count(&self, statement: &MemoryStatement) -> NativeResult<usize> {
        Ok(statement.def.columns.len())
    }

    fn column_type(&self, statement: &MemoryStatement, index: i16) -> NativeResult<i32> {
        let (_, def) = statement.column_def(index)?;
        Ok(types::to_native(def.sql_type, def.nullability))
    }

    fn column_name(
        &self,
        statement: &MemoryStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (_, def) = statement.column_def(index)?;
        write_sized(&statement.last_error, def.name.as_bytes(), buf)
    }

    fn parameter_count(&self, statement: &MemoryStatement) -> NativeResult<usize> {
        Ok(statement.def.params.len())
    }

    fn parameter_type(&self, statement: &MemoryStatement, index: i16) -> NativeResult<i32> {
        let (_, def) = statement.param_def(index)?;
        Ok(types::to_native(def.sql_type, Nullability::Unknown))
    }

    fn parameter_mode(&self, statement: &MemoryStatement, index: i16) -> NativeResult<ParamMode> {
        let (_, def) = statement.param_def(index)?;
        Ok(def.mode)
    }

    fn is_null(&self, statement: &MemoryStatement, index: i16) -> NativeResult<bool> {
        Ok(statement.value_at(index)?.1.is_null())
    }

    fn get_int32(&self, statement: &MemoryStatement, index: i16) -> NativeResult<i32> {
        let (sql_type, value) = statement.value_at(index)?;
        if sql_type.family() != TypeFamily::Int32 {
            return statement.incompatible(index, "get_int32", sql_type);
        }
        match value.as_i64().map(i32::try_from) {
            Some(Ok(v)) => Ok(v),
            Some(Err(_)) => fail(
                &statement.last_error,
                native::VALUE_OUT_OF_RANGE,
                format!("value at position {} exceeds 32 bits", index),
            ),
            None => statement.incompatible(index, "get_int32", sql_type),
        }
    }

    fn get_int64(&self, statement: &MemoryStatement, index: i16) -> NativeResult<i64> {
        let (sql_type, value) = statement.value_at(index)?;
        if !matches!(sql_type.family(), TypeFamily::Int32 | TypeFamily::Int64) {
            return statement.incompatible(index, "get_int64", sql_type);
        }
        value
            .as_i64()
            .map_or_else(|| statement.incompatible(index, "get_int64", sql_type), Ok)
    }

    fn get_boolean(&self, statement: &MemoryStatement, index: i16) -> NativeResult<bool> {
        let (sql_type, value) = statement.value_at(index)?;
        if sql_type != SqlType::Boolean {
            return statement.incompatible(index, "get_boolean", sql_type);
        }
        value
            .as_bool()
            .map_or_else(|| statement.incompatible(index, "get_boolean", sql_type), Ok)
    }

    fn get_float(&self, statement: &MemoryStatement, index: i16) -> NativeResult<f32> {
        let (sql_type, value) = statement.value_at(index)?;
        if !matches!(sql_type.family(), TypeFamily::Real | TypeFamily::Double) {
            return statement.incompatible(index, "get_float", sql_type);
        }
        #[allow(clippy::cast_possible_truncation)]
        let narrowed = value.as_f64().map(|v| v as f32);
        narrowed.map_or_else(|| statement.incompatible(index, "get_float", sql_type), Ok)
    }

    fn get_double(&self, statement: &MemoryStatement, index: i16) -> NativeResult<f64> {
        let (sql_type, value) = statement.value_at(index)?;
        if !sql_type.is_numeric() {
            return statement.incompatible(index, "get_double", sql_type);
        }
        value
            .as_f64()
            .map_or_else(|| statement.incompatible(index, "get_double", sql_type), Ok)
    }

    fn get_string(
        &self,
        statement: &MemoryStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (sql_type, value) = statement.value_at(index)?;
        if matches!(sql_type.family(), TypeFamily::Binary | TypeFamily::Blob) {
            return statement.incompatible(index, "get_string", sql_type);
        }
        // Raw bytes in a character column are served as stored
        if let Value::Bytes(raw) = &value {
            return write_sized(&statement.last_error, raw, buf);
        }
        match value.to_sql_text() {
            Some(text) => write_sized(&statement.last_error, text.as_bytes(), buf),
            None => statement.incompatible(index, "get_string", sql_type),
        }
    }

    fn get_binary(
        &self,
        statement: &MemoryStatement,
        index: i16,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<usize> {
        let (sql_type, value) = statement.value_at(index)?;
        if !matches!(sql_type.family(), TypeFamily::Binary | TypeFamily::Blob) {
            return statement.incompatible(index, "get_binary", sql_type);
        }
        match value.as_bytes() {
            Some(bytes) => write_sized(&statement.last_error, bytes, buf),
            None => statement.incompatible(index, "get_binary", sql_type),
        }
    }

    fn get_lob(&self, statement: &MemoryStatement, index: i16) -> NativeResult<(u64, MemoryLob)> {
        let (sql_type, value) = statement.value_at(index)?;
        if !sql_type.is_lob() {
            return statement.incompatible(index, "get_lob", sql_type);
        }
        let (size, data) = match value {
            Value::Bytes(b) if !sql_type.is_character_lob() => (b.len() as u64, b),
            Value::Text(s) if sql_type.is_character_lob() => (s.chars().count() as u64, s.into_bytes()),
            _ => return statement.incompatible(index, "get_lob", sql_type),
        };
        Ok((
            size,
            MemoryLob {
                state: LobState::Read { data, offset: 0 },
                last_error: Rc::clone(&statement.last_error),
            },
        ))
    }

    fn get_blob_data(&self, lob: &mut MemoryLob, buf: &mut [u8]) -> NativeResult<usize> {
        let LobState::Read { data, offset } = &mut lob.state else {
            return fail(&lob.last_error, native::SEQUENCE_ERROR, "LOB was opened for writing");
        };
        let n = buf.len().min(data.len() - *offset);
        buf[..n].copy_from_slice(&data[*offset..*offset + n]);
        *offset += n;
        Ok(n)
    }

    fn get_nclob_data(&self, lob: &mut MemoryLob, buf: &mut [u8]) -> NativeResult<usize> {
        let LobState::Read { data, offset } = &mut lob.state else {
            return fail(&lob.last_error, native::SEQUENCE_ERROR, "LOB was opened for writing");
        };
        let remaining = &data[*offset..];
        let n = if buf.len() >= remaining.len() {
            remaining.len()
        } else {
            complete_prefix_len(&remaining[..buf.len()])
        };
        if n == 0 && !remaining.is_empty() {
            return fail(
                &lob.last_error,
                native::STRING_TRUNCATED,
                "buffer cannot hold the next character",
            );
        }
        buf[..n].copy_from_slice(&remaining[..n]);
        *offset += n;
        Ok(n)
    }

    fn set_null(&self, statement: &MemoryStatement, index: i16) -> NativeResult<()> {
        statement.store(index, Value::Null)
    }

    fn set_int32(&self, statement: &MemoryStatement, index: i16, value: i32) -> NativeResult<()> {
        statement.store(index, Value::Int(value))
    }

    fn set_int64(&self, statement: &MemoryStatement, index: i16, value: i64) -> NativeResult<()> {
        statement.store(index, Value::BigInt(value))
    }

    fn set_boolean(&self, statement: &MemoryStatement, index: i16, value: bool) -> NativeResult<()> {
        statement.store(index, Value::Bool(value))
    }

    fn set_float(&self, statement: &MemoryStatement, index: i16, value: f32) -> NativeResult<()> {
        statement.store(index, Value::Float(value))
    }

    fn set_double(&self, statement: &MemoryStatement, index: i16, value: f64) -> NativeResult<()> {
        statement.store(index, Value::Double(value))
    }

    fn set_string(&self, statement: &MemoryStatement, index: i16, value: &str) -> NativeResult<()> {
        statement.store(index, Value::Text(value.to_string()))
    }

    fn set_binary(&self, statement: &MemoryStatement, index: i16, value: &[u8]) -> NativeResult<()> {
        statement.store(index, Value::Bytes(value.to_vec()))
    }

    fn set_lob(&self, statement: &MemoryStatement, index: i16, size: u64) -> NativeResult<MemoryLob> {
        let (slot, sql_type) = statement.writable(index)?;
        if !sql_type.is_lob() {
            return statement.incompatible(index, "set_lob", sql_type);
        }
        let log = {
            let mut state = self.state.borrow_mut();
            state.lob_writes.push(Vec::new());
            state.lob_writes.len() - 1
        };
        let target = LobTarget {
            params: Rc::clone(&statement.params),
            index: slot,
            declared: size,
            written: 0,
            log,
        };
        let state = if sql_type.is_character_lob() {
            if size == 0 {
                complete_lob(&target, Value::Text(String::new()));
            }
            LobState::WriteText {
                target,
                data: String::new(),
            }
        } else {
            if size == 0 {
                complete_lob(&target, Value::Bytes(Vec::new()));
            }
            LobState::WriteBinary {
                target,
                data: Vec::new(),
            }
        };
        Ok(MemoryLob {
            state,
            last_error: Rc::clone(&statement.last_error),
        })
    }

    fn set_blob_data(&self, lob: &mut MemoryLob, data: &[u8]) -> NativeResult<()> {
        if !matches!(lob.state, LobState::WriteBinary { .. }) {
            return fail(
                &lob.last_error,
                native::INCOMPATIBLE_TYPE,
                "binary data written to a character LOB",
            );
        }
        let complete = self.write_lob_chunk(lob, data.len() as u64, data.len())?;
        if let LobState::WriteBinary { target, data: buffer } = &mut lob.state {
            buffer.extend_from_slice(data);
            if complete {
                complete_lob(target, Value::Bytes(buffer.clone()));
            }
        }
        Ok(())
    }

    fn set_nclob_data(&self, lob: &mut MemoryLob, data: &str) -> NativeResult<()> {
        if !matches!(lob.state, LobState::WriteText { .. }) {
            return fail(
                &lob.last_error,
                native::INCOMPATIBLE_TYPE,
                "character data written to a binary LOB",
            );
        }
        let units = data.chars().count() as u64;
        let complete = self.write_lob_chunk(lob, units, data.len())?;
        if let LobState::WriteText { target, data: buffer } = &mut lob.state {
            buffer.push_str(data);
            if complete {
                complete_lob(target, Value::Text(buffer.clone()));
            }
        }
        Ok(())
    }

    fn get_error(
        &self,
        handle: NativeHandle<'_, Self>,
        buf: Option<&mut [u8]>,
    ) -> NativeResult<(i32, usize)> {
        let slot = match handle {
            NativeHandle::Session(s) => &s.last_error,
            NativeHandle::Statement(s) => &s.last_error,
        };
        let last = slot.borrow().clone();
        let Some((code, message)) = last else {
            return Ok((native::SUCCESS, 0));
        };
        match buf {
            Some(buf) if buf.len() <= message.len() => Err(native::STRING_TRUNCATED),
            buf => write_sized(slot, message.as_bytes(), buf).map(|n| (code, n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::read_sized_string;

    fn engine_with_numbers() -> MemoryEngine {
        let engine = MemoryEngine::new();
        engine.define(
            StatementDef::query("SELECT n FROM numbers")
                .column_with_nullability("N", SqlType::Integer, Nullability::NoNulls)
                .rows(|_| Ok((1..=4).map(|n| vec![Value::Int(n)]).collect())),
        );
        engine
    }

    #[test]
    fn test_sql_is_whitespace_normalized() {
        let engine = engine_with_numbers();
        let session = engine.begin_session(None, "", "").unwrap();
        assert!(engine
            .begin_statement(&session, "  SELECT n\n  FROM   numbers ", CursorKind::ForwardOnly)
            .is_ok());
    }

    #[test]
    fn test_scroll_positions() {
        let engine = engine_with_numbers();
        let session = engine.begin_session(None, "", "").unwrap();
        let st = engine
            .begin_statement(&session, "SELECT n FROM numbers", CursorKind::Scrollable)
            .unwrap();
        engine.open_cursor(&st).unwrap();

        let at = |o, n| engine.fetch_scroll(&st, o, n).unwrap();
        assert_eq!(at(FetchOrientation::Prior, 0), native::NO_DATA);
        assert_eq!(at(FetchOrientation::Absolute, 4), native::SUCCESS);
        assert_eq!(engine.get_int32(&st, 1).unwrap(), 4);
        assert_eq!(at(FetchOrientation::Relative, 1), native::NO_DATA);
        assert_eq!(at(FetchOrientation::Prior, 0), native::SUCCESS);
        assert_eq!(engine.get_int32(&st, 1).unwrap(), 4);
        assert_eq!(at(FetchOrientation::Absolute, -2), native::SUCCESS);
        assert_eq!(engine.get_int32(&st, 1).unwrap(), 3);
        assert_eq!(at(FetchOrientation::Absolute, 0), native::NO_DATA);
        assert_eq!(at(FetchOrientation::Relative, -10), native::NO_DATA);
    }

    #[test]
    fn test_cursor_sequence_codes() {
        let engine = engine_with_numbers();
        let session = engine.begin_session(None, "", "").unwrap();
        let st = engine
            .begin_statement(&session, "SELECT n FROM numbers", CursorKind::ForwardOnly)
            .unwrap();
        assert_eq!(engine.fetch(&st), Err(native::CURSOR_NOT_OPEN));
        assert_eq!(engine.close_cursor(&st), Err(native::SEQUENCE_ERROR));
        assert_eq!(engine.execute(&st), Err(native::CURSOR_SPECIFICATION_EXECUTED));
        engine.open_cursor(&st).unwrap();
        assert_eq!(engine.open_cursor(&st), Err(native::SEQUENCE_ERROR));
        assert_eq!(
            engine.fetch_scroll(&st, FetchOrientation::First, 0),
            Err(native::SEQUENCE_ERROR)
        );
    }

    #[test]
    fn test_error_lookup_is_two_phase() {
        let engine = MemoryEngine::new();
        let session = engine.begin_session(None, "", "").unwrap();
        assert_eq!(
            engine.get_error(NativeHandle::Session(&session), None),
            Ok((native::SUCCESS, 0))
        );
        assert!(engine.begin_statement(&session, "DROP TABLE x", CursorKind::ForwardOnly).is_err());
        let message = read_sized_string(|buf| {
            engine
                .get_error(NativeHandle::Session(&session), buf)
                .map(|(_, n)| n)
        })
        .unwrap();
        assert_eq!(message, "statement not recognized: DROP TABLE x");
    }

    #[test]
    fn test_coerce() {
        assert_eq!(coerce(SqlType::SmallInt, Value::Int(7)), Ok(Value::SmallInt(7)));
        assert_eq!(
            coerce(SqlType::SmallInt, Value::Int(70_000)).unwrap_err().0,
            native::VALUE_OUT_OF_RANGE
        );
        assert_eq!(
            coerce(SqlType::Decimal, Value::Text(" 12.50 ".into())),
            Ok(Value::Decimal("12.50".into()))
        );
        assert_eq!(
            coerce(SqlType::Decimal, Value::Text("abc".into())).unwrap_err().0,
            native::INVALID_CHARACTER_VALUE
        );
        assert_eq!(
            coerce(SqlType::Date, Value::Text("2024-02-29".into())),
            Ok(Value::Date("2024-02-29".into()))
        );
        assert_eq!(
            coerce(SqlType::VarBinary, Value::Text("x".into())).unwrap_err().0,
            native::INCOMPATIBLE_TYPE
        );
        assert_eq!(coerce(SqlType::Boolean, Value::Null), Ok(Value::Null));
    }

    #[test]
    fn test_lob_size_is_enforced() {
        let engine = MemoryEngine::new();
        engine.define(StatementDef::update("INSERT INTO docs VALUES (?)").param(SqlType::Clob));
        let session = engine.begin_session(None, "", "").unwrap();
        let st = engine
            .begin_statement(&session, "INSERT INTO docs VALUES (?)", CursorKind::ForwardOnly)
            .unwrap();

        let mut lob = engine.set_lob(&st, 1, 3).unwrap();
        engine.set_nclob_data(&mut lob, "é").unwrap();
        assert_eq!(engine.execute(&st), Err(native::PARAMETER_NOT_SET));
        engine.set_nclob_data(&mut lob, "ab").unwrap();
        assert_eq!(engine.set_nclob_data(&mut lob, "c"), Err(native::LOB_SIZE_MISMATCH));
        assert_eq!(engine.execute(&st), Ok(0));
        assert_eq!(engine.lob_writes(), vec![vec![2, 2]]);
    }

    #[test]
    fn test_nclob_reads_whole_characters() {
        let engine = MemoryEngine::new();
        engine.define(
            StatementDef::query("SELECT doc FROM docs")
                .column("DOC", SqlType::NClob)
                .rows(|_| Ok(vec![vec![Value::Text("a😀b".into())]])),
        );
        let session = engine.begin_session(None, "", "").unwrap();
        let st = engine
            .begin_statement(&session, "SELECT doc FROM docs", CursorKind::ForwardOnly)
            .unwrap();
        engine.open_cursor(&st).unwrap();
        assert_eq!(engine.fetch(&st), Ok(native::SUCCESS));

        let (size, mut lob) = engine.get_lob(&st, 1).unwrap();
        assert_eq!(size, 3);
        let mut buf = [0u8; 4];
        assert_eq!(engine.get_nclob_data(&mut lob, &mut buf), Ok(1));
        assert_eq!(engine.get_nclob_data(&mut lob, &mut buf), Ok(4));
        assert_eq!(engine.get_nclob_data(&mut lob, &mut buf), Ok(1));
        assert_eq!(engine.get_nclob_data(&mut lob, &mut buf), Ok(0));
    }

    #[test]
    fn test_read_only_transaction_blocks_updates() {
        let engine = MemoryEngine::new();
        engine.define(StatementDef::update("DELETE FROM t").run(|_| Ok(2)));
        let session = engine.begin_session(None, "", "").unwrap();
        engine
            .begin_transaction(&session, TransactionMode::ReadOnly)
            .unwrap();
        let st = engine
            .begin_statement(&session, "DELETE FROM t", CursorKind::ForwardOnly)
            .unwrap();
        assert_eq!(engine.execute(&st), Err(native::READ_ONLY_TRANSACTION));
        engine
            .end_transaction(&session, TransactionEnd::Rollback)
            .unwrap();
        assert_eq!(engine.execute(&st), Ok(2));
    }

    #[test]
    fn test_session_checks() {
        let engine = MemoryEngine::new()
            .with_database("testdb")
            .with_credentials("SYSADM", "pw");
        assert_eq!(
            engine.begin_session(Some("other"), "SYSADM", "pw").err(),
            Some(native::DATABASE_NOT_FOUND)
        );
        assert_eq!(
            engine.begin_session(None, "SYSADM", "nope").err(),
            Some(native::LOGIN_FAILED)
        );
        assert!(engine.begin_session(Some("testdb"), "SYSADM", "pw").is_ok());
        engine.set_reachable(false);
        assert_eq!(
            engine.begin_session(None, "SYSADM", "pw").err(),
            Some(native::COMMUNICATION_FAILURE)
        );
    }
}
