//! Session management.
//!
//! A [`Session`] owns one native client and at most one native session
//! handle. It tracks the transaction flag, the session attributes and the
//! last error, and hands out [`Statement`]s that borrow it.

use crate::config::MimerConfig;
use crate::diagnostics::{self, ErrorSlot};
use crate::native::{NativeClient, NativeHandle, NativeResult, TransactionEnd};
use crate::statement::Statement;
use mimer_pdo_core::{
    Attribute, AttributeValue, ConnectionErrorKind, ConversionErrorKind, CursorKind,
    DatabaseHandle, Error, ErrorDescriptor, ErrorInfo, ResourceErrorKind, Result,
    SequenceErrorKind, TransactionMode,
};
use std::cell::{Cell, RefCell};

/// Name reported through [`Attribute::DriverName`].
pub const DRIVER_NAME: &str = "mimer";

/// Character set reported through [`Attribute::DefaultStringParam`].
pub const DEFAULT_STRING_PARAM: &str = "UTF8";

/// A connected Mimer SQL session.
pub struct Session<C: NativeClient> {
    client: C,
    handle: RefCell<Option<C::Session>>,
    database: Option<String>,
    transaction_mode: Cell<TransactionMode>,
    cursor_kind: Cell<CursorKind>,
    autocommit: Cell<bool>,
    in_transaction: Cell<bool>,
    lob_chunk_size: usize,
    errors: ErrorSlot,
}

impl<C: NativeClient> Session<C> {
    /// Open a session on `client`.
    ///
    /// The configuration is validated first. A `None` database connects to
    /// the client's default database.
    pub fn connect(client: C, config: &MimerConfig) -> Result<Self> {
        config.validate()?;
        let label = config.database.as_deref().unwrap_or("<default>");

        let handle = client
            .begin_session(config.database.as_deref(), &config.user, &config.password)
            .map_err(|code| {
                let mut descriptor = diagnostics::describe_code(code);
                descriptor.message = format!("cannot connect to {}: {}", label, descriptor.message);
                tracing::warn!(database = label, code, "Mimer SQL connect failed");
                Error::connection(ConnectionErrorKind::Connect, descriptor)
            })?;

        tracing::info!(database = label, user = %config.user, "Mimer SQL session opened");

        Ok(Self {
            client,
            handle: RefCell::new(Some(handle)),
            database: config.database.clone(),
            transaction_mode: Cell::new(config.transaction_mode),
            cursor_kind: Cell::new(config.cursor_kind),
            autocommit: Cell::new(config.autocommit),
            in_transaction: Cell::new(false),
            lob_chunk_size: config.lob_chunk_size,
            errors: ErrorSlot::default(),
        })
    }

    /// The native client this session runs on.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.handle.borrow().is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction.get()
    }

    pub fn transaction_mode(&self) -> TransactionMode {
        self.transaction_mode.get()
    }

    pub fn cursor_kind(&self) -> CursorKind {
        self.cursor_kind.get()
    }

    pub fn autocommit(&self) -> bool {
        self.autocommit.get()
    }

    pub fn lob_chunk_size(&self) -> usize {
        self.lob_chunk_size
    }

    /// Last error recorded on this session.
    pub fn last_error(&self) -> Option<ErrorDescriptor> {
        self.errors.get()
    }

    /// Last error as `(sqlstate, code, message)`; `None` if none was recorded.
    pub fn error_info(&self) -> Option<ErrorInfo> {
        self.errors.info()
    }

    pub(crate) fn record_error(&self, descriptor: ErrorDescriptor) {
        self.errors.record(descriptor);
    }

    fn capture<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.errors.record(e.descriptor());
        }
        result
    }

    /// Run a native call against the session handle, translating failures.
    pub(crate) fn with_native<T>(
        &self,
        call: impl FnOnce(&C, &C::Session) -> NativeResult<T>,
    ) -> Result<T> {
        let guard = self.handle.borrow();
        let handle = guard.as_ref().ok_or_else(Error::closed)?;
        call(&self.client, handle).map_err(|code| {
            let descriptor =
                diagnostics::translate(&self.client, NativeHandle::Session(handle), code);
            Error::database(descriptor, None)
        })
    }

    /// Begin a transaction in the configured access mode.
    pub fn begin_transaction(&self) -> Result<()> {
        let result = if self.in_transaction.get() {
            Err(Error::sequence(
                SequenceErrorKind::AlreadyInTransaction,
                "a transaction is already active",
            ))
        } else {
            let mode = self.transaction_mode.get();
            self.with_native(|client, handle| client.begin_transaction(handle, mode))
                .map(|()| {
                    self.in_transaction.set(true);
                    tracing::debug!(mode = mode.describe(), "transaction started");
                })
        };
        self.capture(result)
    }

    pub fn commit(&self) -> Result<()> {
        let result = self.end_transaction(TransactionEnd::Commit);
        self.capture(result)
    }

    pub fn rollback(&self) -> Result<()> {
        let result = self.end_transaction(TransactionEnd::Rollback);
        self.capture(result)
    }

    /// End the active transaction. The flag is cleared even when the native
    /// call fails.
    fn end_transaction(&self, end: TransactionEnd) -> Result<()> {
        if !self.is_open() {
            return Err(Error::closed());
        }
        if !self.in_transaction.get() {
            return Err(Error::sequence(
                SequenceErrorKind::NotInTransaction,
                format!("{:?} without an active transaction", end).to_lowercase(),
            ));
        }
        let result = self.with_native(|client, handle| client.end_transaction(handle, end));
        self.in_transaction.set(false);
        match &result {
            Ok(()) => tracing::debug!(?end, "transaction ended"),
            Err(e) => tracing::warn!(?end, error = %e, "transaction end failed"),
        }
        result
    }

    /// Check the server is reachable. Never fails: a failed ping is recorded
    /// and reported as `false`.
    pub fn ping(&self) -> bool {
        match self.with_native(|client, handle| client.ping(handle)) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "ping failed");
                self.errors.record(e.descriptor());
                false
            }
        }
    }

    /// End the native session. Calling it again does nothing.
    ///
    /// The handle is released even when the native call fails; the failure
    /// is recorded and returned.
    pub fn close(&self) -> Result<()> {
        let Some(handle) = self.handle.borrow_mut().take() else {
            return Ok(());
        };
        if self.in_transaction.replace(false) {
            tracing::debug!("closing session with an active transaction");
        }
        match self.client.end_session(handle) {
            Ok(()) => {
                tracing::info!(database = ?self.database, "Mimer SQL session closed");
                Ok(())
            }
            Err(code) => {
                let descriptor = diagnostics::describe_code(code);
                tracing::warn!(code, "native session teardown failed");
                self.errors.record(descriptor.clone());
                Err(Error::connection(ConnectionErrorKind::Teardown, descriptor))
            }
        }
    }

    /// Prepare a statement; `None` uses the session's default cursor kind.
    pub fn prepare(&self, sql: &str, cursor: Option<CursorKind>) -> Result<Statement<'_, C>> {
        let kind = cursor.unwrap_or_else(|| self.cursor_kind.get());
        let result = Statement::prepare(self, sql, kind);
        self.capture(result)
    }

    /// Run a statement without a result set and return the affected rows.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn exec(&self, sql: &str) -> Result<u64> {
        let result = self.exec_once(sql);
        self.capture(result)
    }

    fn exec_once(&self, sql: &str) -> Result<u64> {
        let statement = Statement::prepare(self, sql, CursorKind::ForwardOnly)?;
        let rows = statement.execute_direct();
        let finalized = statement.finalize();
        let rows = rows?;
        finalized?;
        tracing::debug!(rows, "exec complete");
        Ok(rows)
    }

    pub fn get_attribute(&self, attribute: Attribute) -> Result<AttributeValue> {
        let result = match attribute {
            Attribute::Autocommit => Ok(AttributeValue::Bool(self.autocommit.get())),
            Attribute::CursorKind => Ok(AttributeValue::Cursor(self.cursor_kind.get())),
            Attribute::TransactionMode => Ok(AttributeValue::Text(
                self.transaction_mode.get().describe().to_string(),
            )),
            Attribute::ClientVersion => Ok(AttributeValue::Text(self.client.api_version())),
            Attribute::DriverName => Ok(AttributeValue::Text(DRIVER_NAME.to_string())),
            Attribute::DefaultStringParam => {
                Ok(AttributeValue::Text(DEFAULT_STRING_PARAM.to_string()))
            }
            Attribute::ConnectionStatus => self.connection_status(),
        };
        self.capture(result)
    }

    fn connection_status(&self) -> Result<AttributeValue> {
        if !self.is_open() {
            return Ok(AttributeValue::Text("Disconnected".to_string()));
        }
        self.with_native(|client, handle| client.ping(handle))?;
        Ok(AttributeValue::Text("Connected".to_string()))
    }

    pub fn set_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()> {
        let result = self.apply_attribute(attribute, value);
        self.capture(result)
    }

    fn apply_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()> {
        let unsupported = |expected: &'static str, value: &AttributeValue| {
            Error::conversion(ConversionErrorKind::InvalidValue, expected, value.to_string())
                .with_target(attribute.name())
        };

        match attribute {
            Attribute::Autocommit => match value {
                AttributeValue::Bool(b) => self.autocommit.set(b),
                AttributeValue::Int(i) => self.autocommit.set(i != 0),
                other => return Err(unsupported("boolean", &other)),
            },
            Attribute::CursorKind => match value {
                AttributeValue::Cursor(kind) => self.cursor_kind.set(kind),
                AttributeValue::Int(0) => self.cursor_kind.set(CursorKind::ForwardOnly),
                AttributeValue::Int(1) => self.cursor_kind.set(CursorKind::Scrollable),
                other => return Err(unsupported("cursor kind", &other)),
            },
            Attribute::TransactionMode => match value {
                AttributeValue::Transaction(mode) => self.transaction_mode.set(mode),
                AttributeValue::Int(0) => self.transaction_mode.set(TransactionMode::ReadWrite),
                AttributeValue::Int(1) => self.transaction_mode.set(TransactionMode::ReadOnly),
                other => return Err(unsupported("transaction mode", &other)),
            },
            Attribute::ClientVersion
            | Attribute::DriverName
            | Attribute::ConnectionStatus
            | Attribute::DefaultStringParam => {
                return Err(Error::resource(
                    ResourceErrorKind::UnsupportedParameter,
                    format!("attribute '{}' is read-only", attribute.name()),
                ));
            }
        }
        tracing::debug!(attribute = attribute.name(), "session attribute set");
        Ok(())
    }

    /// Ping, turning a failure into a connection error.
    pub fn check_liveness(&self) -> Result<()> {
        if self.ping() {
            return Ok(());
        }
        let descriptor = self
            .errors
            .get()
            .unwrap_or_else(|| Error::closed().descriptor());
        Err(Error::connection(ConnectionErrorKind::Disconnected, descriptor))
    }
}

impl<C: NativeClient> Drop for Session<C> {
    fn drop(&mut self) {
        if self.handle.get_mut().is_some() {
            // Failures are logged by close
            let _ = self.close();
        }
    }
}

impl<C: NativeClient> std::fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("database", &self.database)
            .field("open", &self.is_open())
            .field("in_transaction", &self.in_transaction.get())
            .field("transaction_mode", &self.transaction_mode.get())
            .field("cursor_kind", &self.cursor_kind.get())
            .field("autocommit", &self.autocommit.get())
            .finish_non_exhaustive()
    }
}

impl<C: NativeClient> DatabaseHandle for Session<C> {
    type Statement<'h>
        = Statement<'h, C>
    where
        Self: 'h;

    fn close(&self) -> Result<()> {
        Session::close(self)
    }

    fn prepare<'h>(
        &'h self,
        sql: &str,
        cursor: Option<CursorKind>,
    ) -> Result<Self::Statement<'h>> {
        Session::prepare(self, sql, cursor)
    }

    fn exec(&self, sql: &str) -> Result<u64> {
        Session::exec(self, sql)
    }

    fn begin(&self) -> Result<()> {
        self.begin_transaction()
    }

    fn commit(&self) -> Result<()> {
        Session::commit(self)
    }

    fn rollback(&self) -> Result<()> {
        Session::rollback(self)
    }

    fn in_transaction(&self) -> bool {
        Session::in_transaction(self)
    }

    fn get_attribute(&self, attribute: Attribute) -> Result<AttributeValue> {
        Session::get_attribute(self, attribute)
    }

    fn set_attribute(&self, attribute: Attribute, value: AttributeValue) -> Result<()> {
        Session::set_attribute(self, attribute, value)
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        Session::error_info(self)
    }

    fn check_liveness(&self) -> Result<()> {
        Session::check_liveness(self)
    }
}
