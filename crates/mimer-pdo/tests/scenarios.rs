use std::cell::RefCell;
use std::rc::Rc;

use mimer_pdo::{MemoryEngine, MimerConfig, Session, StatementDef, StatementState, native};
use mimer_pdo_core::error::codes;
use mimer_pdo_core::{
    ColumnRequest, CursorKind, Error, ExecuteOutcome, FetchOrientation, ParamMode, ParamValue,
    SqlType, Value,
};

fn users_engine() -> MemoryEngine {
    let engine = MemoryEngine::new().with_credentials("SYSADM", "secret");
    engine.define(
        StatementDef::query("SELECT name FROM users WHERE id = ?")
            .param(SqlType::Integer)
            .column("NAME", SqlType::VarChar)
            .rows(|params| {
                Ok(match params[0].as_i64() {
                    Some(42) => vec![vec![Value::Text("Alice".into())]],
                    _ => Vec::new(),
                })
            }),
    );
    engine
}

fn connect(engine: &MemoryEngine) -> Session<MemoryEngine> {
    let config = MimerConfig::new().user("SYSADM").password("secret");
    Session::connect(engine.clone(), &config).expect("connect to memory engine")
}

#[test]
fn select_by_id_yields_one_row() {
    let engine = users_engine();
    let session = connect(&engine);

    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");
    stmt.bind_value(0, 42).expect("bind id");
    assert_eq!(
        stmt.execute().expect("execute"),
        ExecuteOutcome::ResultSet { columns: 1 }
    );

    assert!(stmt.fetch(FetchOrientation::Next, 0).expect("first fetch"));
    let row = stmt.fetch_row().expect("decode row");
    assert_eq!(row.get_named::<String>("NAME").expect("name"), "Alice");
    assert!(!stmt.fetch(FetchOrientation::Next, 0).expect("second fetch"));

    stmt.finalize().expect("finalize");
    session.close().expect("close");
    let stats = engine.stats();
    assert_eq!(stats.statements_ended, 1);
    assert_eq!(stats.sessions_ended, 1);
}

#[test]
fn transactional_update_commits() {
    let engine = MemoryEngine::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.define(
        StatementDef::update("UPDATE accounts SET balance = ? WHERE id = ?")
            .param(SqlType::Decimal)
            .param(SqlType::Integer)
            .run(move |params| {
                sink.borrow_mut().extend_from_slice(params);
                Ok(1)
            }),
    );
    let session = connect(&engine);

    session.begin_transaction().expect("begin");
    assert!(session.in_transaction());

    let mut stmt = session
        .prepare("UPDATE accounts SET balance = ? WHERE id = ?", None)
        .expect("prepare");
    stmt.bind_value(0, "100.25").expect("bind balance");
    stmt.bind_value(1, 7).expect("bind id");
    assert_eq!(stmt.execute().expect("execute"), ExecuteOutcome::RowsAffected(1));
    stmt.finalize().expect("finalize");

    session.commit().expect("commit");
    assert!(!session.in_transaction());
    assert_eq!(engine.stats().commits, 1);
    assert_eq!(
        *seen.borrow(),
        vec![Value::Decimal("100.25".into()), Value::Int(7)]
    );
}

#[test]
fn read_only_transaction_rejects_updates() {
    let engine = MemoryEngine::new();
    engine.define(StatementDef::update("DELETE FROM audit").run(|_| Ok(5)));
    let config = MimerConfig::new()
        .user("SYSADM")
        .password("secret")
        .transaction_mode(mimer_pdo_core::TransactionMode::ReadOnly);
    let session = Session::connect(engine.clone(), &config).expect("connect");

    session.begin_transaction().expect("begin");
    let err = session.exec("DELETE FROM audit").unwrap_err();
    assert_eq!(err.code(), native::READ_ONLY_TRANSACTION);
    assert_eq!(err.sqlstate().as_str(), "25006");
    session.rollback().expect("rollback");
    assert_eq!(session.exec("DELETE FROM audit").expect("exec"), 5);
}

#[test]
fn parameter_index_limit() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");

    let err = stmt.bind_value(i16::MAX as usize, 1).unwrap_err();
    assert_eq!(err.code(), codes::VALUE_TOO_LARGE);
    assert_eq!(err.sqlstate().as_str(), "HY093");
    assert_eq!(stmt.last_error().expect("recorded").code, codes::VALUE_TOO_LARGE);

    // The last representable position is checked against the declared parameters
    let err = stmt.bind_value(i16::MAX as usize - 1, 1).unwrap_err();
    assert_eq!(err.code(), native::INVALID_INDEX);
}

#[test]
fn close_cursor_twice_is_harmless() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");
    stmt.bind_value(0, 42).expect("bind");
    stmt.execute().expect("execute");

    stmt.close_cursor().expect("first close");
    stmt.close_cursor().expect("second close");
    assert_eq!(stmt.state(), StatementState::CursorClosed);
    assert!(stmt.last_error().is_none());
}

#[test]
fn reexecute_reopens_the_cursor() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");

    stmt.bind_value(0, 42).expect("bind");
    stmt.execute().expect("execute");
    assert!(stmt.fetch(FetchOrientation::Next, 0).expect("fetch"));
    assert!(!stmt.fetch(FetchOrientation::Next, 0).expect("fetch"));

    // Rebinding closes the open cursor; executing again starts from the top
    stmt.bind_value(0, 42).expect("rebind");
    assert_eq!(stmt.state(), StatementState::CursorClosed);
    stmt.execute().expect("re-execute");
    assert!(stmt.fetch(FetchOrientation::Next, 0).expect("fetch after re-execute"));
    assert_eq!(
        stmt.get_column(0, ColumnRequest::Value)
            .expect("column")
            .into_value(),
        Some(Value::Text("Alice".into()))
    );
    assert_eq!(engine.stats().cursors_opened, 2);
}

#[test]
fn missing_parameter_is_reported() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");

    let err = stmt.execute().unwrap_err();
    assert_eq!(err.code(), native::PARAMETER_NOT_SET);
    assert_eq!(err.sql(), Some("SELECT name FROM users WHERE id = ?"));
    assert_eq!(stmt.state(), StatementState::Prepared);
    assert_eq!(stmt.error_info().expect("info").code, native::PARAMETER_NOT_SET);
}

#[test]
fn duplicate_key_maps_to_integrity_violation() {
    let engine = MemoryEngine::new();
    engine.define(
        StatementDef::update("INSERT INTO users (id) VALUES (?)")
            .param(SqlType::Integer)
            .run(|_| Err(mimer_pdo::MemoryError::duplicate_key("primary key USERS_PK"))),
    );
    let session = connect(&engine);
    let mut stmt = session
        .prepare("INSERT INTO users (id) VALUES (?)", None)
        .expect("prepare");
    stmt.bind_value(0, 1).expect("bind");

    let err = stmt.execute().unwrap_err();
    assert!(matches!(err, Error::Database(_)));
    assert_eq!(err.sqlstate().as_str(), "23000");
    let info = stmt.error_info().expect("info");
    assert_eq!(info.code, native::DUPLICATE_KEY);
    assert!(info.message.contains("USERS_PK"));
}

#[test]
fn inout_parameter_reads_back_through_deferred_cell() {
    let engine = MemoryEngine::new();
    engine.define(
        StatementDef::update("CALL bump(?, ?)")
            .param_with_mode(SqlType::Integer, ParamMode::InOut)
            .param_with_mode(SqlType::VarChar, ParamMode::Output)
            .run(|params| {
                let n = params[0].as_i64().unwrap_or(0) + 1;
                params[0] = Value::Int(n as i32);
                params[1] = Value::Text(format!("bumped to {n}"));
                Ok(0)
            }),
    );
    let session = connect(&engine);
    let mut stmt = session.prepare("CALL bump(?, ?)", None).expect("prepare");

    let (counter, counter_cell) = ParamValue::deferred(10);
    let (note, note_cell) = ParamValue::deferred(Value::Null);
    stmt.bind(0, counter).expect("bind counter");
    stmt.bind(1, note).expect("bind note");

    // Deferred values are read at execute time
    *counter_cell.borrow_mut() = Value::Int(20);
    stmt.execute().expect("execute");
    assert_eq!(*counter_cell.borrow(), Value::Int(21));
    assert_eq!(*note_cell.borrow(), Value::Text("bumped to 21".into()));
}

#[test]
fn stream_to_output_parameter_is_rejected() {
    let engine = MemoryEngine::new();
    engine.define(
        StatementDef::update("CALL fetch_doc(?)")
            .param_with_mode(SqlType::Clob, ParamMode::Output),
    );
    let session = connect(&engine);
    let mut stmt = session.prepare("CALL fetch_doc(?)", None).expect("prepare");
    let err = stmt
        .bind(0, ParamValue::stream(std::io::Cursor::new(b"text".to_vec())))
        .unwrap_err();
    assert_eq!(err.code(), codes::UNSUPPORTED_PARAMETER);
}

#[test]
fn scrollable_cursor_from_session_default() {
    let engine = MemoryEngine::new();
    engine.define(
        StatementDef::query("SELECT n FROM numbers")
            .column("N", SqlType::BigInt)
            .rows(|_| Ok((1..=5_i64).map(|n| vec![Value::BigInt(n * 10)]).collect())),
    );
    let config = MimerConfig::new().cursor_kind(CursorKind::Scrollable);
    let session = Session::connect(engine, &config).expect("connect");

    let mut stmt = session.prepare("SELECT n FROM numbers", None).expect("prepare");
    assert!(stmt.is_scrollable());
    stmt.execute().expect("execute");
    assert!(stmt.fetch(FetchOrientation::Absolute, -2).expect("absolute"));
    assert_eq!(stmt.fetch_row().expect("row").get_as::<i64>(0).expect("n"), 40);
    assert!(!stmt.fetch(FetchOrientation::Relative, 5).expect("relative"));
    assert!(stmt.fetch(FetchOrientation::Prior, 0).expect("prior"));
    assert_eq!(stmt.fetch_row().expect("row").get_as::<i64>(0).expect("n"), 50);
}

#[test]
fn statements_survive_a_closed_session_without_panicking() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");
    stmt.bind_value(0, 42).expect("bind");
    session.close().expect("close");

    let err = stmt.execute().unwrap_err();
    assert_eq!(err.code(), codes::SESSION_CLOSED);
    assert!(err.is_connection_error());
}

#[test]
fn open_cursor_is_unreadable_after_session_close() {
    let engine = users_engine();
    let session = connect(&engine);
    let mut stmt = session
        .prepare("SELECT name FROM users WHERE id = ?", None)
        .expect("prepare");
    stmt.bind_value(0, 42).expect("bind");
    stmt.execute().expect("execute");
    session.close().expect("close");

    let err = stmt.fetch(FetchOrientation::Next, 0).unwrap_err();
    assert_eq!(err.code(), codes::SESSION_CLOSED);
    assert!(stmt.fetch_row().is_err());

    // The session took the native statement down with it
    drop(stmt);
    let stats = engine.stats();
    assert_eq!(stats.sessions_ended, 1);
    assert_eq!(stats.statements_ended, 0);
}
