use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::rc::Rc;

use mimer_pdo::{MemoryEngine, MimerConfig, Session, StatementDef};
use mimer_pdo_core::{
    ColumnData, ColumnRequest, Error, FetchOrientation, ParamValue, SqlType, Value,
};

/// Engine with `INSERT INTO docs VALUES (?)` for the given LOB type; the
/// stored value lands in the returned cell.
fn docs_engine(sql_type: SqlType) -> (MemoryEngine, Rc<RefCell<Value>>) {
    let engine = MemoryEngine::new();
    let stored = Rc::new(RefCell::new(Value::Null));
    let sink = Rc::clone(&stored);
    engine.define(
        StatementDef::update("INSERT INTO docs VALUES (?)")
            .param(sql_type)
            .run(move |params| {
                *sink.borrow_mut() = params[0].clone();
                Ok(1)
            }),
    );
    (engine, stored)
}

fn connect(engine: &MemoryEngine, chunk_size: usize) -> Session<MemoryEngine> {
    let config = MimerConfig::new().lob_chunk_size(chunk_size);
    Session::connect(engine.clone(), &config).expect("connect to memory engine")
}

#[test]
fn clob_stream_is_written_in_chunks() {
    let (engine, stored) = docs_engine(SqlType::Clob);
    let session = connect(&engine, 8192);
    let text = "x".repeat(20_000);

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    stmt.bind(0, ParamValue::stream(Cursor::new(text.clone().into_bytes())))
        .expect("bind stream");
    stmt.execute().expect("execute");

    assert_eq!(engine.lob_writes(), vec![vec![8192, 8192, 3616]]);
    assert_eq!(*stored.borrow(), Value::Text(text));
}

#[test]
fn clob_chunks_never_split_a_character() {
    let (engine, stored) = docs_engine(SqlType::NClob);
    let session = connect(&engine, 5);
    let text = "😀🎉🚀";

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    stmt.bind(0, ParamValue::stream(Cursor::new(text.as_bytes().to_vec())))
        .expect("bind stream");
    stmt.execute().expect("execute");

    assert_eq!(engine.lob_writes(), vec![vec![4, 4, 4]]);
    assert_eq!(*stored.borrow(), Value::Text(text.to_string()));
}

#[test]
fn blob_stream_is_written_in_byte_chunks() {
    let (engine, stored) = docs_engine(SqlType::Blob);
    let session = connect(&engine, 5);
    let data: Vec<u8> = (0u8..12).collect();

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    stmt.bind(0, ParamValue::stream(Cursor::new(data.clone())))
        .expect("bind stream");
    stmt.execute().expect("execute");

    assert_eq!(engine.lob_writes(), vec![vec![5, 5, 2]]);
    assert_eq!(*stored.borrow(), Value::Bytes(data));
}

#[test]
fn stream_starts_at_its_current_position() {
    let (engine, stored) = docs_engine(SqlType::Blob);
    let session = connect(&engine, 8192);
    let mut source = Cursor::new(b"headerpayload".to_vec());
    source.set_position(6);

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    stmt.bind(0, ParamValue::stream(source)).expect("bind stream");
    stmt.execute().expect("execute");

    assert_eq!(*stored.borrow(), Value::Bytes(b"payload".to_vec()));
}

#[test]
fn invalid_utf8_in_clob_stream_reports_offset() {
    let (engine, _) = docs_engine(SqlType::Clob);
    let session = connect(&engine, 8192);

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    let err = stmt
        .bind(0, ParamValue::stream(Cursor::new(b"abcd\xffxyz".to_vec())))
        .unwrap_err();
    assert!(matches!(err, Error::Encoding(ref e) if e.offset == 4));
    assert_eq!(err.sqlstate().as_str(), "22029");
}

#[test]
fn stream_bound_to_character_column_is_read_whole() {
    let (engine, stored) = docs_engine(SqlType::VarChar);
    let session = connect(&engine, 4);

    let mut stmt = session
        .prepare("INSERT INTO docs VALUES (?)", None)
        .expect("prepare");
    stmt.bind(0, ParamValue::stream(Cursor::new("short text".as_bytes().to_vec())))
        .expect("bind stream");
    stmt.execute().expect("execute");

    assert!(engine.lob_writes().is_empty());
    assert_eq!(*stored.borrow(), Value::Text("short text".into()));
}

fn lob_query_engine() -> MemoryEngine {
    let engine = MemoryEngine::new();
    engine.define(
        StatementDef::query("SELECT body, image FROM docs")
            .column("BODY", SqlType::Clob)
            .column("IMAGE", SqlType::Blob)
            .rows(|_| {
                Ok(vec![vec![
                    Value::Text("héllo wörld ✓".into()),
                    Value::Bytes((0u8..=255).collect()),
                ]])
            }),
    );
    engine
}

#[test]
fn lob_columns_can_be_streamed() {
    let engine = lob_query_engine();
    let session = connect(&engine, 5);
    let mut stmt = session.prepare("SELECT body, image FROM docs", None).expect("prepare");
    stmt.execute().expect("execute");
    assert!(stmt.fetch(FetchOrientation::Next, 0).expect("fetch"));

    let ColumnData::Stream(mut reader) = stmt
        .get_column(0, ColumnRequest::Stream)
        .expect("body column")
    else {
        panic!("expected a stream for a CLOB column");
    };
    assert!(reader.is_character());
    assert_eq!(reader.size(), 13);
    let mut body = String::new();
    reader.read_to_string(&mut body).expect("read body");
    assert_eq!(body, "héllo wörld ✓");

    let ColumnData::Stream(mut reader) = stmt
        .get_column(1, ColumnRequest::Stream)
        .expect("image column")
    else {
        panic!("expected a stream for a BLOB column");
    };
    let mut image = Vec::new();
    reader.read_to_end(&mut image).expect("read image");
    assert_eq!(image.len(), 256);
    assert_eq!(image[255], 255);
}

#[test]
fn lob_columns_materialize_by_default() {
    let engine = lob_query_engine();
    let session = connect(&engine, 3);
    let mut stmt = session.prepare("SELECT body, image FROM docs", None).expect("prepare");
    stmt.execute().expect("execute");
    assert!(stmt.fetch(FetchOrientation::Next, 0).expect("fetch"));

    let row = stmt.fetch_row().expect("row");
    assert_eq!(row.get_named::<String>("BODY").expect("body"), "héllo wörld ✓");
    assert_eq!(row.get_named::<Vec<u8>>("IMAGE").expect("image").len(), 256);
}
