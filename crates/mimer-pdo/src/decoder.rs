//! Column and output parameter decoding.
//!
//! The same getters serve result columns while a cursor is open and output
//! parameters after a direct execute; both decode through [`decode`].

use crate::diagnostics::{ErrorSlot, StatementScope};
use crate::lob::LobReader;
use crate::native::{NativeClient, read_sized};
use mimer_pdo_core::{
    ColumnData, ColumnRequest, ConversionErrorKind, Error, Result, SqlType, TypeFamily, Value,
};

/// Decode the value at a 1-based native position.
///
/// Null is checked first, so a NULL of any type decodes to [`Value::Null`]
/// and never to a zero, empty or false value. LOB positions honor
/// `request`; every other type is returned as a value.
pub(crate) fn decode<'st, C: NativeClient>(
    scope: StatementScope<'st, C>,
    errors: &'st ErrorSlot,
    position: i16,
    sql_type: SqlType,
    request: ColumnRequest,
    chunk_size: usize,
) -> Result<ColumnData<LobReader<'st, C>>> {
    let client = scope.client;
    let handle = scope.handle;

    if scope.check(client.is_null(handle, position))? {
        return Ok(ColumnData::Value(Value::Null));
    }

    let value = match sql_type.family() {
        TypeFamily::Int32 => {
            let v = scope.check(client.get_int32(handle, position))?;
            if sql_type == SqlType::SmallInt {
                let v = i16::try_from(v).map_err(|_| {
                    Error::conversion(ConversionErrorKind::Overflow, "SMALLINT", v.to_string())
                })?;
                Value::SmallInt(v)
            } else {
                Value::Int(v)
            }
        }
        TypeFamily::Int64 => Value::BigInt(scope.check(client.get_int64(handle, position))?),
        TypeFamily::Boolean => Value::Bool(scope.check(client.get_boolean(handle, position))?),
        TypeFamily::Real => Value::Float(scope.check(client.get_float(handle, position))?),
        TypeFamily::Double => Value::Double(scope.check(client.get_double(handle, position))?),
        TypeFamily::Binary => Value::Bytes(scope.check(read_sized(|buf| {
            client.get_binary(handle, position, buf)
        }))?),
        TypeFamily::Decimal => Value::Decimal(read_text(scope, position)?),
        TypeFamily::Character => Value::Text(read_text(scope, position)?),
        TypeFamily::Datetime => {
            let text = read_text(scope, position)?;
            match sql_type {
                SqlType::Date => Value::Date(text),
                SqlType::Time => Value::Time(text),
                _ => Value::Timestamp(text),
            }
        }
        TypeFamily::Interval => Value::Interval(read_text(scope, position)?),
        TypeFamily::Blob | TypeFamily::Clob | TypeFamily::NClob => {
            let (size, lob) = scope.check(client.get_lob(handle, position))?;
            let character = sql_type.is_character_lob();
            tracing::trace!(position, size, character, "LOB column opened");
            let reader = LobReader::new(scope, errors, lob, size, character, chunk_size);
            if request == ColumnRequest::Stream {
                return Ok(ColumnData::Stream(reader));
            }
            if character {
                Value::Text(reader.read_all_string()?)
            } else {
                Value::Bytes(reader.read_all()?)
            }
        }
    };

    tracing::trace!(position, sql_type = sql_type.sql_name(), "decoded value");
    Ok(ColumnData::Value(value))
}

/// [`decode`] with the value fully materialized.
pub(crate) fn decode_value<C: NativeClient>(
    scope: StatementScope<'_, C>,
    errors: &ErrorSlot,
    position: i16,
    sql_type: SqlType,
    chunk_size: usize,
) -> Result<Value> {
    let data = decode(scope, errors, position, sql_type, ColumnRequest::Value, chunk_size)?;
    Ok(data.into_value().unwrap_or(Value::Null))
}

fn read_text<C: NativeClient>(scope: StatementScope<'_, C>, position: i16) -> Result<String> {
    let bytes = scope.check(read_sized(|buf| {
        scope.client.get_string(scope.handle, position, buf)
    }))?;
    String::from_utf8(bytes).map_err(|e| {
        Error::encoding(
            e.utf8_error().valid_up_to() as u64,
            format!("column {} is not valid UTF-8", position),
        )
    })
}
