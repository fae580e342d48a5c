//! Parameter binding.
//!
//! Values are converted according to the native type family of the target
//! parameter, queried from the statement before any conversion:
//!
//! | Family | Accepted values | Native setter |
//! |--------|-----------------|---------------|
//! | int32, int64 | integers, bool, integral floats, numeric text | range-checked integer |
//! | boolean | bool, integers, `true`/`false`/`1`/`0` text | boolean |
//! | real, double | any numeric, numeric text | float / double |
//! | binary | bytes, text | binary with explicit length |
//! | character, decimal, datetime, interval | anything with a text form | UTF-8 string |
//! | BLOB, CLOB, NCLOB | in-memory bytes / text, or a stream | direct set, or chunked LOB |
//!
//! NULL is bound with the null setter for every type.

use crate::diagnostics::StatementScope;
use crate::lob::{self, Chunk, ChunkSource};
use crate::native::NativeClient;
use mimer_pdo_core::{
    ConversionErrorKind, Error, LobStream, ResourceErrorKind, Result, SqlType, TypeFamily, Value,
};

/// Convert a 0-based caller index to a 1-based native position.
///
/// Positions past the native 16-bit limit are rejected, never truncated.
pub fn native_position(index: usize) -> Result<i16> {
    index
        .checked_add(1)
        .and_then(|p| i16::try_from(p).ok())
        .ok_or_else(|| {
            Error::resource(
                ResourceErrorKind::ParameterIndexOutOfRange,
                format!(
                    "parameter index {} exceeds the native limit of {} parameters",
                    index,
                    i16::MAX
                ),
            )
        })
}

/// Write an in-memory value to a parameter.
pub(crate) fn write_value<C: NativeClient>(
    scope: StatementScope<'_, C>,
    position: i16,
    sql_type: SqlType,
    value: &Value,
) -> Result<()> {
    let client = scope.client;
    let handle = scope.handle;

    if value.is_null() {
        tracing::trace!(position, "binding NULL");
        return scope.check(client.set_null(handle, position));
    }

    tracing::trace!(
        position,
        sql_type = sql_type.sql_name(),
        value_type = value.type_name(),
        "binding value"
    );

    match sql_type.family() {
        TypeFamily::Int32 => {
            let v = to_integer(value, sql_type)?;
            let narrowed = if sql_type == SqlType::SmallInt {
                i16::try_from(v).map(i32::from).ok()
            } else {
                i32::try_from(v).ok()
            };
            let v = narrowed.ok_or_else(|| {
                Error::conversion(ConversionErrorKind::Overflow, sql_type.sql_name(), v.to_string())
            })?;
            scope.check(client.set_int32(handle, position, v))
        }
        TypeFamily::Int64 => {
            let v = to_integer(value, sql_type)?;
            scope.check(client.set_int64(handle, position, v))
        }
        TypeFamily::Boolean => {
            let v = to_bool(value)?;
            scope.check(client.set_boolean(handle, position, v))
        }
        TypeFamily::Real => {
            let v = to_float(value, sql_type)?;
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                return Err(Error::conversion(
                    ConversionErrorKind::Overflow,
                    "REAL",
                    v.to_string(),
                ));
            }
            #[allow(clippy::cast_possible_truncation)]
            let v = v as f32;
            scope.check(client.set_float(handle, position, v))
        }
        TypeFamily::Double => {
            let v = to_float(value, sql_type)?;
            scope.check(client.set_double(handle, position, v))
        }
        TypeFamily::Binary | TypeFamily::Blob => {
            let bytes = to_bytes(value, sql_type)?;
            scope.check(client.set_binary(handle, position, bytes))
        }
        TypeFamily::Character
        | TypeFamily::Decimal
        | TypeFamily::Datetime
        | TypeFamily::Interval
        | TypeFamily::Clob
        | TypeFamily::NClob => {
            let text = to_text(value, sql_type)?;
            scope.check(client.set_string(handle, position, &text))
        }
    }
}

/// Write a streamed source to a parameter.
///
/// LOB parameters get a native LOB handle sized to the remaining source
/// (bytes for BLOB, characters for CLOB/NCLOB) and are filled in chunks of
/// at most `chunk_size` bytes. Other types read the source into memory and
/// bind it as bytes or text.
pub(crate) fn write_stream<C: NativeClient>(
    scope: StatementScope<'_, C>,
    position: i16,
    sql_type: SqlType,
    stream: &mut LobStream,
    chunk_size: usize,
) -> Result<()> {
    let source = stream.get_mut();

    if !sql_type.is_lob() {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        let value = if sql_type.family() == TypeFamily::Binary {
            Value::Bytes(data)
        } else {
            Value::Text(String::from_utf8(data).map_err(|e| {
                Error::encoding(
                    e.utf8_error().valid_up_to() as u64,
                    "stream bound to a character parameter is not valid UTF-8",
                )
            })?)
        };
        return write_value(scope, position, sql_type, &value);
    }

    let character = sql_type.is_character_lob();
    let size = if character {
        lob::remaining_characters(source, chunk_size)?
    } else {
        lob::remaining_bytes(source)?
    };

    let client = scope.client;
    let mut handle = scope.check(client.set_lob(scope.handle, position, size))?;

    let mut chunks = ChunkSource::new(source, chunk_size, character);
    let mut count = 0usize;
    let mut bytes = 0u64;
    while let Some(chunk) = chunks.next_chunk()? {
        bytes += chunk.len() as u64;
        count += 1;
        let written = match chunk {
            Chunk::Binary(data) => client.set_blob_data(&mut handle, data),
            Chunk::Text(text) => client.set_nclob_data(&mut handle, text),
        };
        scope.check(written)?;
    }

    tracing::debug!(position, size, bytes, chunks = count, character, "LOB parameter streamed");
    Ok(())
}

fn to_integer(value: &Value, sql_type: SqlType) -> Result<i64> {
    let out_of_range =
        || Error::conversion(ConversionErrorKind::Overflow, sql_type.sql_name(), value_text(value));
    match value {
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::SmallInt(v) => Ok(i64::from(*v)),
        Value::Int(v) => Ok(i64::from(*v)),
        Value::BigInt(v) => Ok(*v),
        Value::Float(v) => float_to_integer(f64::from(*v)).ok_or_else(out_of_range),
        Value::Double(v) => float_to_integer(*v).ok_or_else(out_of_range),
        Value::Text(s) | Value::Decimal(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i64>() {
                return Ok(v);
            }
            match s.parse::<f64>() {
                Ok(f) if f.is_finite() && f.fract() == 0.0 => {
                    float_to_integer(f).ok_or_else(out_of_range)
                }
                _ => Err(invalid(sql_type, value)),
            }
        }
        _ => Err(invalid(sql_type, value)),
    }
}

/// Integral floats in i64 range; fractional values are rejected.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_to_integer(v: f64) -> Option<i64> {
    if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::SmallInt(_) | Value::Int(_) | Value::BigInt(_) => {
            Ok(value.as_i64().is_some_and(|v| v != 0))
        }
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(invalid(SqlType::Boolean, value)),
        },
        _ => Err(invalid(SqlType::Boolean, value)),
    }
}

fn to_float(value: &Value, sql_type: SqlType) -> Result<f64> {
    match value {
        Value::Bytes(_) | Value::Date(_) | Value::Time(_) | Value::Timestamp(_)
        | Value::Interval(_) => Err(invalid(sql_type, value)),
        Value::Text(s) => s.trim().parse().map_err(|_| invalid(sql_type, value)),
        _ => value.as_f64().ok_or_else(|| invalid(sql_type, value)),
    }
}

fn to_bytes(value: &Value, sql_type: SqlType) -> Result<&[u8]> {
    match value {
        Value::Bytes(b) => Ok(b),
        Value::Text(s) => Ok(s.as_bytes()),
        _ => Err(invalid(sql_type, value)),
    }
}

fn to_text(value: &Value, sql_type: SqlType) -> Result<String> {
    if let Value::Bytes(b) = value {
        return String::from_utf8(b.clone()).map_err(|e| {
            Error::encoding(
                e.utf8_error().valid_up_to() as u64,
                format!("bytes bound to a {} parameter are not valid UTF-8", sql_type.sql_name()),
            )
        });
    }
    value.to_sql_text().ok_or_else(|| invalid(sql_type, value))
}

fn invalid(sql_type: SqlType, value: &Value) -> Error {
    Error::conversion(ConversionErrorKind::InvalidValue, sql_type.sql_name(), value_text(value))
}

fn value_text(value: &Value) -> String {
    value
        .to_sql_text()
        .map_or_else(|| value.type_name().to_string(), |s| format!("{} '{}'", value.type_name(), s))
}
