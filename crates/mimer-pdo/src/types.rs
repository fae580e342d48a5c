//! Native type codes and their mapping onto [`SqlType`].
//!
//! Column and parameter type queries return the client library's numeric
//! type code. Integer and floating point types come in a nullable and a
//! not-null variant; every other code leaves nullability unknown.

use mimer_pdo_core::{Nullability, SqlType};

pub const MIMER_CHARACTER: i32 = 1;
pub const MIMER_DECIMAL: i32 = 2;
pub const MIMER_INTEGER: i32 = 3;
pub const MIMER_FLOAT: i32 = 4;
pub const MIMER_T_INTEGER: i32 = 6;
pub const MIMER_T_SMALLINT: i32 = 7;
pub const MIMER_T_FLOAT: i32 = 8;
pub const MIMER_T_REAL: i32 = 9;
pub const MIMER_T_DOUBLE: i32 = 10;
pub const MIMER_CHARACTER_VARYING: i32 = 11;
pub const MIMER_DATE: i32 = 12;
pub const MIMER_TIME: i32 = 13;
pub const MIMER_TIMESTAMP: i32 = 14;
pub const MIMER_INTERVAL_YEAR: i32 = 15;
pub const MIMER_INTERVAL_MINUTE_TO_SECOND: i32 = 27;
pub const MIMER_NCHAR: i32 = 28;
pub const MIMER_NCHAR_VARYING: i32 = 29;
pub const MIMER_BINARY: i32 = 34;
pub const MIMER_BINARY_VARYING: i32 = 35;
pub const MIMER_BOOLEAN: i32 = 42;
pub const MIMER_T_BIGINT: i32 = 52;
pub const MIMER_BLOB: i32 = 57;
pub const MIMER_CLOB: i32 = 58;
pub const MIMER_NCLOB: i32 = 59;
pub const MIMER_NATIVE_SMALLINT_NULLABLE: i32 = 60;
pub const MIMER_NATIVE_SMALLINT: i32 = 61;
pub const MIMER_NATIVE_INTEGER_NULLABLE: i32 = 62;
pub const MIMER_NATIVE_INTEGER: i32 = 63;
pub const MIMER_NATIVE_BIGINT_NULLABLE: i32 = 64;
pub const MIMER_NATIVE_BIGINT: i32 = 65;
pub const MIMER_NATIVE_REAL_NULLABLE: i32 = 66;
pub const MIMER_NATIVE_REAL: i32 = 67;
pub const MIMER_NATIVE_DOUBLE_NULLABLE: i32 = 68;
pub const MIMER_NATIVE_DOUBLE: i32 = 69;

/// Resolve a native type code; `None` for codes the driver does not know.
pub fn from_native(code: i32) -> Option<(SqlType, Nullability)> {
    use Nullability::{NoNulls, Nullable, Unknown};

    let mapped = match code {
        MIMER_CHARACTER => (SqlType::Char, Unknown),
        MIMER_CHARACTER_VARYING => (SqlType::VarChar, Unknown),
        MIMER_NCHAR => (SqlType::NChar, Unknown),
        MIMER_NCHAR_VARYING => (SqlType::NVarChar, Unknown),
        MIMER_DECIMAL => (SqlType::Decimal, Unknown),
        // INTEGER(p) may exceed 32 bits
        MIMER_INTEGER | MIMER_T_BIGINT => (SqlType::BigInt, Unknown),
        MIMER_T_INTEGER => (SqlType::Integer, Unknown),
        MIMER_T_SMALLINT => (SqlType::SmallInt, Unknown),
        MIMER_FLOAT | MIMER_T_FLOAT | MIMER_T_DOUBLE => (SqlType::Double, Unknown),
        MIMER_T_REAL => (SqlType::Real, Unknown),
        MIMER_DATE => (SqlType::Date, Unknown),
        MIMER_TIME => (SqlType::Time, Unknown),
        MIMER_TIMESTAMP => (SqlType::Timestamp, Unknown),
        MIMER_INTERVAL_YEAR..=MIMER_INTERVAL_MINUTE_TO_SECOND => (SqlType::Interval, Unknown),
        MIMER_BINARY => (SqlType::Binary, Unknown),
        MIMER_BINARY_VARYING => (SqlType::VarBinary, Unknown),
        MIMER_BOOLEAN => (SqlType::Boolean, Unknown),
        MIMER_BLOB => (SqlType::Blob, Unknown),
        MIMER_CLOB => (SqlType::Clob, Unknown),
        MIMER_NCLOB => (SqlType::NClob, Unknown),
        MIMER_NATIVE_SMALLINT_NULLABLE => (SqlType::SmallInt, Nullable),
        MIMER_NATIVE_SMALLINT => (SqlType::SmallInt, NoNulls),
        MIMER_NATIVE_INTEGER_NULLABLE => (SqlType::Integer, Nullable),
        MIMER_NATIVE_INTEGER => (SqlType::Integer, NoNulls),
        MIMER_NATIVE_BIGINT_NULLABLE => (SqlType::BigInt, Nullable),
        MIMER_NATIVE_BIGINT => (SqlType::BigInt, NoNulls),
        MIMER_NATIVE_REAL_NULLABLE => (SqlType::Real, Nullable),
        MIMER_NATIVE_REAL => (SqlType::Real, NoNulls),
        MIMER_NATIVE_DOUBLE_NULLABLE => (SqlType::Double, Nullable),
        MIMER_NATIVE_DOUBLE => (SqlType::Double, NoNulls),
        _ => return None,
    };
    Some(mapped)
}

/// The native code a column or parameter of `sql_type` reports.
pub fn to_native(sql_type: SqlType, nullability: Nullability) -> i32 {
    let nullable = !matches!(nullability, Nullability::NoNulls);
    match sql_type {
        SqlType::SmallInt if nullable => MIMER_NATIVE_SMALLINT_NULLABLE,
        SqlType::SmallInt => MIMER_NATIVE_SMALLINT,
        SqlType::Integer if nullable => MIMER_NATIVE_INTEGER_NULLABLE,
        SqlType::Integer => MIMER_NATIVE_INTEGER,
        SqlType::BigInt if nullable => MIMER_NATIVE_BIGINT_NULLABLE,
        SqlType::BigInt => MIMER_NATIVE_BIGINT,
        SqlType::Real if nullable => MIMER_NATIVE_REAL_NULLABLE,
        SqlType::Real => MIMER_NATIVE_REAL,
        SqlType::Double if nullable => MIMER_NATIVE_DOUBLE_NULLABLE,
        SqlType::Double => MIMER_NATIVE_DOUBLE,
        SqlType::Decimal => MIMER_DECIMAL,
        SqlType::Boolean => MIMER_BOOLEAN,
        SqlType::Char => MIMER_CHARACTER,
        SqlType::VarChar => MIMER_CHARACTER_VARYING,
        SqlType::NChar => MIMER_NCHAR,
        SqlType::NVarChar => MIMER_NCHAR_VARYING,
        SqlType::Binary => MIMER_BINARY,
        SqlType::VarBinary => MIMER_BINARY_VARYING,
        SqlType::Date => MIMER_DATE,
        SqlType::Time => MIMER_TIME,
        SqlType::Timestamp => MIMER_TIMESTAMP,
        SqlType::Interval => MIMER_INTERVAL_MINUTE_TO_SECOND,
        SqlType::Blob => MIMER_BLOB,
        SqlType::Clob => MIMER_CLOB,
        SqlType::NClob => MIMER_NCLOB,
    }
}
