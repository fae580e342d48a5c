//! SQL type definitions and mapping.

use serde::{Deserialize, Serialize};

/// Column and parameter types the native client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    // Integer types
    SmallInt,
    Integer,
    BigInt,

    // Floating point
    Real,
    Double,

    // Fixed precision
    Decimal,

    // Boolean
    Boolean,

    // String types
    Char,
    VarChar,
    NChar,
    NVarChar,

    // Binary types
    Binary,
    VarBinary,

    // Date/time types
    Date,
    Time,
    Timestamp,
    Interval,

    // Large objects
    Blob,
    Clob,
    NClob,
}

/// The conversion path a value takes through the binder and decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Int32,
    Int64,
    Boolean,
    Real,
    Double,
    Decimal,
    Character,
    Binary,
    Datetime,
    Interval,
    Blob,
    Clob,
    NClob,
}

impl SqlType {
    /// Get the SQL type name for this type.
    pub const fn sql_name(&self) -> &'static str {
        match self {
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Decimal => "DECIMAL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Char => "CHARACTER",
            SqlType::VarChar => "CHARACTER VARYING",
            SqlType::NChar => "NATIONAL CHARACTER",
            SqlType::NVarChar => "NATIONAL CHARACTER VARYING",
            SqlType::Binary => "BINARY",
            SqlType::VarBinary => "BINARY VARYING",
            SqlType::Date => "DATE",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Interval => "INTERVAL",
            SqlType::Blob => "BINARY LARGE OBJECT",
            SqlType::Clob => "CHARACTER LARGE OBJECT",
            SqlType::NClob => "NATIONAL CHARACTER LARGE OBJECT",
        }
    }

    pub const fn family(&self) -> TypeFamily {
        match self {
            SqlType::SmallInt | SqlType::Integer => TypeFamily::Int32,
            SqlType::BigInt => TypeFamily::Int64,
            SqlType::Real => TypeFamily::Real,
            SqlType::Double => TypeFamily::Double,
            SqlType::Decimal => TypeFamily::Decimal,
            SqlType::Boolean => TypeFamily::Boolean,
            SqlType::Char | SqlType::VarChar | SqlType::NChar | SqlType::NVarChar => {
                TypeFamily::Character
            }
            SqlType::Binary | SqlType::VarBinary => TypeFamily::Binary,
            SqlType::Date | SqlType::Time | SqlType::Timestamp => TypeFamily::Datetime,
            SqlType::Interval => TypeFamily::Interval,
            SqlType::Blob => TypeFamily::Blob,
            SqlType::Clob => TypeFamily::Clob,
            SqlType::NClob => TypeFamily::NClob,
        }
    }

    /// Check if this is an exact or approximate numeric type.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal
        )
    }

    pub const fn is_lob(&self) -> bool {
        matches!(self, SqlType::Blob | SqlType::Clob | SqlType::NClob)
    }

    /// Character LOBs are sized and chunked by character, not byte.
    pub const fn is_character_lob(&self) -> bool {
        matches!(self, SqlType::Clob | SqlType::NClob)
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::Timestamp | SqlType::Interval
        )
    }
}

/// Whether a column admits NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Nullability {
    Nullable,
    NoNulls,
    #[default]
    Unknown,
}

/// Direction of a statement parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamMode {
    #[default]
    Input,
    Output,
    InOut,
}

impl ParamMode {
    /// Is the parameter's value sent to the engine before execution?
    pub const fn is_input(&self) -> bool {
        matches!(self, ParamMode::Input | ParamMode::InOut)
    }

    /// Is the parameter's value read back after execution?
    pub const fn is_output(&self) -> bool {
        matches!(self, ParamMode::Output | ParamMode::InOut)
    }
}

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    /// 0-based position as seen by the caller
    pub index: usize,
    pub name: String,
    pub sql_type: SqlType,
    pub nullability: Nullability,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(SqlType::SmallInt.family(), TypeFamily::Int32);
        assert_eq!(SqlType::BigInt.family(), TypeFamily::Int64);
        assert_eq!(SqlType::NVarChar.family(), TypeFamily::Character);
        assert_eq!(SqlType::Timestamp.family(), TypeFamily::Datetime);
        assert_eq!(SqlType::NClob.family(), TypeFamily::NClob);
    }

    #[test]
    fn test_lob_predicates() {
        assert!(SqlType::Blob.is_lob());
        assert!(!SqlType::Blob.is_character_lob());
        assert!(SqlType::Clob.is_character_lob());
        assert!(!SqlType::VarChar.is_lob());
    }

    #[test]
    fn test_param_mode() {
        assert!(ParamMode::Input.is_input());
        assert!(!ParamMode::Input.is_output());
        assert!(!ParamMode::Output.is_input());
        assert!(ParamMode::InOut.is_input() && ParamMode::InOut.is_output());
    }

    #[test]
    fn test_sql_names() {
        assert_eq!(SqlType::Double.sql_name(), "DOUBLE PRECISION");
        assert!(SqlType::Decimal.is_numeric());
        assert!(SqlType::Interval.is_temporal());
    }
}
