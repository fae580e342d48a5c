//! Standardized five-character SQLSTATE codes.
//!
//! Native client return codes are reported to callers as one of the states
//! below. The set mirrors the SQL standard / ODBC classes a database-access
//! framework expects to see; anything the translator cannot place falls back
//! to [`SqlState::GENERAL_ERROR`].

use serde::{Serialize, Serializer};
use std::fmt;

/// A validated SQLSTATE: exactly five ASCII alphanumeric characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SqlState([u8; 5]);

impl SqlState {
    pub const SUCCESSFUL_COMPLETION: SqlState = SqlState(*b"00000");
    pub const WARNING: SqlState = SqlState(*b"01000");
    pub const DISCONNECT_ERROR: SqlState = SqlState(*b"01002");
    pub const STRING_DATA_RIGHT_TRUNCATION_WARNING: SqlState = SqlState(*b"01004");
    pub const NO_DATA: SqlState = SqlState(*b"02000");
    pub const DYNAMIC_SQL_ERROR: SqlState = SqlState(*b"07000");
    pub const USING_CLAUSE_DOES_NOT_MATCH_PARAMETERS: SqlState = SqlState(*b"07001");
    pub const CURSOR_SPECIFICATION_CANNOT_BE_EXECUTED: SqlState = SqlState(*b"07003");
    pub const PREPARED_STATEMENT_NOT_A_CURSOR_SPECIFICATION: SqlState = SqlState(*b"07005");
    pub const RESTRICTED_DATA_TYPE_ATTRIBUTE_VIOLATION: SqlState = SqlState(*b"07006");
    pub const INVALID_DESCRIPTOR_INDEX: SqlState = SqlState(*b"07009");
    pub const CONNECTION_EXCEPTION: SqlState = SqlState(*b"08000");
    pub const CLIENT_UNABLE_TO_ESTABLISH_CONNECTION: SqlState = SqlState(*b"08001");
    pub const CONNECTION_DOES_NOT_EXIST: SqlState = SqlState(*b"08003");
    pub const SERVER_REJECTED_THE_CONNECTION: SqlState = SqlState(*b"08004");
    pub const CONNECTION_FAILURE: SqlState = SqlState(*b"08006");
    pub const COMMUNICATION_LINK_FAILURE: SqlState = SqlState(*b"08S01");
    pub const FEATURE_NOT_SUPPORTED: SqlState = SqlState(*b"0A000");
    pub const CARDINALITY_VIOLATION: SqlState = SqlState(*b"21000");
    pub const DATA_EXCEPTION: SqlState = SqlState(*b"22000");
    pub const STRING_DATA_RIGHT_TRUNCATION: SqlState = SqlState(*b"22001");
    pub const NUMERIC_VALUE_OUT_OF_RANGE: SqlState = SqlState(*b"22003");
    pub const ERROR_IN_ASSIGNMENT: SqlState = SqlState(*b"22005");
    pub const INVALID_DATETIME_FORMAT: SqlState = SqlState(*b"22007");
    pub const DATETIME_FIELD_OVERFLOW: SqlState = SqlState(*b"22008");
    pub const DIVISION_BY_ZERO: SqlState = SqlState(*b"22012");
    pub const INVALID_CHARACTER_VALUE_FOR_CAST: SqlState = SqlState(*b"22018");
    pub const INVALID_PARAMETER_VALUE: SqlState = SqlState(*b"22023");
    pub const STRING_DATA_LENGTH_MISMATCH: SqlState = SqlState(*b"22026");
    pub const NONCHARACTER_IN_UCS_STRING: SqlState = SqlState(*b"22029");
    pub const INTEGRITY_CONSTRAINT_VIOLATION: SqlState = SqlState(*b"23000");
    pub const INVALID_CURSOR_STATE: SqlState = SqlState(*b"24000");
    pub const INVALID_TRANSACTION_STATE: SqlState = SqlState(*b"25000");
    pub const READ_ONLY_SQL_TRANSACTION: SqlState = SqlState(*b"25006");
    pub const INVALID_SQL_STATEMENT_NAME: SqlState = SqlState(*b"26000");
    pub const INVALID_AUTHORIZATION_SPECIFICATION: SqlState = SqlState(*b"28000");
    pub const INVALID_CURSOR_NAME: SqlState = SqlState(*b"34000");
    pub const TRANSACTION_ROLLBACK: SqlState = SqlState(*b"40000");
    pub const SERIALIZATION_FAILURE: SqlState = SqlState(*b"40001");
    pub const SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION: SqlState = SqlState(*b"42000");
    pub const BASE_TABLE_OR_VIEW_ALREADY_EXISTS: SqlState = SqlState(*b"42S01");
    pub const BASE_TABLE_OR_VIEW_NOT_FOUND: SqlState = SqlState(*b"42S02");
    pub const COLUMN_NOT_FOUND: SqlState = SqlState(*b"42S22");
    pub const WITH_CHECK_OPTION_VIOLATION: SqlState = SqlState(*b"44000");
    pub const GENERAL_ERROR: SqlState = SqlState(*b"HY000");
    pub const MEMORY_ALLOCATION_ERROR: SqlState = SqlState(*b"HY001");
    pub const INVALID_SQL_DATA_TYPE: SqlState = SqlState(*b"HY004");
    pub const ASSOCIATED_STATEMENT_IS_NOT_PREPARED: SqlState = SqlState(*b"HY007");
    pub const OPERATION_CANCELED: SqlState = SqlState(*b"HY008");
    pub const FUNCTION_SEQUENCE_ERROR: SqlState = SqlState(*b"HY010");
    pub const ATTRIBUTE_CANNOT_BE_SET_NOW: SqlState = SqlState(*b"HY011");
    pub const LIMIT_ON_NUMBER_OF_HANDLES_EXCEEDED: SqlState = SqlState(*b"HY014");
    pub const INVALID_ATTRIBUTE_VALUE: SqlState = SqlState(*b"HY024");
    pub const INVALID_STRING_OR_BUFFER_LENGTH: SqlState = SqlState(*b"HY090");
    pub const INVALID_ATTRIBUTE_OPTION_IDENTIFIER: SqlState = SqlState(*b"HY092");
    pub const INVALID_PARAMETER_NUMBER: SqlState = SqlState(*b"HY093");
    pub const INVALID_PARAMETER_TYPE: SqlState = SqlState(*b"HY105");
    pub const FETCH_TYPE_OUT_OF_RANGE: SqlState = SqlState(*b"HY106");
    pub const ROW_VALUE_OUT_OF_RANGE: SqlState = SqlState(*b"HY107");
    pub const INVALID_CURSOR_POSITION: SqlState = SqlState(*b"HY109");
    pub const OPTIONAL_FEATURE_NOT_IMPLEMENTED: SqlState = SqlState(*b"HYC00");
    pub const TIMEOUT_EXPIRED: SqlState = SqlState(*b"HYT00");
    pub const DRIVER_DOES_NOT_SUPPORT_FUNCTION: SqlState = SqlState(*b"IM001");

    /// Parse a SQLSTATE from text, rejecting anything that is not five ASCII
    /// alphanumerics.
    pub fn new(code: &str) -> Option<Self> {
        let bytes: [u8; 5] = code.as_bytes().try_into().ok()?;
        if bytes.iter().all(u8::is_ascii_alphanumeric) {
            Some(SqlState(bytes.map(|b| b.to_ascii_uppercase())))
        } else {
            None
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII, so this cannot fail.
        std::str::from_utf8(&self.0).unwrap_or("HY000")
    }

    /// The two-character class prefix (e.g. `"22"` for data exceptions).
    pub fn class(&self) -> &str {
        &self.as_str()[..2]
    }

    pub fn is_success(&self) -> bool {
        self.class() == "00"
    }

    pub fn is_warning(&self) -> bool {
        self.class() == "01"
    }

    pub fn is_no_data(&self) -> bool {
        self.class() == "02"
    }
}

impl Default for SqlState {
    fn default() -> Self {
        SqlState::GENERAL_ERROR
    }
}

impl fmt::Debug for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SqlState({})", self.as_str())
    }
}

impl fmt::Display for SqlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SqlState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let state = SqlState::new("42s02").unwrap();
        assert_eq!(state, SqlState::BASE_TABLE_OR_VIEW_NOT_FOUND);
        assert_eq!(state.as_str(), "42S02");
        assert_eq!(state.class(), "42");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        assert!(SqlState::new("4200").is_none());
        assert!(SqlState::new("420000").is_none());
        assert!(SqlState::new("42-00").is_none());
        assert!(SqlState::new("").is_none());
    }

    #[test]
    fn test_classes() {
        assert!(SqlState::SUCCESSFUL_COMPLETION.is_success());
        assert!(SqlState::WARNING.is_warning());
        assert!(SqlState::NO_DATA.is_no_data());
        assert!(!SqlState::GENERAL_ERROR.is_success());
        assert_eq!(SqlState::default(), SqlState::GENERAL_ERROR);
    }

    #[test]
    fn test_display_and_debug() {
        assert_eq!(SqlState::FUNCTION_SEQUENCE_ERROR.to_string(), "HY010");
        assert_eq!(
            format!("{:?}", SqlState::NUMERIC_VALUE_OUT_OF_RANGE),
            "SqlState(22003)"
        );
    }
}
