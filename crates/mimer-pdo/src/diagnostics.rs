//! Native error translation.
//!
//! Every failed native call is turned into an [`ErrorDescriptor`] here: the
//! message comes from the client's own error lookup, the SQLSTATE from a
//! fixed table keyed on the native code.

use crate::native::{self, NativeClient, NativeHandle, NativeResult, read_sized_string};
use mimer_pdo_core::{Error, ErrorDescriptor, ErrorInfo, Result, SqlState};
use std::cell::RefCell;

/// SQLSTATE for a native return code; unmapped codes are general errors.
pub fn sqlstate_for(code: i32) -> SqlState {
    match code {
        native::SUCCESS => SqlState::SUCCESSFUL_COMPLETION,
        native::NO_DATA => SqlState::NO_DATA,
        native::SEQUENCE_ERROR => SqlState::FUNCTION_SEQUENCE_ERROR,
        native::CURSOR_NOT_OPEN => SqlState::INVALID_CURSOR_STATE,
        native::CURSOR_SPECIFICATION_EXECUTED => SqlState::CURSOR_SPECIFICATION_CANNOT_BE_EXECUTED,
        native::NOT_A_CURSOR_SPECIFICATION => {
            SqlState::PREPARED_STATEMENT_NOT_A_CURSOR_SPECIFICATION
        }
        native::VALUE_OUT_OF_RANGE => SqlState::NUMERIC_VALUE_OUT_OF_RANGE,
        native::INVALID_CHARACTER_VALUE => SqlState::INVALID_CHARACTER_VALUE_FOR_CAST,
        native::STRING_TRUNCATED => SqlState::STRING_DATA_RIGHT_TRUNCATION,
        native::PARAMETER_NOT_SET => SqlState::USING_CLAUSE_DOES_NOT_MATCH_PARAMETERS,
        native::INVALID_INDEX => SqlState::INVALID_DESCRIPTOR_INDEX,
        native::INCOMPATIBLE_TYPE => SqlState::RESTRICTED_DATA_TYPE_ATTRIBUTE_VIOLATION,
        native::LOB_SIZE_MISMATCH => SqlState::STRING_DATA_LENGTH_MISMATCH,
        native::INVALID_UTF8 => SqlState::NONCHARACTER_IN_UCS_STRING,
        native::SYNTAX_ERROR => SqlState::SYNTAX_ERROR_OR_ACCESS_RULE_VIOLATION,
        native::TABLE_NOT_FOUND => SqlState::BASE_TABLE_OR_VIEW_NOT_FOUND,
        native::TABLE_EXISTS => SqlState::BASE_TABLE_OR_VIEW_ALREADY_EXISTS,
        native::DUPLICATE_KEY => SqlState::INTEGRITY_CONSTRAINT_VIOLATION,
        native::TRANSACTION_CONFLICT => SqlState::SERIALIZATION_FAILURE,
        native::READ_ONLY_TRANSACTION => SqlState::READ_ONLY_SQL_TRANSACTION,
        native::DATABASE_NOT_FOUND => SqlState::CLIENT_UNABLE_TO_ESTABLISH_CONNECTION,
        native::LOGIN_FAILED => SqlState::INVALID_AUTHORIZATION_SPECIFICATION,
        -18599..=native::COMMUNICATION_FAILURE => SqlState::COMMUNICATION_LINK_FAILURE,
        _ => SqlState::GENERAL_ERROR,
    }
}

/// Build the descriptor for a failed native call on `handle`.
///
/// The message is fetched with the client's two-phase error lookup. If the
/// lookup itself fails, or reports nothing, a generic message naming the code
/// is used so a descriptor is always produced.
pub fn translate<C: NativeClient + ?Sized>(
    client: &C,
    handle: NativeHandle<'_, C>,
    code: i32,
) -> ErrorDescriptor {
    let message = read_sized_string(|buf| client.get_error(handle, buf).map(|(_, len)| len));
    let message = match message {
        Ok(m) if !m.is_empty() => m,
        Ok(_) => fallback_message(code),
        Err(lookup) => {
            tracing::warn!(code, lookup, "native error lookup failed");
            fallback_message(code)
        }
    };
    ErrorDescriptor::new(code, message, sqlstate_for(code))
}

/// Descriptor for a code when no handle is left to ask for its message.
pub fn describe_code(code: i32) -> ErrorDescriptor {
    ErrorDescriptor::new(code, fallback_message(code), sqlstate_for(code))
}

fn fallback_message(code: i32) -> String {
    format!("Mimer SQL error {}", code)
}

/// A native statement handle with the SQL text it was prepared from.
///
/// Turns native return codes into [`Error::Database`] values translated
/// against the statement handle.
pub(crate) struct StatementScope<'a, C: NativeClient> {
    pub client: &'a C,
    pub handle: &'a C::Statement,
    pub sql: &'a str,
}

impl<C: NativeClient> Clone for StatementScope<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C: NativeClient> Copy for StatementScope<'_, C> {}

impl<C: NativeClient> StatementScope<'_, C> {
    pub fn check<T>(&self, result: NativeResult<T>) -> Result<T> {
        result.map_err(|code| self.fail(code))
    }

    pub fn fail(&self, code: i32) -> Error {
        let descriptor = translate(self.client, NativeHandle::Statement(self.handle), code);
        Error::database(descriptor, Some(self.sql))
    }
}

/// The last error recorded on a session or statement.
///
/// Recording replaces (and drops) the previous descriptor.
#[derive(Debug, Default)]
pub struct ErrorSlot {
    last: RefCell<Option<ErrorDescriptor>>,
}

impl ErrorSlot {
    pub fn record(&self, descriptor: ErrorDescriptor) {
        *self.last.borrow_mut() = Some(descriptor);
    }

    pub fn clear(&self) {
        self.last.borrow_mut().take();
    }

    pub fn get(&self) -> Option<ErrorDescriptor> {
        self.last.borrow().clone()
    }

    pub fn info(&self) -> Option<ErrorInfo> {
        self.last.borrow().as_ref().map(ErrorInfo::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lookups() {
        assert_eq!(sqlstate_for(native::LOGIN_FAILED).as_str(), "28000");
        assert_eq!(sqlstate_for(native::SEQUENCE_ERROR).as_str(), "HY010");
        assert_eq!(sqlstate_for(native::TABLE_NOT_FOUND).as_str(), "42S02");
        assert_eq!(sqlstate_for(-18512).as_str(), "08S01");
        assert_eq!(sqlstate_for(native::NO_DATA), SqlState::NO_DATA);
    }

    #[test]
    fn test_unmapped_is_general_error() {
        assert_eq!(sqlstate_for(-99), SqlState::GENERAL_ERROR);
        assert_eq!(sqlstate_for(-17000), SqlState::GENERAL_ERROR);
    }

    #[test]
    fn test_describe_code() {
        let d = describe_code(native::DUPLICATE_KEY);
        assert_eq!(d.code, native::DUPLICATE_KEY);
        assert_eq!(d.sqlstate.as_str(), "23000");
        assert!(d.message.contains("-10101"));
    }

    #[test]
    fn test_error_slot_replaces() {
        let slot = ErrorSlot::default();
        assert!(slot.get().is_none());
        slot.record(ErrorDescriptor::new(-1, "first", SqlState::GENERAL_ERROR));
        slot.record(ErrorDescriptor::new(-2, "second", SqlState::GENERAL_ERROR));
        let info = slot.info().unwrap();
        assert_eq!(info.code, -2);
        assert_eq!(info.message, "second");
        slot.clear();
        assert!(slot.info().is_none());
    }
}
