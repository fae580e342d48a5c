//! Values bound to statement parameters.

use crate::value::Value;
use std::cell::RefCell;
use std::fmt;
use std::io::{Read, Seek};
use std::rc::Rc;

/// A readable, seekable LOB source.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A LOB parameter source streamed to the engine in chunks.
///
/// The stream is consumed from its current position to its end.
pub struct LobStream {
    inner: Box<dyn ReadSeek>,
}

impl LobStream {
    pub fn new(source: impl Read + Seek + 'static) -> Self {
        Self {
            inner: Box::new(source),
        }
    }

    pub fn get_mut(&mut self) -> &mut (dyn ReadSeek + 'static) {
        &mut *self.inner
    }
}

impl fmt::Debug for LobStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LobStream").finish_non_exhaustive()
    }
}

/// How a parameter's value reaches the binder.
#[derive(Debug)]
pub enum ParamValue {
    /// Converted and sent as soon as it is bound.
    Immediate(Value),
    /// Read only when the statement executes; output values are written back
    /// into the same cell.
    Deferred(Rc<RefCell<Value>>),
    /// Streamed into a LOB handle at bind time.
    Stream(LobStream),
}

impl ParamValue {
    /// Shared cell for a deferred (by-reference) binding.
    pub fn deferred(value: impl Into<Value>) -> (Self, Rc<RefCell<Value>>) {
        let cell = Rc::new(RefCell::new(value.into()));
        (ParamValue::Deferred(Rc::clone(&cell)), cell)
    }

    pub fn stream(source: impl Read + Seek + 'static) -> Self {
        ParamValue::Stream(LobStream::new(source))
    }

    pub const fn is_deferred(&self) -> bool {
        matches!(self, ParamValue::Deferred(_))
    }
}

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Immediate(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_deferred_shares_cell() {
        let (param, cell) = ParamValue::deferred(1);
        *cell.borrow_mut() = Value::Int(2);
        match param {
            ParamValue::Deferred(inner) => assert_eq!(*inner.borrow(), Value::Int(2)),
            other => panic!("expected deferred, got {other:?}"),
        }
    }

    #[test]
    fn test_immediate_from_value() {
        let param: ParamValue = Value::from(42i32).into();
        assert!(matches!(param, ParamValue::Immediate(Value::Int(42))));
        assert!(!param.is_deferred());
    }

    #[test]
    fn test_stream_reads_source() {
        let mut param = ParamValue::stream(Cursor::new(b"abc".to_vec()));
        let ParamValue::Stream(stream) = &mut param else {
            panic!("expected stream");
        };
        let mut out = String::new();
        stream.get_mut().read_to_string(&mut out).unwrap();
        assert_eq!(out, "abc");
    }
}
