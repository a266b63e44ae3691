// ABOUTME: RESP2/RESP3 value model — the decoded form of a single wire frame
// ABOUTME: Byte-view variants borrow from the read buffer via cheap bytes::Bytes slices

use bytes::Bytes;
use std::fmt;

/// Default nesting cap for arrays/maps/sets/pushes/attributes, applied by the reader.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Default maximum bulk-string/bulk-error length accepted by the reader (512 MiB).
pub const DEFAULT_MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Default maximum element count in one aggregate frame (1 Mi elements).
pub const DEFAULT_MAX_ELEMENTS: usize = 1024 * 1024;

/// A single decoded RESP2/RESP3 value.
///
/// `BulkString`/`Array` nulls (`$-1\r\n`, `*-1\r\n`) and the RESP3 `_\r\n` null are all
/// folded into the single `Null` variant at decode time, so the "all forms of null
/// compare equal" property holds by construction rather than by a bespoke `PartialEq`.
#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    SimpleString(Bytes),
    BulkString(Bytes),
    Error(Bytes),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Push(Vec<Value>),
    BigNumber(Bytes),
    VerbatimString { format: [u8; 3], data: Bytes },
}

impl Value {
    pub fn simple_string(s: impl Into<Bytes>) -> Self {
        Value::SimpleString(s.into())
    }

    pub fn bulk_string(s: impl Into<Bytes>) -> Self {
        Value::BulkString(s.into())
    }

    pub fn error(msg: impl Into<Bytes>) -> Self {
        Value::Error(msg.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The message text of an `Error` frame, if this is one.
    pub fn error_message(&self) -> Option<&[u8]> {
        match self {
            Value::Error(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// A byte view into this value, for any variant that carries one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::SimpleString(b) | Value::BulkString(b) | Value::Error(b) | Value::BigNumber(b) => {
                Some(b.as_ref())
            }
            Value::VerbatimString { data, .. } => Some(data.as_ref()),
            _ => None,
        }
    }

    /// Convenience accessor that also validates UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) | Value::Set(v) | Value::Push(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Null, Null) => true,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Double(a), Double(b)) => a == b,
            (SimpleString(a), SimpleString(b)) => a == b,
            (BulkString(a), BulkString(b)) => a == b,
            (Error(a), Error(b)) => a == b,
            (BigNumber(a), BigNumber(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Set(a), Set(b)) => a == b,
            (Push(a), Push(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (
                VerbatimString { format: fa, data: da },
                VerbatimString { format: fb, data: db },
            ) => fa == fb && da == db,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::Integer(n) => write!(f, "Integer({n})"),
            Value::Double(d) => write!(f, "Double({d})"),
            Value::SimpleString(b) => write!(f, "SimpleString({:?})", String::from_utf8_lossy(b)),
            Value::BulkString(b) => write!(f, "BulkString({:?})", String::from_utf8_lossy(b)),
            Value::Error(b) => write!(f, "Error({:?})", String::from_utf8_lossy(b)),
            Value::BigNumber(b) => write!(f, "BigNumber({:?})", String::from_utf8_lossy(b)),
            Value::Array(v) => f.debug_tuple("Array").field(v).finish(),
            Value::Map(v) => f.debug_tuple("Map").field(v).finish(),
            Value::Set(v) => f.debug_tuple("Set").field(v).finish(),
            Value::Push(v) => f.debug_tuple("Push").field(v).finish(),
            Value::VerbatimString { format, data } => f
                .debug_struct("VerbatimString")
                .field("format", &String::from_utf8_lossy(format))
                .field("data", &String::from_utf8_lossy(data))
                .finish(),
        }
    }
}
