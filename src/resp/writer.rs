// ABOUTME: RESP2/RESP3 append-only encoder — writes commands and values into a caller
// ABOUTME: supplied BytesMut, mirroring the teacher's Connection::write_decimal/write_value

use super::value::Value;
use bytes::{BufMut, BytesMut};
use std::sync::OnceLock;

/// Small-integer decimal strings for 0..=999, built once on first use and reused for
/// every subsequent small integer so the hot path avoids the general formatting
/// routine entirely.
struct SmallIntTable([([u8; 3], u8); 1000]);

fn small_int_table() -> &'static SmallIntTable {
    static TABLE: OnceLock<SmallIntTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut entries = [([0u8; 3], 0u8); 1000];
        for (n, entry) in entries.iter_mut().enumerate() {
            let s = n.to_string();
            let bytes = s.as_bytes();
            entry.0[..bytes.len()].copy_from_slice(bytes);
            entry.1 = bytes.len() as u8;
        }
        SmallIntTable(entries)
    })
}

/// Appends the decimal representation of `val` followed by `\r\n` to `buf`, using the
/// prebuilt table for 0..=999 and a stack scratch buffer otherwise.
fn write_decimal(buf: &mut BytesMut, val: i64) {
    if (0..1000).contains(&val) {
        let table = small_int_table();
        let (digits, len) = table.0[val as usize];
        buf.put_slice(&digits[..len as usize]);
    } else {
        let mut scratch = [0u8; 20];
        let mut cursor = std::io::Cursor::new(&mut scratch[..]);
        use std::io::Write;
        write!(&mut cursor, "{val}").expect("i64 fits in 20 bytes");
        let pos = cursor.position() as usize;
        buf.put_slice(&scratch[..pos]);
    }
    buf.put_slice(b"\r\n");
}

fn write_decimal_usize(buf: &mut BytesMut, val: usize) {
    write_decimal(buf, val as i64);
}

/// Appends a RESP array-of-bulk-strings command: `*N\r\n$len\r\narg\r\n...`.
///
/// This is the hot path used by every typed command method in `client` — one array
/// header followed by one bulk string per argument, token included.
pub fn write_command<'a, I>(buf: &mut BytesMut, token: &[u8], args: I)
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let args: Vec<&[u8]> = args.into_iter().collect();
    buf.put_u8(b'*');
    write_decimal_usize(buf, args.len() + 1);
    write_bulk_string(buf, token);
    for arg in args {
        write_bulk_string(buf, arg);
    }
}

pub fn write_bulk_string(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u8(b'$');
    write_decimal_usize(buf, data.len());
    buf.put_slice(data);
    buf.put_slice(b"\r\n");
}

pub fn write_integer(buf: &mut BytesMut, val: i64) {
    buf.put_u8(b':');
    write_decimal(buf, val);
}

pub fn write_array_header(buf: &mut BytesMut, len: usize) {
    buf.put_u8(b'*');
    write_decimal_usize(buf, len);
}

pub fn write_simple_string(buf: &mut BytesMut, s: &[u8]) {
    buf.put_u8(b'+');
    buf.put_slice(s);
    buf.put_slice(b"\r\n");
}

pub fn write_error(buf: &mut BytesMut, msg: &[u8]) {
    buf.put_u8(b'-');
    buf.put_slice(msg);
    buf.put_slice(b"\r\n");
}

pub fn write_null(buf: &mut BytesMut) {
    buf.put_slice(b"_\r\n");
}

pub fn write_boolean(buf: &mut BytesMut, val: bool) {
    buf.put_u8(b'#');
    buf.put_u8(if val { b't' } else { b'f' });
    buf.put_slice(b"\r\n");
}

pub fn write_double(buf: &mut BytesMut, val: f64) {
    buf.put_u8(b',');
    buf.put_slice(val.to_string().as_bytes());
    buf.put_slice(b"\r\n");
}

/// Encodes an arbitrary `Value`, recursing into aggregates. Used by middleware that
/// synthesizes responses and by the round-trip property tests; the hot submission path
/// uses `write_command` directly instead.
pub fn encode_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Null => write_null(buf),
        Value::Boolean(b) => write_boolean(buf, *b),
        Value::Integer(n) => write_integer(buf, *n),
        Value::Double(d) => write_double(buf, *d),
        Value::SimpleString(s) => write_simple_string(buf, s),
        Value::BulkString(s) => write_bulk_string(buf, s),
        Value::Error(e) => write_error(buf, e),
        Value::BigNumber(n) => {
            buf.put_u8(b'(');
            buf.put_slice(n);
            buf.put_slice(b"\r\n");
        }
        Value::VerbatimString { format, data } => {
            buf.put_u8(b'=');
            write_decimal_usize(buf, data.len() + 4);
            buf.put_slice(format);
            buf.put_u8(b':');
            buf.put_slice(data);
            buf.put_slice(b"\r\n");
        }
        Value::Array(items) => {
            write_array_header(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Set(items) => {
            buf.put_u8(b'~');
            write_decimal_usize(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Push(items) => {
            buf.put_u8(b'>');
            write_decimal_usize(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Map(pairs) => {
            buf.put_u8(b'%');
            write_decimal_usize(buf, pairs.len());
            for (k, v) in pairs {
                encode_value(buf, k);
                encode_value(buf, v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resp::reader::{check, parse, ReaderLimits};
    use bytes::Bytes;

    #[test]
    fn write_command_shape() {
        let mut buf = BytesMut::new();
        write_command(&mut buf, b"GET", [&b"key"[..]]);
        assert_eq!(&buf[..], b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
    }

    #[test]
    fn small_integers_match_general_path() {
        let mut small = BytesMut::new();
        write_integer(&mut small, 42);
        let mut general = BytesMut::new();
        write_integer(&mut general, 1_000_000);
        assert_eq!(&small[..], b":42\r\n");
        assert_eq!(&general[..], b":1000000\r\n");
    }

    #[test]
    fn negative_integer_roundtrip() {
        let mut buf = BytesMut::new();
        write_integer(&mut buf, -7);
        assert_eq!(&buf[..], b":-7\r\n");
    }

    #[test]
    fn encode_then_decode_matches_value() {
        let values = vec![
            Value::Integer(7),
            Value::bulk_string(&b"hi"[..]),
            Value::Array(vec![Value::Integer(1), Value::Boolean(true)]),
            Value::Null,
        ];
        for v in values {
            let mut buf = BytesMut::new();
            encode_value(&mut buf, &v);
            let frozen: Bytes = buf.freeze();
            let limits = ReaderLimits::default();
            let consumed = check(&frozen, limits).unwrap();
            assert_eq!(consumed, frozen.len());
            let decoded = parse(&frozen, limits).unwrap();
            assert_eq!(decoded, v);
        }
    }
}
