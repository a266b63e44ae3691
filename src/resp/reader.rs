// ABOUTME: RESP2/RESP3 incremental decoder — check-then-parse, mirroring the teacher's
// ABOUTME: Frame::check/Frame::parse split (itself grounded on mini-redis's frame.rs)

use super::value::{Value, DEFAULT_MAX_BULK_LEN, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ELEMENTS};
use bytes::Bytes;
use std::fmt;

/// Reasons `check`/`parse` can fail. `Incomplete` is an expected, non-fatal signal that
/// more bytes are needed; every other variant means the connection is dead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// Not enough data buffered yet to determine the frame's length.
    Incomplete,
    Invalid(&'static str),
    DepthExceeded,
    BulkTooLarge,
    TooManyElements,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::Incomplete => write!(f, "incomplete frame"),
            ReaderError::Invalid(reason) => write!(f, "invalid frame: {reason}"),
            ReaderError::DepthExceeded => write!(f, "nesting depth exceeded"),
            ReaderError::BulkTooLarge => write!(f, "bulk string exceeds maximum length"),
            ReaderError::TooManyElements => write!(f, "aggregate exceeds maximum element count"),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Tunable limits applied while decoding. `Default` matches the spec's stated defaults.
#[derive(Debug, Clone, Copy)]
pub struct ReaderLimits {
    pub max_depth: usize,
    pub max_bulk_len: usize,
    pub max_elements: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        ReaderLimits {
            max_depth: DEFAULT_MAX_DEPTH,
            max_bulk_len: DEFAULT_MAX_BULK_LEN,
            max_elements: DEFAULT_MAX_ELEMENTS,
        }
    }
}

/// Scans `buf` for one complete frame without allocating, returning the number of bytes
/// it occupies. Strips any attribute frame prefixing the real frame into the same
/// count. Returns `Err(Incomplete)` if `buf` doesn't yet hold a whole frame.
pub fn check(buf: &[u8], limits: ReaderLimits) -> Result<usize, ReaderError> {
    let mut pos = 0usize;
    check_one(buf, &mut pos, 0, limits)?;
    Ok(pos)
}

/// Parses exactly one complete frame out of `data`, which must be precisely `check`'s
/// returned length (the caller slices it off the read buffer first). Byte-view payloads
/// are zero-copy `Bytes::slice` views into `data`.
pub fn parse(data: &Bytes, limits: ReaderLimits) -> Result<Value, ReaderError> {
    let mut pos = 0usize;
    let value = parse_one(data, &mut pos, 0, limits)?;
    Ok(value)
}

fn next_byte(buf: &[u8], pos: usize) -> Result<u8, ReaderError> {
    buf.get(pos).copied().ok_or(ReaderError::Incomplete)
}

/// Finds the next CRLF starting at `*pos`, returns the `[start, end)` range excluding
/// the terminator and advances `*pos` past it. Rejects a bare `\n` not preceded by `\r`.
fn take_line(buf: &[u8], pos: &mut usize) -> Result<(usize, usize), ReaderError> {
    let start = *pos;
    let mut i = start;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if i == start || buf[i - 1] != b'\r' {
                return Err(ReaderError::Invalid("bare LF in line"));
            }
            let end = i - 1;
            *pos = i + 1;
            return Ok((start, end));
        }
        i += 1;
    }
    Err(ReaderError::Incomplete)
}

fn parse_i64(bytes: &[u8]) -> Result<i64, ReaderError> {
    let s = std::str::from_utf8(bytes).map_err(|_| ReaderError::Invalid("non-utf8 integer"))?;
    s.parse::<i64>().map_err(|_| ReaderError::Invalid("malformed integer"))
}

fn parse_f64(bytes: &[u8]) -> Result<f64, ReaderError> {
    let s = std::str::from_utf8(bytes).map_err(|_| ReaderError::Invalid("non-utf8 double"))?;
    s.parse::<f64>().map_err(|_| ReaderError::Invalid("malformed double"))
}

fn check_depth(depth: usize, limits: &ReaderLimits) -> Result<(), ReaderError> {
    if depth > limits.max_depth {
        Err(ReaderError::DepthExceeded)
    } else {
        Ok(())
    }
}

fn check_count(count: i64, limits: &ReaderLimits) -> Result<usize, ReaderError> {
    if count < 0 {
        return Err(ReaderError::Invalid("negative aggregate length"));
    }
    let count = count as usize;
    if count > limits.max_elements {
        return Err(ReaderError::TooManyElements);
    }
    Ok(count)
}

/// Check-only pass: validates grammar and advances `*pos` without materializing a
/// `Value`. Returns `()`; the caller reads `*pos` as the consumed length.
fn check_one(
    buf: &[u8],
    pos: &mut usize,
    depth: usize,
    limits: ReaderLimits,
) -> Result<(), ReaderError> {
    check_depth(depth, &limits)?;
    let prefix = next_byte(buf, *pos)?;
    *pos += 1;
    match prefix {
        b'+' | b'-' | b':' | b',' | b'(' => {
            take_line(buf, pos)?;
            Ok(())
        }
        b'_' => {
            // Null: bare CRLF.
            let (start, end) = take_line(buf, pos)?;
            if end != start {
                return Err(ReaderError::Invalid("null frame carries a body"));
            }
            Ok(())
        }
        b'#' => {
            let (start, end) = take_line(buf, pos)?;
            if end - start != 1 || (buf[start] != b't' && buf[start] != b'f') {
                return Err(ReaderError::Invalid("malformed boolean"));
            }
            Ok(())
        }
        b'$' | b'!' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len == -1 {
                return Ok(());
            }
            if len < 0 {
                return Err(ReaderError::Invalid("negative bulk length"));
            }
            let len = len as usize;
            if len > limits.max_bulk_len {
                return Err(ReaderError::BulkTooLarge);
            }
            if *pos + len + 2 > buf.len() {
                return Err(ReaderError::Incomplete);
            }
            if &buf[*pos + len..*pos + len + 2] != b"\r\n" {
                return Err(ReaderError::Invalid("bulk payload missing CRLF terminator"));
            }
            *pos += len + 2;
            Ok(())
        }
        b'=' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len < 4 {
                return Err(ReaderError::Invalid("verbatim string too short for format tag"));
            }
            let len = len as usize;
            if len > limits.max_bulk_len {
                return Err(ReaderError::BulkTooLarge);
            }
            if *pos + len + 2 > buf.len() {
                return Err(ReaderError::Incomplete);
            }
            if buf[*pos + 3] != b':' {
                return Err(ReaderError::Invalid("verbatim string missing format separator"));
            }
            if &buf[*pos + len..*pos + len + 2] != b"\r\n" {
                return Err(ReaderError::Invalid("verbatim payload missing CRLF terminator"));
            }
            *pos += len + 2;
            Ok(())
        }
        b'*' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len == -1 {
                return Ok(());
            }
            let count = check_count(len, &limits)?;
            for _ in 0..count {
                check_one(buf, pos, depth + 1, limits)?;
            }
            Ok(())
        }
        b'~' | b'>' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            let count = check_count(len, &limits)?;
            for _ in 0..count {
                check_one(buf, pos, depth + 1, limits)?;
            }
            Ok(())
        }
        b'%' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            let count = check_count(len, &limits)?;
            for _ in 0..count * 2 {
                check_one(buf, pos, depth + 1, limits)?;
            }
            Ok(())
        }
        b'|' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            let count = check_count(len, &limits)?;
            for _ in 0..count * 2 {
                check_one(buf, pos, depth + 1, limits)?;
            }
            // The attribute prefixes a real frame; consume it too.
            check_one(buf, pos, depth + 1, limits)
        }
        _ => Err(ReaderError::Invalid("unknown type prefix")),
    }
}

/// Parse pass over a buffer already validated by `check_one`/`check`. Builds owned
/// `Value`s, slicing `Bytes` views out of `data` at zero copy cost.
fn parse_one(
    data: &Bytes,
    pos: &mut usize,
    depth: usize,
    limits: ReaderLimits,
) -> Result<Value, ReaderError> {
    let buf = data.as_ref();
    let prefix = next_byte(buf, *pos)?;
    *pos += 1;
    match prefix {
        b'+' => {
            let (start, end) = take_line(buf, pos)?;
            Ok(Value::SimpleString(data.slice(start..end)))
        }
        b'-' => {
            let (start, end) = take_line(buf, pos)?;
            Ok(Value::Error(data.slice(start..end)))
        }
        b':' => {
            let (start, end) = take_line(buf, pos)?;
            Ok(Value::Integer(parse_i64(&buf[start..end])?))
        }
        b',' => {
            let (start, end) = take_line(buf, pos)?;
            Ok(Value::Double(parse_f64(&buf[start..end])?))
        }
        b'(' => {
            let (start, end) = take_line(buf, pos)?;
            Ok(Value::BigNumber(data.slice(start..end)))
        }
        b'_' => {
            take_line(buf, pos)?;
            Ok(Value::Null)
        }
        b'#' => {
            let (start, _end) = take_line(buf, pos)?;
            Ok(Value::Boolean(buf[start] == b't'))
        }
        b'$' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len == -1 {
                return Ok(Value::Null);
            }
            let len = len as usize;
            let body_start = *pos;
            *pos += len + 2;
            Ok(Value::BulkString(data.slice(body_start..body_start + len)))
        }
        b'!' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len == -1 {
                return Ok(Value::Null);
            }
            let len = len as usize;
            let body_start = *pos;
            *pos += len + 2;
            Ok(Value::Error(data.slice(body_start..body_start + len)))
        }
        b'=' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])? as usize;
            let body_start = *pos;
            *pos += len + 2;
            let mut format = [0u8; 3];
            format.copy_from_slice(&buf[body_start..body_start + 3]);
            Ok(Value::VerbatimString {
                format,
                data: data.slice(body_start + 4..body_start + len),
            })
        }
        b'*' => {
            let (start, end) = take_line(buf, pos)?;
            let len = parse_i64(&buf[start..end])?;
            if len == -1 {
                return Ok(Value::Null);
            }
            let count = check_count(len, &limits)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(parse_one(data, pos, depth + 1, limits)?);
            }
            Ok(Value::Array(items))
        }
        b'~' => {
            let (start, end) = take_line(buf, pos)?;
            let count = check_count(parse_i64(&buf[start..end])?, &limits)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(parse_one(data, pos, depth + 1, limits)?);
            }
            Ok(Value::Set(items))
        }
        b'>' => {
            let (start, end) = take_line(buf, pos)?;
            let count = check_count(parse_i64(&buf[start..end])?, &limits)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(parse_one(data, pos, depth + 1, limits)?);
            }
            Ok(Value::Push(items))
        }
        b'%' => {
            let (start, end) = take_line(buf, pos)?;
            let count = check_count(parse_i64(&buf[start..end])?, &limits)?;
            let mut pairs = Vec::with_capacity(count);
            for _ in 0..count {
                let k = parse_one(data, pos, depth + 1, limits)?;
                let v = parse_one(data, pos, depth + 1, limits)?;
                pairs.push((k, v));
            }
            Ok(Value::Map(pairs))
        }
        b'|' => {
            let (start, end) = take_line(buf, pos)?;
            let count = check_count(parse_i64(&buf[start..end])?, &limits)?;
            // Attribute map is decoded for validation, then discarded (resolved open
            // question: attributes aren't delivered anywhere downstream).
            for _ in 0..count {
                let _k = parse_one(data, pos, depth + 1, limits)?;
                let _v = parse_one(data, pos, depth + 1, limits)?;
            }
            parse_one(data, pos, depth + 1, limits)
        }
        _ => Err(ReaderError::Invalid("unknown type prefix")),
    }
}
