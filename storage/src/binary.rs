//! Fixed-width integers and length-prefixed strings over a byte stream.
//!
//! Every integer is little-endian. Every read is all-or-nothing: [read_exact] fails with
//! [Error::UnexpectedEndOfStream] if the stream ends early, and the buffer readers fail
//! with [CodecError::EndOfBuffer] instead of returning a partial value.
//!
//! # Format
//!
//! ```text
//! +---+---+---+---+---+---+---+---+---+---+
//! |    Len (i32)  |    Len bytes ...      |
//! +---+---+---+---+---+---+---+---+---+---+
//! ```
//!
//! The bytes of a string are produced by an [Encoding]. The writer and the reader must
//! agree on the [Encoding]: a mismatch is not detected and yields a different string.

use crate::Error;
use bytes::{Buf, BufMut};
use commonware_codec::{util::at_least, Error as CodecError};
use std::{
    borrow::Cow,
    fmt,
    io::{ErrorKind, Read},
    str::FromStr,
};

/// Text encoding used to turn values into bytes (and back).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8. Invalid sequences decode to `U+FFFD`.
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per character, `U+0000..=U+00FF` only.
    Latin1,
}

impl Encoding {
    /// Encode `value` into bytes.
    pub fn encode<'a>(&self, value: &'a str) -> Result<Cow<'a, [u8]>, Error> {
        match self {
            Encoding::Utf8 => Ok(Cow::Borrowed(value.as_bytes())),
            Encoding::Latin1 => {
                if value.is_ascii() {
                    return Ok(Cow::Borrowed(value.as_bytes()));
                }
                value
                    .chars()
                    .map(|c| u8::try_from(u32::from(c)).map_err(|_| Error::Unencodable(*self)))
                    .collect::<Result<Vec<u8>, _>>()
                    .map(Cow::Owned)
            }
        }
    }

    /// Decode `bytes` into a string.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Utf8 => write!(f, "utf-8"),
            Encoding::Latin1 => write!(f, "latin1"),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(Error::InvalidArgument(format!("unknown encoding: {other}"))),
        }
    }
}

/// Read exactly `n` bytes from `reader`.
pub fn read_exact(reader: &mut impl Read, n: usize) -> Result<Vec<u8>, Error> {
    let mut buf = vec![0u8; n];
    reader.read_exact(&mut buf).map_err(|err| match err.kind() {
        ErrorKind::UnexpectedEof => Error::UnexpectedEndOfStream(n),
        _ => Error::Io(err),
    })?;
    Ok(buf)
}

/// Read a little-endian `i32`.
pub fn read_i32(buf: &mut impl Buf) -> Result<i32, CodecError> {
    at_least(buf, 4)?;
    Ok(buf.get_i32_le())
}

/// Read a little-endian `u32`.
pub fn read_u32(buf: &mut impl Buf) -> Result<u32, CodecError> {
    at_least(buf, 4)?;
    Ok(buf.get_u32_le())
}

/// Read a little-endian `u64`.
pub fn read_u64(buf: &mut impl Buf) -> Result<u64, CodecError> {
    at_least(buf, 8)?;
    Ok(buf.get_u64_le())
}

/// Write a little-endian `i32`.
pub fn write_i32(buf: &mut impl BufMut, value: i32) {
    buf.put_i32_le(value);
}

/// Write a little-endian `u32`.
pub fn write_u32(buf: &mut impl BufMut, value: u32) {
    buf.put_u32_le(value);
}

/// Write a little-endian `u64`.
pub fn write_u64(buf: &mut impl BufMut, value: u64) {
    buf.put_u64_le(value);
}

/// Read a length prefix, rejecting negative lengths.
pub fn read_len(buf: &mut impl Buf) -> Result<usize, CodecError> {
    let len = read_i32(buf)?;
    usize::try_from(len).map_err(|_| CodecError::Invalid("String", "negative length"))
}

/// Read the `len` bytes of a string (the prefix must already have been consumed).
///
/// Turn the result into text with [Encoding::decode].
pub fn read_string(buf: &mut impl Buf, len: usize) -> Result<Vec<u8>, CodecError> {
    at_least(buf, len)?;
    let mut value = vec![0u8; len];
    buf.copy_to_slice(&mut value);
    Ok(value)
}

/// Write the bytes of a string (produced by [Encoding::encode]) with their length prefix.
///
/// `value` must be checked with [string_size] first.
pub fn write_string(buf: &mut impl BufMut, value: &[u8]) {
    write_i32(buf, value.len() as i32);
    buf.put_slice(value);
}

/// Encoded size of the string `value` (prefix included).
///
/// Fails if `value` is too long for its length prefix.
pub fn string_size(value: &[u8]) -> Result<usize, Error> {
    if i32::try_from(value.len()).is_err() {
        return Err(Error::InvalidArgument(format!(
            "string too long: {} bytes",
            value.len()
        )));
    }
    Ok(4 + value.len())
}
