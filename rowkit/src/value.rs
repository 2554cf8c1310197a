//! Parameter and column value types.
//!
//! [`Param`] is what callers bind to placeholders, [`Value`] is what comes
//! back out of a result column.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, Read};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::{ToSql, ValueRef};
use serde::Serialize;

/// Timestamp layout written to the database (SQLite's canonical text form).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const TIMESTAMP_PARSE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A value bound to a positional statement placeholder.
pub enum Param {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Point in time, in UTC.
    Timestamp(NaiveDateTime),
    /// In-memory binary payload.
    Blob(Vec<u8>),
    /// Binary payload read from a stream when the statement is bound.
    Stream(BlobStream),
    /// Any other value, bound through its own [`ToSql`] representation.
    Native(Box<dyn ToSql + Send>),
}

impl Param {
    /// Wraps any [`ToSql`] value that has no dedicated kind.
    pub fn native(value: impl ToSql + Send + 'static) -> Self {
        Self::Native(Box::new(value))
    }

    /// Wraps a reader whose full content is bound as a blob.
    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Self::Stream(BlobStream::new(reader))
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Integer(v) => f.debug_tuple("Integer").field(v).finish(),
            Self::Real(v) => f.debug_tuple("Real").field(v).finish(),
            Self::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Self::Timestamp(v) => f.debug_tuple("Timestamp").field(v).finish(),
            Self::Blob(v) => f.debug_tuple("Blob").field(&v.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<u32> for Param {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<f32> for Param {
    fn from(v: f32) -> Self {
        Self::Real(f64::from(v))
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Self::native(v)
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Param {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl From<NaiveDateTime> for Param {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v.naive_utc())
    }
}

impl From<SystemTime> for Param {
    fn from(v: SystemTime) -> Self {
        Self::Timestamp(DateTime::<Utc>::from(v).naive_utc())
    }
}

impl From<BlobStream> for Param {
    fn from(v: BlobStream) -> Self {
        Self::Stream(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Convenience macro for building parameter lists.
///
/// Usage: `params![1_i64, "text", blob.as_slice(), None::<i64>]`
#[macro_export]
macro_rules! params {
    ($($val:expr),* $(,)?) => {
        &[$($crate::Param::from($val)),*][..]
    };
}

/// One-shot binary source for a [`Param::Stream`].
///
/// The reader is drained the first time the parameter is bound; binding the
/// same stream again fails.
pub struct BlobStream {
    reader: RefCell<Option<Box<dyn Read + Send>>>,
}

impl BlobStream {
    /// Wraps `reader`.
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: RefCell::new(Some(Box::new(reader))),
        }
    }

    /// Reads the whole stream into memory.
    pub(crate) fn drain(&self) -> io::Result<Vec<u8>> {
        let Some(mut reader) = self.reader.borrow_mut().take() else {
            return Err(io::Error::other("stream parameter was already consumed"));
        };
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl fmt::Debug for BlobStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStream")
            .field("consumed", &self.reader.borrow().is_none())
            .finish()
    }
}

/// A value read from a result column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer.
    Integer(i64),
    /// Double-precision float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
    /// Timestamp read from a column declared with a temporal type.
    Timestamp(NaiveDateTime),
    /// Binary payload (serialized as hex).
    Blob(#[serde(serialize_with = "hex::serde::serialize")] Vec<u8>),
}

impl Value {
    /// Returns `true` for SQL NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the integer payload.
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the float payload, widening integers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the text payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the binary payload.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the timestamp, parsing text in one of the accepted layouts.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(v) => Some(*v),
            Self::Text(v) => parse_timestamp(v),
            _ => None,
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(v) => Self::Integer(v),
            ValueRef::Real(v) => Self::Real(v),
            ValueRef::Text(v) => Self::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Self::Blob(v.to_vec()),
        }
    }
}

/// Formats a timestamp the way it is stored.
pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parses the timestamp layouts SQLite and RFC 3339 producers write.
pub(crate) fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(ts) = TIMESTAMP_PARSE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}
