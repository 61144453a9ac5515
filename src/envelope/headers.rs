//! Message headers.
//!
//! Transports hand over a raw [`HeaderMap`]; receivers expose it through the
//! read-only [`ReceiverMessageHeaders`] view, which borrows the map and
//! delegates every lookup.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

/// Raw header source: name → scalar value.
pub type HeaderMap = HashMap<String, HeaderValue>;

/// A scalar header value.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Bytes(Vec<u8>),
}

impl HeaderValue {
    /// Bytes as written to a transport record.
    ///
    /// Scalars are rendered as UTF-8 text; byte values pass through.
    pub fn to_wire(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            other => other.to_string().into_bytes(),
        }
    }

    /// Rebuild a value read back from a transport record.
    pub fn from_wire(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::String(text.to_string()),
            Err(_) => Self::Bytes(bytes.to_vec()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for HeaderValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Bytes(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u8> for HeaderValue {
    fn from(value: u8) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Read-only, typed view over a transport's headers.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverMessageHeaders<'a> {
    raw: &'a HeaderMap,
}

impl<'a> ReceiverMessageHeaders<'a> {
    pub fn new(raw: &'a HeaderMap) -> Self {
        Self { raw }
    }

    pub fn get(&self, key: &str) -> Option<&'a HeaderValue> {
        self.raw.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.raw.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.raw.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a HeaderValue)> {
        self.raw.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Header only if it is stored as a string.
    pub fn get_str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    /// Header rendered as text. Byte values must be valid UTF-8.
    pub fn get_string(&self, key: &str) -> Option<Cow<'a, str>> {
        match self.get(key)? {
            HeaderValue::String(s) => Some(Cow::Borrowed(s)),
            HeaderValue::Bytes(bytes) => std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            other => Some(Cow::Owned(other.to_string())),
        }
    }

    /// Header as an integer, parsing text representations.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            HeaderValue::Integer(i) => Some(*i),
            _ => self.get_string(key)?.trim().parse().ok(),
        }
    }

    /// Header as a boolean, parsing text representations.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            HeaderValue::Boolean(b) => Some(*b),
            _ => self.get_string(key)?.trim().to_ascii_lowercase().parse().ok(),
        }
    }

    /// Header as raw bytes (the wire form for scalars).
    pub fn get_bytes(&self, key: &str) -> Option<Cow<'a, [u8]>> {
        match self.get(key)? {
            HeaderValue::Bytes(bytes) => Some(Cow::Borrowed(bytes)),
            HeaderValue::String(s) => Some(Cow::Borrowed(s.as_bytes())),
            other => Some(Cow::Owned(other.to_wire())),
        }
    }
}
