//! Message payloads and text encodings.
//!
//! A transport speaks either text or binary natively. Both accessors work
//! regardless: the native form is returned as-is, the other form is converted
//! with the supplied [`Encoding`], or with base64 when none is given.

use std::borrow::Cow;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::envelope::error::{EnvelopeError, EnvelopeResult};

/// Text encodings for converting between string and binary payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
}

impl Encoding {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "ASCII",
            Self::Latin1 => "ISO-8859-1",
            Self::Utf16Le => "UTF-16LE",
        }
    }

    /// Encode text into bytes.
    pub fn encode(&self, text: &str) -> EnvelopeResult<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => {
                if text.is_ascii() {
                    Ok(text.as_bytes().to_vec())
                } else {
                    Err(self.encode_error("non-ASCII character"))
                }
            }
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).map_err(|_| self.encode_error(format!("character {c:?} out of range"))))
                .collect(),
            Self::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    /// Decode bytes into text.
    pub fn decode(&self, bytes: &[u8]) -> EnvelopeResult<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| self.decode_error(e.to_string())),
            Self::Ascii => {
                if bytes.is_ascii() {
                    Ok(bytes.iter().map(|b| char::from(*b)).collect())
                } else {
                    Err(self.decode_error("byte outside the ASCII range"))
                }
            }
            Self::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            Self::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(self.decode_error("odd number of bytes"));
                }
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|e| self.decode_error(e.to_string()))
            }
        }
    }

    fn encode_error(&self, reason: impl Into<String>) -> EnvelopeError {
        EnvelopeError::Encode {
            encoding: self.name(),
            reason: reason.into(),
        }
    }

    fn decode_error(&self, reason: impl Into<String>) -> EnvelopeError {
        EnvelopeError::Decode {
            encoding: self.name(),
            reason: reason.into(),
        }
    }
}

/// Message body in its native representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Binary(Vec<u8>),
}

impl Payload {
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Payload as text. Binary payloads are decoded with `encoding`, or
    /// base64-encoded when `encoding` is `None`.
    pub fn string_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, str>> {
        match self {
            Self::Text(text) => Ok(Cow::Borrowed(text)),
            Self::Binary(bytes) => match encoding {
                Some(encoding) => encoding.decode(bytes).map(Cow::Owned),
                None => Ok(Cow::Owned(STANDARD.encode(bytes))),
            },
        }
    }

    /// Payload as bytes. Text payloads are encoded with `encoding`, or
    /// base64-decoded when `encoding` is `None`.
    pub fn binary_value(&self, encoding: Option<Encoding>) -> EnvelopeResult<Cow<'_, [u8]>> {
        match self {
            Self::Binary(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::Text(text) => match encoding {
                Some(encoding) => encoding.encode(text).map(Cow::Owned),
                None => STANDARD
                    .decode(text)
                    .map(Cow::Owned)
                    .map_err(|e| EnvelopeError::Base64(e.to_string())),
            },
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Binary(value)
    }
}

impl From<&[u8]> for Payload {
    fn from(value: &[u8]) -> Self {
        Self::Binary(value.to_vec())
    }
}
