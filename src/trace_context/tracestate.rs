//! The `tracestate` vendor list.
//!
//! Entries are kept in an ordered association list, most recently set first.
//! Lookups and mutations are a linear scan (O(n)); a handful of vendor
//! entries is the expected size and order is part of the wire format.

use std::fmt;

use crate::trace_context::error::{TraceContextError, TraceContextResult};

/// Maximum number of list members allowed on the wire.
pub const MAX_ENTRIES: usize = 32;

const MAX_KEY_LEN: usize = 256;
const MAX_TENANT_LEN: usize = 241;
const MAX_SYSTEM_LEN: usize = 14;
const MAX_VALUE_LEN: usize = 256;

/// Ordered, unique-key list of vendor trace entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceState {
    entries: Vec<(String, String)>,
    value: String,
}

impl TraceState {
    /// Create an empty trace state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with the entries of an inbound `tracestate` header.
    ///
    /// Parsing is lenient: spaces and tabs around each member are trimmed,
    /// and members that do not split into exactly one non-empty key and one
    /// non-empty value are dropped. Later duplicates
    /// override earlier ones and move to the front.
    pub fn parse(&mut self, raw: &str) {
        self.entries.clear();

        let members = raw
            .split(',')
            .map(|member| member.trim_matches(|c| c == ' ' || c == '\t'))
            .filter(|member| !member.is_empty());

        for member in members {
            let mut parts = member.split('=').filter(|part| !part.is_empty());
            if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
                self.insert_front(key.to_string(), value.to_string());
            }
        }

        self.set_value();
    }

    /// Serialized `key1=value1,key2=value2` form.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Strict lookup.
    pub fn get(&self, key: &str) -> TraceContextResult<&str> {
        self.try_get(key)
            .ok_or_else(|| TraceContextError::KeyNotFound(key.to_string()))
    }

    /// Lookup that reports absence as `None`.
    pub fn try_get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Insert or update an entry and move it to the front.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.insert_front(key.into(), value.into());
        self.set_value();
    }

    /// Insert a new entry at the front; fails if the key already exists.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) -> TraceContextResult<()> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(TraceContextError::DuplicateKey(key));
        }
        self.entries.insert(0, (key, value.into()));
        self.set_value();
        Ok(())
    }

    /// Remove the entry for `key`. Returns false if absent.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.entries.remove(index);
                self.set_value();
                true
            }
            None => false,
        }
    }

    /// Remove the entry only if both key and value match.
    pub fn remove_entry(&mut self, key: &str, value: &str) -> bool {
        match self.entries.iter().position(|(k, v)| k == key && v == value) {
            Some(index) => {
                self.entries.remove(index);
                self.set_value();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.value.clear();
    }

    /// Entries in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    /// Check every entry against the W3C list-member grammar.
    pub fn validate(&self) -> TraceContextResult<()> {
        if self.entries.len() > MAX_ENTRIES {
            return Err(TraceContextError::InvalidTraceState(format!(
                "{} entries exceeds the maximum of {}",
                self.entries.len(),
                MAX_ENTRIES
            )));
        }
        for (key, value) in &self.entries {
            if !is_valid_key(key) {
                return Err(TraceContextError::InvalidTraceState(format!("invalid key '{key}'")));
            }
            if !is_valid_value(value) {
                return Err(TraceContextError::InvalidTraceState(format!(
                    "invalid value '{value}' for key '{key}'"
                )));
            }
        }
        Ok(())
    }

    fn insert_front(&mut self, key: String, value: String) {
        if let Some(index) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.remove(index);
        }
        self.entries.insert(0, (key, value));
    }

    fn set_value(&mut self) {
        self.value.clear();
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                self.value.push(',');
            }
            self.value.push_str(key);
            self.value.push('=');
            self.value.push_str(value);
        }
    }
}

impl fmt::Display for TraceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

fn is_key_char(b: u8) -> bool {
    matches!(b, b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'*' | b'/')
}

fn is_valid_segment(segment: &str, max_len: usize, first: impl Fn(u8) -> bool) -> bool {
    match segment.as_bytes().split_first() {
        Some((head, rest)) => {
            segment.len() <= max_len && first(*head) && rest.iter().all(|b| is_key_char(*b))
        }
        None => false,
    }
}

fn is_valid_key(key: &str) -> bool {
    match key.split_once('@') {
        None => is_valid_segment(key, MAX_KEY_LEN, |b| b.is_ascii_lowercase()),
        Some((tenant, system)) => {
            is_valid_segment(tenant, MAX_TENANT_LEN, |b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && is_valid_segment(system, MAX_SYSTEM_LEN, |b| b.is_ascii_lowercase())
        }
    }
}

fn is_valid_value(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_VALUE_LEN
        && !value.ends_with(' ')
        && value
            .bytes()
            .all(|b| (0x20..=0x7e).contains(&b) && b != b',' && b != b'=')
}
