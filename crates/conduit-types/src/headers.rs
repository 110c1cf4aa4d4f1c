//! # Message Headers
//!
//! Header collection carried by every record. Keys are strings, duplicates
//! are allowed and insertion order is preserved, matching broker semantics.

use serde::{Deserialize, Serialize};

/// Well-known header names.
pub mod header_names {
    /// Unique identifier of the logical message (shared by all its chunks).
    pub const MESSAGE_ID: &str = "x-message-id";
    /// Type name of the serialized message, used for subscriber routing.
    pub const MESSAGE_TYPE: &str = "x-message-type";
    /// Zero-based index of a chunk within its message.
    pub const CHUNK_INDEX: &str = "x-chunk-index";
    /// Total number of chunks the message was split into.
    pub const CHUNKS_COUNT: &str = "x-chunks-count";
    /// Number of failed processing attempts before the record was moved.
    pub const FAILED_ATTEMPTS: &str = "x-failed-attempts";
    /// Name of the endpoint a moved record originally came from.
    pub const SOURCE_ENDPOINT: &str = "x-source-endpoint";
    /// Partitioning key used by the broker.
    pub const MESSAGE_KEY: &str = "x-message-key";
}

/// A single header entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// Ordered collection of message headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeaders {
    entries: Vec<Header>,
}

impl MessageHeaders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing entry with the same name.
    pub fn add(&mut self, name: impl Into<String>, value: impl ToString) {
        self.entries.push(Header {
            name: name.into(),
            value: value.to_string(),
        });
    }

    /// Replace the first header with this name in place, or append it.
    pub fn add_or_replace(&mut self, name: &str, value: impl ToString) {
        match self.entries.iter_mut().find(|h| h.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.add(name, value),
        }
    }

    /// Builder-style variant of [`MessageHeaders::add_or_replace`].
    #[must_use]
    pub fn with(mut self, name: &str, value: impl ToString) -> Self {
        self.add_or_replace(name, value);
        self
    }

    /// Value of the first header with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    /// Parse the first header with this name.
    ///
    /// Returns `None` when the header is absent, `Some(Err(_))` when present
    /// but unparsable.
    pub fn get_parsed<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, T::Err>> {
        self.get(name).map(str::parse)
    }

    /// Remove every header with this name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|h| h.name != name);
        before - self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|h| h.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|h| (h.name.as_str(), h.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for MessageHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}
