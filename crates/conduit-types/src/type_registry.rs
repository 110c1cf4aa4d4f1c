//! # Message Type Registry
//!
//! Resolves the `x-message-type` header of an inbound record to a registered
//! type name. Producers on other platforms may send fully qualified names
//! such as `Orders.Created, Orders.Contracts, Version=1.0.0.0, Culture=neutral`;
//! only the first two comma separated parts take part in matching.
//!
//! Resolution is computed once per normalized name and cached, misses
//! included. Registering a type afterwards overwrites its cache entry.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Default)]
pub struct MessageTypeRegistry {
    registered: RwLock<HashSet<String>>,
    cache: RwLock<HashMap<String, Option<String>>>,
}

impl MessageTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the type name and the assembly name.
    pub fn normalize(type_name: &str) -> String {
        type_name
            .split(',')
            .take(2)
            .map(str::trim)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn register(&self, type_name: &str) {
        let normalized = Self::normalize(type_name);
        self.registered.write().insert(normalized.clone());
        self.cache.write().insert(normalized.clone(), Some(normalized));
    }

    /// Resolve a header value to a registered type name.
    pub fn resolve(&self, type_name: &str) -> Option<String> {
        let normalized = Self::normalize(type_name);

        if let Some(cached) = self.cache.read().get(&normalized) {
            return cached.clone();
        }

        let resolved = self
            .registered
            .read()
            .contains(&normalized)
            .then(|| normalized.clone());

        if resolved.is_none() {
            debug!(message_type = %normalized, "Message type not registered");
        }

        self.cache
            .write()
            .entry(normalized)
            .or_insert(resolved)
            .clone()
    }

    pub fn is_registered(&self, type_name: &str) -> bool {
        self.registered.read().contains(&Self::normalize(type_name))
    }
}
