//! # Endpoint
//!
//! A named broker destination or source (a topic) together with the codec
//! used for its payloads and, for producers, its chunking settings.
//!
//! Endpoints are immutable once bound and shared as `Arc<Endpoint>`.

use crate::errors::ConfigError;
use crate::serializer::{JsonMessageSerializer, MessageSerializer, SerializationContext};
use crate::settings::ChunkSettings;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    pub serializer: Arc<dyn MessageSerializer>,
    pub chunk: ChunkSettings,
}

impl Endpoint {
    /// Endpoint using the JSON serializer and no chunking.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serializer: Arc::new(JsonMessageSerializer),
            chunk: ChunkSettings::default(),
        }
    }

    #[must_use]
    pub fn with_serializer(mut self, serializer: Arc<dyn MessageSerializer>) -> Self {
        self.serializer = serializer;
        self
    }

    #[must_use]
    pub fn with_chunking(mut self, chunk: ChunkSettings) -> Self {
        self.chunk = chunk;
        self
    }

    pub fn serialization_context(&self) -> SerializationContext {
        SerializationContext::new(self.name.clone())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyEndpointName);
        }
        self.chunk.validate()
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("serializer", &self.serializer.name())
            .field("chunk", &self.chunk)
            .finish()
    }
}

impl PartialEq for Endpoint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.chunk == other.chunk
            && self.serializer.name() == other.serializer.name()
    }
}
