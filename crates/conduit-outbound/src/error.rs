use conduit_types::{BrokerError, ConfigError, ProcessingError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutboundError {
    #[error("no outbound route for message type '{0}'")]
    NoRoute(String),

    #[error("failed to serialize message for '{endpoint}': {source}")]
    Serialization {
        endpoint: String,
        #[source]
        source: ProcessingError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}
