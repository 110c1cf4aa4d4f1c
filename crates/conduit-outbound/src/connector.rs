use crate::error::OutboundError;
use crate::producer::Producer;
use crate::router::OutboundRouter;
use conduit_bus::{Broker, ProduceAck};
use conduit_types::{header_names, new_message_id, OutboundMessage};
use std::sync::Arc;
use tracing::warn;

/// Publishes application messages to every endpoint routed for their type.
pub struct OutboundConnector {
    router: OutboundRouter,
    producer: Producer,
}

impl OutboundConnector {
    pub fn new(broker: Arc<dyn Broker>, router: OutboundRouter) -> Self {
        Self {
            router,
            producer: Producer::new(broker),
        }
    }

    pub fn router(&self) -> &OutboundRouter {
        &self.router
    }

    /// Route and produce a message. Endpoints are published to in route
    /// order; the first failure stops the publication. Every endpoint
    /// receives the same `x-message-id`.
    pub async fn publish(
        &self,
        mut message: OutboundMessage,
    ) -> Result<Vec<ProduceAck>, OutboundError> {
        let endpoints = self.router.routes_for(&message.message_type);
        if endpoints.is_empty() {
            warn!(message_type = %message.message_type, "No outbound route");
            return Err(OutboundError::NoRoute(message.message_type));
        }

        if !message.headers.contains(header_names::MESSAGE_ID) {
            message
                .headers
                .add_or_replace(header_names::MESSAGE_ID, new_message_id());
        }

        let mut acks = Vec::new();
        for endpoint in endpoints {
            acks.extend(self.producer.produce(&endpoint, &message).await?);
        }
        Ok(acks)
    }
}
