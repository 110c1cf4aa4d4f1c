//! # Producer
//!
//! Serializes an outbound message with its endpoint's codec and publishes it.
//! Payloads larger than the endpoint's chunk size are split into fragments
//! published as separate records sharing one `x-message-id`. The fragments
//! of an unkeyed message are keyed by that id so they land on one partition.

use crate::error::OutboundError;
use conduit_bus::{Broker, ProduceAck};
use conduit_telemetry::{metric_inc, MESSAGES_PRODUCED};
use conduit_types::{
    header_names, new_message_id, split_payload, Endpoint, MessageHeaders, OutboundMessage,
};
use std::sync::Arc;
use tracing::debug;

pub struct Producer {
    broker: Arc<dyn Broker>,
}

impl Producer {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    /// Publish a message to one endpoint.
    ///
    /// Returns one acknowledgement per published record (one per chunk for
    /// chunked messages).
    pub async fn produce(
        &self,
        endpoint: &Endpoint,
        message: &OutboundMessage,
    ) -> Result<Vec<ProduceAck>, OutboundError> {
        let mut headers = message.headers.clone();
        let payload = endpoint
            .serializer
            .serialize(&message.content, &mut headers, &endpoint.serialization_context())
            .map_err(|source| OutboundError::Serialization {
                endpoint: endpoint.name.clone(),
                source,
            })?;

        let message_id = match headers.get(header_names::MESSAGE_ID) {
            Some(id) => id.to_string(),
            None => {
                let id = new_message_id();
                headers.add_or_replace(header_names::MESSAGE_ID, &id);
                id
            }
        };
        headers.add_or_replace(header_names::MESSAGE_TYPE, &message.message_type);
        if let Some(key) = &message.key {
            headers.add_or_replace(header_names::MESSAGE_KEY, key);
        }

        let acks = if endpoint.chunk.enabled && payload.len() > endpoint.chunk.size {
            self.produce_chunked(endpoint, &message_id, &payload, &headers)
                .await?
        } else {
            vec![self.broker.produce(&endpoint.name, payload, headers).await?]
        };

        metric_inc!(MESSAGES_PRODUCED, endpoint.name.as_str(), acks.len() as u64);
        debug!(
            endpoint = %endpoint.name,
            message_id = %message_id,
            message_type = %message.message_type,
            records = acks.len(),
            "Message produced"
        );

        Ok(acks)
    }

    async fn produce_chunked(
        &self,
        endpoint: &Endpoint,
        message_id: &str,
        payload: &[u8],
        headers: &MessageHeaders,
    ) -> Result<Vec<ProduceAck>, OutboundError> {
        let chunks = split_payload(message_id, payload, endpoint.chunk.size)?;
        let mut acks = Vec::with_capacity(chunks.len());

        let mut headers = headers.clone();
        if !headers.contains(header_names::MESSAGE_KEY) {
            headers.add_or_replace(header_names::MESSAGE_KEY, message_id);
        }

        for chunk in chunks {
            let mut chunk_headers = headers.clone();
            chunk.write_headers(&mut chunk_headers);
            acks.push(
                self.broker
                    .produce(&endpoint.name, chunk.fragment, chunk_headers)
                    .await?,
            );
        }

        Ok(acks)
    }
}
