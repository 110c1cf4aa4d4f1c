//! # Outbound to Inbound Round Trips
//!
//! Messages published through the outbound connector are consumed back by
//! an inbound connector on the same in-memory broker.

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{eventually, Pipeline, Recorder};
    use conduit_bus::{Broker, InMemoryBroker};
    use conduit_inbound::ErrorPolicy;
    use conduit_outbound::{OutboundConnector, OutboundRouter};
    use conduit_types::{
        header_names, BinaryMessageSerializer, ChunkSettings, Endpoint, InboundConnectorSettings,
        MessageContent, Offset, OutboundMessage,
    };
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_chunked_round_trip() {
        let broker = Arc::new(InMemoryBroker::new());
        let endpoint = Endpoint::new("files")
            .with_serializer(Arc::new(BinaryMessageSerializer))
            .with_chunking(ChunkSettings::enabled(4));

        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                endpoint.clone(),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        let mut router = OutboundRouter::new();
        router.add_route("Files.Uploaded, Files", Arc::new(endpoint)).unwrap();
        let outbound = OutboundConnector::new(Arc::clone(&broker) as Arc<dyn Broker>, router);

        let payload = b"0123456789".to_vec();
        let acks = outbound
            .publish(OutboundMessage::binary("Files.Uploaded, Files", payload.clone()).with_key("f-1"))
            .await
            .unwrap();
        assert_eq!(acks.len(), 3);

        eventually("chunked message consumed", || recorder.messages().len() == 1).await;
        let message = &recorder.messages()[0];
        assert_eq!(message.content, MessageContent::Binary(payload));
        assert_eq!(message.message_type(), Some("Files.Uploaded, Files"));
        assert_eq!(message.headers.get(header_names::MESSAGE_KEY), Some("f-1"));

        let partition = acks[0].partition.clone();
        eventually("fragments committed", || {
            broker.committed(&partition) == Some(Offset(3))
        })
        .await;

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_unkeyed_chunked_round_trip_over_partitions() {
        let broker = Arc::new(InMemoryBroker::with_default_partitions(3));
        let endpoint = Endpoint::new("files")
            .with_serializer(Arc::new(BinaryMessageSerializer))
            .with_chunking(ChunkSettings::enabled(4));

        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                endpoint.clone(),
                InboundConnectorSettings {
                    consumers: 3,
                    ..Default::default()
                },
                ErrorPolicy::default(),
            )
            .await;

        let mut router = OutboundRouter::new();
        router.add_catch_all(Arc::new(endpoint)).unwrap();
        let outbound = OutboundConnector::new(Arc::clone(&broker) as Arc<dyn Broker>, router);

        let payload = b"0123456789".to_vec();
        let acks = outbound
            .publish(OutboundMessage::binary("Files.Uploaded, Files", payload.clone()))
            .await
            .unwrap();
        assert_eq!(acks.len(), 3);
        let partition = acks[0].partition.clone();
        assert!(acks.iter().all(|ack| ack.partition == partition));

        eventually("fragments committed", || {
            broker.committed(&partition) == Some(Offset(3))
        })
        .await;
        assert_eq!(recorder.messages().len(), 1);
        assert_eq!(recorder.messages()[0].content, MessageContent::Binary(payload));

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_json_round_trip_to_every_route() {
        let broker = Arc::new(InMemoryBroker::new());
        let orders_recorder = Recorder::new();
        let audit_recorder = Recorder::new();

        let mut orders = Pipeline::new(Arc::clone(&broker), orders_recorder.clone());
        orders
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;
        let mut audit = Pipeline::new(Arc::clone(&broker), audit_recorder.clone());
        audit
            .start(
                Endpoint::new("audit"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        let mut router = OutboundRouter::new();
        router
            .add_route("Orders.Created, Orders", Arc::new(Endpoint::new("orders")))
            .unwrap();
        router.add_catch_all(Arc::new(Endpoint::new("audit"))).unwrap();
        let outbound = OutboundConnector::new(Arc::clone(&broker) as Arc<dyn Broker>, router);

        outbound
            .publish(OutboundMessage::json("Orders.Created, Orders", json!({"id": 42})))
            .await
            .unwrap();
        outbound
            .publish(OutboundMessage::json("Shipping.Booked, Shipping", json!({"id": 7})))
            .await
            .unwrap();

        eventually("audit received both", || audit_recorder.messages().len() == 2).await;
        eventually("orders received one", || orders_recorder.messages().len() == 1).await;

        let order = &orders_recorder.messages()[0];
        assert_eq!(order.content, MessageContent::Json(json!({"id": 42})));
        assert_eq!(
            audit_recorder.message_ids()[0],
            order.message_id,
            "every route shares the message id"
        );

        orders.connector.stop().await.unwrap();
        audit.connector.stop().await.unwrap();
    }
}
