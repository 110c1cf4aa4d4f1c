//! # Inbound Pipeline Flows
//!
//! End-to-end scenarios through the in-memory broker:
//!
//! 1. **Chunk reassembly**: fragments delivered out of order produce one message
//! 2. **Error policies**: retry, skip, move and fatal outcomes and their commits
//! 3. **Batching**: size threshold and deadline release
//! 4. **Rebalancing**: revocation drops the revoked slice of the open batch
//! 5. **Ordering**: per-partition order with several consumers
//! 6. **Shutdown**: a retry delay is interrupted without commit

#[cfg(test)]
mod tests {
    use crate::integration::fixtures::{
        eventually, headers, produce_chunks, produce_json, Pipeline, Recorder,
    };
    use conduit_bus::{Broker, InMemoryBroker};
    use conduit_inbound::{
        ChunkStore, ChunkStoreError, Dispatcher, ErrorPolicy, InMemoryChunkStore,
        MessageHandler, Subscription,
    };
    use conduit_types::{
        header_names, BatchSettings, BinaryMessageSerializer, BrokerError, ChunkSettings,
        ConfigError, ConnectorError, Endpoint, FailureKind, InboundConnectorSettings,
        MessageContent, MessageTypeRegistry, Offset, PartitionKey,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn binary_endpoint(name: &str) -> Endpoint {
        Endpoint::new(name).with_serializer(Arc::new(BinaryMessageSerializer))
    }

    // =========================================================================
    // CHUNK REASSEMBLY
    // =========================================================================

    #[tokio::test]
    async fn test_out_of_order_chunks_reassembled_once() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        produce_chunks(&broker, "files", "m1", b"hello", 2, &[2, 0, 1]).await;

        eventually("all fragments committed", || {
            pipeline.committed("files", 0) == Some(Offset(3))
        })
        .await;

        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].message_id, "m1");
        assert_eq!(messages[0].raw_payload, b"hello".to_vec());
        assert_eq!(messages[0].content, MessageContent::Binary(b"hello".to_vec()));
        assert!(!messages[0].headers.contains(header_names::CHUNK_INDEX));
        // Completed by the fragment at offset 2
        assert_eq!(messages[0].offset, Offset(2));

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_interleaved_chunked_messages() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        produce_chunks(&broker, "files", "a", b"aaaa", 2, &[1]).await;
        produce_chunks(&broker, "files", "b", b"bbbbbb", 3, &[0, 1]).await;
        produce_chunks(&broker, "files", "a", b"aaaa", 2, &[0]).await;

        eventually("both messages dispatched", || recorder.messages().len() == 2).await;
        assert_eq!(recorder.message_ids(), vec!["b".to_string(), "a".to_string()]);

        eventually("all fragments committed", || {
            pipeline.committed("files", 0) == Some(Offset(4))
        })
        .await;

        pipeline.connector.stop().await.unwrap();
    }

    struct UnavailableStore;

    impl ChunkStore for UnavailableStore {
        fn store_chunk(&self, _: &str, _: u32, _: u32, _: Vec<u8>) -> Result<(), ChunkStoreError> {
            Err(ChunkStoreError::Unavailable("disk gone".into()))
        }

        fn chunk_count(&self, _: &str) -> Result<usize, ChunkStoreError> {
            Ok(0)
        }

        fn reassemble(&self, _: &str, _: u32) -> Result<Option<Vec<u8>>, ChunkStoreError> {
            Ok(None)
        }

        fn discard(&self, _: &str) -> Result<(), ChunkStoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_chunk_store_failure_is_never_skipped() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(recorder.clone()));
        let mut pipeline =
            Pipeline::with_parts(Arc::clone(&broker), dispatcher, Arc::new(UnavailableStore));
        pipeline
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::skip(),
            )
            .await;

        produce_chunks(&broker, "files", "m1", b"hello", 2, &[0]).await;

        let report = pipeline.next_report().await;
        assert!(matches!(
            report.result,
            Err(ConnectorError::Fatal { ref message_id, .. }) if message_id == "m1"
        ));
        assert_eq!(pipeline.committed("files", 0), None);
        assert_eq!(recorder.calls(), 0);
    }

    #[tokio::test]
    async fn test_fatal_chunked_message_rebuilt_after_restart() {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryChunkStore::new());

        let failing = Recorder::always_failing();
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(failing.clone()));
        let mut first = Pipeline::with_parts(
            Arc::clone(&broker),
            dispatcher,
            Arc::clone(&store) as Arc<dyn ChunkStore>,
        );
        first
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        produce_chunks(&broker, "files", "m1", b"hello", 2, &[0, 1, 2]).await;

        let report = first.next_report().await;
        assert!(matches!(
            report.result,
            Err(ConnectorError::Fatal { ref message_id, .. }) if message_id == "m1"
        ));
        // Leading fragments are committed, their content stays stored
        assert_eq!(first.committed("files", 0), Some(Offset(2)));
        assert_eq!(store.pending_messages(), 1);

        for member in broker.members("files") {
            broker.unsubscribe(member).await.unwrap();
        }

        let recorder = Recorder::new();
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(recorder.clone()));
        let mut second = Pipeline::with_parts(
            Arc::clone(&broker),
            dispatcher,
            Arc::clone(&store) as Arc<dyn ChunkStore>,
        );
        second
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        eventually("message rebuilt and committed", || {
            second.committed("files", 0) == Some(Offset(3))
        })
        .await;
        assert_eq!(recorder.message_ids(), vec!["m1".to_string()]);
        assert_eq!(recorder.messages()[0].raw_payload, b"hello".to_vec());
        eventually("fragments released", || store.pending_messages() == 0).await;

        second.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_inconsistent_fragments_skipped() {
        let broker = Arc::new(InMemoryBroker::new());
        let store = Arc::new(InMemoryChunkStore::new());
        // Stale partial message under a reused id, with another chunk count
        store.store_chunk("m", 0, 3, b"old".to_vec()).unwrap();

        let recorder = Recorder::new();
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::all(recorder.clone()));
        let mut pipeline = Pipeline::with_parts(
            Arc::clone(&broker),
            dispatcher,
            Arc::clone(&store) as Arc<dyn ChunkStore>,
        );
        pipeline
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::skip(),
            )
            .await;

        produce_chunks(&broker, "files", "m", b"abcd", 2, &[0, 1]).await;
        broker
            .produce("files", b"next".to_vec(), headers("n", "Test.Blob, Tests"))
            .await
            .unwrap();

        eventually("fragments skipped and next message committed", || {
            pipeline.committed("files", 0) == Some(Offset(3))
        })
        .await;
        assert_eq!(recorder.message_ids(), vec!["n".to_string()]);

        pipeline.connector.stop().await.unwrap();
    }

    // =========================================================================
    // ERROR POLICIES
    // =========================================================================

    #[tokio::test]
    async fn test_retry_then_skip_commits_after_three_attempts() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::always_failing();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::chain(vec![ErrorPolicy::retry(2), ErrorPolicy::skip()]),
            )
            .await;

        produce_json(&broker, "orders", "o-1", json!({"id": 1})).await;

        eventually("skipped message committed", || {
            pipeline.committed("orders", 0) == Some(Offset(1))
        })
        .await;
        assert_eq!(recorder.calls(), 3);
        assert_eq!(broker.commit_log().len(), 1);

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_transient_failure_recovers_on_retry() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::failing(1);
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::retry(3).with_delay(Duration::from_millis(5), Duration::ZERO),
            )
            .await;

        produce_json(&broker, "orders", "o-1", json!({"id": 1})).await;

        eventually("message committed", || {
            pipeline.committed("orders", 0) == Some(Offset(1))
        })
        .await;
        assert_eq!(recorder.calls(), 2);
        let messages = recorder.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].failed_attempts(), 1);

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_move_publishes_once_and_commits_once() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::always_failing();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        let dlq = Arc::new(Endpoint::new("orders-dlq"));
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::move_to(dlq),
            )
            .await;

        produce_json(&broker, "orders", "o-1", json!({"id": 1})).await;

        eventually("moved message committed", || {
            pipeline.committed("orders", 0) == Some(Offset(1))
        })
        .await;

        let moved = broker.records("orders-dlq");
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].payload, br#"{"id":1}"#.to_vec());
        assert_eq!(moved[0].headers.get(header_names::MESSAGE_ID), Some("o-1"));
        assert_eq!(moved[0].headers.get(header_names::SOURCE_ENDPOINT), Some("orders"));
        assert_eq!(moved[0].headers.get(header_names::FAILED_ATTEMPTS), Some("1"));

        let orders_commits = broker
            .commit_log()
            .into_iter()
            .filter(|(p, _)| p.topic == "orders")
            .count();
        assert_eq!(orders_commits, 1);
        assert_eq!(recorder.calls(), 1);

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_moved_chunked_message_is_republished_whole() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut pipeline = Pipeline::new(Arc::clone(&broker), Recorder::always_failing());
        pipeline
            .start(
                binary_endpoint("files"),
                InboundConnectorSettings::default(),
                ErrorPolicy::move_to(Arc::new(Endpoint::new("files-dlq"))),
            )
            .await;

        produce_chunks(&broker, "files", "m1", b"hello", 2, &[0, 1, 2]).await;

        eventually("chunked message moved", || broker.records("files-dlq").len() == 1).await;
        let moved = &broker.records("files-dlq")[0];
        assert_eq!(moved.payload, b"hello".to_vec());
        assert!(!moved.headers.contains(header_names::CHUNK_INDEX));
        assert!(!moved.headers.contains(header_names::CHUNKS_COUNT));

        eventually("all fragments committed", || {
            pipeline.committed("files", 0) == Some(Offset(3))
        })
        .await;

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_bad_payload_skipped_by_kind_filter() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::skip().apply_to(FailureKind::Deserialization),
            )
            .await;

        broker
            .produce("orders", b"{not json".to_vec(), headers("bad", "Test.Event, Tests"))
            .await
            .unwrap();
        produce_json(&broker, "orders", "good", json!({"ok": true})).await;

        eventually("both records committed", || {
            pipeline.committed("orders", 0) == Some(Offset(2))
        })
        .await;
        assert_eq!(recorder.message_ids(), vec!["good".to_string()]);

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_worker_without_commit() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::always_failing();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::retry(1),
            )
            .await;

        produce_json(&broker, "orders", "o-1", json!({"id": 1})).await;

        let report = pipeline.next_report().await;
        assert_eq!(report.endpoint, "orders");
        match report.result {
            Err(ConnectorError::Fatal {
                message_id,
                partition,
                offset,
                ..
            }) => {
                assert_eq!(message_id, "o-1");
                assert_eq!(partition, PartitionKey::new("orders", 0));
                assert_eq!(offset, Offset(0));
            }
            other => panic!("expected fatal failure, got {:?}", other),
        }

        assert_eq!(recorder.calls(), 2);
        assert_eq!(pipeline.committed("orders", 0), None);
        // The stopped worker keeps its partitions until restart
        assert_eq!(broker.member_count("orders"), 1);
    }

    #[tokio::test]
    async fn test_broker_disconnect_reported() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut pipeline = Pipeline::new(Arc::clone(&broker), Recorder::new());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        broker.disconnect("orders");

        let report = pipeline.next_report().await;
        assert!(matches!(
            report.result,
            Err(ConnectorError::Broker(BrokerError::ConnectionLost(_)))
        ));
        eventually("member left the group", || broker.member_count("orders") == 0).await;
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_batch_released_by_deadline() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings {
                    batch: BatchSettings::enabled(10, Duration::from_millis(500)),
                    consumers: 1,
                },
                ErrorPolicy::default(),
            )
            .await;

        for i in 0..3 {
            produce_json(&broker, "orders", &format!("o-{}", i), json!({"n": i})).await;
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(recorder.batch_sizes().is_empty());
        assert_eq!(pipeline.committed("orders", 0), None);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(recorder.batch_sizes(), vec![3]);
        assert_eq!(pipeline.committed("orders", 0), Some(Offset(3)));

        pipeline.connector.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_batch_released_immediately() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings {
                    batch: BatchSettings::enabled(2, Duration::from_secs(60)),
                    consumers: 1,
                },
                ErrorPolicy::default(),
            )
            .await;

        for i in 0..5 {
            produce_json(&broker, "orders", &format!("o-{}", i), json!({"n": i})).await;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(recorder.batch_sizes(), vec![2, 2]);
        assert_eq!(pipeline.committed("orders", 0), Some(Offset(4)));

        pipeline.connector.stop().await.unwrap();
        // The unfinished batch is dropped, not committed
        assert_eq!(pipeline.committed("orders", 0), Some(Offset(4)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_revocation_discards_revoked_slice_of_open_batch() {
        let broker = Arc::new(InMemoryBroker::with_default_partitions(2));
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings {
                    batch: BatchSettings::enabled(10, Duration::from_secs(10)),
                    consumers: 1,
                },
                ErrorPolicy::default(),
            )
            .await;

        // Round-robin: first record to partition 0, second to partition 1
        produce_json(&broker, "orders", "p0", json!({})).await;
        produce_json(&broker, "orders", "p1", json!({})).await;
        tokio::time::sleep(Duration::from_millis(10)).await;

        // A second instance joins and takes partition 1
        let mut other = broker.subscribe(&Endpoint::new("orders")).await.unwrap();

        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(recorder.message_ids(), vec!["p0".to_string()]);
        assert_eq!(pipeline.committed("orders", 0), Some(Offset(1)));
        assert_eq!(pipeline.committed("orders", 1), None);

        // The new owner receives the uncommitted record again
        let mut redelivered = Vec::new();
        while let Ok(event) = other.events.try_recv() {
            if let conduit_bus::ConsumerEvent::Record(record) = event {
                redelivered.push(record.message_id().map(str::to_string));
            }
        }
        assert_eq!(redelivered, vec![Some("p1".to_string())]);

        pipeline.connector.stop().await.unwrap();
    }

    // =========================================================================
    // ORDERING
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_partition_order_with_multiple_consumers() {
        let broker = Arc::new(InMemoryBroker::with_default_partitions(4));
        let recorder = Recorder::new();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings {
                    batch: BatchSettings::default(),
                    consumers: 2,
                },
                ErrorPolicy::default(),
            )
            .await;
        assert_eq!(pipeline.connector.worker_count(), 2);

        for i in 0..40 {
            let key = format!("customer-{}", i % 4);
            let headers = headers(&format!("m-{}", i), "Test.Event, Tests")
                .with(header_names::MESSAGE_KEY, &key);
            broker
                .produce("orders", serde_json::to_vec(&json!({"seq": i})).unwrap(), headers)
                .await
                .unwrap();
        }

        eventually("all messages handled", || recorder.messages().len() == 40).await;

        let messages = recorder.messages();
        for partition in 0..4 {
            let offsets: Vec<u64> = messages
                .iter()
                .filter(|m| m.partition.partition == partition)
                .map(|m| m.offset.0)
                .collect();
            let expected: Vec<u64> = (0..offsets.len() as u64).collect();
            assert_eq!(offsets, expected, "partition {} out of order", partition);
        }

        pipeline.connector.stop().await.unwrap();
    }

    // =========================================================================
    // SHUTDOWN
    // =========================================================================

    #[tokio::test]
    async fn test_shutdown_interrupts_retry_delay_without_commit() {
        let broker = Arc::new(InMemoryBroker::new());
        let recorder = Recorder::always_failing();
        let mut pipeline = Pipeline::new(Arc::clone(&broker), recorder.clone());
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::retry(5).with_delay(Duration::from_secs(60), Duration::ZERO),
            )
            .await;

        produce_json(&broker, "orders", "o-1", json!({"id": 1})).await;
        eventually("first attempt failed", || recorder.calls() == 1).await;

        tokio::time::timeout(Duration::from_secs(5), pipeline.connector.stop())
            .await
            .expect("stop waited for the retry delay")
            .unwrap();

        assert_eq!(recorder.calls(), 1);
        assert_eq!(pipeline.committed("orders", 0), None);
        assert_eq!(broker.member_count("orders"), 0);

        let report = pipeline.next_report().await;
        assert_eq!(report.result, Ok(()));
    }

    // =========================================================================
    // CONFIGURATION
    // =========================================================================

    #[tokio::test]
    async fn test_invalid_configuration_rejected_before_consumption() {
        let broker = Arc::new(InMemoryBroker::new());
        let mut pipeline = Pipeline::new(Arc::clone(&broker), Recorder::new());

        let chunked = Endpoint::new("orders").with_chunking(ChunkSettings::enabled(0));
        assert_eq!(
            pipeline.connector.bind(
                chunked,
                InboundConnectorSettings::default(),
                ErrorPolicy::default()
            ),
            Err(ConfigError::InvalidChunkSize)
        );

        let settings = InboundConnectorSettings {
            batch: BatchSettings::enabled(5, Duration::ZERO),
            consumers: 1,
        };
        assert_eq!(
            pipeline
                .connector
                .bind(Endpoint::new("orders"), settings, ErrorPolicy::default()),
            Err(ConfigError::InvalidBatchWaitTime)
        );

        assert!(matches!(
            pipeline.connector.bind(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::chain(vec![ErrorPolicy::retry(0)])
            ),
            Err(ConfigError::InvalidErrorPolicy(_))
        ));

        pipeline.connector.start().await.unwrap();
        assert_eq!(pipeline.connector.worker_count(), 0);
        assert_eq!(broker.member_count("orders"), 0);
    }

    #[tokio::test]
    async fn test_typed_subscriptions_receive_their_types() {
        let broker = Arc::new(InMemoryBroker::new());
        let created = Recorder::new();
        let everything = Recorder::new();
        let mut dispatcher = Dispatcher::new(Arc::new(MessageTypeRegistry::new()));
        dispatcher.subscribe(Subscription::for_type(
            "Orders.Created, Orders",
            created.clone() as Arc<dyn MessageHandler>,
        ));
        dispatcher.subscribe(Subscription::all(everything.clone()));
        let mut pipeline =
            Pipeline::with_parts(Arc::clone(&broker), dispatcher, Arc::new(InMemoryChunkStore::new()));
        pipeline
            .start(
                Endpoint::new("orders"),
                InboundConnectorSettings::default(),
                ErrorPolicy::default(),
            )
            .await;

        broker
            .produce(
                "orders",
                b"{}".to_vec(),
                headers("a", "Orders.Created, Orders, Version=1.0.0.0"),
            )
            .await
            .unwrap();
        broker
            .produce("orders", b"{}".to_vec(), headers("b", "Orders.Cancelled, Orders"))
            .await
            .unwrap();

        eventually("both messages handled", || everything.messages().len() == 2).await;
        assert_eq!(created.message_ids(), vec!["a".to_string()]);

        pipeline.connector.stop().await.unwrap();
    }
}
