// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests over the real SQLite document store.
//!
//! Each test opens its own database in a temp directory and drives a
//! complete engine over the mock Source and Sink.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use threadlink_bridge::{BridgeAdapters, BridgeEngine};
use threadlink_config::ThreadlinkConfig;
use threadlink_core::sink::SinkOutgoing;
use threadlink_core::source::{OutgoingContent, SourceEvent};
use threadlink_core::{ConversationId, DocumentStore, TopicId};
use threadlink_storage::SqliteDocumentStore;
use threadlink_test_utils::{
    MockSink, MockSource, MockTranscoder, OPERATOR_ID, operator_message, text_message,
};
use tokio_util::sync::CancellationToken;

const ALICE: &str = "4915112345678@s.whatsapp.net";

fn config(dir: &Path) -> ThreadlinkConfig {
    let mut config = ThreadlinkConfig::default();
    config.auth.privileged_operators = vec![OPERATOR_ID];
    config.storage.database_path = dir.join("threadlink.db").to_string_lossy().into_owned();
    config.media.scratch_dir = dir.join("scratch").to_string_lossy().into_owned();
    config.sync.reconcile_throttle_ms = 0;
    config.sync.contact_sync_interval_secs = 0;
    config.sync.reconcile_interval_secs = 0;
    config.bridge.welcome_message = false;
    config.bridge.profile_pictures = false;
    config
}

async fn engine(
    config: &ThreadlinkConfig,
    source: Arc<MockSource>,
    sink: Arc<MockSink>,
) -> (BridgeEngine, Arc<SqliteDocumentStore>) {
    let documents = Arc::new(
        SqliteDocumentStore::open(config.storage.clone())
            .await
            .unwrap(),
    );
    let engine = BridgeEngine::new(
        config,
        BridgeAdapters {
            source,
            sink,
            transcoder: Arc::new(MockTranscoder::new()),
            documents: documents.clone(),
        },
    )
    .await
    .unwrap();
    (engine, documents)
}

async fn wait_for<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_inbound_message_creates_topic_and_persists_mapping() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let source = Arc::new(MockSource::new());
    let sink = Arc::new(MockSink::new());
    let (engine, documents) = engine(&config, source, sink.clone()).await;

    engine
        .route_inbound(text_message(ALICE, None, Some("Alice"), "hello"))
        .await;
    engine.shutdown().await;

    let topic = engine
        .topic_for(&ConversationId::new(ALICE))
        .await
        .unwrap();
    assert_eq!(
        sink.sent_to(topic).await,
        vec![SinkOutgoing::text("hello")]
    );

    let stored = documents.load("mappings").await.unwrap().unwrap();
    assert_eq!(stored["schemaVersion"], 2);
    assert!(stored.to_string().contains(ALICE));
}

#[tokio::test]
async fn test_mapping_survives_restart_on_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let source = Arc::new(MockSource::new());
    let sink = Arc::new(MockSink::new());

    let first_topic = {
        let (engine, _) = engine(&config, source.clone(), sink.clone()).await;
        engine
            .route_inbound(text_message(ALICE, None, Some("Alice"), "one"))
            .await;
        engine.shutdown().await;
        engine.topic_for(&ConversationId::new(ALICE)).await.unwrap()
    };

    let (engine, _) = engine(&config, source, sink.clone()).await;
    assert_eq!(
        engine.topic_for(&ConversationId::new(ALICE)).await,
        Some(first_topic)
    );
    assert_eq!(
        engine.conversation_for_topic(first_topic).await,
        Some(ConversationId::new(ALICE))
    );

    engine
        .route_inbound(text_message(ALICE, None, Some("Alice"), "two"))
        .await;
    assert_eq!(sink.created_topics().await.len(), 1);
    assert_eq!(sink.sent_to(first_topic).await.len(), 2);
}

#[tokio::test]
async fn test_running_bridge_forwards_both_directions() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let source = Arc::new(MockSource::new());
    let sink = Arc::new(MockSink::new());
    let (engine, _) = engine(&config, source.clone(), sink.clone()).await;

    let cancel = CancellationToken::new();
    let runner = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { engine.run(cancel).await })
    };

    source
        .inject_event(SourceEvent::Message(text_message(
            ALICE,
            None,
            Some("Alice"),
            "ping",
        )))
        .await;
    wait_for(|| {
        let sink = sink.clone();
        async move { !sink.sent_messages().await.is_empty() }
    })
    .await;

    let topic: TopicId = engine.topic_for(&ConversationId::new(ALICE)).await.unwrap();
    sink.inject_message(operator_message(topic, OPERATOR_ID, "pong"))
        .await;
    wait_for(|| {
        let source = source.clone();
        async move { !source.sent_messages().await.is_empty() }
    })
    .await;

    cancel.cancel();
    runner.await.unwrap().unwrap();
    engine.shutdown().await;

    let sent = source.sent_messages().await;
    assert_eq!(sent[0].conversation, ConversationId::new(ALICE));
    assert_eq!(
        sent[0].content,
        OutgoingContent::Text {
            text: "pong".into()
        }
    );
}

#[tokio::test]
async fn test_filters_persist_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let source = Arc::new(MockSource::new());
    let sink = Arc::new(MockSink::new());

    {
        let (engine, _) = engine(&config, source.clone(), sink.clone()).await;
        assert!(engine.add_filter("/secret").await.unwrap());
        engine.shutdown().await;
    }

    let (engine, _) = engine(&config, source.clone(), sink.clone()).await;
    engine
        .route_inbound(text_message(ALICE, None, Some("Alice"), "hi"))
        .await;
    let topic = engine.topic_for(&ConversationId::new(ALICE)).await.unwrap();
    engine
        .route_outbound(operator_message(topic, OPERATOR_ID, "/secret plans"))
        .await;

    assert!(source.sent_messages().await.is_empty());
    assert_eq!(sink.reactions().await.last().map(|(_, e)| e.as_str()), Some("🙈"));
}
