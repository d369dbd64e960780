// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic lifecycle tests: creation, concurrency, healing and reconciliation.

use std::sync::Arc;
use std::time::Duration;

use threadlink_bridge::TopicContext;
use threadlink_bridge::store::MAPPINGS_NAMESPACE;
use threadlink_core::sink::{SinkMedia, SinkOutgoing};
use threadlink_core::{BridgeError, ConversationId, TopicColor, TopicId};
use threadlink_test_utils::{MemoryDocumentStore, TestHarness, text_message};

const ALICE: &str = "4915112345678@s.whatsapp.net";
const TEAM: &str = "120363025@g.us";

fn texts(messages: &[SinkOutgoing]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            SinkOutgoing::Text { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

// ---- Creation ----

#[tokio::test(start_paused = true)]
async fn test_concurrent_messages_create_single_topic() {
    let harness = TestHarness::builder()
        .with_config(|c| c.bridge.welcome_message = false)
        .build()
        .await
        .unwrap();
    harness.sink.set_create_delay(Duration::from_millis(50)).await;

    let messages: Vec<_> = (0..8)
        .map(|i| text_message(ALICE, None, Some("Alice"), &format!("msg {i}")))
        .collect();
    futures::future::join_all(messages.into_iter().map(|m| harness.receive(m))).await;

    let created = harness.sink.created_topics().await;
    assert_eq!(created.len(), 1, "one conversation must map to one topic");
    let topic = harness.topic_of(ALICE).await;
    assert_eq!(created[0].0, topic);
    assert_eq!(texts(&harness.sink.sent_to(topic).await).len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_ensure_topic_shares_result() {
    let harness = TestHarness::new().await.unwrap();
    harness.sink.set_create_delay(Duration::from_millis(20)).await;
    let conversation = ConversationId::new(ALICE);
    let context = TopicContext::default();

    let results = futures::future::join_all(
        (0..5).map(|_| harness.engine.ensure_topic(&conversation, &context)),
    )
    .await;
    let topics: Vec<TopicId> = results.into_iter().map(Result::unwrap).collect();
    assert!(topics.iter().all(|t| *t == topics[0]));
    assert_eq!(harness.sink.created_topics().await.len(), 1);
}

#[tokio::test]
async fn test_ensure_topic_is_idempotent() {
    let harness = TestHarness::new().await.unwrap();
    let conversation = ConversationId::new(ALICE);
    let first = harness
        .engine
        .ensure_topic(&conversation, &TopicContext::default())
        .await
        .unwrap();
    let second = harness
        .engine
        .ensure_topic(&conversation, &TopicContext::default())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(harness.sink.created_topics().await.len(), 1);
    assert_eq!(
        harness.engine.conversation_for_topic(first).await,
        Some(conversation)
    );
}

#[tokio::test]
async fn test_failed_creation_is_reported_and_retried_later() {
    let harness = TestHarness::new().await.unwrap();
    let conversation = ConversationId::new(ALICE);
    harness.sink.fail_create_topic(true);

    let err = harness
        .engine
        .ensure_topic(&conversation, &TopicContext::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to create topic"));
    assert!(harness.engine.topic_for(&conversation).await.is_none());

    harness.sink.fail_create_topic(false);
    assert!(
        harness
            .engine
            .ensure_topic(&conversation, &TopicContext::default())
            .await
            .is_ok()
    );
}

// ---- Titles and welcome ----

#[tokio::test]
async fn test_direct_topic_title_falls_back_to_push_name_then_phone() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .receive(text_message(ALICE, None, Some("  Alice  "), "hi"))
        .await;
    harness
        .receive(text_message("4917000000000@s.whatsapp.net", None, None, "hey"))
        .await;

    let created = harness.sink.created_topics().await;
    assert_eq!(created[0].1, "Alice");
    assert_eq!(created[0].2, TopicColor::Blue);
    assert_eq!(created[1].1, "+4917000000000");
}

#[tokio::test]
async fn test_direct_topic_title_prefers_contact_directory() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .engine
        .handle_contacts(&[threadlink_core::source::Contact {
            id: ALICE.into(),
            name: Some("Alice Liddell".into()),
            ..Default::default()
        }])
        .await;
    harness
        .receive(text_message(ALICE, None, Some("ali"), "hi"))
        .await;
    assert_eq!(harness.sink.created_topics().await[0].1, "Alice Liddell");
}

#[tokio::test]
async fn test_group_topic_uses_subject_and_welcome_counts_participants() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .source
        .set_group(&ConversationId::new(TEAM), "Team Chat", 3)
        .await;
    harness
        .receive(text_message(TEAM, Some(ALICE), Some("Alice"), "hello team"))
        .await;

    let created = harness.sink.created_topics().await;
    assert_eq!(created[0].1, "Team Chat");
    assert_eq!(created[0].2, TopicColor::Green);

    let topic = harness.topic_of(TEAM).await;
    let sent = texts(&harness.sink.sent_to(topic).await);
    assert_eq!(sent[0], "👥 Group: Team Chat\n👤 Participants: 3");
    assert_eq!(sent[1], "👤 Alice:\nhello team");
    assert_eq!(harness.sink.pinned().await.len(), 1);

    let saved = harness.documents.document(MAPPINGS_NAMESPACE).await.unwrap();
    assert_eq!(saved["chatMappings"][TEAM]["topicId"], topic.0);
}

#[tokio::test]
async fn test_unknown_group_gets_fallback_title() {
    let harness = TestHarness::new().await.unwrap();
    harness
        .receive(text_message(TEAM, Some(ALICE), None, "hi"))
        .await;
    assert_eq!(harness.sink.created_topics().await[0].1, "Group Chat");
}

#[tokio::test]
async fn test_direct_welcome_and_profile_picture() {
    let harness = TestHarness::new().await.unwrap();
    let conversation = ConversationId::new(ALICE);
    harness
        .source
        .set_profile_picture(&conversation, Some("https://pps.example/alice.jpg"))
        .await;
    harness.source.set_about(&conversation, "Busy").await;
    harness
        .receive(text_message(ALICE, None, Some("Alice"), "hi"))
        .await;

    let topic = harness.topic_of(ALICE).await;
    let sent = harness.sink.sent_to(topic).await;
    assert_eq!(
        sent[0],
        SinkOutgoing::Photo {
            media: SinkMedia::Url("https://pps.example/alice.jpg".into()),
            caption: Some("📷 Profile picture".into()),
        }
    );
    assert_eq!(
        texts(&sent)[0],
        "👤 Contact: Alice\n📱 Phone: +4915112345678\n💬 About: Busy"
    );
    let mapping = harness.engine.store().mapping(&conversation).await.unwrap();
    assert_eq!(
        mapping.profile_picture_url.as_deref(),
        Some("https://pps.example/alice.jpg")
    );
}

#[tokio::test]
async fn test_welcome_disabled_sends_only_content() {
    let harness = TestHarness::builder()
        .with_config(|c| {
            c.bridge.welcome_message = false;
            c.bridge.profile_pictures = false;
        })
        .build()
        .await
        .unwrap();
    harness
        .receive(text_message(ALICE, None, Some("Alice"), "only this"))
        .await;
    let topic = harness.topic_of(ALICE).await;
    assert_eq!(
        harness.sink.sent_to(topic).await,
        vec![SinkOutgoing::text("only this")]
    );
    assert!(harness.sink.pinned().await.is_empty());
}

// ---- Healing ----

#[tokio::test]
async fn test_deleted_topic_is_recreated_and_message_delivered() {
    let harness = TestHarness::builder()
        .with_config(|c| c.bridge.welcome_message = false)
        .build()
        .await
        .unwrap();
    harness
        .receive(text_message(ALICE, None, Some("Alice"), "first"))
        .await;
    let stale = harness.topic_of(ALICE).await;
    harness.sink.delete_topic(stale).await;

    harness
        .receive(text_message(ALICE, None, Some("Alice"), "second"))
        .await;

    let healed = harness.topic_of(ALICE).await;
    assert_ne!(healed, stale);
    assert_eq!(harness.sink.created_topics().await.len(), 2);
    assert_eq!(texts(&harness.sink.sent_to(healed).await), vec!["second"]);
    assert_eq!(harness.engine.conversation_for_topic(stale).await, None);
}

#[tokio::test]
async fn test_healing_retries_only_once() {
    let harness = TestHarness::builder()
        .with_config(|c| c.bridge.welcome_message = false)
        .build()
        .await
        .unwrap();
    harness
        .receive(text_message(ALICE, None, Some("Alice"), "first"))
        .await;
    harness.sink.always_thread_not_found(true);

    harness
        .receive(text_message(ALICE, None, Some("Alice"), "lost"))
        .await;

    // Original topic plus exactly one replacement.
    assert_eq!(harness.sink.created_topics().await.len(), 2);
    let delivered: Vec<_> = harness
        .sink
        .sent_messages()
        .await
        .into_iter()
        .filter(|m| m.message.text_content() == Some("lost"))
        .collect();
    assert!(delivered.is_empty());
}

#[tokio::test]
async fn test_stale_heal_does_not_recreate_twice() {
    let harness = TestHarness::new().await.unwrap();
    let conversation = ConversationId::new(ALICE);
    let context = TopicContext::default();
    let stale = harness
        .engine
        .ensure_topic(&conversation, &context)
        .await
        .unwrap();
    harness.sink.delete_topic(stale).await;

    let first = harness.engine.reconcile_all_topics().await;
    assert_eq!(first.healed, 1);
    let healed = harness.topic_of(ALICE).await;

    // A late failure for the old topic must not replace the new mapping.
    assert!(
        !harness
            .engine
            .store()
            .remove_mapping_if(&conversation, stale)
            .await
            .unwrap()
    );
    assert_eq!(harness.topic_of(ALICE).await, healed);
    assert_eq!(harness.sink.created_topics().await.len(), 2);
}

// ---- Reconciliation ----

#[tokio::test]
async fn test_reconcile_heals_only_missing_topics() {
    let harness = TestHarness::new().await.unwrap();
    let bob = "4916000000000@s.whatsapp.net";
    harness
        .receive(text_message(ALICE, None, Some("Alice"), "hi"))
        .await;
    harness
        .receive(text_message(bob, None, Some("Bob"), "hi"))
        .await;
    let alice_topic = harness.topic_of(ALICE).await;
    let bob_topic = harness.topic_of(bob).await;
    harness.sink.delete_topic(bob_topic).await;

    let report = harness.engine.reconcile_all_topics().await;
    assert_eq!(report.checked, 2);
    assert_eq!(report.healed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(harness.topic_of(ALICE).await, alice_topic);
    assert_ne!(harness.topic_of(bob).await, bob_topic);
    // Cached verification is bypassed: both topics were probed.
    assert_eq!(harness.sink.topic_exists_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_reconcile_throttles_probes() {
    let harness = TestHarness::builder()
        .with_config(|c| c.sync.reconcile_throttle_ms = 500)
        .build()
        .await
        .unwrap();
    for phone in ["4911", "4912", "4913"] {
        harness
            .receive(text_message(
                &format!("{phone}000000@s.whatsapp.net"),
                None,
                None,
                "hi",
            ))
            .await;
    }
    let started = tokio::time::Instant::now();
    let report = harness.engine.reconcile_all_topics().await;
    assert_eq!(report.checked, 3);
    assert!(started.elapsed() >= Duration::from_millis(1000));
}

// ---- Persistence ----

#[tokio::test]
async fn test_legacy_mapping_document_is_migrated() {
    let documents = Arc::new(MemoryDocumentStore::with_document(
        MAPPINGS_NAMESPACE,
        serde_json::json!({
            "chatMappings": {
                ALICE: 42,
                TEAM: { "topicId": 43, "lastActivity": "2025-01-01T00:00:00Z" }
            },
            "contactMappings": { "4915112345678": "Alice" },
            "filters": ["secret"]
        }),
    ));
    let harness = TestHarness::builder()
        .with_documents(Arc::clone(&documents))
        .build()
        .await
        .unwrap();

    assert_eq!(harness.topic_of(ALICE).await, TopicId(42));
    assert_eq!(harness.topic_of(TEAM).await, TopicId(43));
    assert_eq!(documents.save_count(), 1);

    let saved = documents.document(MAPPINGS_NAMESPACE).await.unwrap();
    assert_eq!(saved["schemaVersion"], 2);
    assert_eq!(saved["chatMappings"][ALICE]["topicId"], 42);
    assert_eq!(saved["filters"][0], "secret");
}

#[tokio::test]
async fn test_failed_save_leaves_no_mapping_or_filter_behind() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let harness = TestHarness::builder()
        .with_config(|c| c.bridge.welcome_message = false)
        .with_documents(Arc::clone(&documents))
        .build()
        .await
        .unwrap();
    let conversation = ConversationId::new(ALICE);
    documents.fail_saves(true);

    let err = harness
        .engine
        .ensure_topic(&conversation, &TopicContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::TopicCreation { .. }));
    assert_eq!(harness.engine.topic_for(&conversation).await, None);

    assert!(harness.engine.add_filter("spam").await.is_err());
    assert!(harness.engine.store().filters().await.is_empty());
    assert!(!harness.engine.store().is_blocked("spam offer").await);

    documents.fail_saves(false);
    let topic = harness
        .engine
        .ensure_topic(&conversation, &TopicContext::default())
        .await
        .unwrap();
    assert_eq!(harness.sink.created_topics().await.len(), 2);
    assert_eq!(harness.engine.topic_for(&conversation).await, Some(topic));
    let saved = documents.document(MAPPINGS_NAMESPACE).await.unwrap();
    assert_eq!(saved["chatMappings"][ALICE]["topicId"], topic.0);
}

#[tokio::test]
async fn test_current_document_loads_without_rewrite() {
    let documents = Arc::new(MemoryDocumentStore::with_document(
        MAPPINGS_NAMESPACE,
        serde_json::json!({
            "schemaVersion": 2,
            "chatMappings": {
                ALICE: { "topicId": 7, "lastActivity": "2025-01-01T00:00:00Z" }
            }
        }),
    ));
    let harness = TestHarness::builder()
        .with_documents(Arc::clone(&documents))
        .build()
        .await
        .unwrap();
    assert_eq!(harness.topic_of(ALICE).await, TopicId(7));
    assert_eq!(documents.save_count(), 0);
}

#[tokio::test]
async fn test_mappings_survive_restart() {
    let documents = Arc::new(MemoryDocumentStore::new());
    let first = TestHarness::builder()
        .with_documents(Arc::clone(&documents))
        .build()
        .await
        .unwrap();
    first
        .receive(text_message(ALICE, None, Some("Alice"), "hi"))
        .await;
    let topic = first.topic_of(ALICE).await;
    first.engine.shutdown().await;

    let second = TestHarness::builder()
        .with_documents(documents)
        .build()
        .await
        .unwrap();
    assert_eq!(second.topic_of(ALICE).await, topic);
    assert_eq!(
        second.engine.conversation_for_topic(topic).await,
        Some(ConversationId::new(ALICE))
    );
}
