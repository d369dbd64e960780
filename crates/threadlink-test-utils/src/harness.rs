// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end bridge testing.
//!
//! `TestHarness` assembles a complete [`BridgeEngine`] over mock adapters and
//! a temporary scratch directory. Tests drive it through
//! [`BridgeEngine::handle_source_event`] and [`BridgeEngine::route_outbound`]
//! and then assert on what the mocks captured.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use threadlink_bridge::{BridgeAdapters, BridgeEngine};
use threadlink_config::ThreadlinkConfig;
use threadlink_core::sink::{SinkChat, SinkUser, TopicMessage};
use threadlink_core::source::{MessageKey, MessagePayload, SourceMessage};
use threadlink_core::{BridgeError, ConversationId, SinkMessageId, TopicId};

use crate::memory_store::MemoryDocumentStore;
use crate::mock_sink::MockSink;
use crate::mock_source::MockSource;
use crate::mock_transcoder::MockTranscoder;

/// Sink user id that is privileged in every harness.
pub const OPERATOR_ID: i64 = 1001;

/// Chat id of the bridged supergroup.
pub const GROUP_CHAT_ID: i64 = -100_123;

static NEXT_MESSAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_message_id() -> String {
    format!("3EB0{:08X}", NEXT_MESSAGE_ID.fetch_add(1, Ordering::SeqCst))
}

type ConfigTweak = Box<dyn FnOnce(&mut ThreadlinkConfig) + Send>;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    tweaks: Vec<ConfigTweak>,
    documents: Option<Arc<MemoryDocumentStore>>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            tweaks: Vec::new(),
            documents: None,
        }
    }

    /// Adjust the configuration before the engine is built.
    pub fn with_config(mut self, tweak: impl FnOnce(&mut ThreadlinkConfig) + Send + 'static) -> Self {
        self.tweaks.push(Box::new(tweak));
        self
    }

    /// Start from an existing document store, e.g. one holding a legacy document.
    pub fn with_documents(mut self, documents: Arc<MemoryDocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Build the engine over fresh mocks.
    pub async fn build(self) -> Result<TestHarness, BridgeError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| BridgeError::Storage {
            source: Box::new(e),
        })?;

        let mut config = ThreadlinkConfig::default();
        config.auth.privileged_operators = vec![OPERATOR_ID];
        config.media.scratch_dir = temp_dir.path().join("scratch").to_string_lossy().into_owned();
        config.sync.reconcile_throttle_ms = 0;
        for tweak in self.tweaks {
            tweak(&mut config);
        }

        let source = Arc::new(MockSource::new());
        let sink = Arc::new(MockSink::new());
        let transcoder = Arc::new(MockTranscoder::new());
        let documents = self
            .documents
            .unwrap_or_else(|| Arc::new(MemoryDocumentStore::new()));

        let engine = BridgeEngine::new(
            &config,
            BridgeAdapters {
                source: source.clone(),
                sink: sink.clone(),
                transcoder: transcoder.clone(),
                documents: documents.clone(),
            },
        )
        .await?;

        Ok(TestHarness {
            engine,
            source,
            sink,
            transcoder,
            documents,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete bridge over mock adapters.
pub struct TestHarness {
    pub engine: BridgeEngine,
    pub source: Arc<MockSource>,
    pub sink: Arc<MockSink>,
    pub transcoder: Arc<MockTranscoder>,
    pub documents: Arc<MemoryDocumentStore>,
    pub config: ThreadlinkConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default configuration.
    pub async fn new() -> Result<Self, BridgeError> {
        Self::builder().build().await
    }

    /// Feed one inbound message through the engine.
    pub async fn receive(&self, message: SourceMessage) {
        self.engine
            .handle_source_event(threadlink_core::source::SourceEvent::Message(message))
            .await;
    }

    /// Feed one operator message through the engine.
    pub async fn operator_says(&self, message: TopicMessage) {
        self.engine.route_outbound(message).await;
    }

    /// Mapped topic for `conversation`, panicking if there is none.
    pub async fn topic_of(&self, conversation: &str) -> TopicId {
        self.engine
            .topic_for(&ConversationId::new(conversation))
            .await
            .unwrap_or_else(|| panic!("no topic mapped for {conversation}"))
    }
}

/// An inbound message carrying `payload`. `participant` is the author inside a group.
pub fn media_message(
    conversation: &str,
    participant: Option<&str>,
    push_name: Option<&str>,
    payload: MessagePayload,
) -> SourceMessage {
    SourceMessage {
        key: MessageKey {
            remote_jid: ConversationId::new(conversation),
            from_me: false,
            id: next_message_id(),
            participant: participant.map(str::to_string),
        },
        push_name: push_name.map(str::to_string),
        message_timestamp: Some(1_700_000_000),
        message: Some(payload),
    }
}

/// An inbound plain text message.
pub fn text_message(
    conversation: &str,
    participant: Option<&str>,
    push_name: Option<&str>,
    text: &str,
) -> SourceMessage {
    media_message(
        conversation,
        participant,
        push_name,
        MessagePayload::text_message(text),
    )
}

/// An operator text message posted in `topic`.
pub fn operator_message(topic: TopicId, operator: i64, text: &str) -> TopicMessage {
    static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(10_000);
    let id = NEXT_SINK_ID.fetch_add(1, Ordering::SeqCst);
    TopicMessage {
        message_id: SinkMessageId(i64::try_from(id).unwrap_or(i64::MAX)),
        message_thread_id: Some(topic),
        from: Some(SinkUser {
            id: operator,
            first_name: "Operator".into(),
            ..SinkUser::default()
        }),
        chat: SinkChat {
            id: GROUP_CHAT_ID,
            kind: "supergroup".into(),
            title: Some("Bridge".into()),
        },
        date: 1_700_000_000,
        text: Some(text.to_string()),
        ..TopicMessage::default()
    }
}
