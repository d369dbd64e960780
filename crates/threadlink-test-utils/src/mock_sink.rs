// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Sink client for deterministic testing.
//!
//! `MockSink` implements `SinkClient` with an in-memory forum: topics are
//! numbered from 100, every send is captured, and deleted topics answer with
//! the same thread-not-found error the real bot API produces.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use threadlink_core::sink::{SinkOutgoing, TopicMessage};
use threadlink_core::{
    AdapterType, BridgeError, HealthStatus, PluginAdapter, SinkClient, SinkMessageId, TopicColor,
    TopicId,
};

/// First topic id handed out by `create_topic`.
const FIRST_TOPIC_ID: i64 = 100;

/// A message passed to `send`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentSinkMessage {
    pub id: SinkMessageId,
    pub topic: TopicId,
    pub message: SinkOutgoing,
}

/// A mock Sink client.
pub struct MockSink {
    events: Mutex<VecDeque<TopicMessage>>,
    notify: Notify,
    sent: Mutex<Vec<SentSinkMessage>>,
    created: Mutex<Vec<(TopicId, String, TopicColor)>>,
    edits: Mutex<Vec<(TopicId, String)>>,
    pins: Mutex<Vec<SinkMessageId>>,
    reactions: Mutex<Vec<(SinkMessageId, String)>>,
    deleted: Mutex<HashSet<TopicId>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    next_topic: AtomicI64,
    next_message: AtomicI64,
    create_delay: Mutex<Option<Duration>>,
    fail_create: AtomicBool,
    always_missing: AtomicBool,
    exists_calls: AtomicUsize,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            sent: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            pins: Mutex::new(Vec::new()),
            reactions: Mutex::new(Vec::new()),
            deleted: Mutex::new(HashSet::new()),
            files: Mutex::new(HashMap::new()),
            next_topic: AtomicI64::new(FIRST_TOPIC_ID),
            next_message: AtomicI64::new(1),
            create_delay: Mutex::new(None),
            fail_create: AtomicBool::new(false),
            always_missing: AtomicBool::new(false),
            exists_calls: AtomicUsize::new(0),
        }
    }

    /// Queue an operator message for `next_event()`.
    pub async fn inject_message(&self, message: TopicMessage) {
        self.events.lock().await.push_back(message);
        self.notify.notify_one();
    }

    /// Simulate an operator deleting `topic`.
    pub async fn delete_topic(&self, topic: TopicId) {
        self.deleted.lock().await.insert(topic);
    }

    /// Make every send fail with thread-not-found, even into fresh topics.
    pub fn always_thread_not_found(&self, enabled: bool) {
        self.always_missing.store(enabled, Ordering::SeqCst);
    }

    /// Delay every `create_topic` call by `delay`.
    pub async fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().await = Some(delay);
    }

    pub fn fail_create_topic(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Bytes returned by `download_file(file_id)`.
    pub async fn set_file(&self, file_id: &str, data: &[u8]) {
        self.files
            .lock()
            .await
            .insert(file_id.to_string(), data.to_vec());
    }

    pub async fn sent_messages(&self) -> Vec<SentSinkMessage> {
        self.sent.lock().await.clone()
    }

    /// Messages delivered into `topic`, in order.
    pub async fn sent_to(&self, topic: TopicId) -> Vec<SinkOutgoing> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.message.clone())
            .collect()
    }

    /// Every created topic as `(id, title, color)`.
    pub async fn created_topics(&self) -> Vec<(TopicId, String, TopicColor)> {
        self.created.lock().await.clone()
    }

    pub async fn topic_edits(&self) -> Vec<(TopicId, String)> {
        self.edits.lock().await.clone()
    }

    pub async fn pinned(&self) -> Vec<SinkMessageId> {
        self.pins.lock().await.clone()
    }

    pub async fn reactions(&self) -> Vec<(SinkMessageId, String)> {
        self.reactions.lock().await.clone()
    }

    /// Number of `topic_exists` probes made so far.
    pub fn topic_exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    async fn is_missing(&self, topic: TopicId) -> bool {
        self.always_missing.load(Ordering::SeqCst) || self.deleted.lock().await.contains(&topic)
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

fn thread_not_found() -> BridgeError {
    BridgeError::ThreadNotFound {
        message: "Bad Request: message thread not found".into(),
    }
}

#[async_trait]
impl PluginAdapter for MockSink {
    fn name(&self) -> &str {
        "mock-sink"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl SinkClient for MockSink {
    async fn connect(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<TopicMessage, BridgeError> {
        loop {
            {
                let mut queue = self.events.lock().await;
                if let Some(message) = queue.pop_front() {
                    return Ok(message);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn send(
        &self,
        topic: TopicId,
        message: SinkOutgoing,
    ) -> Result<SinkMessageId, BridgeError> {
        if self.is_missing(topic).await {
            return Err(thread_not_found());
        }
        let id = SinkMessageId(self.next_message.fetch_add(1, Ordering::SeqCst));
        self.sent.lock().await.push(SentSinkMessage { id, topic, message });
        Ok(id)
    }

    async fn create_topic(&self, title: &str, color: TopicColor) -> Result<TopicId, BridgeError> {
        let delay = *self.create_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(BridgeError::sink("Bad Request: not enough rights to create a topic"));
        }
        let topic = TopicId(self.next_topic.fetch_add(1, Ordering::SeqCst));
        self.created
            .lock()
            .await
            .push((topic, title.to_string(), color));
        Ok(topic)
    }

    async fn edit_topic(&self, topic: TopicId, title: &str) -> Result<(), BridgeError> {
        if self.is_missing(topic).await {
            return Err(thread_not_found());
        }
        self.edits.lock().await.push((topic, title.to_string()));
        Ok(())
    }

    async fn topic_exists(&self, topic: TopicId) -> Result<bool, BridgeError> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(!self.is_missing(topic).await)
    }

    async fn pin_message(&self, message: SinkMessageId) -> Result<(), BridgeError> {
        self.pins.lock().await.push(message);
        Ok(())
    }

    async fn set_reaction(&self, message: SinkMessageId, emoji: &str) -> Result<(), BridgeError> {
        self.reactions
            .lock()
            .await
            .push((message, emoji.to_string()));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BridgeError> {
        self.files
            .lock()
            .await
            .get(file_id)
            .cloned()
            .ok_or_else(|| BridgeError::sink(format!("Bad Request: invalid file_id {file_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topics_are_numbered_from_one_hundred() {
        let sink = MockSink::new();
        let first = sink.create_topic("A", TopicColor::Blue).await.unwrap();
        let second = sink.create_topic("B", TopicColor::Green).await.unwrap();
        assert_eq!(first, TopicId(100));
        assert_eq!(second, TopicId(101));
        assert_eq!(sink.created_topics().await.len(), 2);
    }

    #[tokio::test]
    async fn deleted_topic_rejects_sends() {
        let sink = MockSink::new();
        let topic = sink.create_topic("A", TopicColor::Blue).await.unwrap();
        sink.delete_topic(topic).await;

        let err = sink.send(topic, SinkOutgoing::text("hi")).await.unwrap_err();
        assert!(err.is_thread_not_found());
        assert!(!sink.topic_exists(topic).await.unwrap());
        assert_eq!(sink.topic_exists_calls(), 1);
        assert!(sink.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_file_is_an_error() {
        let sink = MockSink::new();
        sink.set_file("f1", b"bytes").await;
        assert_eq!(sink.download_file("f1").await.unwrap(), b"bytes");
        assert!(sink.download_file("f2").await.is_err());
    }
}
