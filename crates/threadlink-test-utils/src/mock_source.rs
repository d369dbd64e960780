// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Source transport for deterministic testing.
//!
//! `MockSource` implements `SourceClient` with injectable events, canned
//! metadata lookups, and captured sends, receipts, and presence updates.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use threadlink_core::source::{
    Contact, GroupMetadata, GroupParticipant, MediaKind, MediaMessage, MessageKey,
    OutgoingContent, SendOptions, SourceEvent,
};
use threadlink_core::{
    AdapterType, BridgeError, ConversationId, HealthStatus, MediaStream, PluginAdapter,
    PresenceKind, SourceClient,
};

/// A message passed to `send_message`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentSourceMessage {
    pub conversation: ConversationId,
    pub content: OutgoingContent,
    pub options: SendOptions,
}

/// A mock Source transport.
pub struct MockSource {
    events: Mutex<VecDeque<SourceEvent>>,
    notify: Notify,
    sent: Mutex<Vec<SentSourceMessage>>,
    read_batches: Mutex<Vec<Vec<MessageKey>>>,
    presences: Mutex<Vec<(ConversationId, PresenceKind)>>,
    groups: Mutex<HashMap<ConversationId, GroupMetadata>>,
    pictures: Mutex<HashMap<ConversationId, String>>,
    about: Mutex<HashMap<ConversationId, String>>,
    contacts: Mutex<Vec<Contact>>,
    media: Mutex<HashMap<String, Vec<u8>>>,
    fail_sends: AtomicBool,
    next_id: AtomicU64,
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            sent: Mutex::new(Vec::new()),
            read_batches: Mutex::new(Vec::new()),
            presences: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            pictures: Mutex::new(HashMap::new()),
            about: Mutex::new(HashMap::new()),
            contacts: Mutex::new(Vec::new()),
            media: Mutex::new(HashMap::new()),
            fail_sends: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Queue an event for `next_event()`.
    pub async fn inject_event(&self, event: SourceEvent) {
        self.events.lock().await.push_back(event);
        self.notify.notify_one();
    }

    /// Register a group with `participants` members.
    pub async fn set_group(&self, conversation: &ConversationId, subject: &str, participants: usize) {
        let metadata = GroupMetadata {
            id: conversation.to_string(),
            subject: subject.to_string(),
            participants: (0..participants)
                .map(|i| GroupParticipant {
                    id: format!("49000{i}@s.whatsapp.net"),
                    admin: None,
                })
                .collect(),
            ..GroupMetadata::default()
        };
        self.groups.lock().await.insert(conversation.clone(), metadata);
    }

    pub async fn set_profile_picture(&self, conversation: &ConversationId, url: Option<&str>) {
        let mut pictures = self.pictures.lock().await;
        match url {
            Some(url) => pictures.insert(conversation.clone(), url.to_string()),
            None => pictures.remove(conversation),
        };
    }

    pub async fn set_about(&self, conversation: &ConversationId, about: &str) {
        self.about
            .lock()
            .await
            .insert(conversation.clone(), about.to_string());
    }

    pub async fn set_contacts(&self, contacts: Vec<Contact>) {
        *self.contacts.lock().await = contacts;
    }

    /// Bytes returned when downloading media with `media_key`.
    pub async fn set_media(&self, media_key: &str, data: &[u8]) {
        self.media
            .lock()
            .await
            .insert(media_key.to_string(), data.to_vec());
    }

    /// Make every `send_message` call fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_messages(&self) -> Vec<SentSourceMessage> {
        self.sent.lock().await.clone()
    }

    /// Batches passed to `read_messages`, one entry per call.
    pub async fn read_batches(&self) -> Vec<Vec<MessageKey>> {
        self.read_batches.lock().await.clone()
    }

    pub async fn presences(&self) -> Vec<(ConversationId, PresenceKind)> {
        self.presences.lock().await.clone()
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Source
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl SourceClient for MockSource {
    async fn connect(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<SourceEvent, BridgeError> {
        loop {
            {
                let mut queue = self.events.lock().await;
                if let Some(event) = queue.pop_front() {
                    return Ok(event);
                }
            }
            self.notify.notified().await;
        }
    }

    fn own_id(&self) -> Option<String> {
        Some("4900000000000@s.whatsapp.net".to_string())
    }

    async fn send_message(
        &self,
        conversation: &ConversationId,
        content: OutgoingContent,
        options: SendOptions,
    ) -> Result<Option<String>, BridgeError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BridgeError::source_failure("mock send failure"));
        }
        self.sent.lock().await.push(SentSourceMessage {
            conversation: conversation.clone(),
            content,
            options,
        });
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("MOCK{id}")))
    }

    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), BridgeError> {
        self.read_batches.lock().await.push(keys.to_vec());
        Ok(())
    }

    async fn send_presence(
        &self,
        conversation: &ConversationId,
        presence: PresenceKind,
    ) -> Result<(), BridgeError> {
        self.presences
            .lock()
            .await
            .push((conversation.clone(), presence));
        Ok(())
    }

    async fn profile_picture_url(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError> {
        Ok(self.pictures.lock().await.get(conversation).cloned())
    }

    async fn group_metadata(
        &self,
        conversation: &ConversationId,
    ) -> Result<GroupMetadata, BridgeError> {
        self.groups
            .lock()
            .await
            .get(conversation)
            .cloned()
            .ok_or_else(|| BridgeError::source_failure(format!("unknown group {conversation}")))
    }

    async fn fetch_status(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError> {
        Ok(self.about.lock().await.get(conversation).cloned())
    }

    async fn download_media(
        &self,
        media: &MediaMessage,
        _kind: MediaKind,
    ) -> Result<MediaStream, BridgeError> {
        let key = media
            .media_key
            .clone()
            .ok_or_else(|| BridgeError::Media("missing media key".into()))?;
        let data = self
            .media
            .lock()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_else(|| b"mock-media".to_vec());
        let (first, second) = data.split_at(data.len() / 2);
        let chunks: Vec<Result<Vec<u8>, BridgeError>> = vec![Ok(first.to_vec()), Ok(second.to_vec())];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn contacts(&self) -> Result<Vec<Contact>, BridgeError> {
        Ok(self.contacts.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn injected_events_are_returned_in_order() {
        let source = MockSource::new();
        source
            .inject_event(SourceEvent::ContactsUpsert(Vec::new()))
            .await;
        source.inject_event(SourceEvent::Call(Vec::new())).await;
        assert!(matches!(
            source.next_event().await.unwrap(),
            SourceEvent::ContactsUpsert(_)
        ));
        assert!(matches!(
            source.next_event().await.unwrap(),
            SourceEvent::Call(_)
        ));
    }

    #[tokio::test]
    async fn media_download_streams_registered_bytes() {
        let source = MockSource::new();
        source.set_media("key-1", b"abcdef").await;
        let media = MediaMessage {
            media_key: Some("key-1".into()),
            ..MediaMessage::default()
        };
        let stream = source.download_media(&media, MediaKind::Image).await.unwrap();
        let chunks: Vec<Vec<u8>> = stream.try_collect().await.unwrap();
        assert_eq!(chunks.concat(), b"abcdef");
    }

    #[tokio::test]
    async fn failing_sends_are_not_recorded() {
        let source = MockSource::new();
        source.fail_sends(true);
        let result = source
            .send_message(
                &ConversationId::new("1@s.whatsapp.net"),
                OutgoingContent::Text { text: "hi".into() },
                SendOptions::default(),
            )
            .await;
        assert!(result.is_err());
        assert!(source.sent_messages().await.is_empty());
    }
}
