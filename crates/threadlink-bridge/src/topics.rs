// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Topic lifecycle: on-demand creation, existence checks, healing and
//! batch reconciliation.
//!
//! Concurrent [`TopicManager::ensure_topic`] calls for one conversation share
//! a single creation future, so a burst of messages from a new chat produces
//! exactly one Sink topic.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use threadlink_config::model::BridgeConfig;
use threadlink_core::sink::{SinkMedia, SinkOutgoing};
use threadlink_core::{
    BridgeError, ConversationId, ConversationKind, SinkClient, SourceClient, TopicColor, TopicId,
};

use crate::metrics;
use crate::store::MappingStore;

pub const STATUS_TOPIC_TITLE: &str = "📊 Status Updates";
pub const CALL_LOG_TOPIC_TITLE: &str = "📞 Call Logs";
pub const GROUP_FALLBACK_TITLE: &str = "Group Chat";
pub const PROFILE_PICTURE_CAPTION: &str = "📷 Profile picture";

/// What the caller knows about a conversation that the store may not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicContext {
    /// Push name carried by the triggering message.
    pub push_name: Option<String>,
}

impl TopicContext {
    pub fn with_push_name(name: Option<&str>) -> Self {
        Self {
            push_name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
        }
    }
}

/// Feature switches consulted after a topic is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicOptions {
    pub welcome_message: bool,
    pub call_log_welcome: bool,
    pub profile_pictures: bool,
}

impl From<&BridgeConfig> for TopicOptions {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            welcome_message: config.welcome_message,
            call_log_welcome: config.call_log_welcome,
            profile_pictures: config.profile_pictures,
        }
    }
}

impl TopicOptions {
    fn welcome_for(&self, kind: ConversationKind) -> bool {
        match kind {
            ConversationKind::Direct | ConversationKind::Group => self.welcome_message,
            ConversationKind::CallLog => self.call_log_welcome,
            ConversationKind::StatusBroadcast => false,
        }
    }
}

/// Outcome of [`TopicManager::reconcile_all_topics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    pub healed: usize,
    pub failed: usize,
}

type PendingCreation = Shared<BoxFuture<'static, Result<TopicId, Arc<BridgeError>>>>;

/// `+<digits>` for phone-addressed conversations, the raw user part otherwise.
pub fn formatted_phone(conversation: &ConversationId) -> String {
    match conversation.phone() {
        Some(phone) => format!("+{phone}"),
        None => conversation.user_part().to_string(),
    }
}

#[derive(Clone)]
pub struct TopicManager {
    sink: Arc<dyn SinkClient>,
    source: Arc<dyn SourceClient>,
    store: MappingStore,
    options: TopicOptions,
    pending: Arc<Mutex<HashMap<ConversationId, PendingCreation>>>,
    verified: Arc<DashMap<TopicId, bool>>,
}

impl TopicManager {
    pub fn new(
        sink: Arc<dyn SinkClient>,
        source: Arc<dyn SourceClient>,
        store: MappingStore,
        options: TopicOptions,
    ) -> Self {
        Self {
            sink,
            source,
            store,
            options,
            pending: Arc::new(Mutex::new(HashMap::new())),
            verified: Arc::new(DashMap::new()),
        }
    }

    /// Returns the topic for `conversation`, creating it if needed.
    pub async fn ensure_topic(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
    ) -> Result<TopicId, BridgeError> {
        if let Some(topic) = self.store.topic_for(conversation).await {
            return Ok(topic);
        }

        let creation = {
            let mut pending = self.pending.lock().await;
            // A creation may have finished between the fast path and the lock.
            if let Some(topic) = self.store.topic_for(conversation).await {
                return Ok(topic);
            }
            pending
                .entry(conversation.clone())
                .or_insert_with(|| {
                    self.clone()
                        .create(conversation.clone(), context.clone())
                        .boxed()
                        .shared()
                })
                .clone()
        };

        creation
            .await
            .map_err(|source| BridgeError::TopicCreation {
                conversation: conversation.to_string(),
                source,
            })
    }

    async fn create(
        self,
        conversation: ConversationId,
        context: TopicContext,
    ) -> Result<TopicId, Arc<BridgeError>> {
        let result = self.create_topic(&conversation, &context).await;
        self.pending.lock().await.remove(&conversation);
        if let Err(e) = &result {
            warn!(conversation = %conversation, error = %e, "topic creation failed");
        }
        result.map_err(Arc::new)
    }

    async fn create_topic(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
    ) -> Result<TopicId, BridgeError> {
        let kind = conversation.kind();
        let (title, color) = self.title_for(conversation, context).await;

        let topic = self.sink.create_topic(&title, color).await?;
        self.store.set_mapping(conversation, topic).await?;
        self.verified.insert(topic, true);
        metrics::record_topic_created();
        info!(conversation = %conversation, topic = topic.0, title = %title, "topic created");

        if self.options.profile_pictures
            && matches!(kind, ConversationKind::Direct | ConversationKind::Group)
        {
            self.post_initial_picture(conversation, topic).await;
        }
        if self.options.welcome_for(kind) {
            self.post_welcome(conversation, topic, &title).await;
        }
        Ok(topic)
    }

    /// Topic title and icon color for a conversation.
    pub async fn title_for(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
    ) -> (String, TopicColor) {
        match conversation.kind() {
            ConversationKind::StatusBroadcast => {
                (STATUS_TOPIC_TITLE.to_string(), TopicColor::Violet)
            }
            ConversationKind::CallLog => (CALL_LOG_TOPIC_TITLE.to_string(), TopicColor::Red),
            ConversationKind::Group => {
                let subject = match self.source.group_metadata(conversation).await {
                    Ok(meta) if !meta.subject.trim().is_empty() => meta.subject,
                    Ok(_) => GROUP_FALLBACK_TITLE.to_string(),
                    Err(e) => {
                        warn!(conversation = %conversation, error = %e, "group metadata lookup failed");
                        GROUP_FALLBACK_TITLE.to_string()
                    }
                };
                (subject, TopicColor::Green)
            }
            ConversationKind::Direct => {
                let contact = match conversation.phone() {
                    Some(phone) => self.store.contact_name(&phone).await,
                    None => None,
                };
                let title = contact
                    .or_else(|| context.push_name.clone())
                    .unwrap_or_else(|| formatted_phone(conversation));
                (title, TopicColor::Blue)
            }
        }
    }

    async fn post_initial_picture(&self, conversation: &ConversationId, topic: TopicId) {
        let url = match self.source.profile_picture_url(conversation).await {
            Ok(Some(url)) => url,
            Ok(None) => return,
            Err(e) => {
                debug!(conversation = %conversation, error = %e, "no profile picture available");
                return;
            }
        };
        let photo = SinkOutgoing::Photo {
            media: SinkMedia::Url(url.clone()),
            caption: Some(PROFILE_PICTURE_CAPTION.to_string()),
        };
        if let Err(e) = self.sink.send(topic, photo).await {
            warn!(conversation = %conversation, error = %e, "failed to post profile picture");
            return;
        }
        if let Err(e) = self.store.set_profile_picture(conversation, Some(url)).await {
            warn!(conversation = %conversation, error = %e, "failed to cache profile picture");
        }
    }

    async fn post_welcome(&self, conversation: &ConversationId, topic: TopicId, title: &str) {
        let text = self.welcome_text(conversation, title).await;
        match self.sink.send(topic, SinkOutgoing::text(text)).await {
            Ok(message) => {
                if let Err(e) = self.sink.pin_message(message).await {
                    debug!(conversation = %conversation, error = %e, "failed to pin welcome message");
                }
            }
            Err(e) => warn!(conversation = %conversation, error = %e, "failed to send welcome message"),
        }
    }

    async fn welcome_text(&self, conversation: &ConversationId, title: &str) -> String {
        match conversation.kind() {
            ConversationKind::Direct => {
                let mut text = format!(
                    "👤 Contact: {title}\n📱 Phone: {}",
                    formatted_phone(conversation)
                );
                if let Ok(Some(about)) = self.source.fetch_status(conversation).await
                    && !about.trim().is_empty()
                {
                    text.push_str(&format!("\n💬 About: {}", about.trim()));
                }
                text
            }
            ConversationKind::Group => match self.source.group_metadata(conversation).await {
                Ok(meta) => {
                    let mut text = format!("👥 Group: {title}");
                    if let Some(desc) = meta.desc.as_deref().filter(|d| !d.trim().is_empty()) {
                        text.push_str(&format!("\n📝 Description: {}", desc.trim()));
                    }
                    text.push_str(&format!("\n👤 Participants: {}", meta.participants.len()));
                    text
                }
                Err(_) => format!("👥 Group: {title}"),
            },
            ConversationKind::CallLog => {
                "📞 Incoming call notifications are posted in this topic.".to_string()
            }
            ConversationKind::StatusBroadcast => title.to_string(),
        }
    }

    /// Probes the Sink for `topic`, caching definite answers.
    pub async fn verify_topic_exists(&self, topic: TopicId) -> Result<bool, BridgeError> {
        if let Some(known) = self.verified.get(&topic) {
            return Ok(*known);
        }
        let exists = self.sink.topic_exists(topic).await?;
        self.verified.insert(topic, exists);
        Ok(exists)
    }

    /// Drops the mapping to `stale` and creates a fresh topic.
    ///
    /// When another task already healed the conversation the mapping no longer
    /// points at `stale`, and the existing replacement is returned.
    pub async fn heal_on_missing(
        &self,
        conversation: &ConversationId,
        stale: TopicId,
        context: &TopicContext,
    ) -> Result<TopicId, BridgeError> {
        self.verified.insert(stale, false);
        if self.store.remove_mapping_if(conversation, stale).await? {
            metrics::record_topic_healed();
            info!(conversation = %conversation, stale_topic = stale.0, "topic missing, recreating");
        }
        self.ensure_topic(conversation, context).await
    }

    /// Probes every mapped topic and heals the missing ones.
    pub async fn reconcile_all_topics(&self, throttle: Duration) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mappings = self.store.all_mappings().await;
        for (index, (conversation, mapping)) in mappings.iter().enumerate() {
            if index > 0 && !throttle.is_zero() {
                tokio::time::sleep(throttle).await;
            }
            report.checked += 1;
            self.verified.remove(&mapping.topic_id);
            match self.verify_topic_exists(mapping.topic_id).await {
                Ok(true) => {}
                Ok(false) => {
                    match self
                        .heal_on_missing(conversation, mapping.topic_id, &TopicContext::default())
                        .await
                    {
                        Ok(topic) => {
                            report.healed += 1;
                            debug!(conversation = %conversation, topic = topic.0, "reconciled topic");
                        }
                        Err(e) => {
                            report.failed += 1;
                            warn!(conversation = %conversation, error = %e, "failed to heal topic");
                        }
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(conversation = %conversation, topic = mapping.topic_id.0, error = %e, "topic probe failed");
                }
            }
        }
        metrics::set_mapped_conversations(self.store.all_mappings().await.len());
        info!(
            checked = report.checked,
            healed = report.healed,
            failed = report.failed,
            "topic reconciliation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welcome_gating_per_conversation_class() {
        let options = TopicOptions {
            welcome_message: true,
            call_log_welcome: false,
            profile_pictures: true,
        };
        assert!(options.welcome_for(ConversationKind::Direct));
        assert!(options.welcome_for(ConversationKind::Group));
        assert!(!options.welcome_for(ConversationKind::CallLog));
        assert!(!options.welcome_for(ConversationKind::StatusBroadcast));

        let call_log_only = TopicOptions {
            welcome_message: false,
            call_log_welcome: true,
            profile_pictures: false,
        };
        assert!(!call_log_only.welcome_for(ConversationKind::Direct));
        assert!(call_log_only.welcome_for(ConversationKind::CallLog));
    }

    #[test]
    fn formatted_phone_for_direct_chats() {
        assert_eq!(
            formatted_phone(&ConversationId::new("4915112345678@s.whatsapp.net")),
            "+4915112345678"
        );
        assert_eq!(formatted_phone(&ConversationId::new("abc@lid")), "abc");
    }

    #[test]
    fn context_ignores_blank_push_names() {
        assert_eq!(TopicContext::with_push_name(Some("  ")).push_name, None);
        assert_eq!(
            TopicContext::with_push_name(Some(" Alice ")).push_name.as_deref(),
            Some("Alice")
        );
    }
}
