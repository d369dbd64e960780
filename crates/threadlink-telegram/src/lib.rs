// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram Sink adapter for the Threadlink bridge.
//!
//! Implements [`SinkClient`] on top of the Telegram Bot API: one forum topic
//! per bridged conversation inside a single supergroup, long polling for
//! operator messages, and multipart uploads for media.

pub mod api;
pub mod updates;
pub mod upload;

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use threadlink_config::model::TelegramConfig;
use threadlink_core::sink::{SinkOutgoing, TopicMessage};
use threadlink_core::{
    AdapterType, BridgeError, HealthStatus, PluginAdapter, SinkClient, SinkMessageId, TopicColor,
    TopicId,
};

use crate::api::BotApi;
use crate::updates::{RawUpdate, UpdateQueue};

/// Extra time granted to a long-poll request beyond the server-side timeout.
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct BotUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

#[derive(Debug, Deserialize)]
struct ForumTopic {
    message_thread_id: i64,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// Sink adapter posting into the forum topics of one supergroup.
pub struct TelegramSink {
    api: BotApi,
    group_id: i64,
    poll_timeout_secs: u64,
    updates: Mutex<UpdateQueue>,
}

impl TelegramSink {
    /// Creates a new Telegram Sink adapter.
    ///
    /// Requires `config.bot_token` and `config.group_id` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, BridgeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            BridgeError::Config("telegram.bot_token is required for the Telegram sink".into())
        })?;
        if token.is_empty() {
            return Err(BridgeError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }
        let group_id = config.group_id.ok_or_else(|| {
            BridgeError::Config("telegram.group_id is required for the Telegram sink".into())
        })?;

        Ok(Self {
            api: BotApi::new(&config.api_url, token)?,
            group_id,
            poll_timeout_secs: config.poll_timeout_secs,
            updates: Mutex::new(UpdateQueue::default()),
        })
    }

    async fn get_me(&self) -> Result<BotUser, BridgeError> {
        self.api.call("getMe", &json!({})).await
    }
}

#[async_trait]
impl PluginAdapter for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Sink
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        match self.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        debug!("Telegram sink shutting down");
        Ok(())
    }
}

#[async_trait]
impl SinkClient for TelegramSink {
    async fn connect(&self) -> Result<(), BridgeError> {
        let me = self.get_me().await?;
        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or("-"),
            group_id = self.group_id,
            "connected to Telegram"
        );
        Ok(())
    }

    async fn next_event(&self) -> Result<TopicMessage, BridgeError> {
        let mut queue = self.updates.lock().await;
        loop {
            if let Some(message) = queue.pop() {
                return Ok(message);
            }
            let params = json!({
                "offset": queue.offset(),
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            });
            let batch: Vec<RawUpdate> = self
                .api
                .call_with_timeout(
                    "getUpdates",
                    &params,
                    Duration::from_secs(self.poll_timeout_secs) + POLL_GRACE,
                )
                .await?;
            queue.ingest(batch, self.group_id);
        }
    }

    async fn send(
        &self,
        topic: TopicId,
        message: SinkOutgoing,
    ) -> Result<SinkMessageId, BridgeError> {
        let request = upload::prepare(self.group_id, topic.0, &message).await?;
        let sent: SentMessage = if request.is_multipart() {
            self.api
                .call_multipart(request.method, &|| request.form())
                .await?
        } else {
            self.api.call(request.method, &request.json_body()).await?
        };
        debug!(
            topic = topic.0,
            kind = message.kind(),
            message_id = sent.message_id,
            "posted to topic"
        );
        Ok(SinkMessageId(sent.message_id))
    }

    async fn create_topic(&self, title: &str, color: TopicColor) -> Result<TopicId, BridgeError> {
        let topic: ForumTopic = self
            .api
            .call(
                "createForumTopic",
                &json!({
                    "chat_id": self.group_id,
                    "name": title,
                    "icon_color": color.rgb(),
                }),
            )
            .await?;
        Ok(TopicId(topic.message_thread_id))
    }

    async fn edit_topic(&self, topic: TopicId, title: &str) -> Result<(), BridgeError> {
        let _: bool = self
            .api
            .call(
                "editForumTopic",
                &json!({
                    "chat_id": self.group_id,
                    "message_thread_id": topic.0,
                    "name": title,
                }),
            )
            .await?;
        Ok(())
    }

    async fn topic_exists(&self, topic: TopicId) -> Result<bool, BridgeError> {
        let probe: Result<bool, BridgeError> = self
            .api
            .call(
                "sendChatAction",
                &json!({
                    "chat_id": self.group_id,
                    "message_thread_id": topic.0,
                    "action": "typing",
                }),
            )
            .await;
        match probe {
            Ok(_) => Ok(true),
            Err(e) if e.is_thread_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn pin_message(&self, message: SinkMessageId) -> Result<(), BridgeError> {
        let _: bool = self
            .api
            .call(
                "pinChatMessage",
                &json!({
                    "chat_id": self.group_id,
                    "message_id": message.0,
                    "disable_notification": true,
                }),
            )
            .await?;
        Ok(())
    }

    async fn set_reaction(&self, message: SinkMessageId, emoji: &str) -> Result<(), BridgeError> {
        let _: bool = self
            .api
            .call(
                "setMessageReaction",
                &json!({
                    "chat_id": self.group_id,
                    "message_id": message.0,
                    "reaction": [{ "type": "emoji", "emoji": emoji }],
                }),
            )
            .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BridgeError> {
        let file: RemoteFile = self
            .api
            .call("getFile", &json!({ "file_id": file_id }))
            .await?;
        let path = file
            .file_path
            .ok_or_else(|| BridgeError::Media(format!("file {file_id} is not downloadable")))?;
        self.api.download(&path).await
    }
}
