// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink client trait (forum supergroup bot API).

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::sink::{SinkOutgoing, TopicMessage};
use crate::traits::adapter::PluginAdapter;
use crate::types::{SinkMessageId, TopicColor, TopicId};

/// Adapter for the Sink bot API, scoped to a single forum supergroup.
///
/// Any call that targets a topic fails with [`BridgeError::ThreadNotFound`]
/// when the Sink no longer knows that topic.
#[async_trait]
pub trait SinkClient: PluginAdapter {
    /// Starts receiving topic messages.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Waits for the next message posted in the supergroup by a human operator.
    async fn next_event(&self) -> Result<TopicMessage, BridgeError>;

    /// Posts a message into a topic.
    async fn send(&self, topic: TopicId, message: SinkOutgoing)
    -> Result<SinkMessageId, BridgeError>;

    async fn create_topic(&self, title: &str, color: TopicColor) -> Result<TopicId, BridgeError>;

    async fn edit_topic(&self, topic: TopicId, title: &str) -> Result<(), BridgeError>;

    /// Existence probe. `Ok(false)` is a definite "deleted" answer.
    async fn topic_exists(&self, topic: TopicId) -> Result<bool, BridgeError>;

    async fn pin_message(&self, message: SinkMessageId) -> Result<(), BridgeError>;

    /// Replaces the bot's reaction on a message.
    async fn set_reaction(&self, message: SinkMessageId, emoji: &str) -> Result<(), BridgeError>;

    /// Downloads a stored file into memory.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, BridgeError>;
}
