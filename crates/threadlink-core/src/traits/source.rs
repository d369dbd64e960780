// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source transport trait (mobile chat network).

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::BridgeError;
use crate::source::{
    Contact, GroupMetadata, MediaKind, MediaMessage, MessageKey, OutgoingContent, SendOptions,
    SourceEvent,
};
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationId, PresenceKind};

/// Decrypted media chunks as they arrive from the Source.
pub type MediaStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, BridgeError>> + Send>>;

/// Adapter for the Source transport session.
///
/// Implementations own the connection to the mobile chat network and expose
/// its event feed plus the send, presence, and media primitives the bridge needs.
#[async_trait]
pub trait SourceClient: PluginAdapter {
    /// Establishes the session and starts delivering events.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Waits for the next event from the Source feed.
    async fn next_event(&self) -> Result<SourceEvent, BridgeError>;

    /// The bridge account's own id, once connected.
    fn own_id(&self) -> Option<String>;

    /// Sends a message and returns the Source id of the sent message.
    async fn send_message(
        &self,
        conversation: &ConversationId,
        content: OutgoingContent,
        options: SendOptions,
    ) -> Result<Option<String>, BridgeError>;

    /// Marks a batch of messages as read.
    async fn read_messages(&self, keys: &[MessageKey]) -> Result<(), BridgeError>;

    async fn send_presence(
        &self,
        conversation: &ConversationId,
        presence: PresenceKind,
    ) -> Result<(), BridgeError>;

    /// URL of the conversation's profile picture, `None` if it has none.
    async fn profile_picture_url(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError>;

    async fn group_metadata(
        &self,
        conversation: &ConversationId,
    ) -> Result<GroupMetadata, BridgeError>;

    /// Fetches the "about" status text of a contact.
    async fn fetch_status(
        &self,
        conversation: &ConversationId,
    ) -> Result<Option<String>, BridgeError>;

    /// Streams decrypted media. Fails if the message carries no content key.
    async fn download_media(
        &self,
        media: &MediaMessage,
        kind: MediaKind,
    ) -> Result<MediaStream, BridgeError>;

    /// Full contact list for periodic sync.
    async fn contacts(&self) -> Result<Vec<Contact>, BridgeError>;
}
