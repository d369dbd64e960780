// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contact directory sync, topic renames and profile-picture refresh.

use tracing::{debug, info, warn};

use threadlink_core::sink::{SinkMedia, SinkOutgoing};
use threadlink_core::source::Contact;
use threadlink_core::{BridgeError, ConversationId};

use crate::BridgeEngine;

pub const PROFILE_PICTURE_UPDATED_CAPTION: &str = "📷 Profile picture updated";

/// `(phone, name)` pairs for contacts that carry both.
pub fn directory_entries(contacts: &[Contact]) -> Vec<(String, String)> {
    contacts
        .iter()
        .filter_map(|contact| {
            let phone = ConversationId::new(contact.id.as_str()).phone()?;
            let name = contact.display_name()?;
            Some((phone, name.to_string()))
        })
        .collect()
}

impl BridgeEngine {
    /// Merges contact events into the directory and renames affected topics.
    pub async fn handle_contacts(&self, contacts: &[Contact]) {
        let changed = match self
            .inner
            .store
            .merge_contacts(directory_entries(contacts))
            .await
        {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "failed to merge contacts");
                Vec::new()
            }
        };

        for (phone, name) in &changed {
            let conversation = ConversationId::from_phone(phone);
            let Some(topic) = self.inner.store.topic_for(&conversation).await else {
                continue;
            };
            match self.inner.sink.edit_topic(topic, name).await {
                Ok(()) => info!(conversation = %conversation, topic = topic.0, name = %name, "topic renamed"),
                Err(e) => warn!(conversation = %conversation, topic = topic.0, error = %e, "failed to rename topic"),
            }
        }

        if !self.inner.bridge.profile_pictures {
            return;
        }
        for contact in contacts.iter().filter(|c| c.img_url.is_some()) {
            let conversation = ConversationId::new(contact.id.as_str());
            if let Err(e) = self.refresh_profile_picture(&conversation).await {
                debug!(conversation = %conversation, error = %e, "profile picture refresh failed");
            }
        }
    }

    /// Posts the conversation's current profile picture into its topic when it
    /// differs from the cached one. Returns whether anything changed.
    pub async fn refresh_profile_picture(
        &self,
        conversation: &ConversationId,
    ) -> Result<bool, BridgeError> {
        let Some(mapping) = self.inner.store.mapping(conversation).await else {
            return Ok(false);
        };
        let url = self.inner.source.profile_picture_url(conversation).await?;
        if url == mapping.profile_picture_url {
            return Ok(false);
        }
        if let Some(url) = &url {
            let photo = SinkOutgoing::Photo {
                media: SinkMedia::Url(url.clone()),
                caption: Some(PROFILE_PICTURE_UPDATED_CAPTION.to_string()),
            };
            self.inner.sink.send(mapping.topic_id, photo).await?;
        }
        self.inner
            .store
            .set_profile_picture(conversation, url)
            .await?;
        debug!(conversation = %conversation, "profile picture refreshed");
        Ok(true)
    }

    /// Pulls the full contact list from the Source and merges it.
    /// Returns the number of contacts received.
    pub async fn sync_contacts(&self) -> Result<usize, BridgeError> {
        let contacts = self.inner.source.contacts().await?;
        self.handle_contacts(&contacts).await;
        info!(count = contacts.len(), "contacts synced");
        Ok(contacts.len())
    }
}
