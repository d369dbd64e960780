// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The heal-and-retry-once wrapper every forwarder composes with.

use std::future::Future;

use tracing::warn;

use threadlink_core::{BridgeError, ConversationId, TopicId};

use crate::topics::{TopicContext, TopicManager};

impl TopicManager {
    /// Runs `op` against the conversation's topic.
    ///
    /// If the Sink reports the topic missing, the topic is healed and `op`
    /// runs exactly once more against the new topic. The second result is
    /// returned as-is, so a repeated failure surfaces to the caller.
    pub async fn with_topic_healing<T, F, Fut>(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
        op: F,
    ) -> Result<T, BridgeError>
    where
        F: Fn(TopicId) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        let topic = self.ensure_topic(conversation, context).await?;
        match op(topic).await {
            Err(e) if e.is_thread_not_found() => {
                warn!(conversation = %conversation, topic = topic.0, error = %e, "sink lost the topic");
                let healed = self.heal_on_missing(conversation, topic, context).await?;
                op(healed).await
            }
            other => other,
        }
    }
}
