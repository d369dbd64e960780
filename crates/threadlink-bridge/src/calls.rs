// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incoming call notifications mirrored into the call-log topic.

use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;
use tracing::{debug, warn};

use threadlink_core::sink::SinkOutgoing;
use threadlink_core::source::{CallEvent, CallStatus};
use threadlink_core::ConversationId;

use crate::topics::TopicContext;
use crate::{BridgeEngine, metrics};

/// Window in which repeated events for one call are ignored.
pub const CALL_DEDUP_WINDOW: Duration = Duration::from_secs(30);

/// Remembers recently notified calls keyed by `(caller, call id)`.
pub struct CallDeduplicator {
    window: Duration,
    seen: DashMap<(String, String), Instant>,
}

impl Default for CallDeduplicator {
    fn default() -> Self {
        Self::new(CALL_DEDUP_WINDOW)
    }
}

impl CallDeduplicator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: DashMap::new(),
        }
    }

    /// Returns `true` the first time a call is seen within the window.
    pub fn should_notify(&self, caller: &str, call_id: &str) -> bool {
        let now = Instant::now();
        self.seen
            .retain(|_, seen_at| now.duration_since(*seen_at) < self.window);
        match self.seen.entry((caller.to_string(), call_id.to_string())) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }
}

/// Notification text for an incoming call.
pub fn call_notification_text(call: &CallEvent, caller_name: &str) -> String {
    let medium = if call.is_video { "video" } else { "voice" };
    let mut text = format!("📞 Incoming {medium} call from {caller_name}");
    if call.is_group {
        text.push_str(" (group call)");
    }
    text
}

impl BridgeEngine {
    /// Mirrors a call offer into the call-log topic. Never fails.
    pub async fn handle_call(&self, call: &CallEvent) {
        if !self.inner.bridge.call_notifications || call.status != CallStatus::Offer {
            return;
        }
        if !self.inner.calls.should_notify(&call.from, &call.id) {
            debug!(caller = %call.from, call_id = %call.id, "duplicate call event ignored");
            return;
        }

        let name = self.resolve_sender_name(&call.from, None).await;
        let text = call_notification_text(call, &name);
        let call_log = ConversationId::call_log();
        let sink = &self.inner.sink;
        match self
            .inner
            .topics
            .with_topic_healing(&call_log, &TopicContext::default(), |topic| {
                sink.send(topic, SinkOutgoing::text(text.clone()))
            })
            .await
        {
            Ok(_) => {
                metrics::record_call_notified();
                debug!(caller = %call.from, call_id = %call.id, "call notification sent");
            }
            Err(e) => warn!(caller = %call.from, error = %e, "failed to send call notification"),
        }
    }
}
