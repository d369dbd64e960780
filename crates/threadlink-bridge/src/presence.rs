// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rate-limited presence echoing toward the Source.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use threadlink_core::{ConversationId, PresenceKind, SourceClient};

/// Minimum spacing between two presence updates for one conversation.
pub const PRESENCE_INTERVAL: Duration = Duration::from_secs(1);

/// Delay after which a typing indicator falls back to `paused`.
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Sends presence updates, dropping any that arrive inside the rate-limit window.
#[derive(Clone)]
pub struct PresenceCoordinator {
    source: Arc<dyn SourceClient>,
    last_sent: Arc<DashMap<ConversationId, Instant>>,
    /// The single pending typing timer and the conversation it belongs to.
    typing_timer: Arc<Mutex<Option<(ConversationId, JoinHandle<()>)>>>,
    delayed: Arc<Mutex<HashMap<ConversationId, JoinHandle<()>>>>,
}

impl PresenceCoordinator {
    pub fn new(source: Arc<dyn SourceClient>) -> Self {
        Self {
            source,
            last_sent: Arc::new(DashMap::new()),
            typing_timer: Arc::new(Mutex::new(None)),
            delayed: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Sends `presence` unless another update went to this conversation less
    /// than a second ago. Returns whether the update was sent.
    pub async fn update(&self, conversation: &ConversationId, presence: PresenceKind) -> bool {
        let now = Instant::now();
        match self.last_sent.entry(conversation.clone()) {
            Entry::Occupied(mut last) => {
                if now.duration_since(*last.get()) < PRESENCE_INTERVAL {
                    debug!(conversation = %conversation, %presence, "presence rate limited");
                    return false;
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }
        if let Err(e) = self.source.send_presence(conversation, presence).await {
            debug!(conversation = %conversation, %presence, error = %e, "presence update failed");
        }
        true
    }

    /// Shows `composing` and arms the typing timer, replacing any previous one.
    pub async fn typing(&self, conversation: &ConversationId) {
        self.update(conversation, PresenceKind::Composing).await;

        let this = self.clone();
        let target = conversation.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(TYPING_TIMEOUT).await;
            this.update(&target, PresenceKind::Paused).await;
        });
        let mut slot = self
            .typing_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some((_, previous)) = slot.replace((conversation.clone(), handle)) {
            previous.abort();
        }
    }

    /// Sends `available` after `delay`, cancelling a pending typing timer for
    /// the same conversation.
    pub fn available_after(&self, conversation: &ConversationId, delay: Duration) {
        {
            let mut slot = self
                .typing_timer
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.as_ref().is_some_and(|(conv, _)| conv == conversation)
                && let Some((_, handle)) = slot.take()
            {
                handle.abort();
            }
        }

        let this = self.clone();
        let target = conversation.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.update(&target, PresenceKind::Available).await;
        });
        let mut delayed = self.delayed.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = delayed.insert(conversation.clone(), handle) {
            previous.abort();
        }
    }

    /// Aborts every pending timer.
    pub fn cancel_all(&self) {
        if let Some((_, handle)) = self
            .typing_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        let mut delayed = self.delayed.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, handle) in delayed.drain() {
            handle.abort();
        }
    }
}
