// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batched read receipts.
//!
//! Message keys are queued per conversation. The first key queued in a window
//! starts a timer; when it fires the whole queue goes out in one
//! `read_messages` call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use threadlink_core::source::MessageKey;
use threadlink_core::{ConversationId, SourceClient};

/// Delay between the first enqueue of a window and the flush.
pub const RECEIPT_DELAY: Duration = Duration::from_secs(2);

#[derive(Default)]
struct ReceiptState {
    queues: HashMap<ConversationId, Vec<MessageKey>>,
    timers: HashMap<ConversationId, JoinHandle<()>>,
}

#[derive(Clone)]
pub struct ReadReceiptQueue {
    source: Arc<dyn SourceClient>,
    delay: Duration,
    state: Arc<Mutex<ReceiptState>>,
}

impl ReadReceiptQueue {
    pub fn new(source: Arc<dyn SourceClient>) -> Self {
        Self::with_delay(source, RECEIPT_DELAY)
    }

    pub fn with_delay(source: Arc<dyn SourceClient>, delay: Duration) -> Self {
        Self {
            source,
            delay,
            state: Arc::new(Mutex::new(ReceiptState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReceiptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a message for the next batched acknowledgment.
    pub fn enqueue(&self, key: MessageKey) {
        let conversation = key.remote_jid.clone();
        let mut state = self.lock();
        state
            .queues
            .entry(conversation.clone())
            .or_default()
            .push(key);

        if !state.timers.contains_key(&conversation) {
            let this = self.clone();
            let target = conversation.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(this.delay).await;
                this.flush(&target).await;
            });
            state.timers.insert(conversation, handle);
        }
    }

    /// Number of keys waiting for `conversation`.
    pub fn pending(&self, conversation: &ConversationId) -> usize {
        self.lock().queues.get(conversation).map_or(0, Vec::len)
    }

    async fn flush(&self, conversation: &ConversationId) {
        let keys = {
            let mut state = self.lock();
            state.timers.remove(conversation);
            state.queues.remove(conversation).unwrap_or_default()
        };
        if keys.is_empty() {
            return;
        }
        match self.source.read_messages(&keys).await {
            Ok(()) => debug!(conversation = %conversation, count = keys.len(), "read receipts sent"),
            Err(e) => warn!(conversation = %conversation, error = %e, "failed to send read receipts"),
        }
    }

    /// Cancels all timers and sends whatever is still queued.
    pub async fn flush_all(&self) {
        let pending: Vec<ConversationId> = {
            let mut state = self.lock();
            for (_, handle) in state.timers.drain() {
                handle.abort();
            }
            state.queues.keys().cloned().collect()
        };
        for conversation in pending {
            self.flush(&conversation).await;
        }
    }
}
