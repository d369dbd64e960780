// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridging engine for Threadlink.
//!
//! The [`BridgeEngine`] mirrors every Source conversation onto a dedicated
//! Sink forum topic. It owns the conversation to topic mapping, creates and
//! heals topics, and routes messages in both directions by content type.
//! All collaborators are injected as trait objects from `threadlink-core`.

pub mod auth;
pub mod calls;
pub mod classify;
pub mod contacts;
pub mod healing;
pub mod inbound;
pub mod media;
pub mod metrics;
pub mod outbound;
pub mod presence;
pub mod receipts;
pub mod status;
pub mod store;
pub mod topics;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use threadlink_config::ThreadlinkConfig;
use threadlink_config::model::{BridgeConfig, SyncConfig};
use threadlink_core::source::SourceEvent;
use threadlink_core::{
    BridgeError, ConversationId, DocumentStore, MediaTranscoder, OperatorId, SinkClient,
    SourceClient, TopicId,
};

use crate::auth::OperatorAuth;
use crate::calls::CallDeduplicator;
use crate::media::MediaPipeline;
use crate::presence::PresenceCoordinator;
use crate::receipts::ReadReceiptQueue;
use crate::status::StatusReplyIndex;
use crate::store::MappingStore;
use crate::topics::{TopicManager, TopicOptions};

pub use crate::topics::{ReconcileReport, TopicContext};

/// Pause after an event feed error before polling again.
const EVENT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// The external collaborators the engine drives.
#[derive(Clone)]
pub struct BridgeAdapters {
    pub source: Arc<dyn SourceClient>,
    pub sink: Arc<dyn SinkClient>,
    pub transcoder: Arc<dyn MediaTranscoder>,
    pub documents: Arc<dyn DocumentStore>,
}

/// Handle to the running bridge. Cheap to clone.
#[derive(Clone)]
pub struct BridgeEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    source: Arc<dyn SourceClient>,
    sink: Arc<dyn SinkClient>,
    store: MappingStore,
    topics: TopicManager,
    media: MediaPipeline,
    presence: PresenceCoordinator,
    receipts: ReadReceiptQueue,
    auth: OperatorAuth,
    status_index: StatusReplyIndex,
    calls: CallDeduplicator,
    bridge: BridgeConfig,
    sync: SyncConfig,
}

#[derive(Debug, Clone, Copy)]
enum PeriodicJob {
    ContactSync,
    Reconcile,
}

impl BridgeEngine {
    /// Loads the mapping store and wires every component.
    pub async fn new(
        config: &ThreadlinkConfig,
        adapters: BridgeAdapters,
    ) -> Result<Self, BridgeError> {
        let BridgeAdapters {
            source,
            sink,
            transcoder,
            documents,
        } = adapters;

        let store = MappingStore::load(documents).await?;
        let topics = TopicManager::new(
            Arc::clone(&sink),
            Arc::clone(&source),
            store.clone(),
            TopicOptions::from(&config.bridge),
        );
        let media = MediaPipeline::new(
            Arc::clone(&source),
            Arc::clone(&sink),
            transcoder,
            &config.media,
        );

        metrics::set_mapped_conversations(store.all_mappings().await.len());
        info!(
            source = source.name(),
            sink = sink.name(),
            "bridge engine initialized"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                presence: PresenceCoordinator::new(Arc::clone(&source)),
                receipts: ReadReceiptQueue::new(Arc::clone(&source)),
                auth: OperatorAuth::new(&config.auth),
                status_index: StatusReplyIndex::new(config.status.reply_index_capacity),
                calls: CallDeduplicator::default(),
                bridge: config.bridge.clone(),
                sync: config.sync.clone(),
                source,
                sink,
                store,
                topics,
                media,
            }),
        })
    }

    /// The mapping store shared by every component.
    pub fn store(&self) -> &MappingStore {
        &self.inner.store
    }

    /// Returns the topic mirroring `conversation`, creating it if needed.
    pub async fn ensure_topic(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
    ) -> Result<TopicId, BridgeError> {
        self.inner.topics.ensure_topic(conversation, context).await
    }

    /// Topic that mirrors `conversation`, if any.
    pub async fn topic_for(&self, conversation: &ConversationId) -> Option<TopicId> {
        self.inner.store.topic_for(conversation).await
    }

    pub async fn conversation_for_topic(&self, topic: TopicId) -> Option<ConversationId> {
        self.inner.store.conversation_for_topic(topic).await
    }

    /// Adds an outbound content filter. Returns `false` if it was blank or present.
    pub async fn add_filter(&self, prefix: &str) -> Result<bool, BridgeError> {
        self.inner.store.add_filter(prefix).await
    }

    pub async fn clear_filters(&self) -> Result<(), BridgeError> {
        self.inner.store.clear_filters().await
    }

    pub fn is_operator_authenticated(&self, operator: OperatorId) -> bool {
        self.inner.auth.is_authenticated(operator)
    }

    /// Marks `operator` as authenticated from now on.
    pub fn grant_operator(&self, operator: OperatorId) {
        self.inner.auth.grant(operator);
    }

    /// Probes every mapped topic and heals the ones the Sink deleted.
    pub async fn reconcile_all_topics(&self) -> ReconcileReport {
        let throttle = Duration::from_millis(self.inner.sync.reconcile_throttle_ms);
        self.inner.topics.reconcile_all_topics(throttle).await
    }

    /// Dispatches one event from the Source feed.
    pub async fn handle_source_event(&self, event: SourceEvent) {
        match event {
            SourceEvent::Message(message) => self.route_inbound(message).await,
            SourceEvent::ContactsUpsert(contacts) | SourceEvent::ContactsUpdate(contacts) => {
                self.handle_contacts(&contacts).await;
            }
            SourceEvent::Call(calls) => {
                for call in &calls {
                    self.handle_call(call).await;
                }
            }
        }
    }

    /// Connects both networks and runs the event loops and periodic jobs
    /// until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), BridgeError> {
        self.inner.source.connect().await?;
        self.inner.sink.connect().await?;
        self.inner.media.sweep_scratch().await;
        info!("bridge running");

        let mut tasks = JoinSet::new();
        tasks.spawn(self.clone().source_loop(cancel.clone()));
        tasks.spawn(self.clone().sink_loop(cancel.clone()));

        let contact_interval = self.inner.sync.contact_sync_interval_secs;
        if contact_interval > 0 {
            tasks.spawn(self.clone().run_periodic(
                cancel.clone(),
                Duration::from_secs(contact_interval),
                PeriodicJob::ContactSync,
            ));
        }
        let reconcile_interval = self.inner.sync.reconcile_interval_secs;
        if reconcile_interval > 0 {
            tasks.spawn(self.clone().run_periodic(
                cancel.clone(),
                Duration::from_secs(reconcile_interval),
                PeriodicJob::Reconcile,
            ));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "bridge task panicked");
            }
        }
        info!("bridge event loops stopped");
        Ok(())
    }

    async fn source_loop(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                event = self.inner.source.next_event() => match event {
                    Ok(event) => self.handle_source_event(event).await,
                    Err(e) => {
                        warn!(error = %e, "source event feed error");
                        tokio::select! {
                            _ = tokio::time::sleep(EVENT_RETRY_DELAY) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
        debug!("source loop stopped");
    }

    async fn sink_loop(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                event = self.inner.sink.next_event() => match event {
                    Ok(message) => self.route_outbound(message).await,
                    Err(e) => {
                        warn!(error = %e, "sink event feed error");
                        tokio::select! {
                            _ = tokio::time::sleep(EVENT_RETRY_DELAY) => {}
                            _ = cancel.cancelled() => break,
                        }
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
        debug!("sink loop stopped");
    }

    async fn run_periodic(self, cancel: CancellationToken, period: Duration, job: PeriodicJob) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => match job {
                    PeriodicJob::ContactSync => {
                        if let Err(e) = self.sync_contacts().await {
                            warn!(error = %e, "periodic contact sync failed");
                        }
                    }
                    PeriodicJob::Reconcile => {
                        self.reconcile_all_topics().await;
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
        debug!(?job, "periodic job stopped");
    }

    /// Flushes persistence, aborts timers and removes scratch files.
    pub async fn shutdown(&self) {
        self.inner.presence.cancel_all();
        self.inner.receipts.flush_all().await;
        if let Err(e) = self.inner.store.flush().await {
            error!(error = %e, "failed to flush mapping store");
        }
        self.inner.media.sweep_scratch().await;
        info!("bridge engine shut down");
    }
}
