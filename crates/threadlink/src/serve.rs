// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `threadlink serve` and `threadlink reconcile`.
//!
//! Opens storage, builds the Source and Sink adapters, wires the bridge
//! engine and runs it until a shutdown signal arrives.

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

use threadlink_bridge::{BridgeAdapters, BridgeEngine, ReconcileReport};
use threadlink_config::ThreadlinkConfig;
use threadlink_core::BridgeError;
use threadlink_media::FfmpegTranscoder;
use threadlink_storage::SqliteDocumentStore;
use threadlink_telegram::TelegramSink;
use threadlink_whatsapp::WhatsAppSource;

use crate::shutdown;

/// Builds every adapter and the engine over them.
async fn build_engine(
    config: &ThreadlinkConfig,
    metrics: Option<PrometheusHandle>,
) -> Result<BridgeEngine, BridgeError> {
    let documents = Arc::new(SqliteDocumentStore::open(config.storage.clone()).await?);
    let transcoder = Arc::new(FfmpegTranscoder::new(&config.media));
    let sink = Arc::new(TelegramSink::new(&config.telegram)?);

    let mut source = WhatsAppSource::new(&config.whatsapp)?;
    if let Some(handle) = metrics {
        source = source.with_metrics_render(Arc::new(move || handle.render()));
    }

    BridgeEngine::new(
        config,
        BridgeAdapters {
            source: Arc::new(source),
            sink,
            transcoder,
            documents,
        },
    )
    .await
}

/// Runs the bridge until SIGINT or SIGTERM, then flushes state.
pub async fn run_serve(config: ThreadlinkConfig) -> Result<(), BridgeError> {
    init_tracing(&config.bridge.log_level);
    info!("starting threadlink serve");

    let metrics = init_metrics();
    let engine = build_engine(&config, metrics).await?;

    let cancel = shutdown::install_signal_handler();
    let result = engine.run(cancel).await;
    engine.shutdown().await;

    info!("threadlink serve shutdown complete");
    result
}

/// Runs one reconcile pass over every mapped topic.
pub async fn run_reconcile(config: ThreadlinkConfig) -> Result<ReconcileReport, BridgeError> {
    init_tracing(&config.bridge.log_level);
    let engine = build_engine(&config, None).await?;
    let report = engine.reconcile_all_topics().await;
    engine.shutdown().await;
    Ok(report)
}

/// Installs the Prometheus recorder. Metrics stay no-ops if that fails.
fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            threadlink_bridge::metrics::register_metrics();
            info!("prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "failed to install Prometheus recorder");
            None
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("threadlink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
