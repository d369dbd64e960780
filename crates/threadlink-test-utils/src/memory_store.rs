// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use threadlink_core::{AdapterType, BridgeError, DocumentStore, HealthStatus, PluginAdapter};

/// A [`DocumentStore`] backed by a `HashMap`, counting saves.
///
/// Saves can be switched to fail with [`MemoryDocumentStore::fail_saves`].
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, serde_json::Value>>,
    saves: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `document` under `namespace`.
    pub fn with_document(namespace: &str, document: serde_json::Value) -> Self {
        let mut documents = HashMap::new();
        documents.insert(namespace.to_string(), document);
        Self {
            documents: Mutex::new(documents),
            saves: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub async fn document(&self, namespace: &str) -> Option<serde_json::Value> {
        self.documents.lock().await.get(namespace).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// While `true`, every save returns a storage error and keeps the old document.
    pub fn fail_saves(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, BridgeError> {
        Ok(self.documents.lock().await.get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, document: &serde_json::Value) -> Result<(), BridgeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Storage {
                source: "disk full".into(),
            });
        }
        self.documents
            .lock()
            .await
            .insert(namespace.to_string(), document.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
