// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the DocumentStore trait.

use async_trait::async_trait;
use tracing::debug;

use threadlink_config::model::StorageConfig;
use threadlink_core::{AdapterType, BridgeError, DocumentStore, HealthStatus, PluginAdapter};

use crate::database::{Database, storage_err};
use crate::queries;

/// SQLite-backed document store.
pub struct SqliteDocumentStore {
    config: StorageConfig,
    db: Database,
}

impl SqliteDocumentStore {
    /// Opens the database at the configured path and runs migrations.
    pub async fn open(config: StorageConfig) -> Result<Self, BridgeError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "SQLite document store ready");
        Ok(Self { config, db })
    }
}

#[async_trait]
impl PluginAdapter for SqliteDocumentStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        self.db
            .connection()
            .call(|conn| -> Result<i64, rusqlite::Error> {
                conn.query_row("SELECT 1", [], |row| row.get(0))
            })
            .await
            .map_err(storage_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        if self.config.wal_mode {
            self.db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, BridgeError> {
        match queries::documents::get_document(&self.db, namespace).await? {
            Some(body) => serde_json::from_str(&body).map(Some).map_err(storage_err),
            None => Ok(None),
        }
    }

    async fn save(&self, namespace: &str, document: &serde_json::Value) -> Result<(), BridgeError> {
        let body = serde_json::to_string(document).map_err(storage_err)?;
        queries::documents::put_document(&self.db, namespace, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn make_config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string_lossy().into_owned(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(make_config(&dir.path().join("t.db")))
            .await
            .unwrap();

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn open_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("deeper").join("t.db");
        SqliteDocumentStore::open(make_config(&db_path)).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn missing_namespace_loads_none() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(make_config(&dir.path().join("t.db")))
            .await
            .unwrap();
        assert!(store.load("mappings").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_document() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(make_config(&dir.path().join("t.db")))
            .await
            .unwrap();

        store.save("mappings", &json!({ "filters": ["a"] })).await.unwrap();
        store.save("mappings", &json!({ "filters": ["b"] })).await.unwrap();

        let loaded = store.load("mappings").await.unwrap().unwrap();
        assert_eq!(loaded, json!({ "filters": ["b"] }));
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.db");
        {
            let store = SqliteDocumentStore::open(make_config(&path)).await.unwrap();
            store
                .save("mappings", &json!({ "chatMappings": { "1@s.whatsapp.net": 7 } }))
                .await
                .unwrap();
            store.shutdown().await.unwrap();
        }

        let store = SqliteDocumentStore::open(make_config(&path)).await.unwrap();
        let loaded = store.load("mappings").await.unwrap().unwrap();
        assert_eq!(loaded["chatMappings"]["1@s.whatsapp.net"], 7);
    }

    #[tokio::test]
    async fn namespaces_are_independent() {
        let dir = tempdir().unwrap();
        let store = SqliteDocumentStore::open(make_config(&dir.path().join("t.db")))
            .await
            .unwrap();
        store.save("a", &json!(1)).await.unwrap();
        store.save("b", &json!(2)).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(json!(1)));
        assert_eq!(store.load("b").await.unwrap(), Some(json!(2)));
    }
}
