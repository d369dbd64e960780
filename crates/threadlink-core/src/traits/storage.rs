// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document store trait for bridge persistence.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;

/// A key-value store of JSON documents addressed by namespace.
///
/// `save` must be durable when it returns; the bridge relies on this for
/// write-through persistence of its mapping tables.
#[async_trait]
pub trait DocumentStore: PluginAdapter {
    /// Loads the document stored under `namespace`, `None` if absent.
    async fn load(&self, namespace: &str) -> Result<Option<serde_json::Value>, BridgeError>;

    /// Replaces the document stored under `namespace`.
    async fn save(&self, namespace: &str, document: &serde_json::Value) -> Result<(), BridgeError>;
}
