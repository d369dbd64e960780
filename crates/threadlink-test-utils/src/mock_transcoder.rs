// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcoder stand-in that never shells out.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use threadlink_core::{AdapterType, BridgeError, HealthStatus, MediaTranscoder, PluginAdapter};

/// Writes fixed bytes to every output path, or fails when told to.
pub struct MockTranscoder {
    output: Vec<u8>,
    fail: AtomicBool,
    calls: Mutex<Vec<(&'static str, PathBuf)>>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            output: b"converted".to_vec(),
            fail: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every conversion fail.
    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Conversions attempted so far as `(operation, input)`.
    pub async fn calls(&self) -> Vec<(&'static str, PathBuf)> {
        self.calls.lock().await.clone()
    }

    async fn convert(
        &self,
        operation: &'static str,
        input: &Path,
        output: &Path,
    ) -> Result<(), BridgeError> {
        self.calls.lock().await.push((operation, input.to_path_buf()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Media(format!("mock {operation} failure")));
        }
        tokio::fs::write(output, &self.output)
            .await
            .map_err(|e| BridgeError::Media(e.to_string()))
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockTranscoder {
    fn name(&self) -> &str {
        "mock-transcoder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcoder
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl MediaTranscoder for MockTranscoder {
    async fn to_video_note(
        &self,
        input: &Path,
        output: &Path,
        _max_secs: u32,
    ) -> Result<(), BridgeError> {
        self.convert("video_note", input, output).await
    }

    async fn sticker_to_image(&self, input: &Path, output: &Path) -> Result<(), BridgeError> {
        self.convert("sticker_to_image", input, output).await
    }

    async fn image_to_sticker(&self, input: &Path, output: &Path) -> Result<(), BridgeError> {
        self.convert("image_to_sticker", input, output).await
    }
}
