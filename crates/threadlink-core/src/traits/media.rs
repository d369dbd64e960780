// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media transcoding trait.

use std::path::Path;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;

/// Converts media between the formats each network accepts.
///
/// All operations read `input` and write the converted file to `output`.
#[async_trait]
pub trait MediaTranscoder: PluginAdapter {
    /// Square-crops and trims a video to at most `max_secs` seconds.
    async fn to_video_note(
        &self,
        input: &Path,
        output: &Path,
        max_secs: u32,
    ) -> Result<(), BridgeError>;

    /// Converts a Source sticker (webp) to a PNG image.
    async fn sticker_to_image(&self, input: &Path, output: &Path) -> Result<(), BridgeError>;

    /// Converts an arbitrary image to a 512px webp sticker.
    async fn image_to_sticker(&self, input: &Path, output: &Path) -> Result<(), BridgeError>;
}
