// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the two bridged networks and their helpers.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod media;
pub mod sink;
pub mod source;
pub mod storage;

pub use adapter::PluginAdapter;
pub use media::MediaTranscoder;
pub use sink::SinkClient;
pub use source::{MediaStream, SourceClient};
pub use storage::DocumentStore;
