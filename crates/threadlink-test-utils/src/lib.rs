// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Threadlink integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic tests without a Source sidecar, a Sink bot, or ffmpeg.
//!
//! # Components
//!
//! - [`MockSource`] - Source transport with event injection and send capture
//! - [`MockSink`] - Sink client with topic bookkeeping and failure injection
//! - [`MemoryDocumentStore`] - in-memory [`DocumentStore`](threadlink_core::DocumentStore)
//! - [`MockTranscoder`] - transcoder that writes fixed bytes or fails on demand
//! - [`TestHarness`] - a [`BridgeEngine`](threadlink_bridge::BridgeEngine) wired to all of the above

pub mod harness;
pub mod memory_store;
pub mod mock_sink;
pub mod mock_source;
pub mod mock_transcoder;

pub use harness::{
    GROUP_CHAT_ID, OPERATOR_ID, TestHarness, TestHarnessBuilder, media_message, operator_message,
    text_message,
};
pub use memory_store::MemoryDocumentStore;
pub use mock_sink::{MockSink, SentSinkMessage};
pub use mock_source::{MockSource, SentSourceMessage};
pub use mock_transcoder::MockTranscoder;
