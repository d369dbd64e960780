// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Threadlink bridge.
//!
//! This crate provides the trait definitions, error types, and message types
//! shared by the bridging engine and every adapter. Adapters for the Source
//! transport, the Sink bot API, storage, and media conversion implement the
//! traits defined here.

pub mod error;
pub mod sink;
pub mod source;
pub mod traits;
pub mod types;

pub use error::BridgeError;
pub use types::{
    AdapterType, ConversationId, ConversationKind, HealthStatus, OperatorId, PresenceKind,
    SinkMessageId, TopicColor, TopicId,
};

pub use traits::{
    DocumentStore, MediaStream, MediaTranscoder, PluginAdapter, SinkClient, SourceClient,
};
