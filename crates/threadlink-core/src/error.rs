// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Threadlink bridge.

use std::sync::Arc;

use thiserror::Error;

/// The primary error type used across all Threadlink adapter traits and the bridging engine.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (missing credentials, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Document store errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Source transport errors (send failure, sidecar unreachable, bad response).
    #[error("source error: {message}")]
    Source {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Sink bot API errors (send failure, rate limiting, bad request).
    #[error("sink error: {message}")]
    Sink {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The Sink reports that the target topic no longer exists.
    ///
    /// This is the only error class that triggers topic healing.
    #[error("topic not found: {message}")]
    ThreadNotFound { message: String },

    /// Topic creation failed. Shared by every caller that awaited the same creation.
    #[error("failed to create topic for {conversation}: {source}")]
    TopicCreation {
        conversation: String,
        source: Arc<BridgeError>,
    },

    /// Media could not be fetched, decoded, or converted.
    #[error("media error: {0}")]
    Media(String),

    /// The operator is not allowed to use the bridge.
    #[error("unauthorized operator: {0}")]
    Unauthorized(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Returns `true` if the Sink reported the target topic as missing.
    pub fn is_thread_not_found(&self) -> bool {
        matches!(self, BridgeError::ThreadNotFound { .. })
    }

    /// Shorthand for a [`BridgeError::Sink`] without an underlying source.
    pub fn sink(message: impl Into<String>) -> Self {
        BridgeError::Sink {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`BridgeError::Source`] without an underlying source.
    pub fn source_failure(message: impl Into<String>) -> Self {
        BridgeError::Source {
            message: message.into(),
            source: None,
        }
    }
}
