// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identifier and classification types shared by both sides of the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Conversation id reserved for the Source status broadcast feed.
pub const STATUS_BROADCAST: &str = "status@broadcast";

/// Pseudo-conversation id used for the call-log topic.
pub const CALL_LOG: &str = "call@log";

const USER_SUFFIX: &str = "@s.whatsapp.net";
const GROUP_SUFFIX: &str = "@g.us";

/// Stable identifier of a Source conversation (direct, group, status, or call log).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

/// The class of a conversation, derived from its identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConversationKind {
    Direct,
    Group,
    StatusBroadcast,
    CallLog,
}

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The status-broadcast pseudo-conversation.
    pub fn status_broadcast() -> Self {
        Self(STATUS_BROADCAST.to_string())
    }

    /// The call-log pseudo-conversation.
    pub fn call_log() -> Self {
        Self(CALL_LOG.to_string())
    }

    /// Builds a direct conversation id from a phone number, ignoring non-digits.
    pub fn from_phone(phone: &str) -> Self {
        let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        Self(format!("{digits}{USER_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn kind(&self) -> ConversationKind {
        match self.0.as_str() {
            STATUS_BROADCAST => ConversationKind::StatusBroadcast,
            CALL_LOG => ConversationKind::CallLog,
            id if id.ends_with(GROUP_SUFFIX) => ConversationKind::Group,
            _ => ConversationKind::Direct,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind() == ConversationKind::Group
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.kind() == ConversationKind::StatusBroadcast
    }

    pub fn is_call_log(&self) -> bool {
        self.kind() == ConversationKind::CallLog
    }

    /// The user part of the id: everything before `@`, without a `:device` suffix.
    pub fn user_part(&self) -> &str {
        let user = self.0.split('@').next().unwrap_or_default();
        user.split(':').next().unwrap_or_default()
    }

    /// The phone number of a direct conversation, if the user part is numeric.
    pub fn phone(&self) -> Option<String> {
        let user = self.user_part();
        if self.kind() == ConversationKind::Direct
            && !user.is_empty()
            && user.chars().all(|c| c.is_ascii_digit())
        {
            Some(user.to_string())
        } else {
            None
        }
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a Sink forum topic, unique within the bridged supergroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicId(pub i64);

impl fmt::Display for TopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message inside the Sink supergroup.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SinkMessageId(pub i64);

impl fmt::Display for SinkMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sink user id of a bridge operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorId(pub i64);

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Icon colors accepted by the Sink when creating a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TopicColor {
    Blue,
    Yellow,
    Violet,
    Green,
    Rose,
    Red,
}

impl TopicColor {
    /// The RGB value the Sink expects for this color.
    pub fn rgb(self) -> u32 {
        match self {
            TopicColor::Blue => 0x6FB9F0,
            TopicColor::Yellow => 0xFFD67E,
            TopicColor::Violet => 0xCB86DB,
            TopicColor::Green => 0x8EEE98,
            TopicColor::Rose => 0xFF93B2,
            TopicColor::Red => 0xFB6F5F,
        }
    }
}

/// Presence states understood by the Source.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PresenceKind {
    Available,
    Unavailable,
    Composing,
    Recording,
    Paused,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the role an adapter plays in the bridge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Source,
    Sink,
    Storage,
    Transcoder,
}
