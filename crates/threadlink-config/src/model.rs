// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Threadlink bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Threadlink configuration.
///
/// Every section is optional and defaults to sensible values, except the
/// credentials that [`crate::validation::validate_config`] insists on.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ThreadlinkConfig {
    /// Bridging behavior toggles.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Operator authentication.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Sink bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Source sidecar settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub media: MediaConfig,

    /// Periodic background jobs.
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub status: StatusConfig,
}

/// Bridging behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Post and pin a welcome message in new direct and group topics.
    #[serde(default = "default_true")]
    pub welcome_message: bool,

    /// Post and pin a welcome message in the call-log topic.
    #[serde(default)]
    pub call_log_welcome: bool,

    /// Mirror messages sent from the bridge account's own phone.
    #[serde(default)]
    pub mirror_own_messages: bool,

    /// Mark mirrored status updates as viewed.
    #[serde(default)]
    pub auto_view_status: bool,

    /// Send composing/available presence around outbound messages.
    #[serde(default = "default_true")]
    pub typing_indicators: bool,

    /// Mark bridged inbound messages as read.
    #[serde(default = "default_true")]
    pub read_receipts: bool,

    /// Fetch and post profile pictures into new topics.
    #[serde(default = "default_true")]
    pub profile_pictures: bool,

    #[serde(default = "default_true")]
    pub status_mirroring: bool,

    #[serde(default = "default_true")]
    pub call_notifications: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            welcome_message: true,
            call_log_welcome: false,
            mirror_own_messages: false,
            auto_view_status: false,
            typing_indicators: true,
            read_receipts: true,
            profile_pictures: true,
            status_mirroring: true,
            call_notifications: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Operator authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Sink user ids that never need to authenticate.
    #[serde(default)]
    pub privileged_operators: Vec<i64>,

    /// How long a granted authentication stays valid.
    #[serde(default = "default_auth_timeout_secs")]
    pub auth_timeout_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            privileged_operators: Vec::new(),
            auth_timeout_secs: default_auth_timeout_secs(),
        }
    }
}

fn default_auth_timeout_secs() -> u64 {
    24 * 60 * 60
}

/// Sink bot API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. Required.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Id of the forum supergroup that hosts the topics. Required.
    #[serde(default)]
    pub group_id: Option<i64>,

    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    /// Long-poll timeout for `getUpdates`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            group_id: None,
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

/// Source sidecar configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhatsAppConfig {
    /// Base URL of the sidecar's HTTP API.
    #[serde(default = "default_sidecar_url")]
    pub sidecar_url: String,

    /// Bearer token for the sidecar API.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Address the event webhook listens on.
    #[serde(default = "default_webhook_bind")]
    pub webhook_bind: String,

    /// HMAC secret the sidecar signs events with. Required.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            sidecar_url: default_sidecar_url(),
            api_token: None,
            webhook_bind: default_webhook_bind(),
            webhook_secret: None,
        }
    }
}

fn default_sidecar_url() -> String {
    "http://127.0.0.1:8088".to_string()
}

fn default_webhook_bind() -> String {
    "127.0.0.1:8089".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("threadlink").join("threadlink.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("threadlink.db"))
        .to_string_lossy()
        .into_owned()
}

/// Media conversion configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Directory for scratch files; created on startup.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// Duration cap for round video notes.
    #[serde(default = "default_max_video_note_secs")]
    pub max_video_note_secs: u32,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            ffmpeg_path: default_ffmpeg_path(),
            max_video_note_secs: default_max_video_note_secs(),
        }
    }
}

fn default_scratch_dir() -> String {
    std::env::temp_dir()
        .join("threadlink")
        .to_string_lossy()
        .into_owned()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_max_video_note_secs() -> u32 {
    60
}

/// Periodic job configuration. An interval of 0 disables the job.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    #[serde(default = "default_contact_sync_interval_secs")]
    pub contact_sync_interval_secs: u64,

    #[serde(default)]
    pub reconcile_interval_secs: u64,

    /// Pause between topic probes during reconciliation.
    #[serde(default = "default_reconcile_throttle_ms")]
    pub reconcile_throttle_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            contact_sync_interval_secs: default_contact_sync_interval_secs(),
            reconcile_interval_secs: 0,
            reconcile_throttle_ms: default_reconcile_throttle_ms(),
        }
    }
}

fn default_contact_sync_interval_secs() -> u64 {
    30 * 60
}

fn default_reconcile_throttle_ms() -> u64 {
    500
}

/// Status mirroring configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StatusConfig {
    /// Number of mirrored statuses remembered for reply routing.
    #[serde(default = "default_reply_index_capacity")]
    pub reply_index_capacity: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            reply_index_capacity: default_reply_index_capacity(),
        }
    }
}

fn default_reply_index_capacity() -> usize {
    1000
}
