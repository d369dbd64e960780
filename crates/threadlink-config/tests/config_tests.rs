// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Threadlink configuration system.

use threadlink_config::diagnostic::ConfigError;
use threadlink_config::model::ThreadlinkConfig;
use threadlink_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_str, loader,
};

const MINIMAL: &str = r#"
[telegram]
bot_token = "123:ABC"
group_id = -1001234567890

[whatsapp]
webhook_secret = "s3cret"
"#;

#[test]
fn valid_toml_deserializes_into_threadlink_config() {
    let toml = r#"
[bridge]
log_level = "debug"
welcome_message = false
call_log_welcome = true
mirror_own_messages = true

[auth]
privileged_operators = [1001, 1002]
auth_timeout_secs = 3600

[telegram]
bot_token = "123:ABC"
group_id = -1001234567890
poll_timeout_secs = 10

[whatsapp]
sidecar_url = "http://sidecar:8088"
webhook_bind = "0.0.0.0:9000"
webhook_secret = "s3cret"

[storage]
database_path = "/tmp/threadlink.db"
wal_mode = false

[media]
scratch_dir = "/tmp/threadlink-scratch"
max_video_note_secs = 30

[sync]
contact_sync_interval_secs = 0
reconcile_interval_secs = 3600

[status]
reply_index_capacity = 50
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.bridge.log_level, "debug");
    assert!(!config.bridge.welcome_message);
    assert!(config.bridge.call_log_welcome);
    assert!(config.bridge.mirror_own_messages);
    assert_eq!(config.auth.privileged_operators, vec![1001, 1002]);
    assert_eq!(config.auth.auth_timeout_secs, 3600);
    assert_eq!(config.telegram.group_id, Some(-1001234567890));
    assert_eq!(config.telegram.poll_timeout_secs, 10);
    assert_eq!(config.whatsapp.sidecar_url, "http://sidecar:8088");
    assert_eq!(config.whatsapp.webhook_bind, "0.0.0.0:9000");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.media.max_video_note_secs, 30);
    assert_eq!(config.sync.contact_sync_interval_secs, 0);
    assert_eq!(config.sync.reconcile_interval_secs, 3600);
    assert_eq!(config.status.reply_index_capacity, 50);
}

#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_and_validate_str(MINIMAL).expect("minimal config");

    assert_eq!(config.bridge.log_level, "info");
    assert!(config.bridge.welcome_message);
    assert!(!config.bridge.call_log_welcome);
    assert!(!config.bridge.mirror_own_messages);
    assert!(!config.bridge.auto_view_status);
    assert!(config.bridge.typing_indicators);
    assert!(config.bridge.read_receipts);
    assert_eq!(config.auth.auth_timeout_secs, 86_400);
    assert!(config.auth.privileged_operators.is_empty());
    assert_eq!(config.telegram.api_url, "https://api.telegram.org");
    assert_eq!(config.telegram.poll_timeout_secs, 30);
    assert!(config.storage.wal_mode);
    assert_eq!(config.media.ffmpeg_path, "ffmpeg");
    assert_eq!(config.media.max_video_note_secs, 60);
    assert_eq!(config.sync.contact_sync_interval_secs, 1800);
    assert_eq!(config.sync.reconcile_interval_secs, 0);
    assert_eq!(config.sync.reconcile_throttle_ms, 500);
    assert_eq!(config.status.reply_index_capacity, 1000);
}

#[test]
fn unknown_field_gets_a_suggestion() {
    let toml = r#"
[telegram]
bot_tken = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an unknown key diagnostic");
    assert_eq!(unknown.0, "bot_tken");
    assert_eq!(unknown.1.as_deref(), Some("bot_token"));
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[discord]\ntoken = \"x\"\n").expect_err("unknown section");
    assert!(err.to_string().contains("discord"));
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[telegram]
group_id = "not-a-number"
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key == "telegram.group_id"))
    );
}

#[test]
fn config_file_is_loaded_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("threadlink.toml");
    std::fs::write(&path, MINIMAL).unwrap();

    let config = load_and_validate_path(&path).expect("file config");
    assert_eq!(config.telegram.bot_token.as_deref(), Some("123:ABC"));
}

#[test]
fn env_vars_override_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("threadlink.toml", MINIMAL)?;
        jail.set_env("THREADLINK_TELEGRAM_BOT_TOKEN", "999:FROMENV");
        jail.set_env("THREADLINK_BRIDGE_STATUS_MIRRORING", "false");
        jail.set_env("THREADLINK_SYNC_RECONCILE_INTERVAL_SECS", "600");

        let config = loader::load_config()?;
        assert_eq!(config.telegram.bot_token.as_deref(), Some("999:FROMENV"));
        assert!(!config.bridge.status_mirroring);
        assert_eq!(config.sync.reconcile_interval_secs, 600);
        Ok(())
    });
}

#[test]
fn serialized_defaults_round_trip_through_toml() {
    let config = ThreadlinkConfig::default();
    let rendered = toml::to_string(&config).expect("defaults serialize");
    let parsed: ThreadlinkConfig = toml::from_str(&rendered).expect("defaults parse");
    assert_eq!(parsed.bridge.log_level, config.bridge.log_level);
    assert_eq!(parsed.storage.database_path, config.storage.database_path);
}
