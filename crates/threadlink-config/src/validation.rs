// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks credentials and ranges that serde attributes cannot express. All
//! problems are collected; validation does not stop at the first one.

use std::net::SocketAddr;

use crate::diagnostic::ConfigError;
use crate::model::ThreadlinkConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &ThreadlinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.bridge.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "bridge.log_level `{}` must be one of {}",
            config.bridge.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    match config.telegram.bot_token.as_deref().map(str::trim) {
        None | Some("") => errors.push(ConfigError::MissingKey {
            key: "telegram.bot_token".to_string(),
        }),
        Some(token) if !token.contains(':') => errors.push(ConfigError::validation(
            "telegram.bot_token must have the form `<bot id>:<secret>`",
        )),
        Some(_) => {}
    }

    match config.telegram.group_id {
        None => errors.push(ConfigError::MissingKey {
            key: "telegram.group_id".to_string(),
        }),
        Some(id) if id >= 0 => errors.push(ConfigError::validation(format!(
            "telegram.group_id must be a supergroup id (negative), got {id}"
        ))),
        Some(_) => {}
    }

    if config.telegram.poll_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "telegram.poll_timeout_secs must be at least 1",
        ));
    }

    for (key, url) in [
        ("telegram.api_url", &config.telegram.api_url),
        ("whatsapp.sidecar_url", &config.whatsapp.sidecar_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::validation(format!(
                "{key} `{url}` must be an http:// or https:// URL"
            )));
        }
    }

    if config.whatsapp.webhook_bind.parse::<SocketAddr>().is_err() {
        errors.push(ConfigError::validation(format!(
            "whatsapp.webhook_bind `{}` is not a valid socket address",
            config.whatsapp.webhook_bind
        )));
    }

    if config
        .whatsapp
        .webhook_secret
        .as_deref()
        .is_none_or(|s| s.trim().is_empty())
    {
        errors.push(ConfigError::MissingKey {
            key: "whatsapp.webhook_secret".to_string(),
        });
    }

    if config.auth.auth_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "auth.auth_timeout_secs must be at least 1",
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.media.scratch_dir.trim().is_empty() {
        errors.push(ConfigError::validation("media.scratch_dir must not be empty"));
    }

    if !(1..=60).contains(&config.media.max_video_note_secs) {
        errors.push(ConfigError::validation(format!(
            "media.max_video_note_secs must be between 1 and 60, got {}",
            config.media.max_video_note_secs
        )));
    }

    if config.status.reply_index_capacity == 0 {
        errors.push(ConfigError::validation(
            "status.reply_index_capacity must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ThreadlinkConfig {
        let mut config = ThreadlinkConfig::default();
        config.telegram.bot_token = Some("123:ABC".to_string());
        config.telegram.group_id = Some(-1001234567890);
        config.whatsapp.webhook_secret = Some("s3cret".to_string());
        config
    }

    fn has_validation(errors: &[ConfigError], needle: &str) -> bool {
        errors.iter().any(|e| match e {
            ConfigError::Validation { message } => message.contains(needle),
            ConfigError::MissingKey { key } => key.contains(needle),
            _ => false,
        })
    }

    #[test]
    fn config_with_credentials_validates() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn default_config_reports_every_missing_credential() {
        let errors = validate_config(&ThreadlinkConfig::default()).unwrap_err();
        assert!(has_validation(&errors, "telegram.bot_token"));
        assert!(has_validation(&errors, "telegram.group_id"));
        assert!(has_validation(&errors, "whatsapp.webhook_secret"));
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn positive_group_id_fails_validation() {
        let mut config = valid_config();
        config.telegram.group_id = Some(42);
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation(&errors, "supergroup"));
    }

    #[test]
    fn bad_log_level_fails_validation() {
        let mut config = valid_config();
        config.bridge.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation(&errors, "bridge.log_level"));
    }

    #[test]
    fn video_note_cap_is_bounded() {
        let mut config = valid_config();
        config.media.max_video_note_secs = 90;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation(&errors, "max_video_note_secs"));
    }

    #[test]
    fn invalid_webhook_bind_fails_validation() {
        let mut config = valid_config();
        config.whatsapp.webhook_bind = "localhost".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation(&errors, "webhook_bind"));
    }

    #[test]
    fn zero_auth_timeout_fails_validation() {
        let mut config = valid_config();
        config.auth.auth_timeout_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_validation(&errors, "auth_timeout_secs"));
    }
}
