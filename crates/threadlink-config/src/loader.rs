// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/threadlink/threadlink.toml`, then
//! `~/.config/threadlink/threadlink.toml`, then `./threadlink.toml`, with
//! `THREADLINK_*` environment variables applied last.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ThreadlinkConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/threadlink/threadlink.toml";
pub(crate) const LOCAL_CONFIG: &str = "threadlink.toml";

/// Config sections addressable through `THREADLINK_<SECTION>_<KEY>`.
const ENV_SECTIONS: &[&str] = &[
    "bridge", "auth", "telegram", "whatsapp", "storage", "media", "sync", "status",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("threadlink").join(LOCAL_CONFIG))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/threadlink/threadlink.toml`
/// 3. `~/.config/threadlink/threadlink.toml`
/// 4. `./threadlink.toml`
/// 5. `THREADLINK_*` environment variables
pub fn load_config() -> Result<ThreadlinkConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ThreadlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ThreadlinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ThreadlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ThreadlinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ThreadlinkConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `THREADLINK_TELEGRAM_BOT_TOKEN` to `telegram.bot_token`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores (or other section names) stay intact.
pub fn env_key_to_path(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("THREADLINK_").map(|key| env_key_to_path(key.as_str()).into())
}
