use std::{collections::HashMap, fs, path::PathBuf};

use serde::Deserialize;
use shared::protocol::MAX_CONTACT_FIELD_BYTES;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub content_root: PathBuf,
    pub max_contact_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            content_root: PathBuf::from("./site"),
            // Three fields at their cap plus JSON framing.
            max_contact_bytes: 3 * MAX_CONTACT_FIELD_BYTES + 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file(&mut settings, &raw);
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

/// Applies `bind_addr`, `content_root` and `max_contact_bytes` from a flat
/// TOML table. Malformed files are ignored.
pub(crate) fn apply_file(settings: &mut Settings, raw: &str) {
    let Ok(file_cfg) = toml::from_str::<HashMap<String, toml::Value>>(raw) else {
        return;
    };
    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("content_root").and_then(toml::Value::as_str) {
        settings.content_root = PathBuf::from(v);
    }
    if let Some(v) = file_cfg.get("max_contact_bytes").and_then(toml::Value::as_integer) {
        if let Ok(v) = usize::try_from(v) {
            settings.max_contact_bytes = v;
        }
    }
}

pub(crate) fn apply_env<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = lookup("CONTENT_ROOT") {
        settings.content_root = PathBuf::from(v);
    }
    if let Some(v) = lookup("APP__CONTENT_ROOT") {
        settings.content_root = PathBuf::from(v);
    }

    if let Some(v) = lookup("APP__MAX_CONTACT_BYTES") {
        if let Ok(parsed) = v.trim().parse::<usize>() {
            settings.max_contact_bytes = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
