use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    /// Username put in tokens requested without one.
    pub default_username: String,
    pub push_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4000".into(),
            jwt_secret: "flow-dev-secret".into(),
            token_ttl_minutes: 15,
            default_username: "testuser".into(),
            push_buffer: 256,
        }
    }
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new("flow_relay.toml"), |key| std::env::var(key).ok())
}

/// Defaults, then the TOML file, then environment variables.
pub(crate) fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                let get = |key: &str| file_cfg.get(key).map(toml_to_string);
                apply(&mut settings, "bind_addr", get("bind_addr"));
                apply(&mut settings, "jwt_secret", get("jwt_secret"));
                apply(&mut settings, "token_ttl_minutes", get("token_ttl_minutes"));
                apply(&mut settings, "default_username", get("default_username"));
                apply(&mut settings, "push_buffer", get("push_buffer"));
            }
            Err(error) => warn!(path = %path.display(), %error, "ignoring unreadable relay config"),
        }
    }

    apply(&mut settings, "bind_addr", env("FLOW_RELAY_BIND"));
    apply(&mut settings, "bind_addr", env("APP__BIND_ADDR"));
    apply(&mut settings, "jwt_secret", env("APP__JWT_SECRET"));
    apply(&mut settings, "token_ttl_minutes", env("APP__TOKEN_TTL_MINUTES"));
    apply(&mut settings, "default_username", env("APP__DEFAULT_USERNAME"));
    apply(&mut settings, "push_buffer", env("APP__PUSH_BUFFER"));

    settings
}

fn toml_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}

fn apply(settings: &mut Settings, key: &str, value: Option<String>) {
    let Some(value) = value else {
        return;
    };
    match key {
        "bind_addr" => settings.bind_addr = value,
        "jwt_secret" => settings.jwt_secret = value,
        "default_username" => settings.default_username = value,
        "token_ttl_minutes" => match value.parse::<i64>() {
            Ok(parsed) if parsed > 0 => settings.token_ttl_minutes = parsed,
            _ => warn!(%value, "ignoring invalid token_ttl_minutes"),
        },
        "push_buffer" => match value.parse::<usize>() {
            Ok(parsed) if parsed > 0 => settings.push_buffer = parsed,
            _ => warn!(%value, "ignoring invalid push_buffer"),
        },
        _ => {}
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
