use std::{fs, path::Path};

use anyhow::Context;
use client_core::{transport::DEFAULT_API_URL, DEFAULT_IMAGE_FOLDER};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "pantry.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub image_folder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            request_timeout_secs: 10,
            log_level: "warn".into(),
            image_folder: DEFAULT_IMAGE_FOLDER.into(),
        }
    }
}

/// Defaults, then the config file, then the environment, then `--api-url`.
///
/// An explicit `config_path` must exist; the default `pantry.toml` is
/// optional.
pub fn load_settings(
    config_path: Option<&Path>,
    api_url_override: Option<&str>,
) -> anyhow::Result<Settings> {
    let mut settings = match config_path {
        Some(path) => read_settings_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                read_settings_file(default_path)?
            } else {
                Settings::default()
            }
        }
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    if let Some(api_url) = api_url_override {
        settings.api_url = api_url.to_string();
    }

    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let settings: Settings = toml::from_str(&raw)
        .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
    anyhow::ensure!(
        settings.request_timeout_secs > 0,
        "request_timeout_secs in '{}' must be at least 1",
        path.display()
    );
    Ok(settings)
}

/// `APP__*` variables are applied after `PANTRY_*` ones and win on conflict.
pub(crate) fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["PANTRY_API_URL", "APP__API_URL"] {
        if let Some(v) = lookup(key) {
            settings.api_url = v;
        }
    }

    for key in ["PANTRY_TIMEOUT_SECS", "APP__TIMEOUT_SECS"] {
        let parsed = lookup(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0);
        if let Some(parsed) = parsed {
            settings.request_timeout_secs = parsed;
        }
    }

    for key in ["PANTRY_LOG", "APP__LOG_LEVEL"] {
        if let Some(v) = lookup(key) {
            settings.log_level = v;
        }
    }

    for key in ["PANTRY_IMAGE_FOLDER", "APP__IMAGE_FOLDER"] {
        if let Some(v) = lookup(key) {
            settings.image_folder = v;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
