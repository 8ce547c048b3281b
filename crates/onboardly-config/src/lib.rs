//! Configuration for onboardly reconcilers.
//!
//! A flat TOML file (one key per onboarding setting, plus the
//! `[platform_map]` and `[napalm_driver_map]` tables) layered under
//! `ONBOARDLY_*` environment variables, and translation to
//! `onboardly_core::ReconcilerConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use onboardly_core::{Color, CreatePolicy, MatchStrategy, ReconcilerConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config struct ──────────────────────────────────────────────

/// Onboarding settings as stored on disk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Config {
    /// `strict` or `loose`.
    #[serde(default)]
    pub object_match_strategy: MatchStrategy,

    #[serde(default = "default_device_role")]
    pub default_device_role: String,

    /// Six hex digits, with or without a leading `#`.
    #[serde(default = "default_device_role_color")]
    pub default_device_role_color: String,

    #[serde(default = "default_status")]
    pub default_device_status: String,

    #[serde(default = "default_status")]
    pub default_ip_status: String,

    #[serde(default = "enabled")]
    pub create_manufacturer_if_missing: bool,

    #[serde(default = "enabled")]
    pub create_device_type_if_missing: bool,

    #[serde(default = "enabled")]
    pub create_device_role_if_missing: bool,

    #[serde(default = "enabled")]
    pub create_platform_if_missing: bool,

    #[serde(default = "enabled")]
    pub create_management_interface_if_missing: bool,

    #[serde(default)]
    pub skip_manufacturer_on_update: bool,

    #[serde(default)]
    pub skip_device_type_on_update: bool,

    #[serde(default)]
    pub preserve_status_on_update: bool,

    /// Driver string → platform name.
    #[serde(default)]
    pub platform_map: HashMap<String, String>,

    /// Driver string → napalm driver.
    #[serde(default)]
    pub napalm_driver_map: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            object_match_strategy: MatchStrategy::default(),
            default_device_role: default_device_role(),
            default_device_role_color: default_device_role_color(),
            default_device_status: default_status(),
            default_ip_status: default_status(),
            create_manufacturer_if_missing: true,
            create_device_type_if_missing: true,
            create_device_role_if_missing: true,
            create_platform_if_missing: true,
            create_management_interface_if_missing: true,
            skip_manufacturer_on_update: false,
            skip_device_type_on_update: false,
            preserve_status_on_update: false,
            platform_map: HashMap::new(),
            napalm_driver_map: HashMap::new(),
        }
    }
}

fn default_device_role() -> String {
    "network".into()
}
fn default_device_role_color() -> String {
    "ff0000".into()
}
fn default_status() -> String {
    "Active".into()
}
fn enabled() -> bool {
    true
}

impl Config {
    /// Validate and translate into the reconciler's runtime configuration.
    pub fn to_reconciler_config(&self) -> Result<ReconcilerConfig, ConfigError> {
        let color = self
            .default_device_role_color
            .parse::<Color>()
            .map_err(|e| ConfigError::Validation {
                field: "default_device_role_color".into(),
                reason: e.to_string(),
            })?;

        Ok(ReconcilerConfig {
            object_match_strategy: self.object_match_strategy,
            default_device_role: required("default_device_role", &self.default_device_role)?,
            default_device_role_color: color,
            default_device_status: required("default_device_status", &self.default_device_status)?,
            default_ip_status: required("default_ip_status", &self.default_ip_status)?,
            platform_map: self.platform_map.clone(),
            napalm_driver_map: self.napalm_driver_map.clone(),
            create: CreatePolicy {
                manufacturer: self.create_manufacturer_if_missing,
                device_type: self.create_device_type_if_missing,
                device_role: self.create_device_role_if_missing,
                platform: self.create_platform_if_missing,
                management_interface: self.create_management_interface_if_missing,
            },
            skip_manufacturer_on_update: self.skip_manufacturer_on_update,
            skip_device_type_on_update: self.skip_device_type_on_update,
            preserve_status_on_update: self.preserve_status_on_update,
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ConfigError::Validation {
            field: field.into(),
            reason: "must not be empty".into(),
        })
    } else {
        Ok(trimmed.to_owned())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "onboardly", "onboardly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("onboardly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the Config from `path` + environment.
///
/// A missing file is not an error: defaults and environment still apply.
/// `ONBOARDLY_PLATFORM_MAP__CISCO_IOS=ios` sets one map entry.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ONBOARDLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be loaded.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
