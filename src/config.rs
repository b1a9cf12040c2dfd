// Copyright 2018-2020 Sebastian Wiesner <sebastian@swsnr.de>

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Configuration: built-in defaults, layered with a TOML file discovered via
//! the platform's user configuration directory (`streamdown/config.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Per-role hue/saturation/value multiplier, applied on top of the base HSV
/// triple before clamping and converting to RGB.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoleMultiplier {
    #[serde(rename = "H")]
    pub h: f64,
    #[serde(rename = "S")]
    pub s: f64,
    #[serde(rename = "V")]
    pub v: f64,
}

/// `[features]` section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Features {
    #[serde(rename = "CodeSpaces")]
    pub code_spaces: bool,
    #[serde(rename = "Clipboard")]
    pub clipboard: bool,
    #[serde(rename = "Logging")]
    pub logging: bool,
    #[serde(rename = "Timeout")]
    pub timeout: f64,
}

impl Default for Features {
    fn default() -> Self {
        Features {
            code_spaces: true,
            clipboard: true,
            logging: false,
            timeout: 0.5,
        }
    }
}

/// `[style]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleConfig {
    #[serde(rename = "Margin")]
    pub margin: usize,
    #[serde(rename = "ListIndent")]
    pub list_indent: usize,
    #[serde(rename = "PrettyPad")]
    pub pretty_pad: bool,
    #[serde(rename = "Width")]
    pub width: usize,
    #[serde(rename = "HSV")]
    pub hsv: [f64; 3],
    #[serde(rename = "Dark")]
    pub dark: RoleMultiplier,
    #[serde(rename = "Mid")]
    pub mid: RoleMultiplier,
    #[serde(rename = "Symbol")]
    pub symbol: RoleMultiplier,
    #[serde(rename = "Head")]
    pub head: RoleMultiplier,
    #[serde(rename = "Grey")]
    pub grey: RoleMultiplier,
    #[serde(rename = "Bright")]
    pub bright: RoleMultiplier,
    #[serde(rename = "Syntax")]
    pub syntax: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            margin: 2,
            list_indent: 2,
            pretty_pad: false,
            width: 0,
            hsv: [0.8, 0.5, 0.5],
            dark: RoleMultiplier {
                h: 1.0,
                s: 1.5,
                v: 0.25,
            },
            mid: RoleMultiplier {
                h: 1.0,
                s: 1.0,
                v: 0.50,
            },
            symbol: RoleMultiplier {
                h: 1.0,
                s: 1.0,
                v: 1.50,
            },
            head: RoleMultiplier {
                h: 1.0,
                s: 2.0,
                v: 1.50,
            },
            grey: RoleMultiplier {
                h: 1.0,
                s: 0.12,
                v: 1.25,
            },
            bright: RoleMultiplier {
                h: 1.0,
                s: 2.0,
                v: 2.00,
            },
            syntax: "monokai".to_string(),
        }
    }
}

/// The full, merged configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub features: Features,
    pub style: StyleConfig,
}

/// The built-in TOML document written to a fresh config file, matching the
/// shape a user would hand-edit.
pub fn default_toml() -> String {
    let config = Config::default();
    toml::to_string_pretty(&config).expect("default configuration always serializes")
}

/// Locate `streamdown/config.toml` under the platform's user configuration
/// directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    directories::ProjectDirs::from("", "", "streamdown")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Read the configuration file at `path`, creating it with built-in defaults
/// if it does not exist yet.
pub fn ensure_config_file(path: &Path) -> Result<String, ConfigError> {
    if !path.exists() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }
        fs::write(path, default_toml()).map_err(ConfigError::Write)?;
    }
    fs::read_to_string(path).map_err(ConfigError::Read)
}

/// Load the merged configuration, falling back to built-in defaults (with a
/// logged warning) on any parse error rather than aborting startup.
pub fn load() -> Config {
    match config_path().and_then(|path| ensure_config_file(&path).map(|text| (path, text))) {
        Ok((path, text)) => match toml::from_str(&text) {
            Ok(config) => config,
            Err(error) => {
                warn!(?path, %error, "failed to parse configuration, using defaults");
                Config::default()
            }
        },
        Err(error) => {
            warn!(%error, "failed to load configuration, using defaults");
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_round_trips() {
        let text = default_toml();
        let parsed: Config = toml::from_str(&text).expect("default TOML must parse");
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn ensure_config_file_creates_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "streamdown-test-config-{:?}",
            std::thread::current().id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let text = ensure_config_file(&path).unwrap();
        assert!(path.exists());
        let config: Config = toml::from_str(&text).unwrap();
        assert_eq!(config, Config::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn partial_config_merges_over_defaults() {
        let text = "[features]\nClipboard = false\n";
        let config: Config = toml::from_str(text).unwrap();
        assert!(!config.features.clipboard);
        assert!(config.features.code_spaces);
        assert_eq!(config.style, StyleConfig::default());
    }
}
