// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host configuration, read from a RON file.

use crate::error::HostError;
use ordoplay_render_graph::{RunnerSettings, SettingsError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Host settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    /// Format version
    pub version: u32,
    /// Frames to render before exiting
    pub frames: u32,
    /// Cameras in the scene at startup
    pub cameras: u32,
    /// Frame after which the last camera is removed, if any
    pub remove_camera_at: Option<u32>,
    /// Stop at the first failed frame instead of skipping it
    pub fail_fast: bool,
    /// Extra `tracing` filter directives, applied on top of `RUST_LOG`
    pub log_directives: Vec<String>,
    /// Graph runner options
    pub runner: RunnerSettings,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            frames: 3,
            cameras: 2,
            remove_camera_at: None,
            fail_fast: false,
            log_directives: vec![
                "ordoplay_render_host=info".to_string(),
                "ordoplay_render_graph=debug".to_string(),
            ],
            runner: RunnerSettings::default(),
        }
    }
}

impl HostSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, HostError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_ron(&content)?;
        tracing::debug!("Loaded host settings from {}", path.display());
        Ok(settings)
    }

    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, HostError> {
        let settings: HostSettings = ron::from_str(content).map_err(SettingsError::from)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(HostError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_settings_keep_defaults() {
        let settings = HostSettings::from_ron("(frames: 10, runner: (validate_graphs: true))").unwrap();
        assert_eq!(settings.frames, 10);
        assert_eq!(settings.cameras, 2);
        assert!(settings.runner.validate_graphs);
        assert_eq!(settings.log_directives, HostSettings::default().log_directives);
    }

    #[test]
    fn test_newer_version_rejected() {
        assert!(matches!(
            HostSettings::from_ron("(version: 99)"),
            Err(HostError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_malformed_settings() {
        assert!(matches!(
            HostSettings::from_ron("(frames: \"many\")"),
            Err(HostError::Settings(_))
        ));
    }

    #[test]
    fn test_bundled_settings_file_parses() {
        let settings = HostSettings::from_ron(include_str!("../host.ron")).unwrap();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert!(settings.runner.validate_graphs);
    }
}
