// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runner configuration.

use serde::{Deserialize, Serialize};

/// Options for [`RenderGraphRunner`](crate::RenderGraphRunner)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Run [`RenderGraph::validate`](crate::RenderGraph::validate) before every run
    pub validate_graphs: bool,
}

impl RunnerSettings {
    /// Parse settings from RON text; missing fields keep their defaults
    pub fn from_ron(source: &str) -> Result<Self, SettingsError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize settings to pretty RON
    pub fn to_ron(&self) -> Result<String, SettingsError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }
}

/// Settings could not be read or written
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Malformed RON
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failure
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let settings = RunnerSettings::from_ron("()").unwrap();
        assert_eq!(settings, RunnerSettings::default());
        assert!(!settings.validate_graphs);
    }

    #[test]
    fn test_parse_and_write_back() {
        let settings = RunnerSettings::from_ron("(validate_graphs: true)").unwrap();
        assert!(settings.validate_graphs);
        let text = settings.to_ron().unwrap();
        assert_eq!(RunnerSettings::from_ron(&text).unwrap(), settings);
    }

    #[test]
    fn test_malformed_settings() {
        assert!(matches!(
            RunnerSettings::from_ron("(validate_graphs: maybe)"),
            Err(SettingsError::Parse(_))
        ));
    }
}
