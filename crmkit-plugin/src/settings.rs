//! Plugin configuration read from the step's unsecure configuration.

use crate::LogLevel;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogSettings {
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PluginSettings {
    pub log_settings: LogSettings,
}

impl PluginSettings {
    /// Parses `{"LogSettings":{"Level":"Debug"}}`.
    ///
    /// Never fails: absent, blank, or malformed input yields the defaults.
    pub fn load(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str(raw) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Malformed plugin settings, using defaults");
                Self::default()
            }
        }
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_settings.level
    }
}
