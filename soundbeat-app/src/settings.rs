//! Persistent settings (JSON file), merged with command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use soundbeat_core::{parse_duration, MeterError, MeteringConfig};
use tracing::warn;

pub const DEFAULT_PERIOD: &str = "10ms";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct AppSettings {
    /// Path of the file to meter; also the `type` of every emitted event.
    pub name: String,
    /// Block period as a duration string (`"10ms"`, `"0.5s"`, ...).
    pub period: String,
    pub zoom: f64,
    pub backdate: bool,
    /// Where to write JSON lines. Standard output when unset.
    pub output: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            period: DEFAULT_PERIOD.into(),
            zoom: 1.0,
            backdate: false,
            output: None,
        }
    }
}

impl AppSettings {
    pub fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.period = normalize_period(&self.period);
        self.output = self
            .output
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    /// Build the core configuration.
    ///
    /// # Errors
    /// `MeterError::Config` when no name is set, the period does not parse,
    /// or the resulting configuration is invalid.
    pub fn metering_config(&self) -> Result<MeteringConfig, MeterError> {
        if self.name.is_empty() {
            return Err(MeterError::Config("no name set".into()));
        }
        let config = MeteringConfig {
            period: parse_duration(&self.period)?,
            zoom: self.zoom,
            backdate: self.backdate,
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn normalize_period(raw: &str) -> String {
    let period = raw.trim();
    if period.is_empty() {
        DEFAULT_PERIOD.into()
    } else {
        period.to_ascii_lowercase()
    }
}

pub fn default_settings_path() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".config")
        })
        .join("soundbeat")
        .join("settings.json")
}

/// Load settings, falling back to defaults for a missing or unreadable file.
pub fn load_settings(path: &Path) -> AppSettings {
    let mut settings = match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str::<AppSettings>(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring malformed settings file: {e}");
            AppSettings::default()
        }),
        Err(_) => AppSettings::default(),
    };
    settings.normalize();
    settings
}

pub fn save_settings(path: &Path, settings: &AppSettings) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
