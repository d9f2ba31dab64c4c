//! INI configuration file.
//!
//! Lives at `<config_dir>/scanview/config.ini`:
//!
//! ```ini
//! [performance]
//! preset = medium
//! frustum_culling = true
//! debug_frustum = false
//!
//! [monitor]
//! auto_adjust = false
//! target_fps = 30
//! sample_period_ms = 2000
//! adjust_threshold = 3
//!
//! [logging]
//! level = info
//! directory =
//! ```
//!
//! Missing files and missing keys fall back to defaults. Every key is
//! addressable through [`ConfigKey`], which the `config` CLI command uses.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::monitor::{
    MonitorConfig, DEFAULT_ADJUST_THRESHOLD, DEFAULT_SAMPLE_PERIOD, DEFAULT_TARGET_FPS,
};
use crate::preset::Preset;
use crate::settings::{CullingState, ViewerSettings};

/// Errors reading, writing or editing the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config file parse error: {0}")]
    Parse(String),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),
}

impl From<ini::Error> for ConfigError {
    fn from(e: ini::Error) -> Self {
        match e {
            ini::Error::Io(e) => ConfigError::Io(e),
            ini::Error::Parse(e) => ConfigError::Parse(e.to_string()),
        }
    }
}

/// `[performance]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSettings {
    pub preset: Preset,
    pub frustum_culling: bool,
    pub debug_frustum: bool,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self {
            preset: Preset::DEFAULT,
            frustum_culling: true,
            debug_frustum: false,
        }
    }
}

/// `[monitor]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Start the frame-rate monitor on launch.
    pub auto_adjust: bool,
    pub target_fps: f64,
    pub sample_period_ms: u64,
    pub adjust_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            auto_adjust: false,
            target_fps: DEFAULT_TARGET_FPS,
            sample_period_ms: DEFAULT_SAMPLE_PERIOD.as_millis() as u64,
            adjust_threshold: DEFAULT_ADJUST_THRESHOLD,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub level: String,
    /// Directory for daily rolling log files; `None` logs to the console only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub performance: PerformanceSettings,
    pub monitor: MonitorSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if !path.exists() {
            return Ok(config);
        }

        let ini = Ini::load_from_file(path)?;
        for key in ConfigKey::all() {
            if let Some(value) = ini.get_from(Some(key.section()), key.key_name()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini.write_to_file(path)?;
        Ok(())
    }

    /// Monitor configuration derived from the `[monitor]` section.
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::default()
            .with_target_fps(self.monitor.target_fps)
            .with_sample_period(Duration::from_millis(self.monitor.sample_period_ms))
            .with_adjust_threshold(self.monitor.adjust_threshold)
    }

    /// Initial viewer settings derived from the `[performance]` section.
    pub fn viewer_settings(&self) -> ViewerSettings {
        ViewerSettings {
            active_preset: self.performance.preset,
            culling: CullingState {
                frustum_culling_enabled: self.performance.frustum_culling,
                debug_show_frustum: self.performance.debug_frustum && self.performance.frustum_culling,
            },
        }
    }
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("scanview")
        .join("config.ini")
}

/// Every configurable `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    PerformancePreset,
    PerformanceFrustumCulling,
    PerformanceDebugFrustum,
    MonitorAutoAdjust,
    MonitorTargetFps,
    MonitorSamplePeriodMs,
    MonitorAdjustThreshold,
    LoggingLevel,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::PerformancePreset,
            ConfigKey::PerformanceFrustumCulling,
            ConfigKey::PerformanceDebugFrustum,
            ConfigKey::MonitorAutoAdjust,
            ConfigKey::MonitorTargetFps,
            ConfigKey::MonitorSamplePeriodMs,
            ConfigKey::MonitorAdjustThreshold,
            ConfigKey::LoggingLevel,
            ConfigKey::LoggingDirectory,
        ]
    }

    pub fn section(&self) -> &'static str {
        match self {
            ConfigKey::PerformancePreset
            | ConfigKey::PerformanceFrustumCulling
            | ConfigKey::PerformanceDebugFrustum => "performance",
            ConfigKey::MonitorAutoAdjust
            | ConfigKey::MonitorTargetFps
            | ConfigKey::MonitorSamplePeriodMs
            | ConfigKey::MonitorAdjustThreshold => "monitor",
            ConfigKey::LoggingLevel | ConfigKey::LoggingDirectory => "logging",
        }
    }

    pub fn key_name(&self) -> &'static str {
        match self {
            ConfigKey::PerformancePreset => "preset",
            ConfigKey::PerformanceFrustumCulling => "frustum_culling",
            ConfigKey::PerformanceDebugFrustum => "debug_frustum",
            ConfigKey::MonitorAutoAdjust => "auto_adjust",
            ConfigKey::MonitorTargetFps => "target_fps",
            ConfigKey::MonitorSamplePeriodMs => "sample_period_ms",
            ConfigKey::MonitorAdjustThreshold => "adjust_threshold",
            ConfigKey::LoggingLevel => "level",
            ConfigKey::LoggingDirectory => "directory",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as a string; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::PerformancePreset => config.performance.preset.to_string(),
            ConfigKey::PerformanceFrustumCulling => config.performance.frustum_culling.to_string(),
            ConfigKey::PerformanceDebugFrustum => config.performance.debug_frustum.to_string(),
            ConfigKey::MonitorAutoAdjust => config.monitor.auto_adjust.to_string(),
            ConfigKey::MonitorTargetFps => config.monitor.target_fps.to_string(),
            ConfigKey::MonitorSamplePeriodMs => config.monitor.sample_period_ms.to_string(),
            ConfigKey::MonitorAdjustThreshold => config.monitor.adjust_threshold.to_string(),
            ConfigKey::LoggingLevel => config.logging.level.clone(),
            ConfigKey::LoggingDirectory => config
                .logging
                .directory
                .as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default(),
        }
    }

    /// Validate and store a value.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let invalid = |reason: &str| ConfigError::InvalidValue {
            key: self.name(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match self {
            ConfigKey::PerformancePreset => {
                config.performance.preset = value
                    .parse()
                    .map_err(|_| invalid("expected ultra, high, medium or low"))?;
            }
            ConfigKey::PerformanceFrustumCulling => {
                config.performance.frustum_culling =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::PerformanceDebugFrustum => {
                config.performance.debug_frustum =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::MonitorAutoAdjust => {
                config.monitor.auto_adjust =
                    parse_bool(value).ok_or_else(|| invalid("expected true or false"))?;
            }
            ConfigKey::MonitorTargetFps => {
                let fps: f64 = value.parse().map_err(|_| invalid("expected a number"))?;
                MonitorConfig::default()
                    .with_target_fps(fps)
                    .validate()
                    .map_err(|_| invalid("must be a positive number"))?;
                config.monitor.target_fps = fps;
            }
            ConfigKey::MonitorSamplePeriodMs => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| invalid("expected milliseconds"))?;
                if ms == 0 {
                    return Err(invalid("must be at least 1"));
                }
                config.monitor.sample_period_ms = ms;
            }
            ConfigKey::MonitorAdjustThreshold => {
                let threshold: u32 = value.parse().map_err(|_| invalid("expected an integer"))?;
                if threshold == 0 {
                    return Err(invalid("must be at least 1"));
                }
                config.monitor.adjust_threshold = threshold;
            }
            ConfigKey::LoggingLevel => {
                if value.is_empty() {
                    return Err(invalid("must not be empty"));
                }
                tracing_subscriber::EnvFilter::try_new(value)
                    .map_err(|e| invalid(&e.to_string()))?;
                config.logging.level = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
        }
        Ok(())
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert_eq!(config.performance.preset, Preset::Medium);
        assert!(config.performance.frustum_culling);
        assert!(!config.monitor.auto_adjust);
        assert_eq!(config.monitor_config(), MonitorConfig::default());
        assert_eq!(config.viewer_settings(), ViewerSettings::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[monitor]\ntarget_fps = 45\nauto_adjust = yes\n").unwrap();

        let config = ConfigFile::load_from(&path).unwrap();
        assert_eq!(config.monitor.target_fps, 45.0);
        assert!(config.monitor.auto_adjust);
        assert_eq!(config.monitor.adjust_threshold, 3);
        assert_eq!(config.performance, PerformanceSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.performance.preset = Preset::Low;
        config.performance.frustum_culling = false;
        config.logging.directory = Some(PathBuf::from("/var/log/scanview"));
        config.save_to(&path).unwrap();

        assert_eq!(ConfigFile::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[performance]\npreset = cinematic\n").unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "performance.preset"));
    }

    #[test]
    fn test_set_target_fps_must_be_positive() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::MonitorTargetFps.set(&mut config, "0").is_err());
        assert!(ConfigKey::MonitorTargetFps.set(&mut config, "-3").is_err());
        assert!(ConfigKey::MonitorTargetFps.set(&mut config, "fast").is_err());

        ConfigKey::MonitorTargetFps.set(&mut config, "24").unwrap();
        assert_eq!(config.monitor_config().target_fps, 24.0);
    }

    #[test]
    fn test_key_parsing() {
        let key: ConfigKey = "monitor.sample_period_ms".parse().unwrap();
        assert_eq!(key, ConfigKey::MonitorSamplePeriodMs);
        assert_eq!(key.to_string(), "monitor.sample_period_ms");

        assert!(matches!(
            "monitor.bogus".parse::<ConfigKey>(),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_every_key_round_trips_its_default() {
        let defaults = ConfigFile::default();
        for key in ConfigKey::all() {
            let mut config = ConfigFile::default();
            key.set(&mut config, &key.get(&defaults)).unwrap();
            assert_eq!(config, defaults, "{}", key);
        }
    }

    #[test]
    fn test_debug_overlay_requires_culling() {
        let mut config = ConfigFile::default();
        config.performance.debug_frustum = true;
        config.performance.frustum_culling = false;
        assert!(!config.viewer_settings().culling.debug_show_frustum);
    }
}
