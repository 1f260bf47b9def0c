//! Configuration management

use super::error::ConfigError;
use super::session::CapturePlan;
use crate::hid::Led;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identity of the keyboard to capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// USB Vendor ID (0 = not set)
    #[serde(default)]
    pub vendor_id: u16,
    /// USB Product ID (0 = not set)
    #[serde(default)]
    pub product_id: u16,
}

/// Heartbeat configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Ticks before the heartbeat fires (0 disables the heartbeat)
    #[serde(default = "default_reload")]
    pub reload: u32,
    /// Tick period in milliseconds
    #[serde(default = "default_period")]
    pub period_ms: u64,
}

fn default_reload() -> u32 {
    3
}
fn default_period() -> u64 {
    1000
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            reload: default_reload(),
            period_ms: default_period(),
        }
    }
}

/// Capture loop configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Pause between forwarded reports in milliseconds
    #[serde(default = "default_report_interval")]
    pub report_interval_ms: u64,
    /// Reports to forward before stopping (0 = until cancelled)
    #[serde(default)]
    pub max_reports: u64,
    /// LED toggled by the liveness reports
    #[serde(default)]
    pub led: Led,
}

fn default_report_interval() -> u64 {
    500
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: default_report_interval(),
            max_reports: 0,
            led: Led::default(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Validated inputs for one capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub vendor_id: u16,
    pub product_id: u16,
    /// Tick period and reload count, `None` when the heartbeat is disabled
    pub heartbeat: Option<(Duration, NonZeroU32)>,
    pub plan: CapturePlan,
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "hidhub", "hidhub")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Get the default configuration embedded in the binary
    pub fn default_config_str() -> &'static str {
        include_str!("../../config/default.toml")
    }

    /// Check identifiers and timings, producing session inputs
    pub fn session_settings(&self) -> Result<SessionSettings, ConfigError> {
        if self.device.vendor_id == 0 {
            return Err(ConfigError::MissingVendorId);
        }
        if self.device.product_id == 0 {
            return Err(ConfigError::MissingProductId);
        }
        if self.capture.report_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "capture.report_interval_ms",
                reason: "must be positive".to_string(),
            });
        }

        let heartbeat = match NonZeroU32::new(self.heartbeat.reload) {
            Some(_) if self.heartbeat.period_ms == 0 => {
                return Err(ConfigError::InvalidValue {
                    field: "heartbeat.period_ms",
                    reason: "must be positive when the heartbeat is enabled".to_string(),
                })
            }
            Some(reload) => Some((Duration::from_millis(self.heartbeat.period_ms), reload)),
            None => None,
        };

        Ok(SessionSettings {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            heartbeat,
            plan: CapturePlan {
                report_interval: Duration::from_millis(self.capture.report_interval_ms),
                max_reports: self.capture.max_reports,
                led: self.capture.led,
            },
        })
    }
}

/// Parse a USB vendor/product id given as decimal or `0x`-prefixed hex
pub fn parse_usb_id(s: &str) -> Result<u16, ConfigError> {
    let trimmed = s.trim();
    let (digits, radix) = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    // from_str_radix tolerates a leading '+', ids are digits only
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(ConfigError::InvalidId(s.to_string()));
    }

    match u32::from_str_radix(digits, radix) {
        Ok(value) if (1..=0xFFFF).contains(&value) => Ok(value as u16),
        _ => Err(ConfigError::InvalidId(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ids() -> Config {
        let mut config = Config::default();
        config.device.vendor_id = 0x046d;
        config.device.product_id = 0xc31c;
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.vendor_id, 0);
        assert_eq!(config.heartbeat.reload, 3);
        assert_eq!(config.heartbeat.period_ms, 1000);
        assert_eq!(config.capture.report_interval_ms, 500);
        assert_eq!(config.capture.led, Led::CapsLock);
    }

    #[test]
    fn test_embedded_default_matches_default() {
        let parsed: Config = toml::from_str(Config::default_config_str()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_config_serialization() {
        let config = with_ids();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[device]\nvendor_id = 1133\n").unwrap();
        assert_eq!(parsed.device.vendor_id, 0x046d);
        assert_eq!(parsed.device.product_id, 0);
        assert_eq!(parsed.heartbeat, HeartbeatConfig::default());
    }

    #[test]
    fn test_missing_ids_rejected() {
        assert!(matches!(
            Config::default().session_settings(),
            Err(ConfigError::MissingVendorId)
        ));

        let mut config = with_ids();
        config.device.product_id = 0;
        assert!(matches!(
            config.session_settings(),
            Err(ConfigError::MissingProductId)
        ));
    }

    #[test]
    fn test_zero_reload_disables_heartbeat() {
        let mut config = with_ids();
        config.heartbeat.reload = 0;
        config.heartbeat.period_ms = 0;
        let settings = config.session_settings().unwrap();
        assert!(settings.heartbeat.is_none());
    }

    #[test]
    fn test_session_settings() {
        let settings = with_ids().session_settings().unwrap();
        assert_eq!(settings.vendor_id, 0x046d);
        assert_eq!(settings.product_id, 0xc31c);
        assert_eq!(
            settings.heartbeat,
            Some((Duration::from_secs(1), NonZeroU32::new(3).unwrap()))
        );
        assert_eq!(settings.plan.report_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        let mut config = with_ids();
        config.heartbeat.period_ms = 0;
        assert!(matches!(
            config.session_settings(),
            Err(ConfigError::InvalidValue { field: "heartbeat.period_ms", .. })
        ));

        let mut config = with_ids();
        config.capture.report_interval_ms = 0;
        assert!(config.session_settings().is_err());
    }

    #[test]
    fn test_parse_usb_id() {
        assert_eq!(parse_usb_id("0x046d").unwrap(), 0x046d);
        assert_eq!(parse_usb_id("0XC31C").unwrap(), 0xc31c);
        assert_eq!(parse_usb_id("1133").unwrap(), 0x046d);
        assert_eq!(parse_usb_id("0xffff").unwrap(), 0xffff);

        for bad in ["0", "0x0", "0x10000", "65536", "-1", "xyz", "", "0x"] {
            assert!(parse_usb_id(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_parse_usb_id_rejects_signs() {
        for bad in ["+5", "+0x046d", "0x+10", "0x-10", "-0x10", "+"] {
            assert!(
                matches!(parse_usb_id(bad), Err(ConfigError::InvalidId(_))),
                "accepted {:?}",
                bad
            );
        }
    }
}
