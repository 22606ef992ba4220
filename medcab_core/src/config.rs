//! Configuration file support for Medcab.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medcab/config.toml`.

use crate::{Error, Result};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Offset of the pharmacy's local time zone (IST, +05:30)
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub refill: RefillConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Local time zone used for dose windows
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_zone_label")]
    pub zone_label: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            zone_label: default_zone_label(),
        }
    }
}

/// Inventory thresholds
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InventoryConfig {
    #[serde(default = "default_reorder_threshold")]
    pub default_reorder_threshold: u32,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            default_reorder_threshold: default_reorder_threshold(),
        }
    }
}

/// Refill prediction parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefillConfig {
    #[serde(default = "default_days_ahead")]
    pub days_ahead: i64,

    #[serde(default = "default_days_supply")]
    pub default_days_supply: u32,
}

impl Default for RefillConfig {
    fn default() -> Self {
        Self {
            days_ahead: default_days_ahead(),
            default_days_supply: default_days_supply(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME")
            .expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("medcab")
}

fn default_utc_offset_minutes() -> i32 {
    DEFAULT_UTC_OFFSET_MINUTES
}

fn default_zone_label() -> String {
    "IST".into()
}

fn default_reorder_threshold() -> u32 {
    10
}

fn default_days_ahead() -> i64 {
    7
}

fn default_days_supply() -> u32 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.zone()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME")
                .expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("medcab").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// The configured local time zone as a fixed offset
    pub fn zone(&self) -> Result<FixedOffset> {
        self.schedule
            .utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                Error::Config(format!(
                    "utc_offset_minutes {} is outside -24h..+24h",
                    self.schedule.utc_offset_minutes
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schedule.utc_offset_minutes, 330);
        assert_eq!(config.inventory.default_reorder_threshold, 10);
        assert_eq!(config.refill.days_ahead, 7);
        assert_eq!(config.refill.default_days_supply, 30);
    }

    #[test]
    fn test_default_zone_is_ist() {
        let zone = Config::default().zone().unwrap();
        assert_eq!(zone.local_minus_utc(), 5 * 3600 + 1800);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let mut config = Config::default();
        config.schedule.utc_offset_minutes = 24 * 60;
        assert!(matches!(config.zone(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(
            config.schedule.utc_offset_minutes,
            parsed.schedule.utc_offset_minutes
        );
        assert_eq!(config.data.data_dir, parsed.data.data_dir);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[schedule]
utc_offset_minutes = 60
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.schedule.utc_offset_minutes, 60);
        assert_eq!(config.schedule.zone_label, "IST"); // default
        assert_eq!(config.inventory.default_reorder_threshold, 10);
    }

    #[test]
    fn test_load_from_rejects_bad_offset() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nutc_offset_minutes = 5000\n").unwrap();

        assert!(Config::load_from(&path).is_err());
    }
}
