use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use bf_prog::device::DEFAULT_BLOCK_SIZE;
use bf_prog::transport::TransportConfig;
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SerialConfig {
    /// Port of the programming cable, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub block_size: Option<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProgUtilConfig {
    #[serde(default)]
    pub serial: SerialConfig,
}

/// Connection parameters after merging the command line over the config file
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub port: Option<String>,
    pub transport: TransportConfig,
    pub block_size: u8,
}

impl SerialConfig {
    /// Fields set in `overrides` win over the ones in `self`
    pub fn merged(&self, overrides: &SerialConfig) -> SerialConfig {
        SerialConfig {
            port: overrides.port.clone().or_else(|| self.port.clone()),
            baud_rate: overrides.baud_rate.or(self.baud_rate),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            block_size: overrides.block_size.or(self.block_size),
        }
    }

    pub fn settings(&self) -> ConnectionSettings {
        let mut transport = TransportConfig::default();
        if let Some(baud_rate) = self.baud_rate {
            transport.baud_rate = baud_rate;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            transport.read_timeout = Duration::from_millis(timeout_ms);
            transport.write_timeout = Duration::from_millis(timeout_ms);
        }

        ConnectionSettings {
            port: self.port.clone(),
            transport,
            block_size: self.block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
        }
    }
}

pub static APP_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("io.github", "", "bf-prog"));

pub fn config_path() -> Option<PathBuf> {
    APP_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn load_config_from(config_path: &Path) -> Result<Option<ProgUtilConfig>> {
    let config = match std::fs::read_to_string(config_path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        r => r.map(Some),
    }
    .with_context(|| format!("Reading config file {}", config_path.display()))?;

    config
        .map(|config| {
            toml::from_str(&config)
                .with_context(|| format!("Parsing config file {}", config_path.display()))
        })
        .transpose()
}

pub fn load_config() -> Result<Option<ProgUtilConfig>> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_config() {
        let config: ProgUtilConfig = toml::from_str(
            r#"
            [serial]
            port = "/dev/ttyUSB1"
            timeout_ms = 2500
            "#,
        )
        .unwrap();

        assert_eq!(config.serial.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.serial.baud_rate, None);

        let settings = config.serial.settings();
        assert_eq!(settings.transport.baud_rate, 115200);
        assert_eq!(settings.transport.read_timeout, Duration::from_millis(2500));
        assert_eq!(settings.transport.write_timeout, Duration::from_millis(2500));
        assert_eq!(settings.block_size, 0x40);
    }

    #[test]
    fn empty_config_is_default() {
        let config: ProgUtilConfig = toml::from_str("").unwrap();
        assert_eq!(config, ProgUtilConfig::default());
        assert_eq!(
            config.serial.settings().transport,
            TransportConfig::default()
        );
    }

    #[test]
    fn command_line_wins() {
        let file = SerialConfig {
            port: Some("COM3".to_string()),
            baud_rate: Some(9600),
            timeout_ms: None,
            block_size: Some(0x20),
        };
        let cli = SerialConfig {
            port: Some("COM7".to_string()),
            block_size: None,
            ..Default::default()
        };

        let merged = file.merged(&cli);

        assert_eq!(merged.port.as_deref(), Some("COM7"));
        assert_eq!(merged.baud_rate, Some(9600));
        assert_eq!(merged.block_size, Some(0x20));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let path = std::env::temp_dir().join("bf-prog-util-test-does-not-exist.toml");
        assert!(load_config_from(&path).unwrap().is_none());
    }

    #[test]
    fn invalid_file_mentions_path() {
        let path = std::env::temp_dir().join(format!(
            "bf-prog-util-invalid-{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "serial = 5").unwrap();

        let err = load_config_from(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(format!("{err}").contains("Parsing config file"));
    }
}
