//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the cloudlight.toml file.
//! It describes where the durable log image lives and how the ring inside it is sized.

use crate::log_manager::{LogError, LogOptions};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name, looked up in the working directory
pub const CONFIG_FILE: &str = "cloudlight.toml";

/// Storage settings that no log could be opened with.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Capacity or commit threshold rejected by [`LogOptions::validate`]
    #[error("invalid log options: {0}")]
    Options(#[from] LogError),

    /// The ring does not fit inside `region_bytes`
    #[error("{capacity} slots need {required} bytes but only {reserved} are reserved")]
    RegionTooSmall {
        capacity: u16,
        required: usize,
        reserved: usize,
    },

    /// `base_offset + region_bytes` is past the end of the address space
    #[error("log region of {region_bytes} bytes at offset {base_offset} overflows the address space")]
    OffsetOverflow {
        base_offset: usize,
        region_bytes: usize,
    },
}

/// Application configuration loaded from cloudlight.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Durable log storage configuration
    pub storage: StorageConfig,
}

/// Durable log storage configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct StorageConfig {
    /// File holding the emulated EEPROM image
    pub path: PathBuf,
    /// Byte offset of the log region within the image.
    /// The first 512 bytes are left to the controller's own settings.
    pub base_offset: usize,
    /// Bytes reserved for the log region (header + slots + headroom)
    pub region_bytes: usize,
    /// Number of 8-byte entry slots
    pub capacity: u16,
    /// Appends between durable commits
    pub commit_threshold: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: StorageConfig {
                path: PathBuf::from("cloudlight-eeprom.bin"),
                base_offset: 512,
                region_bytes: 3072,
                capacity: 100,
                commit_threshold: 5,
            },
        }
    }
}

impl Config {
    /// Load configuration from cloudlight.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!("Loaded configuration, log image at {}", config.storage.path.display());
                    config
                }
                Err(e) => {
                    warn!("Invalid config file format: {}", e);
                    warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// Ring parameters for [`LogManager::open`](crate::LogManager::open).
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            capacity: self.storage.capacity,
            commit_threshold: self.storage.commit_threshold,
            base_offset: self.storage.base_offset,
        }
    }

    /// Total bytes the store must reserve: everything up to the end of the log region.
    pub fn store_size(&self) -> Result<usize, ConfigError> {
        self.storage
            .base_offset
            .checked_add(self.storage.region_bytes)
            .ok_or(ConfigError::OffsetOverflow {
                base_offset: self.storage.base_offset,
                region_bytes: self.storage.region_bytes,
            })
    }

    /// Check that the ring fits inside the reserved region.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let options = self.log_options();
        options.validate()?;
        self.store_size()?;
        if options.region_size() > self.storage.region_bytes {
            return Err(ConfigError::RegionTooSmall {
                capacity: options.capacity,
                required: options.region_size(),
                reserved: self.storage.region_bytes,
            });
        }
        Ok(())
    }
}
