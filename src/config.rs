// src/config.rs
//! Bridge configuration, read from an optional JSON file

use crate::error::{BridgeError, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/mm-nmea-bridge/config.json";

/// Upper bound for every delay, interval and timeout in the file
pub const MAX_WAIT_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Fixed path gpsd is pointed at
    pub alias_path: PathBuf,
    /// Group granted rw on the pty (gpsd runs as a member of it)
    pub gps_group: String,
    pub discovery_retries: u32,
    pub discovery_delay_secs: u64,
    pub setup_attempts: u32,
    pub setup_delay_secs: u64,
    pub poll_interval_secs: u64,
    /// Longest wait for a reply from ModemManager
    pub bus_timeout_secs: u64,
    pub gpsd: GpsdConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GpsdConfig {
    /// Register the pty with gpsd at startup
    pub enabled: bool,
    pub service: String,
    pub service_manager: String,
    pub helper: String,
    pub register_attempts: u32,
    pub register_delay_secs: u64,
    /// Longest a single service manager or helper run may take
    pub helper_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            alias_path: PathBuf::from("/run/nmea-bridge"),
            gps_group: "dialout".to_string(),
            discovery_retries: 15,
            discovery_delay_secs: 2,
            setup_attempts: 10,
            setup_delay_secs: 2,
            poll_interval_secs: 1,
            bus_timeout_secs: 25,
            gpsd: GpsdConfig::default(),
        }
    }
}

impl Default for GpsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service: "gpsd.service".to_string(),
            service_manager: "systemctl".to_string(),
            helper: "gpsdctl".to_string(),
            register_attempts: 10,
            register_delay_secs: 1,
            helper_timeout_secs: 5,
        }
    }
}

impl BridgeConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; an
    /// explicitly requested file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if !path.exists() {
                    return Ok(Self::default());
                }
                Self::load_from_file(path)
            }
        }
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        Self::from_json(&contents)
            .map_err(|e| BridgeError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("poll_interval_secs", self.poll_interval_secs),
            ("bus_timeout_secs", self.bus_timeout_secs),
            ("gpsd.helper_timeout_secs", self.gpsd.helper_timeout_secs),
        ] {
            if secs == 0 {
                return Err(BridgeError::Config(format!("{} must be at least 1", name)));
            }
        }

        for (name, secs) in [
            ("discovery_delay_secs", self.discovery_delay_secs),
            ("setup_delay_secs", self.setup_delay_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("bus_timeout_secs", self.bus_timeout_secs),
            ("gpsd.register_delay_secs", self.gpsd.register_delay_secs),
            ("gpsd.helper_timeout_secs", self.gpsd.helper_timeout_secs),
        ] {
            if secs > MAX_WAIT_SECS {
                return Err(BridgeError::Config(format!(
                    "{} must not exceed {}",
                    name, MAX_WAIT_SECS
                )));
            }
        }

        if self.alias_path.as_os_str().is_empty() {
            return Err(BridgeError::Config("alias_path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply command-line overrides
    pub fn update_alias(&mut self, alias: PathBuf) {
        self.alias_path = alias;
    }

    pub fn update_group(&mut self, group: String) {
        self.gps_group = group;
    }

    pub fn disable_gpsd(&mut self) {
        self.gpsd.enabled = false;
    }

    pub fn discovery_delay(&self) -> Duration {
        Duration::from_secs(self.discovery_delay_secs)
    }

    pub fn setup_delay(&self) -> Duration {
        Duration::from_secs(self.setup_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_secs(self.bus_timeout_secs)
    }
}

impl GpsdConfig {
    pub fn register_delay(&self) -> Duration {
        Duration::from_secs(self.register_delay_secs)
    }

    pub fn helper_timeout(&self) -> Duration {
        Duration::from_secs(self.helper_timeout_secs)
    }
}
