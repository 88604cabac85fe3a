// src/error.rs
//! Error types for the bridge

use crate::modem::BusError;
use std::{fmt, path::PathBuf, time::Duration};

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug)]
pub enum BridgeError {
    Io(std::io::Error),
    Sys(nix::errno::Errno),
    Bus(BusError),
    Json(serde_json::Error),
    /// The group that should own the consumer-side device does not exist.
    Group(String),
    /// Filesystem failure on the alias path.
    Alias { path: PathBuf, source: std::io::Error },
    /// No modem with NMEA capability appeared within the discovery budget.
    NoSource { waited: Duration },
    /// `Setup` kept failing until the activation budget ran out.
    Activation { attempts: u32, source: BusError },
    NotPrivileged,
    Config(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Io(e) => write!(f, "IO error: {}", e),
            BridgeError::Sys(e) => write!(f, "System error: {}", e),
            BridgeError::Bus(e) => write!(f, "D-Bus error: {}", e),
            BridgeError::Json(e) => write!(f, "JSON error: {}", e),
            BridgeError::Group(name) => write!(f, "Group lookup failed: {}", name),
            BridgeError::Alias { path, source } => {
                write!(f, "Alias path {} unusable: {}", path.display(), source)
            }
            BridgeError::NoSource { waited } => write!(
                f,
                "No modem with GPS NMEA capability found after {}s.\n\
                 Check:  mmcli -L && mmcli -m <index> --location-status",
                waited.as_secs()
            ),
            BridgeError::Activation { attempts, source } => write!(
                f,
                "Enabling GPS NMEA failed after {} attempts: {}",
                attempts, source
            ),
            BridgeError::NotPrivileged => write!(
                f,
                "Must run as root (needs D-Bus system bus and the alias path in /run)"
            ),
            BridgeError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BridgeError::Io(e) => Some(e),
            BridgeError::Sys(e) => Some(e),
            BridgeError::Bus(e) => Some(e),
            BridgeError::Json(e) => Some(e),
            BridgeError::Alias { source, .. } => Some(source),
            BridgeError::Activation { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(error: std::io::Error) -> Self {
        BridgeError::Io(error)
    }
}

impl From<nix::errno::Errno> for BridgeError {
    fn from(error: nix::errno::Errno) -> Self {
        BridgeError::Sys(error)
    }
}

impl From<BusError> for BridgeError {
    fn from(error: BusError) -> Self {
        BridgeError::Bus(error)
    }
}

impl From<zbus::Error> for BridgeError {
    fn from(error: zbus::Error) -> Self {
        BridgeError::Bus(error.into())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(error: serde_json::Error) -> Self {
        BridgeError::Json(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_source_message_carries_budget_and_hint() {
        let err = BridgeError::NoSource { waited: Duration::from_secs(30) };
        let msg = err.to_string();

        assert!(msg.contains("after 30s"));
        assert!(msg.contains("mmcli -L"));
    }

    #[test]
    fn test_activation_keeps_bus_error_as_source() {
        let err = BridgeError::Activation {
            attempts: 10,
            source: BusError::new("org.freedesktop.ModemManager1.Error.Core.WrongState", "not ready"),
        };

        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("org.freedesktop.ModemManager1.Error.Core.WrongState: not ready")
        );
    }
}
