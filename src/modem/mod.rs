// src/modem/mod.rs
//! ModemManager access: discovery, activation and location reads

pub mod activation;
pub mod dbus;
pub mod discovery;
pub mod location;

#[cfg(test)]
pub(crate) mod testing;

pub use activation::{activate, deactivate};
pub use dbus::{SystemModemManager, DbusModem};
pub use discovery::discover;
pub use location::{LocationPayload, LocationSources};

use futures::stream::LocalBoxStream;
use std::{fmt, future::Future, time::Duration};

pub const MM_SERVICE: &str = "org.freedesktop.ModemManager1";
pub const MM_OBJ_PATH: &str = "/org/freedesktop/ModemManager1";
pub const MM_MODEM_PATH_PREFIX: &str = "/org/freedesktop/ModemManager1/Modem/";
pub const MM_LOC_IFACE: &str = "org.freedesktop.ModemManager1.Modem.Location";

/// Reported for calls that got no reply in time, same name the bus daemon uses
pub const TIMEOUT_ERROR: &str = "org.freedesktop.DBus.Error.Timeout";

/// Identity of a modem on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemId {
    pub index: u32,
    pub path: String,
}

impl ModemId {
    /// Build the id for an operator-supplied index. Not validated here;
    /// a bad index shows up when the modem is activated.
    pub fn from_index(index: u32) -> Self {
        Self {
            index,
            path: format!("{}{}", MM_MODEM_PATH_PREFIX, index),
        }
    }

    /// Parse the index from the trailing path segment
    pub fn from_path(path: &str) -> Option<Self> {
        let index = path.rsplit('/').next()?.parse::<u32>().ok()?;
        Some(Self {
            index,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for ModemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "modem {} ({})", self.index, self.path)
    }
}

/// A managed object that exposes the Location interface
#[derive(Debug, Clone)]
pub struct LocationModem {
    pub path: String,
    pub capabilities: LocationSources,
}

/// A failed bus call, reduced to the D-Bus error name and message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusError {
    pub name: String,
    pub message: String,
}

impl BusError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

impl std::error::Error for BusError {}

/// Give up on a bus call after `limit`.
///
/// zbus has no reply timeout of its own, so a ModemManager that stops
/// answering would otherwise leave the call pending forever.
pub async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, BusError>
where
    F: Future<Output = Result<T, BusError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BusError::new(
            TIMEOUT_ERROR,
            format!("no reply within {}s", limit.as_secs()),
        )),
    }
}

/// Stream of location payloads pushed by the modem
pub type LocationChanges = LocalBoxStream<'static, LocationPayload>;

/// Enumerates ModemManager objects and opens modems
#[allow(async_fn_in_trait)]
pub trait ModemManager {
    type Modem: ModemLocation;

    /// All managed objects exposing the Location interface, in bus order
    async fn location_modems(&self) -> Result<Vec<LocationModem>, BusError>;

    /// Open the Location interface of a modem
    async fn modem(&self, id: &ModemId) -> Result<Self::Modem, BusError>;
}

/// The Location interface of a single modem
#[allow(async_fn_in_trait)]
pub trait ModemLocation {
    async fn setup(&self, sources: LocationSources, signal_location: bool) -> Result<(), BusError>;

    /// Fresh read of the `Location` property
    async fn location(&self) -> Result<LocationPayload, BusError>;

    /// Subscribe to changes of the `Location` property on this modem
    async fn location_changes(&self) -> Result<LocationChanges, BusError>;
}
