// src/modem/dbus.rs
//! ModemManager client on the D-Bus system bus

use super::{
    BusError, LocationChanges, LocationModem, LocationPayload, LocationSources, ModemId,
    ModemLocation, ModemManager, MM_LOC_IFACE, MM_OBJ_PATH, MM_SERVICE,
};
use futures::StreamExt;
use std::collections::HashMap;
use zbus::{
    fdo::ObjectManagerProxy,
    proxy,
    proxy::CacheProperties,
    zvariant::{OwnedValue, Value},
    Connection, DBusError,
};

#[proxy(
    interface = "org.freedesktop.ModemManager1.Modem.Location",
    default_service = "org.freedesktop.ModemManager1",
    gen_blocking = false
)]
trait Location {
    fn setup(&self, sources: u32, signal_location: bool) -> zbus::Result<()>;

    #[zbus(property)]
    fn capabilities(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn enabled(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn location(&self) -> zbus::Result<HashMap<u32, OwnedValue>>;
}

impl From<zbus::Error> for BusError {
    fn from(error: zbus::Error) -> Self {
        match error {
            zbus::Error::MethodError(name, message, _) => {
                BusError::new(name.as_str(), message.unwrap_or_default())
            }
            zbus::Error::FDO(e) => (*e).into(),
            other => BusError::new("org.freedesktop.zbus.Error", other.to_string()),
        }
    }
}

impl From<zbus::fdo::Error> for BusError {
    fn from(error: zbus::fdo::Error) -> Self {
        BusError::new(error.name().as_str(), error.description().unwrap_or_default())
    }
}

/// ModemManager reached through the system bus
pub struct SystemModemManager {
    conn: Connection,
}

impl SystemModemManager {
    /// Connect to the system bus
    pub async fn connect() -> Result<Self, BusError> {
        let conn = Connection::system().await?;
        Ok(Self { conn })
    }
}

impl ModemManager for SystemModemManager {
    type Modem = DbusModem;

    async fn location_modems(&self) -> Result<Vec<LocationModem>, BusError> {
        let manager = ObjectManagerProxy::builder(&self.conn)
            .destination(MM_SERVICE)?
            .path(MM_OBJ_PATH)?
            .build()
            .await?;

        let objects = manager.get_managed_objects().await?;

        let mut modems = Vec::new();
        for (path, interfaces) in objects.iter() {
            let Some((_, props)) = interfaces
                .iter()
                .find(|(name, _)| name.as_str() == MM_LOC_IFACE)
            else {
                continue;
            };

            let caps = match props.get("Capabilities").map(|v| &**v) {
                Some(Value::U32(caps)) => *caps,
                _ => 0,
            };

            modems.push(LocationModem {
                path: path.as_str().to_string(),
                capabilities: LocationSources::from_bits_truncate(caps),
            });
        }

        Ok(modems)
    }

    async fn modem(&self, id: &ModemId) -> Result<DbusModem, BusError> {
        // Polling must hit the bus every time, so that proxy keeps no cache.
        // The cached one is only there to drive the change stream.
        let poll = LocationProxy::builder(&self.conn)
            .path(id.path.clone())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        let events = LocationProxy::builder(&self.conn)
            .path(id.path.clone())?
            .build()
            .await?;

        Ok(DbusModem { poll, events })
    }
}

/// Location interface of one modem
pub struct DbusModem {
    poll: LocationProxy<'static>,
    events: LocationProxy<'static>,
}

impl ModemLocation for DbusModem {
    async fn setup(&self, sources: LocationSources, signal_location: bool) -> Result<(), BusError> {
        self.poll.setup(sources.bits(), signal_location).await?;
        Ok(())
    }

    async fn location(&self) -> Result<LocationPayload, BusError> {
        let raw = self.poll.location().await?;
        Ok(LocationPayload::from_dbus(raw))
    }

    async fn location_changes(&self) -> Result<LocationChanges, BusError> {
        let changes = self.events.receive_location_changed().await;

        let payloads = changes
            .then(|change| async move { change.get().await })
            .filter_map(|raw| async move {
                match raw {
                    Ok(raw) => Some(LocationPayload::from_dbus(raw)),
                    Err(e) => {
                        tracing::warn!(error = %BusError::from(e), "unreadable Location change");
                        None
                    }
                }
            });

        Ok(payloads.boxed_local())
    }
}
