// src/modem/testing.rs
//! In-memory ModemManager for tests

use super::{
    BusError, LocationChanges, LocationModem, LocationPayload, LocationSources, ModemId,
    ModemLocation, ModemManager,
};
use futures::StreamExt;
use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

pub fn location_modem(index: u32, caps: u32) -> LocationModem {
    LocationModem {
        path: format!("/org/freedesktop/ModemManager1/Modem/{}", index),
        capabilities: LocationSources::from_bits_truncate(caps),
    }
}

pub fn wrong_state() -> BusError {
    BusError::new("org.freedesktop.ModemManager1.Error.Core.WrongState", "modem not ready")
}

pub struct FakeManager {
    modems: Vec<LocationModem>,
    pub enumerations: Cell<u32>,
    pub failing_enumerations: Cell<u32>,
    pub unresponsive: Cell<bool>,
    pub opened: RefCell<Vec<ModemId>>,
    pub modem: Rc<FakeModem>,
}

impl FakeManager {
    pub fn new(modems: Vec<LocationModem>) -> Self {
        Self {
            modems,
            enumerations: Cell::new(0),
            failing_enumerations: Cell::new(0),
            unresponsive: Cell::new(false),
            opened: RefCell::new(Vec::new()),
            modem: Rc::new(FakeModem::new()),
        }
    }
}

impl ModemManager for FakeManager {
    type Modem = Rc<FakeModem>;

    async fn location_modems(&self) -> Result<Vec<LocationModem>, BusError> {
        self.enumerations.set(self.enumerations.get() + 1);
        if self.unresponsive.get() {
            std::future::pending::<()>().await;
        }
        if self.failing_enumerations.get() > 0 {
            self.failing_enumerations.set(self.failing_enumerations.get() - 1);
            return Err(BusError::new(
                "org.freedesktop.DBus.Error.ServiceUnknown",
                "ModemManager not running",
            ));
        }
        Ok(self.modems.clone())
    }

    async fn modem(&self, id: &ModemId) -> Result<Rc<FakeModem>, BusError> {
        self.opened.borrow_mut().push(id.clone());
        Ok(Rc::clone(&self.modem))
    }
}

pub struct FakeModem {
    pub setup_calls: RefCell<Vec<(LocationSources, bool)>>,
    pub setup_failures: Cell<u32>,
    pub fail_disable: Cell<bool>,
    /// Calls never get a reply
    pub unresponsive: Cell<bool>,
    pub location: RefCell<Result<LocationPayload, BusError>>,
    pub location_reads: Cell<u32>,
    pub changes: RefCell<Option<LocationChanges>>,
}

impl FakeModem {
    pub fn new() -> Self {
        Self {
            setup_calls: RefCell::new(Vec::new()),
            setup_failures: Cell::new(0),
            fail_disable: Cell::new(false),
            unresponsive: Cell::new(false),
            location: RefCell::new(Ok(LocationPayload::new())),
            location_reads: Cell::new(0),
            changes: RefCell::new(None),
        }
    }

    async fn stall(&self) {
        if self.unresponsive.get() {
            std::future::pending::<()>().await;
        }
    }

    pub fn report(&self, location: Result<LocationPayload, BusError>) {
        *self.location.borrow_mut() = location;
    }
}

impl ModemLocation for FakeModem {
    async fn setup(&self, sources: LocationSources, signal_location: bool) -> Result<(), BusError> {
        self.setup_calls.borrow_mut().push((sources, signal_location));
        self.stall().await;

        if sources.is_empty() && self.fail_disable.get() {
            return Err(BusError::new("org.freedesktop.DBus.Error.NoReply", "modem gone"));
        }
        if self.setup_failures.get() > 0 {
            self.setup_failures.set(self.setup_failures.get() - 1);
            return Err(wrong_state());
        }
        Ok(())
    }

    async fn location(&self) -> Result<LocationPayload, BusError> {
        self.location_reads.set(self.location_reads.get() + 1);
        self.stall().await;
        self.location.borrow().clone()
    }

    async fn location_changes(&self) -> Result<LocationChanges, BusError> {
        let changes = self.changes.borrow_mut().take();
        Ok(changes.unwrap_or_else(|| futures::stream::pending().boxed_local()))
    }
}

impl ModemLocation for Rc<FakeModem> {
    async fn setup(&self, sources: LocationSources, signal_location: bool) -> Result<(), BusError> {
        (**self).setup(sources, signal_location).await
    }

    async fn location(&self) -> Result<LocationPayload, BusError> {
        (**self).location().await
    }

    async fn location_changes(&self) -> Result<LocationChanges, BusError> {
        (**self).location_changes().await
    }
}
