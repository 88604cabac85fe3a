// src/bridge.rs
//! Bridge lifecycle: startup ordering, streaming and teardown

use crate::{
    config::BridgeConfig,
    endpoint::{Endpoint, Owner},
    error::Result,
    gpsd::Consumer,
    modem::{self, ModemId, ModemLocation, ModemManager},
    stream::{StreamEngine, StreamStats},
};
use std::{fmt, future::Future};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    EndpointReady,
    SourceEnabled,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Init => "init",
            Phase::EndpointReady => "endpoint-ready",
            Phase::SourceEnabled => "source-enabled",
            Phase::Running => "running",
            Phase::ShuttingDown => "shutting-down",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Owns the endpoint and the modem handle for one run of the bridge
pub struct Bridge {
    config: BridgeConfig,
    phase: Phase,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            phase: Phase::Init,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase) {
        tracing::info!("Lifecycle: {} → {}", self.phase, phase);
        self.phase = phase;
    }

    /// Run until `shutdown` resolves or a startup stage fails.
    ///
    /// `modem` selects a modem index directly; `None` auto-discovers. The
    /// endpoint is released on every path out of here.
    pub async fn run<M, C, F>(
        &mut self,
        manager: &M,
        consumer: &C,
        modem: Option<u32>,
        owner: Owner,
        shutdown: F,
    ) -> Result<StreamStats>
    where
        M: ModemManager,
        C: Consumer,
        F: Future<Output = ()>,
    {
        let mut endpoint = Endpoint::acquire(self.config.alias_path.clone(), owner)?;
        self.enter(Phase::EndpointReady);

        let result = self.serve(manager, consumer, modem, &mut endpoint, shutdown).await;

        endpoint.release();
        if result.is_ok() {
            self.enter(Phase::Terminated);
        }
        result
    }

    async fn serve<M, C, F>(
        &mut self,
        manager: &M,
        consumer: &C,
        modem: Option<u32>,
        endpoint: &mut Endpoint,
        shutdown: F,
    ) -> Result<StreamStats>
    where
        M: ModemManager,
        C: Consumer,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        // Startup may sleep for a while; a signal meanwhile still tears down.
        let enabled = tokio::select! {
            biased;

            _ = &mut shutdown => None,
            enabled = self.enable_source(manager, modem) => Some(enabled?),
        };

        let Some((id, modem)) = enabled else {
            self.enter(Phase::ShuttingDown);
            tracing::info!("Shutting down…");
            return Ok(StreamStats::default());
        };

        let result = self.stream(&id, &modem, consumer, endpoint, &mut shutdown).await;

        self.enter(Phase::ShuttingDown);
        tracing::info!("Shutting down…");
        modem::deactivate(&modem, self.config.bus_timeout()).await;

        if let Ok(stats) = &result {
            tracing::info!(
                polls = stats.polls,
                poll_errors = stats.poll_errors,
                notifications = stats.notifications,
                lines = stats.lines_written,
                write_errors = stats.write_errors,
                last_forward = ?stats.last_forward,
                "stream closed"
            );
        }
        result
    }

    async fn enable_source<M: ModemManager>(
        &mut self,
        manager: &M,
        index: Option<u32>,
    ) -> Result<(ModemId, M::Modem)> {
        let id = match index {
            Some(index) => ModemId::from_index(index),
            None => {
                let id = modem::discover(
                    manager,
                    self.config.discovery_retries,
                    self.config.discovery_delay(),
                    self.config.bus_timeout(),
                )
                .await?;
                tracing::info!("Auto-discovered GPS modem: index {} ({})", id.index, id.path);
                id
            }
        };

        let timeout = self.config.bus_timeout();
        let modem = modem::bounded(timeout, manager.modem(&id)).await?;
        modem::activate(&modem, self.config.setup_attempts, self.config.setup_delay(), timeout).await?;
        tracing::info!("GPS NMEA enabled on modem {} ({})", id.index, id.path);

        self.enter(Phase::SourceEnabled);
        Ok((id, modem))
    }

    async fn stream<L, C, F>(
        &mut self,
        id: &ModemId,
        modem: &L,
        consumer: &C,
        endpoint: &mut Endpoint,
        shutdown: &mut F,
    ) -> Result<StreamStats>
    where
        L: ModemLocation,
        C: Consumer,
        F: Future<Output = ()> + Unpin,
    {
        let changes = modem::bounded(self.config.bus_timeout(), modem.location_changes()).await?;
        tracing::debug!(%id, "subscribed to Location changes");

        let alias = endpoint.alias().to_path_buf();
        let mut engine = StreamEngine::new(endpoint, self.config.poll_interval(), self.config.bus_timeout());
        self.enter(Phase::Running);

        tokio::select! {
            biased;

            _ = &mut *shutdown => return Ok(engine.stats().clone()),
            _ = consumer.attach(&alias) => {}
        }

        tracing::info!("Forwarding NMEA → {}  (Ctrl-C to stop)", alias.display());
        engine.run(modem, changes, shutdown).await;

        Ok(engine.stats().clone())
    }
}
