// src/shutdown.rs
//! Termination signals as a future the bridge can wait on

use crate::error::Result;
use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT and SIGTERM listeners.
///
/// Once installed, tokio keeps its handlers for the rest of the process, so
/// signals arriving after the first one are swallowed and cannot interrupt
/// teardown.
pub struct Termination {
    interrupt: Signal,
    terminate: Signal,
}

impl Termination {
    pub fn install() -> Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolve on the first signal
    pub async fn recv(mut self) {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "termination requested");
    }
}
