// src/modem/activation.rs
//! Enabling and disabling NMEA output on a modem

use super::{bounded, LocationSources, ModemLocation};
use crate::error::{BridgeError, Result};
use std::time::Duration;

/// Enable GPS NMEA with location signals.
///
/// ModemManager may still be initialising the modem right after discovery,
/// so bus errors are retried with a fixed delay. A call without a reply
/// within `call_timeout` counts as a failed attempt. The last error is
/// returned once `attempts` are used up.
pub async fn activate<L: ModemLocation>(
    modem: &L,
    attempts: u32,
    delay: Duration,
    call_timeout: Duration,
) -> Result<()> {
    let attempts = attempts.max(1);
    let mut attempt = 0;

    while let Err(err) = bounded(call_timeout, modem.setup(LocationSources::GPS_NMEA, true)).await {
        attempt += 1;
        if attempt >= attempts {
            return Err(BridgeError::Activation { attempts, source: err });
        }

        tracing::info!(
            detail = %err.message,
            "Setup failed ({}), retrying in {}s… ({}/{})",
            err.name,
            delay.as_secs(),
            attempt,
            attempts
        );
        tokio::time::sleep(delay).await;
    }

    Ok(())
}

/// Turn all location sources off. Failures and timeouts only get logged.
pub async fn deactivate<L: ModemLocation>(modem: &L, call_timeout: Duration) {
    if let Err(err) = bounded(call_timeout, modem.setup(LocationSources::empty(), false)).await {
        tracing::debug!(error = %err, "disabling location sources failed");
    }
}
