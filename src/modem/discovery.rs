// src/modem/discovery.rs
//! Finding a modem that can emit NMEA

use super::{bounded, LocationModem, LocationSources, ModemId, ModemManager};
use crate::error::{BridgeError, Result};
use std::time::Duration;

/// Return the first GPS NMEA-capable modem.
///
/// Retries up to `retries` times with `delay` between attempts so that
/// ModemManager has time to finish probing the modem after boot. Failed
/// or unanswered enumerations count as attempts.
pub async fn discover<M: ModemManager>(
    manager: &M,
    retries: u32,
    delay: Duration,
    call_timeout: Duration,
) -> Result<ModemId> {
    for attempt in 0..retries {
        match bounded(call_timeout, manager.location_modems()).await {
            Ok(modems) => {
                if let Some(id) = select_nmea_modem(&modems) {
                    return Ok(id);
                }
            }
            Err(e) => tracing::warn!(error = %e, "enumerating modems failed"),
        }

        if attempt + 1 < retries {
            tracing::info!(
                "No GPS modem found yet, retrying in {}s… ({}/{})",
                delay.as_secs(),
                attempt + 1,
                retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    Err(BridgeError::NoSource {
        waited: delay.saturating_mul(retries),
    })
}

/// First modem in enumeration order whose capabilities include NMEA.
///
/// ModemManager does not define the order of managed objects, so with
/// several capable modems the pick is not stable across restarts.
pub fn select_nmea_modem(modems: &[LocationModem]) -> Option<ModemId> {
    modems
        .iter()
        .filter(|m| m.capabilities.contains(LocationSources::GPS_NMEA))
        .find_map(|m| {
            let id = ModemId::from_path(&m.path);
            if id.is_none() {
                tracing::warn!(path = %m.path, "skipping modem with non-numeric object path");
            }
            id
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modem::testing::{location_modem, FakeManager};
    use tokio::time::Instant;

    const TIMEOUT: Duration = Duration::from_secs(25);

    #[test]
    fn test_select_finds_nmea_modem_at_any_position() {
        for k in 0..5 {
            let modems: Vec<_> = (0..5)
                .map(|i| {
                    let caps = if i == k { 0x05 } else { 0x01 | 0x08 };
                    location_modem(i, caps)
                })
                .collect();

            let id = select_nmea_modem(&modems).unwrap();
            assert_eq!(id.index, k);
            assert_eq!(id.path, format!("/org/freedesktop/ModemManager1/Modem/{}", k));
        }
    }

    #[test]
    fn test_select_takes_first_of_several() {
        let modems = vec![location_modem(4, 0x02), location_modem(2, 0x04), location_modem(0, 0x04)];
        assert_eq!(select_nmea_modem(&modems).unwrap().index, 2);
    }

    #[test]
    fn test_select_skips_unparsable_path() {
        let mut bad = location_modem(0, 0x04);
        bad.path = "/org/freedesktop/ModemManager1/Modem/abc".to_string();
        let modems = vec![bad, location_modem(1, 0x04)];

        assert_eq!(select_nmea_modem(&modems).unwrap().index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_returns_on_first_hit() {
        let manager = FakeManager::new(vec![location_modem(0, 0x01), location_modem(1, 0x04)]);

        let id = discover(&manager, 15, Duration::from_secs(2), TIMEOUT).await.unwrap();

        assert_eq!(id.index, 1);
        assert_eq!(manager.enumerations.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_gives_up_after_retries() {
        let manager = FakeManager::new(vec![location_modem(0, 0x01)]);
        let start = Instant::now();

        let err = discover(&manager, 3, Duration::from_secs(2), TIMEOUT).await.unwrap_err();

        assert_eq!(manager.enumerations.get(), 3);
        // sleeps between attempts only, not after the last one
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4) && elapsed < Duration::from_secs(5));
        match err {
            BridgeError::NoSource { waited } => assert_eq!(waited, Duration::from_secs(6)),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_survives_enumeration_errors() {
        let manager = FakeManager::new(vec![location_modem(3, 0x04)]);
        manager.failing_enumerations.set(2);

        let id = discover(&manager, 5, Duration::from_secs(2), TIMEOUT).await.unwrap();

        assert_eq!(id.index, 3);
        assert_eq!(manager.enumerations.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_discover_gives_up_on_silent_manager() {
        let manager = FakeManager::new(vec![location_modem(3, 0x04)]);
        manager.unresponsive.set(true);

        let err = discover(&manager, 2, Duration::from_secs(2), TIMEOUT).await.unwrap_err();

        assert_eq!(manager.enumerations.get(), 2);
        assert!(matches!(err, BridgeError::NoSource { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_budget_saturates() {
        let manager = FakeManager::new(Vec::new());

        let err = discover(&manager, 2, Duration::MAX, TIMEOUT).await.unwrap_err();

        match err {
            BridgeError::NoSource { waited } => assert_eq!(waited, Duration::MAX),
            other => panic!("unexpected error: {}", other),
        }
    }
}
