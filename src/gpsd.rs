// src/gpsd.rs
//! Handing the pty over to gpsd

use crate::config::GpsdConfig;
use std::{io, path::Path, process::Output};
use tokio::process::Command;

/// Printed by gpsdctl when gpsd is up but refuses the add, which happens
/// when it already has the device.
pub const ALREADY_TRACKED_MARKER: &str = "reached a running gpsd";

/// Something that should be told where the NMEA stream lives
#[allow(async_fn_in_trait)]
pub trait Consumer {
    /// Best effort; never fails and returns within a bounded time
    async fn attach(&self, alias: &Path);
}

/// `None` skips the hand-over
impl<C: Consumer> Consumer for Option<C> {
    async fn attach(&self, alias: &Path) {
        if let Some(consumer) = self {
            consumer.attach(alias).await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyTracked,
    GaveUp,
}

/// Result of one helper run, `None` meaning "try again"
pub fn classify(success: bool, stdout: &[u8]) -> Option<Registration> {
    if success {
        Some(Registration::Added)
    } else if String::from_utf8_lossy(stdout).contains(ALREADY_TRACKED_MARKER) {
        Some(Registration::AlreadyTracked)
    } else {
        None
    }
}

/// Starts gpsd through the service manager and adds the device with gpsdctl
pub struct GpsdControl {
    config: GpsdConfig,
}

impl GpsdControl {
    pub fn new(config: GpsdConfig) -> Self {
        Self { config }
    }

    /// Fire-and-forget start. gpsd is expected to have no DEVICES= of its
    /// own, so it does not race the add below.
    pub async fn start_service(&self) {
        let mut command = Command::new(&self.config.service_manager);
        command.args(["start", "--no-block", self.config.service.as_str()]);

        match self.run(&mut command).await {
            Ok(output) if output.status.success() => {
                tracing::debug!(service = %self.config.service, "start requested")
            }
            Ok(output) => {
                tracing::warn!(service = %self.config.service, status = %output.status, "service start failed")
            }
            Err(e) => tracing::warn!(service = %self.config.service, error = %e, "could not run service manager"),
        }
    }

    /// Run `command` to completion, killing it after the helper timeout
    async fn run(&self, command: &mut Command) -> io::Result<Output> {
        let limit = self.config.helper_timeout();

        match tokio::time::timeout(limit, command.kill_on_drop(true).output()).await {
            Ok(output) => output,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no exit within {}s", limit.as_secs()),
            )),
        }
    }

    /// Add `alias` to gpsd, waiting for its control socket to come up
    pub async fn register(&self, alias: &Path) -> Registration {
        let delay = self.config.register_delay();

        for attempt in 0..self.config.register_attempts {
            tokio::time::sleep(delay).await;

            let mut command = Command::new(&self.config.helper);
            command.arg("add").arg(alias);

            match self.run(&mut command).await {
                Ok(output) => match classify(output.status.success(), &output.stdout) {
                    Some(Registration::Added) => {
                        tracing::info!("gpsdctl: added {}", alias.display());
                        return Registration::Added;
                    }
                    Some(Registration::AlreadyTracked) => {
                        tracing::info!("gpsdctl: gpsd already tracking {}", alias.display());
                        return Registration::AlreadyTracked;
                    }
                    _ => tracing::debug!(attempt = attempt + 1, status = %output.status, "gpsd not ready"),
                },
                Err(e) => tracing::debug!(attempt = attempt + 1, error = %e, "could not run {}", self.config.helper),
            }
        }

        tracing::warn!(
            "Warning: could not add {} to gpsd after {}s; run manually:  {} add {}",
            alias.display(),
            delay.saturating_mul(self.config.register_attempts).as_secs(),
            self.config.helper,
            alias.display()
        );
        Registration::GaveUp
    }
}

impl Consumer for GpsdControl {
    async fn attach(&self, alias: &Path) {
        self.start_service().await;
        self.register(alias).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn control(helper: &str, attempts: u32) -> GpsdControl {
        GpsdControl::new(GpsdConfig {
            enabled: true,
            service: "gpsd.service".to_string(),
            service_manager: "true".to_string(),
            helper: helper.to_string(),
            register_attempts: attempts,
            register_delay_secs: 0,
            helper_timeout_secs: 1,
        })
    }

    /// A gpsdctl stand-in that never exits
    fn hanging_helper(dir: &tempfile::TempDir) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("gpsdctl");
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(true, b""), Some(Registration::Added));
        assert_eq!(
            classify(false, b"gpsdctl: reached a running gpsd\n"),
            Some(Registration::AlreadyTracked)
        );
        assert_eq!(classify(false, b"gpsdctl: socket connect failed\n"), None);
    }

    #[tokio::test]
    async fn test_register_added() {
        let gpsd = control("true", 3);
        assert_eq!(gpsd.register(Path::new("/run/nmea-bridge")).await, Registration::Added);
    }

    #[tokio::test]
    async fn test_register_gives_up() {
        let gpsd = control("false", 3);
        assert_eq!(gpsd.register(Path::new("/run/nmea-bridge")).await, Registration::GaveUp);
    }

    #[tokio::test]
    async fn test_register_missing_helper() {
        let gpsd = control("/nonexistent/gpsdctl", 2);
        assert_eq!(gpsd.register(Path::new("/run/nmea-bridge")).await, Registration::GaveUp);
    }

    #[tokio::test]
    async fn test_attach_never_fails() {
        let mut gpsd = control("false", 1);
        gpsd.config.service_manager = "/nonexistent/systemctl".to_string();

        gpsd.attach(Path::new("/run/nmea-bridge")).await;
    }

    #[tokio::test]
    async fn test_register_gives_up_on_hanging_helper() {
        let dir = tempfile::tempdir().unwrap();
        let gpsd = control(&hanging_helper(&dir), 2);
        let start = std::time::Instant::now();

        let registration = tokio::time::timeout(
            std::time::Duration::from_secs(20),
            gpsd.register(Path::new("/run/nmea-bridge")),
        )
        .await
        .unwrap();

        assert_eq!(registration, Registration::GaveUp);
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_attach_bounded_with_hanging_service_manager() {
        let dir = tempfile::tempdir().unwrap();
        let mut gpsd = control("true", 1);
        gpsd.config.service_manager = hanging_helper(&dir);

        tokio::time::timeout(
            std::time::Duration::from_secs(20),
            gpsd.attach(Path::new("/run/nmea-bridge")),
        )
        .await
        .unwrap();
    }
}
