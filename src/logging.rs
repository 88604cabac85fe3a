// src/logging.rs
//! Log to stdout and the system journal

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const SYSLOG_IDENTIFIER: &str = "mm-nmea-bridge";

fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `verbose`.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let (journald, journal_error) = match tracing_journald::layer() {
        Ok(layer) => (Some(layer.with_syslog_identifier(SYSLOG_IDENTIFIER.to_string())), None),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(journald)
        .init();

    if let Some(e) = journal_error {
        tracing::warn!(error = %e, "system journal unavailable, logging to stdout only");
    }
}
