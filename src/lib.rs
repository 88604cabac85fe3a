// src/lib.rs
//! ModemManager to gpsd NMEA bridge
//!
//! Creates a pseudo-terminal, links its consumer end to a fixed path and
//! writes the NMEA sentences ModemManager publishes on the D-Bus Location
//! interface to the controller end. gpsd is pointed at the fixed path.

pub mod bridge;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod gpsd;
pub mod logging;
pub mod modem;
pub mod shutdown;
pub mod stream;

// Re-export main types for convenience
pub use bridge::{Bridge, Phase};
pub use config::BridgeConfig;
pub use endpoint::{Endpoint, Owner};
pub use error::{BridgeError, Result};
pub use stream::{StreamEngine, StreamStats};
