// src/modem/location.rs
//! Location source bits and the typed `Location` property payload

use bitflags::bitflags;
use std::collections::{BTreeMap, HashMap};
use zbus::zvariant::{OwnedValue, Value};

bitflags! {
    /// `MMModemLocationSource` bits, used both for the `Capabilities`
    /// bitmask and as keys of the `Location` dictionary.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct LocationSources: u32 {
        const THREE_GPP_LAC_CI = 0x01;
        const GPS_RAW = 0x02;
        /// 0x04, not 0x08 (that one is CDMA_BS)
        const GPS_NMEA = 0x04;
        const CDMA_BS = 0x08;
        const GPS_UNMANAGED = 0x10;
        const AGPS_MSA = 0x20;
        const AGPS_MSB = 0x40;
    }
}

/// String-valued entries of a `Location` property snapshot.
///
/// Only entries keyed by a single known source bit and carrying a string
/// are kept; the dictionary-valued sources (GPS raw, CDMA BS) are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationPayload {
    entries: BTreeMap<LocationSources, String>,
}

impl LocationPayload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nmea(nmea: impl Into<String>) -> Self {
        let mut payload = Self::new();
        payload.insert(LocationSources::GPS_NMEA, nmea);
        payload
    }

    /// Convert the raw `a{uv}` property value
    pub fn from_dbus(raw: HashMap<u32, OwnedValue>) -> Self {
        let mut payload = Self::new();
        for (key, value) in raw.iter() {
            let Some(source) = LocationSources::from_bits(*key) else {
                continue;
            };
            if source.bits().count_ones() != 1 {
                continue;
            }
            if let Some(text) = value_as_str(value) {
                payload.insert(source, text);
            }
        }
        payload
    }

    pub fn insert(&mut self, source: LocationSources, text: impl Into<String>) {
        self.entries.insert(source, text.into());
    }

    pub fn get(&self, source: LocationSources) -> Option<&str> {
        self.entries.get(&source).map(String::as_str)
    }

    /// The NMEA blob, if present and non-empty
    pub fn nmea(&self) -> Option<&str> {
        self.get(LocationSources::GPS_NMEA).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn value_as_str<'a>(value: &'a Value<'_>) -> Option<&'a str> {
    match value {
        Value::Str(s) => Some(s.as_str()),
        Value::Value(inner) => value_as_str(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(value: Value<'_>) -> OwnedValue {
        OwnedValue::try_from(value).unwrap()
    }

    #[test]
    fn test_nmea_bit_is_0x04() {
        assert_eq!(LocationSources::GPS_NMEA.bits(), 0x04);
        assert!(LocationSources::from_bits_truncate(0x05).contains(LocationSources::GPS_NMEA));
        assert!(!LocationSources::from_bits_truncate(0x0b).contains(LocationSources::GPS_NMEA));
    }

    #[test]
    fn test_from_dbus_keeps_string_entries() {
        let mut raw = HashMap::new();
        raw.insert(0x04, owned(Value::from("$GPGGA,1\n$GPRMC,2\n")));
        raw.insert(0x01, owned(Value::from("262,01,1A2B,3C4D")));
        raw.insert(0x02, owned(Value::U32(7)));
        raw.insert(0x80, owned(Value::from("unknown source")));

        let payload = LocationPayload::from_dbus(raw);

        assert_eq!(payload.nmea(), Some("$GPGGA,1\n$GPRMC,2\n"));
        assert_eq!(payload.get(LocationSources::THREE_GPP_LAC_CI), Some("262,01,1A2B,3C4D"));
        assert_eq!(payload.get(LocationSources::GPS_RAW), None);
    }

    #[test]
    fn test_value_as_str_unwraps_variants() {
        let nested = Value::Value(Box::new(Value::from("$GPGSA")));
        assert_eq!(value_as_str(&nested), Some("$GPGSA"));
        assert_eq!(value_as_str(&Value::U32(4)), None);
    }

    #[test]
    fn test_empty_nmea_is_none() {
        let payload = LocationPayload::with_nmea("");
        assert!(!payload.is_empty());
        assert_eq!(payload.nmea(), None);
        assert_eq!(LocationPayload::new().nmea(), None);
    }
}
