//! Zone and tuner band identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A logically independent output of the AVR.
///
/// The four device zones carry a single-character wire code used to build
/// zone-scoped commands. [`Zone::All`] is a pseudo-zone: it can be used to
/// register an observer that fires for any zone, but it never appears in the
/// command table or in per-zone property maps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Zone {
    /// Main zone (Zone 1)
    Main,
    /// Zone 2
    Zone2,
    /// Zone 3
    Zone3,
    /// HDZone (Zone 4)
    HdZone,
    /// Pseudo-zone matching every zone (observer registration only)
    All,
}

impl Zone {
    /// The four real zones of the device, in wire order.
    pub const DEVICE_ZONES: [Zone; 4] = [Zone::Main, Zone::Zone2, Zone::Zone3, Zone::HdZone];

    /// Single-character wire code used in command tokens.
    pub fn code(&self) -> &'static str {
        match self {
            Zone::Main => "1",
            Zone::Zone2 => "2",
            Zone::Zone3 => "3",
            Zone::HdZone => "Z",
            Zone::All => "*",
        }
    }

    /// Human-readable zone label.
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Main => "Zone 1",
            Zone::Zone2 => "Zone 2",
            Zone::Zone3 => "Zone 3",
            Zone::HdZone => "HDZone",
            Zone::All => "All Zones",
        }
    }

    /// Look up a zone by its wire code.
    pub fn from_code(code: &str) -> Option<Zone> {
        match code {
            "1" => Some(Zone::Main),
            "2" => Some(Zone::Zone2),
            "3" => Some(Zone::Zone3),
            "Z" => Some(Zone::HdZone),
            _ => None,
        }
    }

    /// Whether this is one of the four real zones.
    pub fn is_device_zone(&self) -> bool {
        !matches!(self, Zone::All)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tuner band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TunerBand {
    Am,
    Fm,
}

impl TunerBand {
    /// Whether `frequency` is within the valid range for the band
    /// (AM 530–1700 kHz, FM 87.5–108.0 MHz).
    pub fn contains(&self, frequency: f64) -> bool {
        match self {
            TunerBand::Am => (530.0..=1700.0).contains(&frequency),
            TunerBand::Fm => (87.5..=108.0).contains(&frequency),
        }
    }

    /// Frequency unit label for the band.
    pub fn unit(&self) -> &'static str {
        match self {
            TunerBand::Am => "kHz",
            TunerBand::Fm => "MHz",
        }
    }
}

impl fmt::Display for TunerBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerBand::Am => f.write_str("AM"),
            TunerBand::Fm => f.write_str("FM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_codes_round_trip() {
        for zone in Zone::DEVICE_ZONES {
            assert_eq!(Zone::from_code(zone.code()), Some(zone));
        }
        assert_eq!(Zone::from_code("*"), None);
        assert_eq!(Zone::from_code("4"), None);
    }

    #[test]
    fn test_device_zone_predicate() {
        assert!(Zone::Main.is_device_zone());
        assert!(Zone::HdZone.is_device_zone());
        assert!(!Zone::All.is_device_zone());
    }

    #[test]
    fn test_band_ranges() {
        assert!(TunerBand::Fm.contains(87.5));
        assert!(TunerBand::Fm.contains(108.0));
        assert!(!TunerBand::Fm.contains(530.0));
        assert!(TunerBand::Am.contains(530.0));
        assert!(TunerBand::Am.contains(1700.0));
        assert!(!TunerBand::Am.contains(87.5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Zone::Main.to_string(), "Zone 1");
        assert_eq!(Zone::HdZone.to_string(), "HDZone");
        assert_eq!(TunerBand::Am.to_string(), "AM");
    }
}
