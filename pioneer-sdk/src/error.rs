//! SDK error type.

use thiserror::Error;

use pioneer_api::{TunerBand, Zone};
use pioneer_session::SessionError;

/// Errors surfaced by [`crate::PioneerAvr`] operations.
///
/// Session failures (unavailable, timeouts, device errors, disconnects) are
/// wrapped in [`SdkError::Session`]; every other variant is a validation
/// failure detected before anything is sent to the device.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("volume {volume} out of range for {zone} (maximum {max})")]
    VolumeOutOfRange { zone: Zone, volume: i64, max: i64 },

    #[error("{0} does not exist on AVR")]
    UnknownZone(Zone),

    #[error("unknown source: {0}")]
    UnknownSource(String),

    #[error("source name {0} is ambiguous, select by id")]
    AmbiguousSource(String),

    #[error("listening mode {0} is not available")]
    UnknownListeningMode(String),

    #[error("frequency {frequency} out of range for {band}")]
    FrequencyOutOfRange { band: TunerBand, frequency: f64 },

    #[error("tuner is not available")]
    TunerUnavailable,

    #[error("{0}")]
    InvalidArgument(String),
}

impl SdkError {
    /// Whether this is a validation error (raised before any wire traffic).
    pub fn is_validation(&self) -> bool {
        !matches!(self, SdkError::Session(_))
    }
}

impl From<pioneer_api::ApiError> for SdkError {
    fn from(err: pioneer_api::ApiError) -> Self {
        SdkError::Session(SessionError::UnknownCommand(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_predicate() {
        assert!(SdkError::UnknownSource("HDMI".into()).is_validation());
        assert!(SdkError::TunerUnavailable.is_validation());
        assert!(!SdkError::Session(SessionError::Unavailable).is_validation());
    }

    #[test]
    fn test_display() {
        let err = SdkError::VolumeOutOfRange {
            zone: Zone::Zone2,
            volume: 90,
            max: 81,
        };
        assert_eq!(
            err.to_string(),
            "volume 90 out of range for Zone 2 (maximum 81)"
        );
    }
}
