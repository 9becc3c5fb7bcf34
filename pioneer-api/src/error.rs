//! Error types for the protocol definition layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::zone::Zone;

/// Errors returned by the AVR on the wire as `E01`..`E06` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    E01,
    E02,
    E03,
    E04,
    E05,
    E06,
}

impl ErrorCode {
    /// Parse an inbound frame as an AVR error token.
    ///
    /// Only exact `E0[1-6]` frames qualify; anything else (including `B00`
    /// busy frames) is not an error token.
    pub fn parse(frame: &str) -> Option<ErrorCode> {
        match frame {
            "E01" => Some(ErrorCode::E01),
            "E02" => Some(ErrorCode::E02),
            "E03" => Some(ErrorCode::E03),
            "E04" => Some(ErrorCode::E04),
            "E05" => Some(ErrorCode::E05),
            "E06" => Some(ErrorCode::E06),
            _ => None,
        }
    }

    /// The wire token for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E01 => "E01",
            ErrorCode::E02 => "E02",
            ErrorCode::E03 => "E03",
            ErrorCode::E04 => "E04",
            ErrorCode::E05 => "E05",
            ErrorCode::E06 => "E06",
        }
    }

    /// Documented meaning of the code, where known.
    pub fn meaning(&self) -> &'static str {
        match self {
            ErrorCode::E02 => "not available now",
            ErrorCode::E03 => "invalid command",
            ErrorCode::E04 => "command error",
            ErrorCode::E06 => "parameter error",
            ErrorCode::E01 | ErrorCode::E05 => "device error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.meaning())
    }
}

/// Errors from command table lookups.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The mnemonic is not in the command table, or has no entry for the
    /// requested zone.
    #[error("unknown command {command} for {zone}")]
    UnknownCommand { command: String, zone: Zone },
}

/// Convenience alias for results using [`ApiError`].
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_parse() {
        assert_eq!(ErrorCode::parse("E02"), Some(ErrorCode::E02));
        assert_eq!(ErrorCode::parse("E06"), Some(ErrorCode::E06));
        assert_eq!(ErrorCode::parse("E07"), None);
        assert_eq!(ErrorCode::parse("B00"), None);
        assert_eq!(ErrorCode::parse("E02X"), None);
        assert_eq!(ErrorCode::parse(""), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E03.to_string(), "E03 (invalid command)");
    }

    #[test]
    fn test_unknown_command_display() {
        let err = ApiError::UnknownCommand {
            command: "warp_drive".to_string(),
            zone: Zone::Zone2,
        };
        assert_eq!(err.to_string(), "unknown command warp_drive for Zone 2");
    }
}
