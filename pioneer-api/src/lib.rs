//! # pioneer-api
//!
//! Stateless protocol definitions for controlling a Pioneer AVR over its
//! line-oriented ASCII control protocol (telnet-style, default port 8102).
//!
//! This crate contains no I/O. It defines the command code table (mnemonic →
//! wire token and expected response prefix, per zone), the zone and tuner
//! band identifiers, the AVR error codes, and the static lookup tables
//! (default input sources, listening modes, media controls) shared by the
//! state and session crates.

mod command;
mod error;
mod source;
pub mod tables;
mod zone;

pub use command::{lookup, query_commands, CommandEntry};
pub use error::{ApiError, ErrorCode, Result};
pub use source::{
    default_source_dict, listening_mode, listening_modes, media_control_actions,
    media_control_mode, ListeningMode, DEFAULT_SOURCES, MEDIA_CONTROL_COMMANDS, SOURCE_TUNER,
};
pub use zone::{TunerBand, Zone};

/// Default control port exposed by the AVR.
pub const DEFAULT_PORT: u16 = 8102;
