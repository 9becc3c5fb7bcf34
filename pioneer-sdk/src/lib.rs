//! # pioneer-sdk
//!
//! Async client for controlling a Pioneer AVR over its line-oriented ASCII
//! control protocol (default port 8102).
//!
//! [`PioneerAvr`] is the main entry point: it owns the layered parameters,
//! the property cache and the live session, and exposes typed operations for
//! power, volume, input sources, listening modes, the tuner, tone and the
//! various amp/video settings. State is kept fresh by a background refresh
//! loop and by decoding the AVR's unsolicited status updates.
//!
//! # Example
//!
//! ```rust,ignore
//! use pioneer_sdk::{PioneerAvr, Zone};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pioneer_sdk::SdkError> {
//!     let avr = PioneerAvr::new("172.16.0.10", 8102);
//!     avr.connect(true).await?;
//!
//!     avr.power_on(Zone::Main).await?;
//!     avr.set_volume_level(121, Zone::Main).await?;
//!     avr.select_source("HDMI1", Zone::Main).await?;
//!
//!     println!("volume: {:?}", avr.properties().volume(Zone::Main));
//!     avr.shutdown().await;
//!     Ok(())
//! }
//! ```

mod avr;
mod error;

pub use avr::{ListeningModeSelect, PioneerAvr, SourceSelect};
pub use error::SdkError;

pub use pioneer_api::{ErrorCode, TunerBand, Zone, DEFAULT_PORT};
pub use pioneer_session::{
    AvrSession, CommandArg, CommandItem, CommandOutcome, SessionError, SessionState,
};
pub use pioneer_state::{
    AvrParams, AvrProperties, DecoderRegistry, ModeDef, ParamError, ParamKey, ParamValue,
    StateChange, TunerState, ZoneObserver,
};
