//! # pioneer-state
//!
//! State management for a Pioneer AVR client: the layered device parameters,
//! the in-memory property cache with per-zone observers, and the response
//! decoder registry that turns inbound protocol frames into property
//! updates.
//!
//! # Architecture
//!
//! ```text
//! inbound frame
//!     │
//!     ▼
//! DecoderRegistry::dispatch()          longest response-prefix match
//!     │
//!     ▼
//! decoder fn ──▶ AvrProperties         change-detecting setters
//!     │              │
//!     │              ├──▶ broadcast::Sender<StateChange>   (firehose)
//!     ▼              └──▶ zone observers                   (coalesced per frame)
//! Vec<Zone> touched
//! ```
//!
//! Parameters ([`AvrParams`]) are layered defaults → model profile → user
//! overrides → runtime values; every mutation rebuilds the effective view
//! and notifies subscribers of the keys that changed.

mod decoder;
mod decoders;
mod error;
mod params;
mod profiles;
mod properties;

pub use decoder::{DecodeFn, DecoderRegistry};
pub use error::{ParamError, Result};
pub use params::{AvrParams, ModeDef, ParamEvent, ParamKey, ParamValue};
pub use properties::{AvrProperties, StateChange, TunerState, ZoneObserver};
