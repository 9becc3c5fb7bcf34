//! Built-in response decoders.
//!
//! One decoder per response prefix, covering the core of the protocol:
//! power, volume, mute and source per zone, listening mode, tuner state,
//! device information, audio/video signal information, tone and the
//! amp/dsp/video setting codes. Integrations can register further decoders
//! on the registry for responses not covered here.

mod audio;
mod basic;
mod settings;
mod system;
mod tuner;

use crate::decoder::DecoderRegistry;

/// Register the built-in decoder set.
pub(crate) fn register_defaults(registry: &mut DecoderRegistry) {
    basic::register(registry);
    tuner::register(registry);
    system::register(registry);
    audio::register(registry);
    settings::register(registry);
}
