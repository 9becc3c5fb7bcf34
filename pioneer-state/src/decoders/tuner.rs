//! Decoders for tuner frequency, preset and AM step responses.

use pioneer_api::{TunerBand, Zone};

use crate::decoder::DecoderRegistry;
use crate::params::{AvrParams, ParamKey, ParamValue};
use crate::properties::AvrProperties;

/// `FR` frames carry the frequency as an integer: AM in kHz (530–1700), FM
/// in 10 kHz units (8750–10800). The ranges are disjoint, so the band can be
/// derived from the value.
fn decode_frequency(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    let Ok(value) = code.parse::<i64>() else {
        return vec![];
    };
    if value >= 8000 {
        props.set_tuner_frequency(TunerBand::Fm, value as f64 / 100.0);
    } else {
        props.set_tuner_frequency(TunerBand::Am, value as f64);
    }
    vec![Zone::All]
}

fn decode_preset(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    if code.is_empty() {
        return vec![];
    }
    props.set_tuner_preset(code);
    vec![Zone::All]
}

/// `SUQ` reports the AM frequency step in kHz.
fn decode_am_step(code: &str, _props: &AvrProperties, params: &AvrParams) -> Vec<Zone> {
    if let Ok(step) = code.trim_start_matches('0').parse::<i64>() {
        params.set_runtime_param(ParamKey::AmFrequencyStep, ParamValue::Float(step as f64));
    }
    vec![]
}

pub(super) fn register(registry: &mut DecoderRegistry) {
    registry.register("FR", decode_frequency);
    registry.register("PR", decode_preset);
    registry.register("SUQ", decode_am_step);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> (DecoderRegistry, AvrProperties, AvrParams) {
        let params = AvrParams::new();
        let props = AvrProperties::new(params.clone());
        (DecoderRegistry::with_defaults(), props, params)
    }

    #[test]
    fn test_fm_frequency() {
        let (registry, props, params) = context();
        registry.dispatch("FR08750", &props, &params);
        let tuner = props.tuner();
        assert_eq!(tuner.band, Some(TunerBand::Fm));
        assert_eq!(tuner.frequency, Some(87.5));
    }

    #[test]
    fn test_am_frequency() {
        let (registry, props, params) = context();
        registry.dispatch("FR01070", &props, &params);
        let tuner = props.tuner();
        assert_eq!(tuner.band, Some(TunerBand::Am));
        assert_eq!(tuner.frequency, Some(1070.0));
    }

    #[test]
    fn test_preset() {
        let (registry, props, params) = context();
        registry.dispatch("PRA01", &props, &params);
        assert_eq!(props.tuner().preset.as_deref(), Some("A01"));
    }

    #[test]
    fn test_am_step() {
        let (registry, props, params) = context();
        registry.dispatch("SUQ09", &props, &params);
        assert_eq!(params.am_frequency_step(), Some(9.0));
    }
}
