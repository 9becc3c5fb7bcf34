//! Decoders for power, volume, mute, source and listening mode.

use pioneer_api::Zone;

use crate::decoder::DecoderRegistry;
use crate::params::AvrParams;
use crate::properties::AvrProperties;

fn decode_power(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        // "0" is powered on, "1" is standby.
        let Some(first) = code.chars().next() else {
            return vec![];
        };
        props.set_power(zone, first == '0');
        vec![zone]
    }
}

fn decode_volume(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| match code.parse::<i64>() {
        Ok(volume) => {
            props.set_volume(zone, volume);
            vec![zone]
        }
        Err(_) => vec![],
    }
}

fn decode_mute(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        let Some(first) = code.chars().next() else {
            return vec![];
        };
        props.set_mute(zone, first == '0');
        vec![zone]
    }
}

fn decode_source(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        if code.is_empty() {
            return vec![];
        }
        props.set_source_id(zone, code);
        vec![zone]
    }
}

fn decode_listening_mode(code: &str, props: &AvrProperties, params: &AvrParams) -> Vec<Zone> {
    if code.len() != 4 {
        return vec![];
    }
    let name = params
        .all_listening_modes()
        .get(code)
        .map(|def| def.name.clone());
    props.set_listening_mode(code, name);
    vec![Zone::All]
}

pub(super) fn register(registry: &mut DecoderRegistry) {
    registry.register("PWR", decode_power(Zone::Main));
    registry.register("APR", decode_power(Zone::Zone2));
    registry.register("BPR", decode_power(Zone::Zone3));
    registry.register("ZEP", decode_power(Zone::HdZone));

    registry.register("VOL", decode_volume(Zone::Main));
    registry.register("ZV", decode_volume(Zone::Zone2));
    registry.register("YV", decode_volume(Zone::Zone3));
    registry.register("XV", decode_volume(Zone::HdZone));

    registry.register("MUT", decode_mute(Zone::Main));
    registry.register("Z2MUT", decode_mute(Zone::Zone2));
    registry.register("Z3MUT", decode_mute(Zone::Zone3));
    registry.register("HZMUT", decode_mute(Zone::HdZone));

    registry.register("FN", decode_source(Zone::Main));
    registry.register("Z2F", decode_source(Zone::Zone2));
    registry.register("Z3F", decode_source(Zone::Zone3));
    registry.register("ZEA", decode_source(Zone::HdZone));

    registry.register("SR", decode_listening_mode);
}
