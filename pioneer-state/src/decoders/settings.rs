//! Decoders for tone, amp, video adjust, DSP and channel level responses.

use pioneer_api::tables::{
    code_to_name, CodeTable, DIMMER_MODES, DSP_DIGITAL_DIALOG_ENHANCEMENT, DSP_DIGITAL_FILTER,
    DSP_DRC, DSP_DUAL_MONO, DSP_HEIGHT_GAIN, DSP_PHASE_CONTROL, DSP_SIGNAL_SELECT,
    DSP_VIRTUAL_DEPTH, HDMI_AUDIO_MODES, HDMI_OUT_MODES, PANEL_LOCK_MODES, PQLS_MODES,
    SPEAKER_MODES, TONE_MODES, VIDEO_ASPECT_MODES, VIDEO_PURE_CINEMA_MODES,
    VIDEO_RESOLUTION_MODES, VIDEO_STREAM_SMOOTHER_MODES,
};
use pioneer_api::Zone;

use crate::decoder::DecoderRegistry;
use crate::params::AvrParams;
use crate::properties::AvrProperties;

fn decode_tone_status(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        let Some(name) = code_to_name(TONE_MODES, code) else {
            return vec![];
        };
        props.set_tone_value(zone, "status", name);
        vec![zone]
    }
}

/// Tone dB codes run "00" (+6 dB) through "12" (−6 dB).
fn decode_tone_db(
    zone: Zone,
    key: &'static str,
) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| match code.parse::<i64>() {
        Ok(value) if (0..=12).contains(&value) => {
            props.set_tone_value(zone, key, &(6 - value).to_string());
            vec![zone]
        }
        _ => vec![],
    }
}

fn decode_mapped(
    topic: &'static str,
    key: &'static str,
    table: CodeTable,
) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        let Some(name) = code_to_name(table, code) else {
            return vec![];
        };
        props.set_setting(topic, key, name);
        vec![Zone::All]
    }
}

fn decode_flag(
    topic: &'static str,
    key: &'static str,
) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        let Some(first) = code.chars().next() else {
            return vec![];
        };
        props.set_setting(topic, key, if first == '1' { "1" } else { "0" });
        vec![Zone::All]
    }
}

fn decode_sleep_time(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    match code.parse::<i64>() {
        Ok(minutes) => {
            props.set_setting("amp", "sleep_time", &minutes.to_string());
            vec![Zone::All]
        }
        Err(_) => vec![],
    }
}

/// Channel level frames carry a three-character channel (underscore padded)
/// followed by the level: wire 50 is 0 dB, one unit is 0.5 dB.
fn decode_channel_level(zone: Zone) -> impl Fn(&str, &AvrProperties, &AvrParams) -> Vec<Zone> {
    move |code, props, _| {
        if code.len() < 5 {
            return vec![];
        }
        let channel = code[..3].trim_end_matches('_');
        let Ok(value) = code[3..5].parse::<i64>() else {
            return vec![];
        };
        props.set_channel_level(zone, channel, (value - 50) as f64 / 2.0);
        vec![zone]
    }
}

pub(super) fn register(registry: &mut DecoderRegistry) {
    registry.register("TO", decode_tone_status(Zone::Main));
    registry.register("ZGA", decode_tone_status(Zone::Zone2));
    registry.register("BA", decode_tone_db(Zone::Main, "bass"));
    registry.register("ZGB", decode_tone_db(Zone::Zone2, "bass"));
    registry.register("TR", decode_tone_db(Zone::Main, "treble"));
    registry.register("ZGC", decode_tone_db(Zone::Zone2, "treble"));

    registry.register("SPK", decode_mapped("amp", "speakers", SPEAKER_MODES));
    registry.register("HO", decode_mapped("amp", "hdmi_out", HDMI_OUT_MODES));
    registry.register("HA", decode_mapped("amp", "hdmi_audio", HDMI_AUDIO_MODES));
    registry.register("PQ", decode_mapped("amp", "pqls", PQLS_MODES));
    registry.register("SAA", decode_mapped("amp", "dimmer", DIMMER_MODES));
    registry.register("SAB", decode_sleep_time);
    registry.register("PKL", decode_mapped("amp", "panel_lock", PANEL_LOCK_MODES));
    registry.register("RML", decode_flag("amp", "remote_lock"));

    registry.register("VTC", decode_mapped("video", "resolution", VIDEO_RESOLUTION_MODES));
    registry.register("VTB", decode_flag("video", "converter"));
    registry.register("VTD", decode_mapped("video", "pure_cinema", VIDEO_PURE_CINEMA_MODES));
    registry.register(
        "VTF",
        decode_mapped("video", "stream_smoother", VIDEO_STREAM_SMOOTHER_MODES),
    );
    registry.register("VTS", decode_mapped("video", "aspect", VIDEO_ASPECT_MODES));

    registry.register("IS", decode_mapped("dsp", "phase_control", DSP_PHASE_CONTROL));
    registry.register("SDA", decode_mapped("dsp", "signal_select", DSP_SIGNAL_SELECT));
    registry.register("ATA", decode_flag("dsp", "sound_retriever"));
    registry.register(
        "ATH",
        decode_mapped("dsp", "digital_dialog_enhancement", DSP_DIGITAL_DIALOG_ENHANCEMENT),
    );
    registry.register("ATJ", decode_mapped("dsp", "dual_mono", DSP_DUAL_MONO));
    registry.register("ATL", decode_mapped("dsp", "drc", DSP_DRC));
    registry.register("ATU", decode_mapped("dsp", "height_gain", DSP_HEIGHT_GAIN));
    registry.register("VDP", decode_mapped("dsp", "virtual_depth", DSP_VIRTUAL_DEPTH));
    registry.register("ATV", decode_mapped("dsp", "digital_filter", DSP_DIGITAL_FILTER));

    registry.register("CLV", decode_channel_level(Zone::Main));
    registry.register("ZGE", decode_channel_level(Zone::Zone2));
    registry.register("ZHE", decode_channel_level(Zone::Zone3));
}
