//! Decoders for audio and video signal information.

use pioneer_api::tables::{
    code_to_name, AUDIO_SIGNAL_INPUT_INFO, VIDEO_SIGNAL_FORMATS, VIDEO_SIGNAL_INPUT_TERMINAL,
};
use pioneer_api::Zone;

use crate::decoder::DecoderRegistry;
use crate::params::AvrParams;
use crate::properties::AvrProperties;

/// `AST` frames: two digits of input signal format, then per-channel input
/// flags (L, C, R, SL, SR, SBL, SB, SBR, ...). An active centre or surround
/// channel marks the input as multichannel.
fn decode_audio_information(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    if code.len() < 2 {
        return vec![];
    }
    if let Some(name) = code_to_name(AUDIO_SIGNAL_INPUT_INFO, &code[..2]) {
        props.set_setting("audio", "input_signal", name);
    }
    let flags: Vec<char> = code[2..].chars().collect();
    if flags.len() >= 5 {
        let multichannel = flags[1] == '1' || flags[3] == '1' || flags[4] == '1';
        props.set_setting(
            "audio",
            "input_multichannel",
            if multichannel { "1" } else { "0" },
        );
    }
    vec![Zone::All]
}

/// `VST` frames: input terminal digit, then a two-digit signal format.
fn decode_video_information(code: &str, props: &AvrProperties, _params: &AvrParams) -> Vec<Zone> {
    if code.is_empty() {
        return vec![];
    }
    if let Some(name) = code_to_name(VIDEO_SIGNAL_INPUT_TERMINAL, &code[..1]) {
        props.set_setting("video", "input_terminal", name);
    }
    if code.len() >= 3 {
        if let Some(name) = code_to_name(VIDEO_SIGNAL_FORMATS, &code[1..3]) {
            props.set_setting("video", "input_resolution", name);
        }
    }
    vec![Zone::All]
}

pub(super) fn register(registry: &mut DecoderRegistry) {
    registry.register("AST", decode_audio_information);
    registry.register("VST", decode_video_information);
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
    fn test_audio_information_stereo() {
        let (registry, props, params) = context();
        registry.dispatch("AST0310100", &props, &params);
        assert_eq!(props.setting("audio", "input_signal").as_deref(), Some("PCM"));
        assert!(!props.input_multichannel());
    }

    #[test]
    fn test_audio_information_multichannel() {
        let (registry, props, params) = context();
        registry.dispatch("AST0511111", &props, &params);
        assert_eq!(
            props.setting("audio", "input_signal").as_deref(),
            Some("DOLBY DIGITAL")
        );
        assert!(props.input_multichannel());
    }

    #[test]
    fn test_video_information() {
        let (registry, props, params) = context();
        registry.dispatch("VST409", &props, &params);
        assert_eq!(props.setting("video", "input_terminal").as_deref(), Some("HDMI"));
        assert_eq!(
            props.setting("video", "input_resolution").as_deref(),
            Some("1080/60p")
        );
    }
}
