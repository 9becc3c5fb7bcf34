//! Static lookup tables: input sources, listening modes, media controls.

use std::collections::HashMap;

/// Default input source names, keyed by two-digit source id.
///
/// Used to pre-populate the source dictionary for AVRs that do not answer
/// source-name queries. Ids not present here exist on some models but have
/// no well-known default name.
pub static DEFAULT_SOURCES: &[(&str, &str)] = &[
    ("25", "BD"),
    ("04", "DVD"),
    ("06", "SAT/CBL"),
    ("10", "VIDEO"),
    ("15", "DVR/BDR"),
    ("19", "HDMI1"),
    ("20", "HDMI2"),
    ("21", "HDMI3"),
    ("22", "HDMI4"),
    ("23", "HDMI5"),
    ("24", "HDMI6"),
    ("34", "HDMI7"),
    ("49", "GAME"),
    ("26", "NETWORK"),
    ("38", "INTERNET RADIO"),
    ("53", "Spotify"),
    ("41", "PANDORA"),
    ("44", "MEDIA SERVER"),
    ("45", "FAVORITES"),
    ("17", "iPod/USB"),
    ("05", "TV"),
    ("01", "CD"),
    ("13", "USB-DAC"),
    ("02", "TUNER"),
    ("00", "PHONO"),
    ("12", "MULTI CH IN"),
    ("33", "BT AUDIO"),
    ("31", "HDMI-cyclic"),
    ("46", "AirPlay"),
    ("47", "DMR"),
];

/// Source id of the internal tuner.
pub const SOURCE_TUNER: &str = "02";

/// Build the default source name → id dictionary.
pub fn default_source_dict() -> HashMap<String, String> {
    DEFAULT_SOURCES
        .iter()
        .map(|(id, name)| (name.to_string(), id.to_string()))
        .collect()
}

/// A listening mode definition: display name plus which input channel
/// layouts it can be selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningMode {
    pub name: &'static str,
    pub two_channel: bool,
    pub multi_channel: bool,
}

const fn mode(name: &'static str, two_channel: bool, multi_channel: bool) -> ListeningMode {
    ListeningMode {
        name,
        two_channel,
        multi_channel,
    }
}

/// Stock listening modes, keyed by four-digit mode id.
///
/// Model profiles enable, disable, and extend this set via parameters.
#[rustfmt::skip]
static LISTENING_MODES: &[(&str, ListeningMode)] = &[
    ("0001", mode("STEREO", true, false)),
    ("0003", mode("Front Stage Surround Advance", true, false)),
    ("0004", mode("Front Stage Surround Advance Wide", true, true)),
    ("0005", mode("AUTO SURR/STREAM DIRECT", true, true)),
    ("0006", mode("AUTO SURROUND", true, true)),
    ("0007", mode("DIRECT", true, true)),
    ("0008", mode("PURE DIRECT", true, true)),
    ("0009", mode("STEREO (direct)", true, false)),
    ("0010", mode("STANDARD", true, false)),
    ("0011", mode("2ch", true, false)),
    ("0012", mode("PRO LOGIC", true, false)),
    ("0013", mode("PRO LOGIC2 MOVIE", true, false)),
    ("0014", mode("PRO LOGIC2 MUSIC", true, false)),
    ("0015", mode("PRO LOGIC2 GAME", true, false)),
    ("0016", mode("Neo:6 CINEMA", true, false)),
    ("0017", mode("Neo:6 MUSIC", true, false)),
    ("0018", mode("PRO LOGIC2x MOVIE", true, false)),
    ("0019", mode("PRO LOGIC2x MUSIC", true, false)),
    ("0020", mode("PRO LOGIC2x GAME", true, false)),
    ("0021", mode("Multi ch", false, true)),
    ("0022", mode("Multi ch+DOLBY EX", false, true)),
    ("0023", mode("Multi ch+PRO LOGIC2x MOVIE", false, true)),
    ("0024", mode("Multi ch+PRO LOGIC2x MUSIC", false, true)),
    ("0025", mode("Multi ch+DTS-ES Neo", false, true)),
    ("0026", mode("Multi ch+DTS-ES matrix", false, true)),
    ("0027", mode("Multi ch+DTS-ES discrete", false, true)),
    ("0028", mode("XM HD SURROUND", true, true)),
    ("0029", mode("NEURAL SURROUND", true, true)),
    ("0031", mode("PRO LOGIC2z HEIGHT", true, false)),
    ("0032", mode("WIDE SURROUND MOVIE", true, false)),
    ("0033", mode("WIDE SURROUND MUSIC", true, false)),
    ("0034", mode("Multi ch+PRO LOGIC2z HEIGHT", false, true)),
    ("0035", mode("Multi ch+WIDE SURROUND MOVIE", false, true)),
    ("0036", mode("Multi ch+WIDE SURROUND MUSIC", false, true)),
    ("0037", mode("Neo:X CINEMA", true, false)),
    ("0038", mode("Neo:X MUSIC", true, false)),
    ("0039", mode("Neo:X GAME", true, false)),
    ("0051", mode("PROLOGIC + THX CINEMA", true, false)),
    ("0052", mode("PL2 MOVIE + THX CINEMA", true, false)),
    ("0053", mode("Neo:6 CINEMA + THX CINEMA", true, false)),
    ("0054", mode("PL2x MOVIE + THX CINEMA", true, false)),
    ("0055", mode("THX SELECT2 GAMES", true, false)),
    ("0068", mode("THX CINEMA (for 2ch)", true, false)),
    ("0069", mode("THX MUSIC (for 2ch)", true, false)),
    ("0070", mode("THX GAMES (for 2ch)", true, false)),
    ("0101", mode("ACTION", true, true)),
    ("0102", mode("SCI-FI", true, true)),
    ("0103", mode("DRAMA", true, true)),
    ("0104", mode("ENTERTAINMENT SHOW", true, true)),
    ("0105", mode("MONO FILM", true, true)),
    ("0106", mode("EXPANDED THEATER", true, true)),
    ("0107", mode("CLASSICAL", true, true)),
    ("0109", mode("UNPLUGGED", true, true)),
    ("0110", mode("ROCK/POP", true, true)),
    ("0112", mode("EXTENDED STEREO", true, true)),
    ("0113", mode("PHONES SURROUND", true, true)),
    ("0116", mode("TV SURROUND", true, true)),
    ("0117", mode("SPORTS", true, true)),
    ("0118", mode("ADVANCED GAME", true, true)),
    ("0151", mode("Auto Level Control", true, false)),
    ("0152", mode("OPTIMUM SURROUND", true, true)),
    ("0153", mode("RETRIEVER AIR", true, false)),
    ("0200", mode("ECO MODE", true, true)),
    ("0212", mode("ECO MODE 1", true, true)),
    ("0213", mode("ECO MODE 2", true, true)),
];

/// All stock listening modes.
pub fn listening_modes() -> &'static [(&'static str, ListeningMode)] {
    LISTENING_MODES
}

/// Look up a stock listening mode by id.
pub fn listening_mode(id: &str) -> Option<&'static ListeningMode> {
    LISTENING_MODES
        .iter()
        .find(|(mode_id, _)| *mode_id == id)
        .map(|(_, m)| m)
}

/// Source id → media control mode.
static MEDIA_CONTROL_SOURCES: &[(&str, &str)] = &[
    ("26", "NETWORK"),
    ("38", "NETWORK"),
    ("41", "NETWORK"),
    ("44", "NETWORK"),
    ("53", "NETWORK"),
    ("02", "TUNER"),
    ("13", "ADAPTERPORT"),
    ("17", "IPOD"),
];

/// Media control mode → (action, command mnemonic).
pub static MEDIA_CONTROL_COMMANDS: &[(&str, &[(&str, &str)])] = &[
    (
        "NETWORK",
        &[
            ("play", "operation_network_play"),
            ("pause", "operation_network_pause"),
            ("stop", "operation_network_stop"),
            ("ff", "operation_network_fastforward"),
            ("rw", "operation_network_rewind"),
            ("next", "operation_network_next"),
            ("previous", "operation_network_previous"),
            ("repeat", "operation_network_repeat"),
            ("shuffle", "operation_network_random"),
        ],
    ),
    (
        "IPOD",
        &[
            ("play", "operation_ipod_play"),
            ("pause", "operation_ipod_pause"),
            ("stop", "operation_ipod_stop"),
            ("ff", "operation_ipod_fastforward"),
            ("rw", "operation_ipod_rewind"),
            ("next", "operation_ipod_next"),
            ("previous", "operation_ipod_previous"),
            ("repeat", "operation_ipod_repeat"),
            ("shuffle", "operation_ipod_shuffle"),
        ],
    ),
    (
        "ADAPTERPORT",
        &[
            ("play", "operation_adapterport_play"),
            ("pause", "operation_adapterport_pause"),
            ("stop", "operation_adapterport_stop"),
            ("ff", "operation_adapterport_fastforward"),
            ("rw", "operation_adapterport_rewind"),
            ("next", "operation_adapterport_next"),
            ("previous", "operation_adapterport_previous"),
            ("repeat", "operation_adapterport_repeat"),
            ("shuffle", "operation_adapterport_random"),
        ],
    ),
    (
        "TUNER",
        &[
            ("ff", "increase_tuner_frequency"),
            ("rw", "decrease_tuner_frequency"),
            ("next", "increase_tuner_preset"),
            ("previous", "decrease_tuner_preset"),
        ],
    ),
];

/// Media control mode for a source id, if the source supports transport
/// control.
pub fn media_control_mode(source_id: &str) -> Option<&'static str> {
    MEDIA_CONTROL_SOURCES
        .iter()
        .find(|(id, _)| *id == source_id)
        .map(|(_, m)| *m)
}

/// The (action, command mnemonic) pairs for a media control mode.
pub fn media_control_actions(mode: &str) -> Option<&'static [(&'static str, &'static str)]> {
    MEDIA_CONTROL_COMMANDS
        .iter()
        .find(|(m, _)| *m == mode)
        .map(|(_, actions)| *actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_dict() {
        let dict = default_source_dict();
        assert_eq!(dict.get("TUNER").map(String::as_str), Some("02"));
        assert_eq!(dict.get("HDMI1").map(String::as_str), Some("19"));
        assert_eq!(dict.len(), DEFAULT_SOURCES.len());
    }

    #[test]
    fn test_listening_mode_lookup() {
        let stereo = listening_mode("0001").unwrap();
        assert_eq!(stereo.name, "STEREO");
        assert!(stereo.two_channel);
        assert!(!stereo.multi_channel);
        assert!(listening_mode("9999").is_none());
    }

    #[test]
    fn test_media_control_tables() {
        assert_eq!(media_control_mode("26"), Some("NETWORK"));
        assert_eq!(media_control_mode("02"), Some("TUNER"));
        assert_eq!(media_control_mode("25"), None);

        let actions = media_control_actions("NETWORK").unwrap();
        assert!(actions
            .iter()
            .any(|(action, command)| *action == "play" && *command == "operation_network_play"));
        assert!(media_control_actions("CASSETTE").is_none());
    }
}
