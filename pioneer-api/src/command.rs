//! Command code table.
//!
//! Maps command mnemonics to their wire tokens and the response prefix the
//! AVR answers with, per zone. Entries without a response prefix are
//! fire-and-forget: the AVR acknowledges them only through unsolicited
//! status updates, if at all.
//!
//! Wire tokens are sent verbatim; callers prepend argument digits (volume
//! levels, source ids, mode ids) and append suffixes (source-name query ids)
//! before transmission.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::{ApiError, Result};
use crate::zone::Zone;

/// One command table entry for a specific zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    /// Wire token, excluding argument prefix/suffix.
    pub wire: &'static str,
    /// Response prefix the AVR answers with, or `None` for fire-and-forget.
    pub response_prefix: Option<&'static str>,
}

const fn req(wire: &'static str, prefix: &'static str) -> CommandEntry {
    CommandEntry {
        wire,
        response_prefix: Some(prefix),
    }
}

const fn cmd(wire: &'static str) -> CommandEntry {
    CommandEntry {
        wire,
        response_prefix: None,
    }
}

use crate::zone::Zone::{HdZone, Main, Zone2, Zone3};

type ZoneEntries = &'static [(Zone, CommandEntry)];

#[rustfmt::skip]
static COMMANDS: &[(&str, ZoneEntries)] = &[
    // System
    ("query_model", &[(Main, req("?RGD", "RGD"))]),
    ("query_software_version", &[(Main, req("?SSI", "SSI"))]),
    ("query_mac_addr", &[(Main, req("?SVB", "SVB"))]),
    ("query_source_name", &[(Main, req("?RGB", "RGB"))]),
    ("query_display_information", &[(Main, req("?FL", "FL"))]),
    // Power
    ("turn_on", &[
        (Main, req("PO", "PWR")), (Zone2, req("APO", "APR")),
        (Zone3, req("BPO", "BPR")), (HdZone, req("ZEO", "ZEP")),
    ]),
    ("turn_off", &[
        (Main, req("PF", "PWR")), (Zone2, req("APF", "APR")),
        (Zone3, req("BPF", "BPR")), (HdZone, req("ZEF", "ZEP")),
    ]),
    ("query_power", &[
        (Main, req("?P", "PWR")), (Zone2, req("?AP", "APR")),
        (Zone3, req("?BP", "BPR")), (HdZone, req("?ZEP", "ZEP")),
    ]),
    // Volume
    ("volume_up", &[
        (Main, req("VU", "VOL")), (Zone2, req("ZU", "ZV")),
        (Zone3, req("YU", "YV")), (HdZone, req("HZU", "XV")),
    ]),
    ("volume_down", &[
        (Main, req("VD", "VOL")), (Zone2, req("ZD", "ZV")),
        (Zone3, req("YD", "YV")), (HdZone, req("HZD", "XV")),
    ]),
    ("set_volume_level", &[
        (Main, req("VL", "VOL")), (Zone2, req("ZV", "ZV")),
        (Zone3, req("YV", "YV")), (HdZone, req("HZV", "XV")),
    ]),
    ("query_volume", &[
        (Main, req("?V", "VOL")), (Zone2, req("?ZV", "ZV")),
        (Zone3, req("?YV", "YV")), (HdZone, req("?HZV", "XV")),
    ]),
    // Mute
    ("mute_on", &[
        (Main, req("MO", "MUT")), (Zone2, req("Z2MO", "Z2MUT")),
        (Zone3, req("Z3MO", "Z3MUT")), (HdZone, req("HZMO", "HZMUT")),
    ]),
    ("mute_off", &[
        (Main, req("MF", "MUT")), (Zone2, req("Z2MF", "Z2MUT")),
        (Zone3, req("Z3MF", "Z3MUT")), (HdZone, req("HZMF", "HZMUT")),
    ]),
    ("query_mute", &[
        (Main, req("?M", "MUT")), (Zone2, req("?Z2M", "Z2MUT")),
        (Zone3, req("?Z3M", "Z3MUT")), (HdZone, req("?HZM", "HZMUT")),
    ]),
    // Source
    ("select_source", &[
        (Main, req("FN", "FN")), (Zone2, req("ZS", "Z2F")),
        (Zone3, req("ZT", "Z3F")), (HdZone, req("ZEA", "ZEA")),
    ]),
    ("query_source_id", &[
        (Main, req("?F", "FN")), (Zone2, req("?ZS", "Z2F")),
        (Zone3, req("?ZT", "Z3F")), (HdZone, req("?ZEA", "ZEA")),
    ]),
    // Listening mode
    ("query_listening_mode", &[(Main, req("?S", "SR"))]),
    ("set_listening_mode", &[(Main, req("SR", "SR"))]),
    // Tone
    ("query_tone_status", &[(Main, req("?TO", "TO")), (Zone2, req("?ZGA", "ZGA"))]),
    ("query_tone_bass", &[(Main, req("?BA", "BA")), (Zone2, req("?ZGB", "ZGB"))]),
    ("query_tone_treble", &[(Main, req("?TR", "TR")), (Zone2, req("?ZGC", "ZGC"))]),
    ("set_tone_mode", &[(Main, req("TO", "TO")), (Zone2, req("ZGA", "ZGA"))]),
    ("set_tone_bass", &[(Main, req("BA", "BA")), (Zone2, req("ZGB", "ZGB"))]),
    ("set_tone_treble", &[(Main, req("TR", "TR")), (Zone2, req("ZGC", "ZGC"))]),
    // Amp
    ("query_amp_speaker_status", &[(Main, req("?SPK", "SPK"))]),
    ("set_amp_speaker_status", &[(Main, req("SPK", "SPK"))]),
    ("query_amp_hdmi_out_status", &[(Main, req("?HO", "HO"))]),
    ("set_amp_hdmi_out_status", &[(Main, req("HO", "HO"))]),
    ("query_amp_hdmi_audio_status", &[(Main, req("?HA", "HA"))]),
    ("set_amp_hdmi_audio_status", &[(Main, req("HA", "HA"))]),
    ("query_amp_pqls_status", &[(Main, req("?PQ", "PQ"))]),
    ("set_amp_pqls_status", &[(Main, req("PQ", "PQ"))]),
    ("set_amp_dimmer", &[(Main, req("SAA", "SAA"))]),
    ("query_amp_sleep_remain_time", &[(Main, req("?SAB", "SAB"))]),
    ("set_amp_sleep_remain_time", &[(Main, req("SAB", "SAB"))]),
    ("query_amp_panel_lock", &[(Main, req("?PKL", "PKL"))]),
    ("set_amp_panel_lock", &[(Main, req("PKL", "PKL"))]),
    ("query_amp_remote_lock", &[(Main, req("?RML", "RML"))]),
    ("set_amp_remote_lock", &[(Main, req("RML", "RML"))]),
    // Tuner
    ("query_tuner_frequency", &[(Main, req("?FR", "FR"))]),
    ("query_tuner_am_step", &[(Main, req("?SUQ", "SUQ"))]),
    ("set_tuner_band_am", &[(Main, req("01TN", "FR"))]),
    ("set_tuner_band_fm", &[(Main, req("00TN", "FR"))]),
    ("increase_tuner_frequency", &[(Main, req("TFI", "FR"))]),
    ("decrease_tuner_frequency", &[(Main, req("TFD", "FR"))]),
    ("query_tuner_preset", &[(Main, req("?PR", "PR"))]),
    ("select_tuner_preset", &[(Main, req("PR", "PR"))]),
    ("increase_tuner_preset", &[(Main, req("TPI", "PR"))]),
    ("decrease_tuner_preset", &[(Main, req("TPD", "PR"))]),
    ("operation_direct_access", &[(Main, req("TAC", "FR"))]),
    ("operation_tuner_digit", &[(Main, cmd("TN"))]),
    ("operation_tuner_edit", &[(Main, cmd("02TN"))]),
    ("operation_tuner_enter", &[(Main, cmd("03TN"))]),
    // Audio/video information
    ("query_audio_information", &[(Main, req("?AST", "AST"))]),
    ("query_video_information", &[(Main, req("?VST", "VST"))]),
    // Video adjust
    ("query_video_resolution", &[(Main, req("?VTC", "VTC"))]),
    ("set_video_resolution", &[(Main, req("VTC", "VTC"))]),
    ("query_video_converter", &[(Main, req("?VTB", "VTB"))]),
    ("set_video_converter", &[(Main, req("VTB", "VTB"))]),
    ("query_video_pure_cinema_status", &[(Main, req("?VTD", "VTD"))]),
    ("set_video_pure_cinema_status", &[(Main, req("VTD", "VTD"))]),
    ("query_video_stream_smoother", &[(Main, req("?VTF", "VTF"))]),
    ("set_video_stream_smoother", &[(Main, req("VTF", "VTF"))]),
    ("query_video_aspect", &[(Main, req("?VTS", "VTS"))]),
    ("set_video_aspect", &[(Main, req("VTS", "VTS"))]),
    // DSP
    ("query_dsp_phase_control", &[(Main, req("?IS", "IS"))]),
    ("set_dsp_phase_control", &[(Main, req("IS", "IS"))]),
    ("query_dsp_signal_select", &[(Main, req("?SDA", "SDA"))]),
    ("set_dsp_signal_select", &[(Main, req("SDA", "SDA"))]),
    ("query_dsp_sound_retriever", &[(Main, req("?ATA", "ATA"))]),
    ("set_dsp_sound_retriever", &[(Main, req("ATA", "ATA"))]),
    ("query_dsp_digital_dialog_enhancement", &[(Main, req("?ATH", "ATH"))]),
    ("set_dsp_digital_dialog_enhancement", &[(Main, req("ATH", "ATH"))]),
    ("query_dsp_dual_mono", &[(Main, req("?ATJ", "ATJ"))]),
    ("set_dsp_dual_mono", &[(Main, req("ATJ", "ATJ"))]),
    ("query_dsp_drc", &[(Main, req("?ATL", "ATL"))]),
    ("set_dsp_drc", &[(Main, req("ATL", "ATL"))]),
    ("query_dsp_height_gain", &[(Main, req("?ATU", "ATU"))]),
    ("set_dsp_height_gain", &[(Main, req("ATU", "ATU"))]),
    ("query_dsp_virtual_depth", &[(Main, req("?VDP", "VDP"))]),
    ("set_dsp_virtual_depth", &[(Main, req("VDP", "VDP"))]),
    ("query_dsp_digital_filter", &[(Main, req("?ATV", "ATV"))]),
    ("set_dsp_digital_filter", &[(Main, req("ATV", "ATV"))]),
    // Channel levels
    ("set_channel_levels", &[
        (Main, req("CLV", "CLV")), (Zone2, req("ZGE", "ZGE")), (Zone3, req("ZHE", "ZHE")),
    ]),
    // Network transport operations
    ("operation_network_play", &[(Main, cmd("10NW"))]),
    ("operation_network_pause", &[(Main, cmd("11NW"))]),
    ("operation_network_stop", &[(Main, cmd("20NW"))]),
    ("operation_network_fastforward", &[(Main, cmd("15NW"))]),
    ("operation_network_rewind", &[(Main, cmd("14NW"))]),
    ("operation_network_next", &[(Main, cmd("13NW"))]),
    ("operation_network_previous", &[(Main, cmd("12NW"))]),
    ("operation_network_repeat", &[(Main, cmd("34NW"))]),
    ("operation_network_random", &[(Main, cmd("35NW"))]),
    // iPod transport operations
    ("operation_ipod_play", &[(Main, cmd("00IP"))]),
    ("operation_ipod_pause", &[(Main, cmd("01IP"))]),
    ("operation_ipod_stop", &[(Main, cmd("02IP"))]),
    ("operation_ipod_previous", &[(Main, cmd("03IP"))]),
    ("operation_ipod_next", &[(Main, cmd("04IP"))]),
    ("operation_ipod_rewind", &[(Main, cmd("05IP"))]),
    ("operation_ipod_fastforward", &[(Main, cmd("06IP"))]),
    ("operation_ipod_repeat", &[(Main, cmd("07IP"))]),
    ("operation_ipod_shuffle", &[(Main, cmd("08IP"))]),
    // Adapter port (Bluetooth) transport operations
    ("operation_adapterport_play", &[(Main, cmd("10BT"))]),
    ("operation_adapterport_pause", &[(Main, cmd("11BT"))]),
    ("operation_adapterport_stop", &[(Main, cmd("12BT"))]),
    ("operation_adapterport_previous", &[(Main, cmd("13BT"))]),
    ("operation_adapterport_next", &[(Main, cmd("14BT"))]),
    ("operation_adapterport_rewind", &[(Main, cmd("15BT"))]),
    ("operation_adapterport_fastforward", &[(Main, cmd("16BT"))]),
    ("operation_adapterport_repeat", &[(Main, cmd("17BT"))]),
    ("operation_adapterport_random", &[(Main, cmd("18BT"))]),
    // Front panel / cursor operations
    ("operation_amp_status_display", &[(Main, cmd("STS"))]),
    ("operation_amp_cursor_up", &[(Main, cmd("CUP"))]),
    ("operation_amp_cursor_down", &[(Main, cmd("CDN"))]),
    ("operation_amp_cursor_left", &[(Main, cmd("CLE"))]),
    ("operation_amp_cursor_right", &[(Main, cmd("CRI"))]),
    ("operation_amp_cursor_enter", &[(Main, cmd("CEN"))]),
    ("operation_amp_cursor_return", &[(Main, cmd("CRT"))]),
    ("operation_amp_home_menu", &[(Main, cmd("HM"))]),
];

fn index() -> &'static HashMap<&'static str, ZoneEntries> {
    static INDEX: OnceLock<HashMap<&'static str, ZoneEntries>> = OnceLock::new();
    INDEX.get_or_init(|| COMMANDS.iter().copied().collect())
}

/// Look up the table entry for `(command, zone)`.
pub fn lookup(command: &str, zone: Zone) -> Result<CommandEntry> {
    index()
        .get(command)
        .and_then(|entries| {
            entries
                .iter()
                .find(|(z, _)| *z == zone)
                .map(|(_, entry)| *entry)
        })
        .ok_or_else(|| ApiError::UnknownCommand {
            command: command.to_string(),
            zone,
        })
}

/// All `query_*` commands with an entry for `zone`, paired with the function
/// group the mnemonic belongs to (`tone` for `query_tone_bass`, etc.).
///
/// Used by the refresh machinery to select zone queries by enabled function.
pub fn query_commands(zone: Zone) -> Vec<(&'static str, &'static str, CommandEntry)> {
    COMMANDS
        .iter()
        .filter(|(name, _)| name.starts_with("query_"))
        .filter_map(|(name, entries)| {
            let entry = entries.iter().find(|(z, _)| *z == zone)?.1;
            let group = match *name {
                // Listening mode is an amp function.
                "query_listening_mode" => "amp",
                _ => name
                    .strip_prefix("query_")
                    .and_then(|rest| rest.split('_').next())
                    .unwrap_or_default(),
            };
            Some((*name, group, entry))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_zone_scoped() {
        let entry = lookup("query_power", Zone::Main).unwrap();
        assert_eq!(entry.wire, "?P");
        assert_eq!(entry.response_prefix, Some("PWR"));

        let entry = lookup("query_power", Zone::HdZone).unwrap();
        assert_eq!(entry.wire, "?ZEP");
        assert_eq!(entry.response_prefix, Some("ZEP"));
    }

    #[test]
    fn test_lookup_unknown_command() {
        assert!(lookup("query_warp_core", Zone::Main).is_err());
    }

    #[test]
    fn test_lookup_unknown_zone_entry() {
        // Listening mode exists for Main only.
        assert!(lookup("query_listening_mode", Zone::Main).is_ok());
        assert!(lookup("query_listening_mode", Zone::Zone2).is_err());
    }

    #[test]
    fn test_fire_and_forget_has_no_prefix() {
        let entry = lookup("operation_network_play", Zone::Main).unwrap();
        assert_eq!(entry.response_prefix, None);
    }

    #[test]
    fn test_query_commands_grouping() {
        let queries = query_commands(Zone::Main);
        assert!(queries
            .iter()
            .any(|(name, group, _)| *name == "query_tone_bass" && *group == "tone"));
        assert!(queries
            .iter()
            .any(|(name, group, _)| *name == "query_dsp_drc" && *group == "dsp"));
        assert!(queries
            .iter()
            .any(|(name, group, _)| *name == "query_listening_mode" && *group == "amp"));

        // Zone 2 has no video queries.
        let queries = query_commands(Zone::Zone2);
        assert!(!queries.iter().any(|(_, group, _)| *group == "video"));
        assert!(queries.iter().any(|(name, _, _)| *name == "query_volume"));
    }

    #[test]
    fn test_no_duplicate_mnemonics() {
        assert_eq!(index().len(), COMMANDS.len());
    }
}
