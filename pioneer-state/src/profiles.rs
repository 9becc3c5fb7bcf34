//! Model parameter profiles.
//!
//! Profiles adjust defaults for device families whose capabilities differ
//! from the baseline. Selection is by exact model match first, then by the
//! longest profile name that prefixes the detected model string.

use std::collections::BTreeMap;

use crate::params::{ModeDef, ParamKey, ParamValue, ENABLED_FUNCTIONS_NO_VIDEO};

fn strs(items: &[&str]) -> ParamValue {
    ParamValue::StrList(items.iter().map(|s| s.to_string()).collect())
}

fn str_map(items: &[(&str, &str)]) -> ParamValue {
    ParamValue::StrMap(
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Listening modes the SC-LX family does not offer.
const DISABLED_MODES_SC_LX: &[&str] = &[
    "0004", "0011", "0016", "0017", "0025", "0028", "0029", "0053", "0055", "0059", "0073",
    "0076", "0077", "0078", "0083", "0084", "0085", "0102", "0104", "0105", "0106", "0109",
    "0116",
];

#[rustfmt::skip]
const SPEAKER_SYSTEM_MODES_SC_LX: &[(&str, &str)] = &[
    ("00", "Normal (SB/FH)"),
    ("01", "Normal (SB/FW)"),
    ("02", "Speaker B"),
    ("03", "Front Bi-Amp"),
    ("04", "Zone 2"),
    ("10", "9.1ch FH/FW"),
    ("11", "7.1ch + Speaker B"),
    ("12", "7.1ch Front Bi-Amp"),
    ("13", "7.1ch + ZONE2"),
    ("14", "7.1ch FH/FW + ZONE 2"),
    ("15", "5.1ch Bi-Amp + ZONE2"),
    ("16", "5.1ch + ZONE 2+3"),
    ("17", "5.1ch + SP-B Bi-Amp"),
    ("18", "5.1ch F+Surr Bi-Amp"),
    ("19", "5.1ch F+C Bi-Amp"),
    ("20", "5.1ch C+Surr Bi-Amp"),
    ("21", "Multi-ZONE Music"),
];

fn vsx_930() -> Vec<(ParamKey, ParamValue)> {
    let mut extra = BTreeMap::new();
    extra.insert("0040".to_string(), ModeDef::new("Dolby Surround", true, true));
    extra.insert("0041".to_string(), ModeDef::new("EXTENDED STEREO", true, true));
    extra.insert(
        "0100".to_string(),
        ModeDef::new("ADVANCED SURROUND (cyclic)", true, true),
    );
    vec![
        (ParamKey::ExtraAmpListeningModes, ParamValue::ModeMap(extra)),
        (
            ParamKey::EnabledAmpListeningModes,
            strs(&[
                "0005", "0006", "0007", "0008", "0009", "0010", "0016", "0040", "0041", "0100",
                "0151", "0212",
            ]),
        ),
        (ParamKey::EnabledFunctions, strs(ENABLED_FUNCTIONS_NO_VIDEO)),
    ]
}

fn volume_step_only() -> Vec<(ParamKey, ParamValue)> {
    vec![(ParamKey::VolumeStepOnly, ParamValue::Bool(true))]
}

fn sc_lx() -> Vec<(ParamKey, ParamValue)> {
    vec![
        (
            ParamKey::DisabledAmpListeningModes,
            strs(DISABLED_MODES_SC_LX),
        ),
        (
            ParamKey::AmpSpeakerSystemModes,
            str_map(SPEAKER_SYSTEM_MODES_SC_LX),
        ),
    ]
}

static PROFILES: &[(&str, fn() -> Vec<(ParamKey, ParamValue)>)] = &[
    ("VSX-930", vsx_930),
    ("VSX-S510", volume_step_only),
    ("VSX-528", volume_step_only),
    ("SC-LX57", sc_lx),
    ("SC-LX77", sc_lx),
    ("SC-LX79", sc_lx),
    ("SC-LX87", sc_lx),
];

/// Resolve the parameter profile for a detected model string.
pub(crate) fn profile_for(model: &str) -> Vec<(ParamKey, ParamValue)> {
    if model.is_empty() || model == "unknown" {
        return vec![];
    }
    if let Some((_, profile)) = PROFILES.iter().find(|(name, _)| *name == model) {
        return profile();
    }
    PROFILES
        .iter()
        .filter(|(name, _)| model.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, profile)| profile())
        .unwrap_or_default()
}
