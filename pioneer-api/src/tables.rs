//! Code maps shared by response decoders and the operation facade.
//!
//! Each table maps a wire code to its display name. `name_to_code` is the
//! reverse lookup used when building set commands from display names.

pub type CodeTable = &'static [(&'static str, &'static str)];

pub static TONE_MODES: CodeTable = &[("0", "Bypass"), ("1", "On"), ("9", "Tone (Cyclic)")];

pub static SPEAKER_MODES: CodeTable = &[("0", "OFF"), ("1", "A"), ("2", "B"), ("3", "A+B")];

pub static HDMI_OUT_MODES: CodeTable = &[
    ("0", "ALL"),
    ("1", "HDMI 1"),
    ("2", "HDMI 2"),
    ("3", "HDMI (cyclic)"),
];

pub static HDMI_AUDIO_MODES: CodeTable = &[("0", "AMP"), ("1", "PASSTHROUGH")];

pub static PQLS_MODES: CodeTable = &[("0", "OFF"), ("1", "AUTO")];

pub static DIMMER_MODES: CodeTable = &[
    ("0", "Brightest"),
    ("1", "Bright"),
    ("2", "Dark"),
    ("3", "Off"),
];

pub static PANEL_LOCK_MODES: CodeTable = &[
    ("0", "OFF"),
    ("1", "PANEL ONLY"),
    ("2", "PANEL + VOLUME"),
];

pub static VIDEO_RESOLUTION_MODES: CodeTable = &[
    ("0", "AUTO"),
    ("1", "PURE"),
    ("3", "480/576p"),
    ("4", "720p"),
    ("5", "1080i"),
    ("6", "1080p"),
    ("7", "1080/24p"),
    ("8", "4K"),
    ("9", "4K/24p"),
];

pub static VIDEO_PURE_CINEMA_MODES: CodeTable = &[("0", "AUTO"), ("1", "ON"), ("2", "OFF")];

pub static VIDEO_STREAM_SMOOTHER_MODES: CodeTable = &[("0", "OFF"), ("1", "ON"), ("2", "AUTO")];

pub static VIDEO_ASPECT_MODES: CodeTable = &[("0", "PASSTHROUGH"), ("1", "NORMAL")];

pub static DSP_PHASE_CONTROL: CodeTable = &[("0", "off"), ("1", "on"), ("2", "full band on")];

pub static DSP_SIGNAL_SELECT: CodeTable = &[
    ("0", "AUTO"),
    ("1", "ANALOG"),
    ("2", "DIGITAL"),
    ("3", "HDMI"),
];

pub static DSP_DIGITAL_DIALOG_ENHANCEMENT: CodeTable = &[
    ("0", "off"),
    ("1", "flat"),
    ("2", "+1"),
    ("3", "+2"),
    ("4", "+3"),
    ("5", "+4"),
];

pub static DSP_DUAL_MONO: CodeTable = &[("0", "CH1+CH2"), ("1", "CH1"), ("2", "CH2")];

pub static DSP_DRC: CodeTable = &[("0", "off"), ("1", "auto"), ("2", "mid"), ("3", "max")];

pub static DSP_HEIGHT_GAIN: CodeTable = &[("0", "low"), ("1", "mid"), ("2", "high")];

pub static DSP_VIRTUAL_DEPTH: CodeTable =
    &[("0", "off"), ("1", "min"), ("2", "mid"), ("3", "max")];

pub static DSP_DIGITAL_FILTER: CodeTable = &[("0", "slow"), ("1", "sharp"), ("2", "short")];

/// Audio input signal formats reported in `AST` responses (first two digits).
pub static AUDIO_SIGNAL_INPUT_INFO: CodeTable = &[
    ("00", "ANALOG"),
    ("01", "ANALOG"),
    ("02", "ANALOG"),
    ("03", "PCM"),
    ("04", "PCM"),
    ("05", "DOLBY DIGITAL"),
    ("06", "DTS"),
    ("07", "DTS-ES Matrix"),
    ("08", "DTS-ES Discrete"),
    ("09", "DTS 96/24"),
    ("12", "MPEG-2 AAC"),
    ("13", "WMA9 Pro"),
    ("15", "HDMI THROUGH"),
    ("16", "DOLBY DIGITAL PLUS"),
    ("17", "DOLBY TrueHD"),
    ("18", "DTS EXPRESS"),
    ("19", "DTS-HD Master Audio"),
    ("20", "DTS-HD High Resolution"),
    ("27", "DTS-HD Master Audio"),
    ("29", "Dolby Atmos"),
    ("30", "Dolby Atmos over Dolby Digital Plus"),
    ("31", "Dolby Atmos over Dolby TrueHD"),
    ("64", "MP3"),
    ("65", "WAV"),
    ("66", "WMA"),
    ("67", "MPEG4-AAC"),
    ("68", "FLAC"),
    ("69", "ALAC(Apple Lossless)"),
    ("70", "AIFF"),
    ("71", "DSD (USB-DAC)"),
    ("72", "Spotify"),
];

/// Video input terminals reported in `VST` responses (first digit).
pub static VIDEO_SIGNAL_INPUT_TERMINAL: CodeTable = &[
    ("0", "---"),
    ("1", "VIDEO"),
    ("2", "S-VIDEO"),
    ("3", "COMPONENT"),
    ("4", "HDMI"),
    ("5", "Self OSD/JPEG"),
];

/// Video signal formats reported in `VST` responses (digits 2-3).
pub static VIDEO_SIGNAL_FORMATS: CodeTable = &[
    ("00", "---"),
    ("01", "480/60i"),
    ("02", "576/50i"),
    ("03", "480/60p"),
    ("04", "576/50p"),
    ("05", "720/60p"),
    ("06", "720/50p"),
    ("07", "1080/60i"),
    ("08", "1080/50i"),
    ("09", "1080/60p"),
    ("10", "1080/50p"),
    ("11", "1080/24p"),
    ("12", "4Kx2K/24Hz"),
    ("13", "4Kx2K/25Hz"),
    ("14", "4Kx2K/30Hz"),
    ("16", "4Kx2K/50Hz"),
    ("17", "4Kx2K/60Hz"),
];

/// Channels addressable via the channel level commands.
pub static CHANNELS: &[&str] = &[
    "L", "R", "C", "SL", "SR", "SBL", "SBR", "SW", "LH", "RH", "LW", "RW",
];

/// Resolve a wire code to its display name.
pub fn code_to_name(table: CodeTable, code: &str) -> Option<&'static str> {
    table.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

/// Resolve a display name back to its wire code.
pub fn name_to_code(table: CodeTable, name: &str) -> Option<&'static str> {
    table.iter().find(|(_, n)| *n == name).map(|(c, _)| *c)
}
