//! Layered device parameters.
//!
//! Parameters come from four layers, merged last-writer-wins:
//!
//! 0. built-in defaults
//! 1. model profile (selected from the detected model string)
//! 2. user overrides
//! 3. runtime values computed by the library (AM step, detected zones,
//!    initial-refresh set, listening-mode views)
//!
//! Every mutation rebuilds the effective view and broadcasts a [`ParamEvent`]
//! for each key whose effective value changed. The key set is closed; unknown
//! keys are stored as [`ParamKey::Custom`] with a warning, or rejected
//! outright when the strict flag is set.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use pioneer_api::{listening_modes, Zone};

use crate::error::{ParamError, Result};
use crate::profiles;

// ============================================================================
// Keys and values
// ============================================================================

/// The recognized parameter keys.
///
/// `Custom` carries any key outside the closed set, for forward
/// compatibility with integrations that configure their own decoders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Model,
    IgnoredZones,
    CommandDelay,
    MaxSourceId,
    MaxVolume,
    MaxVolumeZonex,
    PowerOnVolumeBounce,
    VolumeStepOnly,
    IgnoreVolumeCheck,
    Zone1Sources,
    Zone2Sources,
    Zone3Sources,
    HdzoneSources,
    AmpSpeakerSystemModes,
    ExtraAmpListeningModes,
    EnabledAmpListeningModes,
    DisabledAmpListeningModes,
    VideoResolutionModes,
    MhlSource,
    EnabledFunctions,
    DisableAutoQuery,
    AmFrequencyStep,
    AlwaysPoll,
    ScanInterval,
    Timeout,
    ZonesInitialRefresh,
    QuerySources,
    AvailableListeningModes,
    Custom(String),
}

impl ParamKey {
    /// The canonical string name of the key.
    pub fn as_str(&self) -> &str {
        match self {
            ParamKey::Model => "model",
            ParamKey::IgnoredZones => "ignored_zones",
            ParamKey::CommandDelay => "command_delay",
            ParamKey::MaxSourceId => "max_source_id",
            ParamKey::MaxVolume => "max_volume",
            ParamKey::MaxVolumeZonex => "max_volume_zonex",
            ParamKey::PowerOnVolumeBounce => "power_on_volume_bounce",
            ParamKey::VolumeStepOnly => "volume_step_only",
            ParamKey::IgnoreVolumeCheck => "ignore_volume_check",
            ParamKey::Zone1Sources => "zone_1_sources",
            ParamKey::Zone2Sources => "zone_2_sources",
            ParamKey::Zone3Sources => "zone_3_sources",
            ParamKey::HdzoneSources => "hdzone_sources",
            ParamKey::AmpSpeakerSystemModes => "amp_speaker_system_modes",
            ParamKey::ExtraAmpListeningModes => "extra_amp_listening_modes",
            ParamKey::EnabledAmpListeningModes => "enabled_amp_listening_modes",
            ParamKey::DisabledAmpListeningModes => "disabled_amp_listening_modes",
            ParamKey::VideoResolutionModes => "video_resolution_modes",
            ParamKey::MhlSource => "mhl_source",
            ParamKey::EnabledFunctions => "enabled_functions",
            ParamKey::DisableAutoQuery => "disable_auto_query",
            ParamKey::AmFrequencyStep => "am_frequency_step",
            ParamKey::AlwaysPoll => "always_poll",
            ParamKey::ScanInterval => "scan_interval",
            ParamKey::Timeout => "timeout",
            ParamKey::ZonesInitialRefresh => "zones_initial_refresh",
            ParamKey::QuerySources => "query_sources",
            ParamKey::AvailableListeningModes => "available_listening_modes",
            ParamKey::Custom(name) => name,
        }
    }

    /// Parse a key name; unrecognized names become [`ParamKey::Custom`].
    pub fn from_name(name: &str) -> ParamKey {
        match name {
            "model" => ParamKey::Model,
            "ignored_zones" => ParamKey::IgnoredZones,
            "command_delay" => ParamKey::CommandDelay,
            "max_source_id" => ParamKey::MaxSourceId,
            "max_volume" => ParamKey::MaxVolume,
            "max_volume_zonex" => ParamKey::MaxVolumeZonex,
            "power_on_volume_bounce" => ParamKey::PowerOnVolumeBounce,
            "volume_step_only" => ParamKey::VolumeStepOnly,
            "ignore_volume_check" => ParamKey::IgnoreVolumeCheck,
            "zone_1_sources" => ParamKey::Zone1Sources,
            "zone_2_sources" => ParamKey::Zone2Sources,
            "zone_3_sources" => ParamKey::Zone3Sources,
            "hdzone_sources" => ParamKey::HdzoneSources,
            "amp_speaker_system_modes" => ParamKey::AmpSpeakerSystemModes,
            "extra_amp_listening_modes" => ParamKey::ExtraAmpListeningModes,
            "enabled_amp_listening_modes" => ParamKey::EnabledAmpListeningModes,
            "disabled_amp_listening_modes" => ParamKey::DisabledAmpListeningModes,
            "video_resolution_modes" => ParamKey::VideoResolutionModes,
            "mhl_source" => ParamKey::MhlSource,
            "enabled_functions" => ParamKey::EnabledFunctions,
            "disable_auto_query" => ParamKey::DisableAutoQuery,
            "am_frequency_step" => ParamKey::AmFrequencyStep,
            "always_poll" => ParamKey::AlwaysPoll,
            "scan_interval" => ParamKey::ScanInterval,
            "timeout" => ParamKey::Timeout,
            "zones_initial_refresh" => ParamKey::ZonesInitialRefresh,
            "query_sources" => ParamKey::QuerySources,
            "available_listening_modes" => ParamKey::AvailableListeningModes,
            other => ParamKey::Custom(other.to_string()),
        }
    }

    /// Sources parameter key for a zone.
    pub fn zone_sources(zone: Zone) -> Option<ParamKey> {
        match zone {
            Zone::Main => Some(ParamKey::Zone1Sources),
            Zone::Zone2 => Some(ParamKey::Zone2Sources),
            Zone::Zone3 => Some(ParamKey::Zone3Sources),
            Zone::HdZone => Some(ParamKey::HdzoneSources),
            Zone::All => None,
        }
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A listening mode definition stored in parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeDef {
    pub name: String,
    pub two_channel: bool,
    pub multi_channel: bool,
}

impl ModeDef {
    pub fn new(name: impl Into<String>, two_channel: bool, multi_channel: bool) -> Self {
        Self {
            name: name.into(),
            two_channel,
            multi_channel,
        }
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrList(Vec<String>),
    ZoneList(Vec<Zone>),
    StrMap(BTreeMap<String, String>),
    ModeMap(BTreeMap<String, ModeDef>),
}

impl ParamValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::StrList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_zone_list(&self) -> Option<&[Zone]> {
        match self {
            ParamValue::ZoneList(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str_map(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            ParamValue::StrMap(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_mode_map(&self) -> Option<&BTreeMap<String, ModeDef>> {
        match self {
            ParamValue::ModeMap(v) => Some(v),
            _ => None,
        }
    }
}

/// Notification that a parameter's effective value changed.
#[derive(Debug, Clone)]
pub struct ParamEvent {
    pub key: ParamKey,
}

// ============================================================================
// Defaults
// ============================================================================

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

pub(crate) const DEFAULT_ENABLED_FUNCTIONS: &[&str] = &[
    "basic", "audio", "amp", "dsp", "tone", "channels", "video", "tuner", "system", "display",
];

pub(crate) const ENABLED_FUNCTIONS_NO_VIDEO: &[&str] = &[
    "basic", "audio", "amp", "dsp", "tone", "channels", "tuner", "system", "display",
];

const ZONE_2_3_SOURCES: &[&str] = &[
    "04", "06", "15", "26", "38", "53", "41", "44", "45", "17", "13", "05", "01", "02", "33",
    "46", "47", "99", "10",
];

const HDZONE_SOURCES: &[&str] = &[
    "25", "04", "06", "10", "15", "19", "20", "21", "22", "23", "24", "34", "35", "26", "38",
    "53", "41", "44", "45", "17", "13", "33", "31", "46", "47", "48",
];

#[rustfmt::skip]
const SPEAKER_SYSTEM_MODES: &[(&str, &str)] = &[
    ("00", "Normal / 5.2.2ch / 7.2ch"),
    ("01", "7.2ch SB/FW"),
    ("02", "Speaker B"),
    ("03", "Front Bi-Amp"),
    ("04", "Zone 2"),
    ("05", "HDZone"),
    ("07", "5.2ch"),
    ("08", "Front Bi-Amp"),
    ("09", "Speaker B"),
    ("10", "9.1ch FH/FW"),
    ("11", "7.2.2/7.2ch +SP-B"),
    ("12", "7.2ch Front Bi-Amp"),
    ("13", "7.2ch + HDZONE"),
    ("14", "7.1ch FH/FW + ZONE 2"),
    ("15", "5.2ch Bi-Amp + HDZONE"),
    ("16", "5.2ch + ZONE 2+3"),
    ("17", "5.2ch + SP-B Bi-Amp"),
    ("18", "5.2ch F+Surr Bi-Amp"),
    ("19", "5.2ch F+C Bi-Amp"),
    ("20", "5.2ch C+Surr Bi-Amp"),
    ("21", "Multi-ZONE Music"),
    ("22", "7.2.2ch TMd/FW"),
    ("23", "7.2.2ch TMd/FH"),
    ("24", "5.2.4ch"),
    ("25", "5.2ch ZONE 2 + HDZONE"),
    ("26", "7.2.2/5.2.2/7.2ch"),
    ("27", "7.2.2c Front Bi-Amp"),
    ("30", "9.2.2ch TMd/FH"),
    ("31", "7.2.4ch SB Pre Out"),
    ("32", "7.2.4ch Front Pre Out"),
];

fn default_params() -> HashMap<ParamKey, ParamValue> {
    let mut map = HashMap::new();
    map.insert(ParamKey::IgnoredZones, ParamValue::ZoneList(vec![]));
    map.insert(ParamKey::CommandDelay, ParamValue::Float(0.1));
    map.insert(ParamKey::MaxSourceId, ParamValue::Int(60));
    map.insert(ParamKey::MaxVolume, ParamValue::Int(185));
    map.insert(ParamKey::MaxVolumeZonex, ParamValue::Int(81));
    map.insert(ParamKey::PowerOnVolumeBounce, ParamValue::Bool(false));
    map.insert(ParamKey::VolumeStepOnly, ParamValue::Bool(false));
    map.insert(ParamKey::IgnoreVolumeCheck, ParamValue::Bool(true));
    map.insert(ParamKey::AlwaysPoll, ParamValue::Bool(false));
    map.insert(ParamKey::ScanInterval, ParamValue::Float(60.0));
    map.insert(ParamKey::Timeout, ParamValue::Float(5.0));
    map.insert(ParamKey::DisableAutoQuery, ParamValue::Bool(false));
    map.insert(
        ParamKey::EnabledFunctions,
        strs(DEFAULT_ENABLED_FUNCTIONS),
    );
    map.insert(ParamKey::Zone1Sources, strs(&[]));
    map.insert(ParamKey::Zone2Sources, strs(ZONE_2_3_SOURCES));
    map.insert(ParamKey::Zone3Sources, strs(ZONE_2_3_SOURCES));
    map.insert(ParamKey::HdzoneSources, strs(HDZONE_SOURCES));
    map.insert(
        ParamKey::AmpSpeakerSystemModes,
        str_map(SPEAKER_SYSTEM_MODES),
    );
    map.insert(
        ParamKey::ExtraAmpListeningModes,
        ParamValue::ModeMap(BTreeMap::new()),
    );
    map.insert(ParamKey::EnabledAmpListeningModes, strs(&[]));
    map.insert(ParamKey::DisabledAmpListeningModes, strs(&[]));
    map.insert(
        ParamKey::VideoResolutionModes,
        strs(&["0", "1", "3", "4", "5", "6", "7", "8", "9"]),
    );
    map
}

// ============================================================================
// AvrParams
// ============================================================================

struct ParamLayers {
    defaults: HashMap<ParamKey, ParamValue>,
    model: HashMap<ParamKey, ParamValue>,
    user: HashMap<ParamKey, ParamValue>,
    runtime: HashMap<ParamKey, ParamValue>,
    effective: HashMap<ParamKey, ParamValue>,
    strict: bool,
}

impl ParamLayers {
    /// Rebuild the effective view and return the keys whose value changed.
    fn rebuild(&mut self) -> Vec<ParamKey> {
        // A user-supplied AM step overrides any measured runtime value.
        if self.user.contains_key(&ParamKey::AmFrequencyStep) {
            self.runtime.remove(&ParamKey::AmFrequencyStep);
        }

        let mut merged = self.defaults.clone();
        for layer in [&self.model, &self.user, &self.runtime] {
            for (key, value) in layer {
                merged.insert(key.clone(), value.clone());
            }
        }

        let mut changed: Vec<ParamKey> = merged
            .iter()
            .filter(|(key, value)| self.effective.get(key) != Some(value))
            .map(|(key, _)| key.clone())
            .collect();
        for key in self.effective.keys() {
            if !merged.contains_key(key) {
                changed.push(key.clone());
            }
        }
        self.effective = merged;
        changed
    }
}

/// Layered device parameters, shared by cloning.
#[derive(Clone)]
pub struct AvrParams {
    inner: Arc<RwLock<ParamLayers>>,
    events_tx: broadcast::Sender<ParamEvent>,
}

impl Default for AvrParams {
    fn default() -> Self {
        Self::new()
    }
}

impl AvrParams {
    /// Create parameters with built-in defaults and no overrides.
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(64);
        let mut layers = ParamLayers {
            defaults: default_params(),
            model: HashMap::new(),
            user: HashMap::new(),
            runtime: HashMap::new(),
            effective: HashMap::new(),
            strict: false,
        };
        layers.rebuild();
        let params = Self {
            inner: Arc::new(RwLock::new(layers)),
            events_tx,
        };
        params.update_listening_modes();
        params
    }

    /// Reject unknown keys instead of storing them.
    pub fn set_strict(&self, strict: bool) {
        self.inner.write().unwrap().strict = strict;
    }

    /// Subscribe to effective-value changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ParamEvent> {
        self.events_tx.subscribe()
    }

    fn notify(&self, changed: Vec<ParamKey>) {
        for key in changed {
            debug!("parameter {key} changed");
            let _ = self.events_tx.send(ParamEvent { key });
        }
    }

    fn check_key(&self, key: &ParamKey, strict: bool) -> Result<()> {
        if let ParamKey::Custom(name) = key {
            if strict {
                return Err(ParamError::UnknownKey(name.clone()));
            }
            warn!("unknown parameter {name} accepted");
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Replace the user override layer.
    pub fn set_user_params(
        &self,
        params: impl IntoIterator<Item = (ParamKey, ParamValue)>,
    ) -> Result<()> {
        let changed = {
            let mut layers = self.inner.write().unwrap();
            let strict = layers.strict;
            let mut user = HashMap::new();
            for (key, value) in params {
                self.check_key(&key, strict)?;
                user.insert(key, value);
            }
            layers.user = user;
            layers.rebuild()
        };
        self.notify(changed);
        self.update_listening_modes();
        Ok(())
    }

    /// Set a single user override.
    pub fn set_user_param(&self, key: ParamKey, value: ParamValue) -> Result<()> {
        let changed = {
            let mut layers = self.inner.write().unwrap();
            let strict = layers.strict;
            self.check_key(&key, strict)?;
            layers.user.insert(key, value);
            layers.rebuild()
        };
        self.notify(changed);
        self.update_listening_modes();
        Ok(())
    }

    /// Set a runtime (library-computed) value.
    pub fn set_runtime_param(&self, key: ParamKey, value: ParamValue) {
        let changed = {
            let mut layers = self.inner.write().unwrap();
            layers.runtime.insert(key, value);
            layers.rebuild()
        };
        self.notify(changed);
    }

    /// Select the model profile layer from the detected model string.
    ///
    /// Profiles match exactly first, then by the longest profile name that is
    /// a prefix of `model`; no match leaves the layer empty.
    pub fn set_default_params_model(&self, model: &str) {
        let profile = profiles::profile_for(model);
        if !profile.is_empty() {
            info!("applying default parameters for model {model}");
        }
        let changed = {
            let mut layers = self.inner.write().unwrap();
            layers.model = profile.into_iter().collect();
            layers
                .runtime
                .insert(ParamKey::Model, ParamValue::Str(model.to_string()));
            layers.rebuild()
        };
        self.notify(changed);
        self.update_listening_modes();
    }

    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Effective value of a parameter.
    pub fn get(&self, key: &ParamKey) -> Option<ParamValue> {
        self.inner.read().unwrap().effective.get(key).cloned()
    }

    /// A copy of the whole effective view.
    pub fn get_all(&self) -> HashMap<ParamKey, ParamValue> {
        self.inner.read().unwrap().effective.clone()
    }

    /// A copy of the user override layer.
    pub fn user_params(&self) -> HashMap<ParamKey, ParamValue> {
        self.inner.read().unwrap().user.clone()
    }

    /// A copy of the defaults layer.
    pub fn default_params(&self) -> HashMap<ParamKey, ParamValue> {
        self.inner.read().unwrap().defaults.clone()
    }

    fn bool_param(&self, key: ParamKey) -> bool {
        self.get(&key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    fn float_param(&self, key: ParamKey, default: f64) -> f64 {
        self.get(&key).and_then(|v| v.as_float()).unwrap_or(default)
    }

    /// Detected model string, if any.
    pub fn model(&self) -> Option<String> {
        self.get(&ParamKey::Model)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Delay enforced between outbound commands.
    pub fn command_delay(&self) -> Duration {
        Duration::from_secs_f64(self.float_param(ParamKey::CommandDelay, 0.1).max(0.0))
    }

    /// Response timeout for requests.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.float_param(ParamKey::Timeout, 5.0).max(0.1))
    }

    /// Poll period for the updater; zero disables periodic refresh.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs_f64(self.float_param(ParamKey::ScanInterval, 60.0).max(0.0))
    }

    pub fn always_poll(&self) -> bool {
        self.bool_param(ParamKey::AlwaysPoll)
    }

    pub fn disable_auto_query(&self) -> bool {
        self.bool_param(ParamKey::DisableAutoQuery)
    }

    pub fn power_on_volume_bounce(&self) -> bool {
        self.bool_param(ParamKey::PowerOnVolumeBounce)
    }

    pub fn volume_step_only(&self) -> bool {
        self.bool_param(ParamKey::VolumeStepOnly)
    }

    pub fn ignore_volume_check(&self) -> bool {
        self.bool_param(ParamKey::IgnoreVolumeCheck)
    }

    /// Highest source id probed by the source dictionary builder.
    pub fn max_source_id(&self) -> i64 {
        self.get(&ParamKey::MaxSourceId)
            .and_then(|v| v.as_int())
            .unwrap_or(60)
    }

    /// Volume ceiling for a zone (Main differs from the other zones).
    pub fn max_volume(&self, zone: Zone) -> i64 {
        let key = if zone == Zone::Main {
            ParamKey::MaxVolume
        } else {
            ParamKey::MaxVolumeZonex
        };
        self.get(&key).and_then(|v| v.as_int()).unwrap_or(185)
    }

    pub fn ignored_zones(&self) -> Vec<Zone> {
        self.get(&ParamKey::IgnoredZones)
            .and_then(|v| v.as_zone_list().map(<[Zone]>::to_vec))
            .unwrap_or_default()
    }

    pub fn enabled_functions(&self) -> Vec<String> {
        self.get(&ParamKey::EnabledFunctions)
            .and_then(|v| v.as_str_list().map(<[String]>::to_vec))
            .unwrap_or_default()
    }

    /// Valid source ids for a zone; empty means unrestricted.
    pub fn zone_sources(&self, zone: Zone) -> Vec<String> {
        ParamKey::zone_sources(zone)
            .and_then(|key| self.get(&key))
            .and_then(|v| v.as_str_list().map(<[String]>::to_vec))
            .unwrap_or_default()
    }

    /// AM tuner frequency step in kHz, if known.
    pub fn am_frequency_step(&self) -> Option<f64> {
        self.get(&ParamKey::AmFrequencyStep).and_then(|v| v.as_float())
    }

    // ------------------------------------------------------------------------
    // Runtime views
    // ------------------------------------------------------------------------

    /// Zones that have completed at least one full refresh since connecting.
    pub fn zones_initial_refresh(&self) -> Vec<Zone> {
        self.get(&ParamKey::ZonesInitialRefresh)
            .and_then(|v| v.as_zone_list().map(<[Zone]>::to_vec))
            .unwrap_or_default()
    }

    /// Record a zone's first completed refresh. Returns true if newly added.
    pub fn mark_zone_initial_refresh(&self, zone: Zone) -> bool {
        let mut zones = self.zones_initial_refresh();
        if zones.contains(&zone) {
            return false;
        }
        zones.push(zone);
        self.set_runtime_param(ParamKey::ZonesInitialRefresh, ParamValue::ZoneList(zones));
        true
    }

    /// Forget initial-refresh state (used when the session restarts).
    pub fn clear_initial_refresh(&self) {
        self.set_runtime_param(ParamKey::ZonesInitialRefresh, ParamValue::ZoneList(vec![]));
    }

    /// All listening modes: stock plus `extra_amp_listening_modes`.
    pub fn all_listening_modes(&self) -> BTreeMap<String, ModeDef> {
        let mut all: BTreeMap<String, ModeDef> = listening_modes()
            .iter()
            .map(|(id, m)| {
                (
                    id.to_string(),
                    ModeDef::new(m.name, m.two_channel, m.multi_channel),
                )
            })
            .collect();
        if let Some(extra) = self
            .get(&ParamKey::ExtraAmpListeningModes)
            .and_then(|v| v.as_mode_map().cloned())
        {
            all.extend(extra);
        }
        all
    }

    /// Recompute the available listening mode view from the mode parameters.
    pub fn update_listening_modes(&self) {
        let all = self.all_listening_modes();
        let disabled = self
            .get(&ParamKey::DisabledAmpListeningModes)
            .and_then(|v| v.as_str_list().map(<[String]>::to_vec))
            .unwrap_or_default();
        let enabled = self
            .get(&ParamKey::EnabledAmpListeningModes)
            .and_then(|v| v.as_str_list().map(<[String]>::to_vec))
            .unwrap_or_default();

        let mut available: BTreeMap<String, ModeDef> = BTreeMap::new();
        let mut seen_names: Vec<String> = Vec::new();
        for (id, def) in all {
            if disabled.contains(&id) || (!enabled.is_empty() && !enabled.contains(&id)) {
                continue;
            }
            if seen_names.contains(&def.name) {
                warn!("ignored duplicate listening mode name: {}", def.name);
                continue;
            }
            seen_names.push(def.name.clone());
            available.insert(id, def);
        }
        self.set_runtime_param(
            ParamKey::AvailableListeningModes,
            ParamValue::ModeMap(available),
        );
    }

    /// The listening modes selectable on this AVR.
    pub fn available_listening_modes(&self) -> BTreeMap<String, ModeDef> {
        self.get(&ParamKey::AvailableListeningModes)
            .and_then(|v| v.as_mode_map().cloned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = AvrParams::new();
        assert_eq!(params.command_delay(), Duration::from_millis(100));
        assert_eq!(params.max_volume(Zone::Main), 185);
        assert_eq!(params.max_volume(Zone::Zone2), 81);
        assert!(!params.always_poll());
        assert!(params.enabled_functions().contains(&"tone".to_string()));
    }

    #[test]
    fn test_user_layer_overrides_defaults() {
        let params = AvrParams::new();
        params
            .set_user_param(ParamKey::MaxVolumeZonex, ParamValue::Int(100))
            .unwrap();
        assert_eq!(params.max_volume(Zone::HdZone), 100);

        // Round trip of the user layer.
        let user = params.user_params();
        assert_eq!(user.get(&ParamKey::MaxVolumeZonex), Some(&ParamValue::Int(100)));
    }

    #[test]
    fn test_set_user_params_replaces_layer() {
        let params = AvrParams::new();
        params
            .set_user_param(ParamKey::AlwaysPoll, ParamValue::Bool(true))
            .unwrap();
        params
            .set_user_params([(ParamKey::ScanInterval, ParamValue::Float(5.0))])
            .unwrap();
        // Previous override gone, new one applied.
        assert!(!params.always_poll());
        assert_eq!(params.scan_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_key_lenient_and_strict() {
        let params = AvrParams::new();
        params
            .set_user_param(
                ParamKey::Custom("frobnicate".into()),
                ParamValue::Bool(true),
            )
            .unwrap();
        assert_eq!(
            params.get(&ParamKey::Custom("frobnicate".into())),
            Some(ParamValue::Bool(true))
        );

        params.set_strict(true);
        let err = params.set_user_param(
            ParamKey::Custom("frobnicate".into()),
            ParamValue::Bool(false),
        );
        assert!(matches!(err, Err(ParamError::UnknownKey(_))));
    }

    #[test]
    fn test_model_profile_prefix_match() {
        let params = AvrParams::new();
        params.set_default_params_model("VSX-S510-K");
        assert!(params.volume_step_only());
        assert_eq!(params.model().as_deref(), Some("VSX-S510-K"));

        // Unknown model leaves profile layer empty.
        let params = AvrParams::new();
        params.set_default_params_model("UNKNOWN-1");
        assert!(!params.volume_step_only());
    }

    #[test]
    fn test_user_layer_wins_over_profile() {
        let params = AvrParams::new();
        params
            .set_user_param(ParamKey::VolumeStepOnly, ParamValue::Bool(false))
            .unwrap();
        params.set_default_params_model("VSX-528");
        assert!(!params.volume_step_only());
    }

    #[test]
    fn test_runtime_layer_wins() {
        let params = AvrParams::new();
        params.set_runtime_param(ParamKey::ScanInterval, ParamValue::Float(2.0));
        assert_eq!(params.scan_interval(), Duration::from_secs(2));
    }

    #[test]
    fn test_user_am_step_overrides_runtime() {
        let params = AvrParams::new();
        params.set_runtime_param(ParamKey::AmFrequencyStep, ParamValue::Float(10.0));
        assert_eq!(params.am_frequency_step(), Some(10.0));
        params
            .set_user_param(ParamKey::AmFrequencyStep, ParamValue::Float(9.0))
            .unwrap();
        assert_eq!(params.am_frequency_step(), Some(9.0));
    }

    #[test]
    fn test_change_events() {
        let params = AvrParams::new();
        let mut rx = params.subscribe();
        params
            .set_user_param(ParamKey::ScanInterval, ParamValue::Float(10.0))
            .unwrap();
        let event = rx.try_recv().unwrap();
        assert_eq!(event.key, ParamKey::ScanInterval);

        // Setting the same value again emits nothing.
        params
            .set_user_param(ParamKey::ScanInterval, ParamValue::Float(10.0))
            .unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_listening_mode_filtering() {
        let params = AvrParams::new();
        let available = params.available_listening_modes();
        assert!(available.contains_key("0001"));

        params
            .set_user_param(
                ParamKey::EnabledAmpListeningModes,
                strs(&["0001", "0007"]),
            )
            .unwrap();
        let available = params.available_listening_modes();
        assert_eq!(available.len(), 2);

        params
            .set_user_param(ParamKey::DisabledAmpListeningModes, strs(&["0007"]))
            .unwrap();
        let available = params.available_listening_modes();
        assert_eq!(available.len(), 1);
        assert!(available.contains_key("0001"));
    }

    #[test]
    fn test_duplicate_mode_names_ignored() {
        let params = AvrParams::new();
        let mut extra = BTreeMap::new();
        extra.insert("0999".to_string(), ModeDef::new("STEREO", true, true));
        params
            .set_user_param(ParamKey::ExtraAmpListeningModes, ParamValue::ModeMap(extra))
            .unwrap();
        let available = params.available_listening_modes();
        // "0001" registers STEREO first; the duplicate display name is dropped.
        assert!(available.contains_key("0001"));
        assert!(!available.contains_key("0999"));
    }

    #[test]
    fn test_initial_refresh_tracking() {
        let params = AvrParams::new();
        assert!(params.zones_initial_refresh().is_empty());
        assert!(params.mark_zone_initial_refresh(Zone::Main));
        assert!(!params.mark_zone_initial_refresh(Zone::Main));
        assert_eq!(params.zones_initial_refresh(), vec![Zone::Main]);
        params.clear_initial_refresh();
        assert!(params.zones_initial_refresh().is_empty());
    }
}
