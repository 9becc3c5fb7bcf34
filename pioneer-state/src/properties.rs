//! Cached AVR state.
//!
//! `AvrProperties` is the in-memory view of the device, updated by the
//! response decoders and read by the operation facade. All writes go through
//! change-detecting setters that log old → new transitions and publish a
//! [`StateChange`] on the broadcast firehose. Zone observers registered via
//! [`AvrProperties::register_zone_observer`] receive one coalesced callback
//! per touched zone per inbound frame.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use pioneer_api::{media_control_actions, media_control_mode, TunerBand, Zone};

use crate::params::AvrParams;

/// Callback invoked when a zone's observable state changed.
pub type ZoneObserver = Arc<dyn Fn(Zone) + Send + Sync>;

/// Tuner state for the Main zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TunerState {
    pub band: Option<TunerBand>,
    pub frequency: Option<f64>,
    pub preset: Option<String>,
}

/// A state change published on the firehose channel.
#[derive(Debug, Clone, Serialize)]
pub enum StateChange {
    ZoneDiscovered { zone: Zone },
    PowerChanged { zone: Zone, on: bool, was: Option<bool> },
    VolumeChanged { zone: Zone, volume: i64 },
    MuteChanged { zone: Zone, muted: bool },
    SourceChanged { zone: Zone, source_id: String },
    ListeningModeChanged { id: String },
    TunerUpdated,
    ToneChanged { zone: Zone },
    SettingChanged { topic: String, key: String },
    DeviceInfoUpdated,
}

#[derive(Default)]
struct PropertyState {
    model: Option<String>,
    software_version: Option<String>,
    mac_addr: Option<String>,
    zones: Vec<Zone>,
    power: HashMap<Zone, bool>,
    volume: HashMap<Zone, i64>,
    max_volume: HashMap<Zone, i64>,
    mute: HashMap<Zone, bool>,
    source_id: HashMap<Zone, String>,
    source_name: HashMap<Zone, String>,
    media_control_mode: HashMap<Zone, String>,
    listening_mode_id: Option<String>,
    listening_mode: Option<String>,
    tone: HashMap<Zone, BTreeMap<String, String>>,
    channel_level: HashMap<Zone, BTreeMap<String, f64>>,
    tuner: TunerState,
    settings: BTreeMap<&'static str, BTreeMap<String, String>>,
    source_name_to_id: HashMap<String, String>,
    source_id_to_name: HashMap<String, String>,
}

/// The property cache, shared by cloning.
#[derive(Clone)]
pub struct AvrProperties {
    state: Arc<RwLock<PropertyState>>,
    observers: Arc<RwLock<Vec<(Zone, ZoneObserver)>>>,
    changes_tx: broadcast::Sender<StateChange>,
    params: AvrParams,
}

impl AvrProperties {
    pub fn new(params: AvrParams) -> Self {
        let (changes_tx, _) = broadcast::channel(256);
        Self {
            state: Arc::new(RwLock::new(PropertyState::default())),
            observers: Arc::new(RwLock::new(Vec::new())),
            changes_tx,
            params,
        }
    }

    /// The parameters this cache was created with.
    pub fn params(&self) -> &AvrParams {
        &self.params
    }

    /// Subscribe to all state changes.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes_tx.subscribe()
    }

    fn emit(&self, change: StateChange) {
        let _ = self.changes_tx.send(change);
    }

    // ------------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------------

    /// Record a discovered zone and its volume ceiling.
    pub fn add_zone(&self, zone: Zone, max_volume: i64) {
        if !zone.is_device_zone() {
            return;
        }
        let added = {
            let mut state = self.state.write().unwrap();
            if state.zones.contains(&zone) {
                false
            } else {
                state.zones.push(zone);
                state.zones.sort();
                state.max_volume.insert(zone, max_volume);
                true
            }
        };
        if added {
            info!("{zone} discovered");
            self.emit(StateChange::ZoneDiscovered { zone });
        }
    }

    /// Forget a zone (e.g. when it becomes ignored).
    pub fn remove_zone(&self, zone: Zone) {
        let mut state = self.state.write().unwrap();
        state.zones.retain(|z| *z != zone);
        state.power.remove(&zone);
        state.volume.remove(&zone);
        state.mute.remove(&zone);
        state.source_id.remove(&zone);
        state.source_name.remove(&zone);
        state.media_control_mode.remove(&zone);
    }

    /// The detected zones.
    pub fn zones(&self) -> Vec<Zone> {
        self.state.read().unwrap().zones.clone()
    }

    pub fn has_zone(&self, zone: Zone) -> bool {
        self.state.read().unwrap().zones.contains(&zone)
    }

    // ------------------------------------------------------------------------
    // Per-zone scalars
    // ------------------------------------------------------------------------

    /// Update a zone's power state. Returns true if the value changed.
    pub fn set_power(&self, zone: Zone, on: bool) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state.power.insert(zone, on)
        };
        if was != Some(on) {
            info!("{zone}: power: {was:?} -> {on}");
            self.emit(StateChange::PowerChanged { zone, on, was });
            true
        } else {
            false
        }
    }

    pub fn power(&self, zone: Zone) -> Option<bool> {
        self.state.read().unwrap().power.get(&zone).copied()
    }

    /// Whether any zone is powered on.
    pub fn any_power_on(&self) -> bool {
        self.state.read().unwrap().power.values().any(|on| *on)
    }

    pub fn set_volume(&self, zone: Zone, volume: i64) -> bool {
        let (was, widened) = {
            let mut state = self.state.write().unwrap();
            let widened = match state.max_volume.get(&zone) {
                Some(max) if volume > *max => {
                    state.max_volume.insert(zone, volume);
                    true
                }
                _ => false,
            };
            (state.volume.insert(zone, volume), widened)
        };
        if widened {
            debug!("{zone}: reported volume {volume} above ceiling, widening");
        }
        if was != Some(volume) {
            info!("{zone}: volume: {was:?} -> {volume}");
            self.emit(StateChange::VolumeChanged { zone, volume });
            true
        } else {
            false
        }
    }

    pub fn volume(&self, zone: Zone) -> Option<i64> {
        self.state.read().unwrap().volume.get(&zone).copied()
    }

    pub fn set_max_volume(&self, zone: Zone, max_volume: i64) {
        self.state.write().unwrap().max_volume.insert(zone, max_volume);
    }

    pub fn max_volume(&self, zone: Zone) -> Option<i64> {
        self.state.read().unwrap().max_volume.get(&zone).copied()
    }

    pub fn set_mute(&self, zone: Zone, muted: bool) -> bool {
        let was = self.state.write().unwrap().mute.insert(zone, muted);
        if was != Some(muted) {
            info!("{zone}: mute: {was:?} -> {muted}");
            self.emit(StateChange::MuteChanged { zone, muted });
            true
        } else {
            false
        }
    }

    pub fn mute(&self, zone: Zone) -> Option<bool> {
        self.state.read().unwrap().mute.get(&zone).copied()
    }

    /// Update a zone's selected source. Also refreshes the derived source
    /// name and media control mode.
    pub fn set_source_id(&self, zone: Zone, source_id: &str) -> bool {
        let (was, name) = {
            let mut state = self.state.write().unwrap();
            let name = state.source_id_to_name.get(source_id).cloned();
            let was = state.source_id.insert(zone, source_id.to_string());
            match &name {
                Some(name) => {
                    state.source_name.insert(zone, name.clone());
                }
                None => {
                    state.source_name.remove(&zone);
                }
            }
            match media_control_mode(source_id) {
                Some(mode) => {
                    state.media_control_mode.insert(zone, mode.to_string());
                }
                None => {
                    state.media_control_mode.remove(&zone);
                }
            }
            (was, name)
        };
        if was.as_deref() != Some(source_id) {
            info!("{zone}: source: {was:?} -> {source_id} ({name:?})");
            self.emit(StateChange::SourceChanged {
                zone,
                source_id: source_id.to_string(),
            });
            true
        } else {
            false
        }
    }

    pub fn source_id(&self, zone: Zone) -> Option<String> {
        self.state.read().unwrap().source_id.get(&zone).cloned()
    }

    pub fn source_name(&self, zone: Zone) -> Option<String> {
        self.state.read().unwrap().source_name.get(&zone).cloned()
    }

    pub fn media_control_mode(&self, zone: Zone) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .media_control_mode
            .get(&zone)
            .cloned()
    }

    /// Media control actions valid for the zone's current source, or `None`
    /// if the source has no transport controls.
    pub fn get_supported_media_controls(&self, zone: Zone) -> Option<Vec<String>> {
        let mode = self.media_control_mode(zone)?;
        media_control_actions(&mode)
            .map(|actions| actions.iter().map(|(a, _)| a.to_string()).collect())
    }

    // ------------------------------------------------------------------------
    // Listening mode
    // ------------------------------------------------------------------------

    pub fn set_listening_mode(&self, id: &str, name: Option<String>) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state.listening_mode = name.clone();
            state.listening_mode_id.replace(id.to_string())
        };
        if was.as_deref() != Some(id) {
            info!("listening mode: {was:?} -> {id} ({name:?})");
            self.emit(StateChange::ListeningModeChanged { id: id.to_string() });
            true
        } else {
            false
        }
    }

    pub fn listening_mode_id(&self) -> Option<String> {
        self.state.read().unwrap().listening_mode_id.clone()
    }

    pub fn listening_mode(&self) -> Option<String> {
        self.state.read().unwrap().listening_mode.clone()
    }

    // ------------------------------------------------------------------------
    // Device information
    // ------------------------------------------------------------------------

    pub fn set_model(&self, model: &str) -> bool {
        let was = self
            .state
            .write()
            .unwrap()
            .model
            .replace(model.to_string());
        if was.as_deref() != Some(model) {
            info!("model: {was:?} -> {model}");
            self.emit(StateChange::DeviceInfoUpdated);
            true
        } else {
            false
        }
    }

    pub fn model(&self) -> Option<String> {
        self.state.read().unwrap().model.clone()
    }

    pub fn set_software_version(&self, version: &str) -> bool {
        let was = self
            .state
            .write()
            .unwrap()
            .software_version
            .replace(version.to_string());
        if was.as_deref() != Some(version) {
            info!("software version: {was:?} -> {version}");
            self.emit(StateChange::DeviceInfoUpdated);
            true
        } else {
            false
        }
    }

    pub fn software_version(&self) -> Option<String> {
        self.state.read().unwrap().software_version.clone()
    }

    pub fn set_mac_addr(&self, mac: &str) -> bool {
        let was = self.state.write().unwrap().mac_addr.replace(mac.to_string());
        if was.as_deref() != Some(mac) {
            info!("MAC address: {was:?} -> {mac}");
            self.emit(StateChange::DeviceInfoUpdated);
            true
        } else {
            false
        }
    }

    pub fn mac_addr(&self) -> Option<String> {
        self.state.read().unwrap().mac_addr.clone()
    }

    // ------------------------------------------------------------------------
    // Tuner
    // ------------------------------------------------------------------------

    pub fn set_tuner_frequency(&self, band: TunerBand, frequency: f64) -> bool {
        let changed = {
            let mut state = self.state.write().unwrap();
            let changed =
                state.tuner.band != Some(band) || state.tuner.frequency != Some(frequency);
            state.tuner.band = Some(band);
            state.tuner.frequency = Some(frequency);
            changed
        };
        if changed {
            info!("tuner: {frequency} {}", band.unit());
            self.emit(StateChange::TunerUpdated);
        }
        changed
    }

    pub fn set_tuner_preset(&self, preset: &str) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state.tuner.preset.replace(preset.to_string())
        };
        if was.as_deref() != Some(preset) {
            info!("tuner preset: {was:?} -> {preset}");
            self.emit(StateChange::TunerUpdated);
            true
        } else {
            false
        }
    }

    pub fn tuner(&self) -> TunerState {
        self.state.read().unwrap().tuner.clone()
    }

    // ------------------------------------------------------------------------
    // Tone, channel levels and setting topics
    // ------------------------------------------------------------------------

    pub fn set_tone_value(&self, zone: Zone, key: &str, value: &str) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state
                .tone
                .entry(zone)
                .or_default()
                .insert(key.to_string(), value.to_string())
        };
        if was.as_deref() != Some(value) {
            info!("{zone}: tone.{key}: {was:?} -> {value}");
            self.emit(StateChange::ToneChanged { zone });
            true
        } else {
            false
        }
    }

    pub fn tone(&self, zone: Zone) -> Option<BTreeMap<String, String>> {
        self.state.read().unwrap().tone.get(&zone).cloned()
    }

    pub fn set_channel_level(&self, zone: Zone, channel: &str, level: f64) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state
                .channel_level
                .entry(zone)
                .or_default()
                .insert(channel.to_string(), level)
        };
        if was != Some(level) {
            info!("{zone}: channel level {channel}: {was:?} -> {level}");
            true
        } else {
            false
        }
    }

    pub fn channel_levels(&self, zone: Zone) -> Option<BTreeMap<String, f64>> {
        self.state.read().unwrap().channel_level.get(&zone).cloned()
    }

    /// Update a value in one of the setting topics (`amp`, `dsp`, `video`,
    /// `audio`, `system`).
    pub fn set_setting(&self, topic: &'static str, key: &str, value: &str) -> bool {
        let was = {
            let mut state = self.state.write().unwrap();
            state
                .settings
                .entry(topic)
                .or_default()
                .insert(key.to_string(), value.to_string())
        };
        if was.as_deref() != Some(value) {
            info!("{topic}.{key}: {was:?} -> {value}");
            self.emit(StateChange::SettingChanged {
                topic: topic.to_string(),
                key: key.to_string(),
            });
            true
        } else {
            false
        }
    }

    pub fn setting(&self, topic: &str, key: &str) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .settings
            .get(topic)
            .and_then(|topic| topic.get(key))
            .cloned()
    }

    pub fn settings(&self, topic: &str) -> BTreeMap<String, String> {
        self.state
            .read()
            .unwrap()
            .settings
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the current audio input carries more than two channels.
    pub fn input_multichannel(&self) -> bool {
        self.setting("audio", "input_multichannel").as_deref() == Some("1")
    }

    // ------------------------------------------------------------------------
    // Source dictionary
    // ------------------------------------------------------------------------

    /// Replace the source dictionary with a name → id mapping.
    pub fn set_source_dict(&self, sources: HashMap<String, String>) {
        let mut state = self.state.write().unwrap();
        state.source_id_to_name = sources
            .iter()
            .map(|(name, id)| (id.clone(), name.clone()))
            .collect();
        state.source_name_to_id = sources;
    }

    /// Record one source name, as returned by a source-name query. Trailing
    /// spaces are trimmed.
    pub fn add_source(&self, source_id: &str, name: &str) {
        let name = name.trim_end().to_string();
        let mut state = self.state.write().unwrap();
        state
            .source_id_to_name
            .insert(source_id.to_string(), name.clone());
        state.source_name_to_id.insert(name, source_id.to_string());
    }

    /// Drop the name mapping for a source id.
    pub fn clear_source_id(&self, source_id: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(name) = state.source_id_to_name.remove(source_id) {
            state.source_name_to_id.remove(&name);
        }
    }

    /// Name → id mapping, restricted to a zone's valid sources when the zone
    /// has a configured source list.
    pub fn get_source_dict(&self, zone: Option<Zone>) -> HashMap<String, String> {
        let state = self.state.read().unwrap();
        let Some(zone) = zone else {
            return state.source_name_to_id.clone();
        };
        let zone_sources = self.params.zone_sources(zone);
        if zone_sources.is_empty() {
            return state.source_name_to_id.clone();
        }
        state
            .source_name_to_id
            .iter()
            .filter(|(_, id)| zone_sources.contains(id))
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect()
    }

    /// Source names selectable for a zone.
    pub fn get_source_list(&self, zone: Zone) -> Vec<String> {
        let state = self.state.read().unwrap();
        let zone_sources = self.params.zone_sources(zone);
        let mut names: Vec<String> = if zone_sources.is_empty() {
            state.source_name_to_id.keys().cloned().collect()
        } else {
            zone_sources
                .iter()
                .filter_map(|id| state.source_id_to_name.get(id).cloned())
                .collect()
        };
        names.sort();
        names
    }

    /// Name for a source id; falls back to the id when the dictionary has no
    /// entry (or is empty).
    pub fn get_source_name(&self, source_id: &str) -> String {
        let state = self.state.read().unwrap();
        state
            .source_id_to_name
            .get(source_id)
            .cloned()
            .unwrap_or_else(|| source_id.to_string())
    }

    /// All source ids carrying the given name. More than one id means the
    /// name is ambiguous and callers must select by id.
    pub fn source_ids_for_name(&self, name: &str) -> Vec<String> {
        let state = self.state.read().unwrap();
        let mut ids: Vec<String> = state
            .source_id_to_name
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Whether any source names are known.
    pub fn has_source_dict(&self) -> bool {
        !self.state.read().unwrap().source_id_to_name.is_empty()
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    /// Register an observer for a zone ([`Zone::All`] fires for every zone).
    pub fn register_zone_observer(&self, zone: Zone, observer: ZoneObserver) {
        self.observers.write().unwrap().push((zone, observer));
    }

    /// Remove all observers.
    pub fn clear_observers(&self) {
        self.observers.write().unwrap().clear();
    }

    /// Fire one callback per observer per touched zone. Panicking observers
    /// are logged and never propagate into the decoder path.
    pub fn notify_zones(&self, zones: &[Zone]) {
        if zones.is_empty() {
            return;
        }
        let observers = self.observers.read().unwrap().clone();
        for (target, observer) in &observers {
            for zone in zones {
                if *target == Zone::All || target == zone {
                    if catch_unwind(AssertUnwindSafe(|| observer(*zone))).is_err() {
                        error!("zone observer for {target} panicked");
                    }
                    if *target == Zone::All {
                        // All-observers coalesce to one callback per frame.
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn props() -> AvrProperties {
        AvrProperties::new(AvrParams::new())
    }

    #[test]
    fn test_zone_discovery() {
        let props = props();
        props.add_zone(Zone::Main, 185);
        props.add_zone(Zone::Zone2, 81);
        props.add_zone(Zone::Main, 185); // idempotent
        assert_eq!(props.zones(), vec![Zone::Main, Zone::Zone2]);
        assert_eq!(props.max_volume(Zone::Zone2), Some(81));
    }

    #[test]
    fn test_power_change_detection() {
        let props = props();
        let mut rx = props.subscribe_changes();

        assert!(props.set_power(Zone::Main, true));
        assert!(matches!(
            rx.try_recv(),
            Ok(StateChange::PowerChanged { zone: Zone::Main, on: true, was: None })
        ));

        // Same value emits nothing.
        assert!(!props.set_power(Zone::Main, true));
        assert!(rx.try_recv().is_err());

        assert!(props.set_power(Zone::Main, false));
        assert!(matches!(
            rx.try_recv(),
            Ok(StateChange::PowerChanged { on: false, was: Some(true), .. })
        ));
    }

    #[test]
    fn test_volume_widens_ceiling() {
        let props = props();
        props.add_zone(Zone::Zone2, 81);
        props.set_volume(Zone::Zone2, 90);
        assert_eq!(props.max_volume(Zone::Zone2), Some(90));
        assert_eq!(props.volume(Zone::Zone2), Some(90));
    }

    #[test]
    fn test_source_name_follows_dict() {
        let props = props();
        props.add_source("19", "HDMI1  ");
        props.set_source_id(Zone::Main, "19");
        assert_eq!(props.source_name(Zone::Main).as_deref(), Some("HDMI1"));

        // Unknown id clears the name.
        props.set_source_id(Zone::Main, "57");
        assert_eq!(props.source_name(Zone::Main), None);
    }

    #[test]
    fn test_media_control_mode_derived() {
        let props = props();
        props.set_source_id(Zone::Main, "26");
        assert_eq!(props.media_control_mode(Zone::Main).as_deref(), Some("NETWORK"));
        let controls = props.get_supported_media_controls(Zone::Main).unwrap();
        assert!(controls.contains(&"play".to_string()));

        props.set_source_id(Zone::Main, "25");
        assert_eq!(props.get_supported_media_controls(Zone::Main), None);
    }

    #[test]
    fn test_ambiguous_source_names() {
        let props = props();
        props.add_source("19", "HDMI");
        props.add_source("20", "HDMI");
        assert_eq!(props.source_ids_for_name("HDMI"), vec!["19", "20"]);
        assert_eq!(props.source_ids_for_name("PHONO"), Vec::<String>::new());
    }

    #[test]
    fn test_source_dict_round_trip() {
        let props = props();
        let mut dict = HashMap::new();
        dict.insert("CD".to_string(), "01".to_string());
        dict.insert("TV".to_string(), "05".to_string());
        props.set_source_dict(dict.clone());
        assert_eq!(props.get_source_dict(None), dict);
        assert_eq!(props.get_source_name("05"), "TV");
    }

    #[test]
    fn test_zone_source_list_filtering() {
        let props = props();
        props.add_source("01", "CD");
        props.add_source("25", "BD");
        // Zone 2 defaults include "01" but not "25".
        let list = props.get_source_list(Zone::Zone2);
        assert!(list.contains(&"CD".to_string()));
        assert!(!list.contains(&"BD".to_string()));
    }

    #[test]
    fn test_observer_coalescing() {
        let props = props();
        let count = Arc::new(AtomicUsize::new(0));
        let all_count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        props.register_zone_observer(
            Zone::Zone2,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let c = all_count.clone();
        props.register_zone_observer(
            Zone::All,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        props.notify_zones(&[Zone::Main, Zone::Zone2]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(all_count.load(Ordering::SeqCst), 1);

        props.notify_zones(&[Zone::Main]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(all_count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_observer_panic_is_contained() {
        let props = props();
        props.register_zone_observer(Zone::All, Arc::new(|_| panic!("boom")));
        // Must not propagate.
        props.notify_zones(&[Zone::Main]);
    }

    #[test]
    fn test_clear_observers() {
        let props = props();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        props.register_zone_observer(
            Zone::All,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        props.clear_observers();
        props.notify_zones(&[Zone::Main]);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tuner_state() {
        let props = props();
        assert!(props.set_tuner_frequency(TunerBand::Fm, 87.5));
        assert!(!props.set_tuner_frequency(TunerBand::Fm, 87.5));
        assert!(props.set_tuner_frequency(TunerBand::Fm, 87.6));
        let tuner = props.tuner();
        assert_eq!(tuner.band, Some(TunerBand::Fm));
        assert_eq!(tuner.frequency, Some(87.6));
    }
}
