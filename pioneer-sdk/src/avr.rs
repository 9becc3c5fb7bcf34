//! The AVR operation facade.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use pioneer_api::tables::{
    name_to_code, CHANNELS, DIMMER_MODES, PANEL_LOCK_MODES, TONE_MODES, VIDEO_RESOLUTION_MODES,
};
use pioneer_api::{TunerBand, Zone, SOURCE_TUNER};
use pioneer_session::{AvrSession, CommandItem, CommandOutcome, SessionError};
use pioneer_state::{
    AvrParams, AvrProperties, DecoderRegistry, ParamError, ParamKey, ParamValue, ZoneObserver,
};

use crate::error::SdkError;

/// FM tuning grid in MHz.
const FM_STEP: f64 = 0.05;

/// Watchdog for the step-tuning fallback.
const MAX_TUNER_STEPS: u32 = 100;

/// Select an input source by id or by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelect {
    Id(String),
    Name(String),
}

impl SourceSelect {
    pub fn id(id: impl Into<String>) -> Self {
        SourceSelect::Id(id.into())
    }
}

impl From<u8> for SourceSelect {
    fn from(id: u8) -> Self {
        SourceSelect::Id(format!("{id:02}"))
    }
}

impl From<&str> for SourceSelect {
    fn from(name: &str) -> Self {
        SourceSelect::Name(name.to_string())
    }
}

impl From<String> for SourceSelect {
    fn from(name: String) -> Self {
        SourceSelect::Name(name)
    }
}

/// Select a listening mode by id or by display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListeningModeSelect {
    Id(String),
    Name(String),
}

impl ListeningModeSelect {
    pub fn id(id: impl Into<String>) -> Self {
        ListeningModeSelect::Id(id.into())
    }
}

impl From<&str> for ListeningModeSelect {
    fn from(name: &str) -> Self {
        ListeningModeSelect::Name(name.to_string())
    }
}

impl From<String> for ListeningModeSelect {
    fn from(name: String) -> Self {
        ListeningModeSelect::Name(name)
    }
}

/// High-level client for one Pioneer AVR.
///
/// Owns the parameters, the property cache and the session. Cheap to clone;
/// clones share all state.
#[derive(Clone)]
pub struct PioneerAvr {
    params: AvrParams,
    properties: AvrProperties,
    session: AvrSession,
}

impl PioneerAvr {
    /// Create a client for `host:port` with default parameters.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let params = AvrParams::new();
        let properties = AvrProperties::new(params.clone());
        let registry = DecoderRegistry::with_defaults();
        let session = AvrSession::new(host, port, params.clone(), properties.clone(), registry);
        Self {
            params,
            properties,
            session,
        }
    }

    /// Create a client with user parameter overrides.
    pub fn with_params(
        host: impl Into<String>,
        port: u16,
        user_params: impl IntoIterator<Item = (ParamKey, ParamValue)>,
    ) -> Result<Self, ParamError> {
        let avr = Self::new(host, port);
        avr.params.set_user_params(user_params)?;
        Ok(avr)
    }

    pub fn params(&self) -> &AvrParams {
        &self.params
    }

    pub fn properties(&self) -> &AvrProperties {
        &self.properties
    }

    pub fn session(&self) -> &AvrSession {
        &self.session
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Connect and wait for the session to become ready (zones discovered,
    /// first basic query round done).
    ///
    /// With `reconnect` enabled a failed dial hands over to the reconnect
    /// supervisor and `connect` returns `Ok`; without it, dial errors are
    /// returned synchronously.
    pub async fn connect(&self, reconnect: bool) -> Result<(), SdkError> {
        self.session.connect(reconnect).await?;
        let mut state_rx = self.session.subscribe_state();
        let wait_ready = state_rx.wait_for(|state| {
            matches!(
                state,
                pioneer_session::SessionState::Ready
                    | pioneer_session::SessionState::Disconnected
                    | pioneer_session::SessionState::Reconnecting
                    | pioneer_session::SessionState::Shutdown
            )
        });
        let deadline = self.params.timeout() * 4 + Duration::from_secs(1);
        let result = tokio::time::timeout(deadline, wait_ready).await;
        let outcome = match result {
            Ok(Ok(state)) if *state == pioneer_session::SessionState::Ready => Ok(()),
            _ if reconnect => Ok(()),
            _ => Err(SessionError::ConnectionFailed(
                "session did not become ready".to_string(),
            )
            .into()),
        };
        outcome
    }

    /// Close the connection; `reconnect` updates the supervisor policy,
    /// `None` keeps it.
    pub async fn disconnect(&self, reconnect: Option<bool>) {
        self.session.disconnect(reconnect).await;
    }

    /// Permanently close the session and stop all background tasks.
    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }

    /// True when the session is connected and ready.
    pub fn available(&self) -> bool {
        self.session.available()
    }

    /// Update the response timeout. In-flight requests keep the deadline
    /// they were issued with.
    pub fn set_timeout(&self, timeout: Duration) -> Result<(), ParamError> {
        self.params
            .set_user_param(ParamKey::Timeout, ParamValue::Float(timeout.as_secs_f64()))
    }

    /// Update the poll period of the refresh scheduler.
    pub fn set_scan_interval(&self, interval: Duration) -> Result<(), ParamError> {
        self.params.set_user_param(
            ParamKey::ScanInterval,
            ParamValue::Float(interval.as_secs_f64()),
        )
    }

    // ------------------------------------------------------------------------
    // Observers and refresh
    // ------------------------------------------------------------------------

    /// Register an observer fired when a zone's state changes
    /// ([`Zone::All`] observes every zone). Observers must not block.
    pub fn register_zone_observer(&self, zone: Zone, observer: ZoneObserver) {
        self.properties.register_zone_observer(zone, observer);
    }

    pub fn clear_observers(&self) {
        self.properties.clear_observers();
    }

    /// Queue a refresh for the given zones (all zones by default) and
    /// optionally wait for it to complete.
    pub async fn refresh(&self, zones: Option<&[Zone]>, wait: bool) -> Result<(), SdkError> {
        self.session.refresh(zones, wait).await.map_err(Into::into)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn ensure_available(&self) -> Result<(), SdkError> {
        if self.session.available() {
            Ok(())
        } else {
            Err(SessionError::Unavailable.into())
        }
    }

    fn check_zone(&self, zone: Zone) -> Result<(), SdkError> {
        if self.properties.has_zone(zone) {
            Ok(())
        } else {
            Err(SdkError::UnknownZone(zone))
        }
    }

    /// Queue an item and await its completion. Items dropped by a skip rule
    /// count as acknowledged.
    async fn run_queued(&self, item: CommandItem) -> Result<CommandOutcome, SdkError> {
        match self.session.enqueue(item) {
            Some(rx) => match rx.await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(SessionError::Cancelled.into()),
            },
            None => Ok(CommandOutcome::Ack),
        }
    }

    // ------------------------------------------------------------------------
    // Power
    // ------------------------------------------------------------------------

    pub async fn power_on(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("turn_on").arg(zone).skip_if_queued(true))
            .await?;
        if zone == Zone::Main && self.params.power_on_volume_bounce() {
            // Some models report a stale volume after power-on until the
            // volume is moved.
            info!("scheduling main zone volume bounce");
            let _ = self
                .session
                .enqueue(CommandItem::new("volume_up").arg(zone).insert_at(0));
            let _ = self
                .session
                .enqueue(CommandItem::new("volume_down").arg(zone).insert_at(1));
        }
        Ok(())
    }

    pub async fn power_off(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("turn_off").arg(zone).skip_if_queued(true))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Volume and mute
    // ------------------------------------------------------------------------

    pub async fn volume_up(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("volume_up").arg(zone)).await?;
        Ok(())
    }

    pub async fn volume_down(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("volume_down").arg(zone)).await?;
        Ok(())
    }

    /// Set a zone's volume (0..=185 for Main, 0..=81 for the other zones
    /// unless overridden by parameters).
    ///
    /// With the `volume_step_only` parameter set, the target is reached by a
    /// deterministic sequence of step commands pushed at the head of the
    /// queue.
    pub async fn set_volume_level(&self, volume: i64, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        let max = self
            .properties
            .max_volume(zone)
            .unwrap_or_else(|| self.params.max_volume(zone));
        if volume < 0 || volume > max {
            return Err(SdkError::VolumeOutOfRange { zone, volume, max });
        }

        if self.params.volume_step_only() {
            let current = match self.properties.volume(zone) {
                Some(current) => current,
                None => {
                    self.session
                        .send_command("query_volume", zone, "", "", true)
                        .await?;
                    self.properties.volume(zone).ok_or_else(|| {
                        SdkError::InvalidArgument(format!("current volume unknown for {zone}"))
                    })?
                }
            };
            let steps = volume - current;
            let command = if steps >= 0 { "volume_up" } else { "volume_down" };
            debug!("stepping volume {current} -> {volume} on {zone}");
            let mut last_rx = None;
            for position in 0..steps.unsigned_abs() {
                last_rx = self.session.enqueue(
                    CommandItem::new(command)
                        .arg(zone)
                        .insert_at(position as isize),
                );
            }
            if let Some(rx) = last_rx {
                match rx.await {
                    Ok(result) => {
                        result?;
                    }
                    Err(_) => return Err(SessionError::Cancelled.into()),
                }
            }
            return Ok(());
        }

        let width: usize = if zone == Zone::Main { 3 } else { 2 };
        let prefix = format!("{volume:0width$}");
        self.run_queued(
            CommandItem::new("set_volume_level")
                .arg(zone)
                .arg(prefix.as_str()),
        )
        .await?;
        Ok(())
    }

    pub async fn mute_on(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("mute_on").arg(zone)).await?;
        Ok(())
    }

    pub async fn mute_off(&self, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        self.run_queued(CommandItem::new("mute_off").arg(zone)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Sources
    // ------------------------------------------------------------------------

    /// Select an input source by id or name. Ambiguous names are rejected;
    /// disambiguate by id.
    pub async fn select_source(
        &self,
        source: impl Into<SourceSelect>,
        zone: Zone,
    ) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        let source_id = match source.into() {
            SourceSelect::Id(id) => {
                if self.properties.has_source_dict() && self.properties.get_source_name(&id) == id {
                    debug!("source id {id} has no name mapping");
                }
                id
            }
            SourceSelect::Name(name) => {
                let ids = self.properties.source_ids_for_name(&name);
                match ids.len() {
                    0 => return Err(SdkError::UnknownSource(name)),
                    1 => ids.into_iter().next().unwrap(),
                    _ => return Err(SdkError::AmbiguousSource(name)),
                }
            }
        };
        let allowed = self.params.zone_sources(zone);
        if !allowed.is_empty() && !allowed.contains(&source_id) {
            return Err(SdkError::UnknownSource(source_id));
        }
        self.run_queued(
            CommandItem::new("select_source")
                .arg(zone)
                .arg(source_id.as_str()),
        )
        .await?;
        Ok(())
    }

    /// Source names selectable for a zone.
    pub fn get_source_list(&self, zone: Zone) -> Vec<String> {
        self.properties.get_source_list(zone)
    }

    /// Source name → id mapping, optionally restricted to a zone.
    pub fn get_source_dict(&self, zone: Option<Zone>) -> HashMap<String, String> {
        self.properties.get_source_dict(zone)
    }

    pub fn get_source_name(&self, source_id: &str) -> String {
        self.properties.get_source_name(source_id)
    }

    /// Manually install the source dictionary, disabling source queries.
    pub fn set_source_dict(&self, sources: HashMap<String, String>) {
        self.params
            .set_runtime_param(ParamKey::QuerySources, ParamValue::Bool(false));
        self.properties.set_source_dict(sources);
    }

    /// Query the AVR for all source names (ids `0..=max_source_id`).
    /// Individual query failures are tolerated; ids the AVR does not name
    /// fall back to the well-known default source table.
    pub async fn build_source_dict(&self) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.params
            .set_runtime_param(ParamKey::QuerySources, ParamValue::Bool(true));
        self.properties.set_source_dict(HashMap::new());
        self.session.wait().await;
        info!("querying AVR source names");
        let max_source_id = self.params.max_source_id();
        for id in 0..=max_source_id {
            let suffix = format!("{id:02}");
            match self
                .session
                .send_command("query_source_name", Zone::Main, "", &suffix, false)
                .await
            {
                Ok(_)
                | Err(SessionError::Device { .. } | SessionError::ResponseTimeout { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        for (id, name) in pioneer_api::DEFAULT_SOURCES.iter().copied() {
            let in_range = id
                .parse::<i64>()
                .map(|numeric| numeric <= max_source_id)
                .unwrap_or(false);
            if in_range && self.properties.get_source_name(id) == id {
                self.properties.add_source(id, name);
            }
        }
        if !self.properties.has_source_dict() {
            warn!("no input sources found on AVR");
        }
        Ok(())
    }

    /// Media control actions supported by the zone's current source.
    pub fn get_supported_media_controls(&self, zone: Zone) -> Option<Vec<String>> {
        self.properties.get_supported_media_controls(zone)
    }

    /// Run a transport action (play, pause, stop, ...) for the zone's
    /// current source.
    pub async fn media_control(&self, action: &str, zone: Zone) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        let mode = self.properties.media_control_mode(zone).ok_or_else(|| {
            SdkError::InvalidArgument(format!("current source on {zone} has no media controls"))
        })?;
        let command = pioneer_api::media_control_actions(&mode)
            .and_then(|actions| {
                actions
                    .iter()
                    .find(|(name, _)| *name == action)
                    .map(|(_, command)| *command)
            })
            .ok_or_else(|| {
                SdkError::InvalidArgument(format!("action {action} not supported by {mode}"))
            })?;
        // Transport commands are not zone-scoped; they always go to Main.
        self.run_queued(CommandItem::new(command).arg(Zone::Main)).await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Listening modes
    // ------------------------------------------------------------------------

    /// Listening modes selectable for the current input (id → name).
    pub fn get_listening_modes(&self) -> BTreeMap<String, String> {
        let multichannel = self.properties.input_multichannel();
        self.params
            .available_listening_modes()
            .into_iter()
            .filter(|(_, def)| {
                if multichannel {
                    def.multi_channel
                } else {
                    def.two_channel
                }
            })
            .map(|(id, def)| (id, def.name))
            .collect()
    }

    /// Select a listening mode by id or display name.
    pub async fn select_listening_mode(
        &self,
        mode: impl Into<ListeningModeSelect>,
    ) -> Result<(), SdkError> {
        self.ensure_available()?;
        let modes = self.get_listening_modes();
        let mode_id = match mode.into() {
            ListeningModeSelect::Id(id) => {
                if !modes.contains_key(&id) {
                    return Err(SdkError::UnknownListeningMode(id));
                }
                id
            }
            ListeningModeSelect::Name(name) => modes
                .iter()
                .find(|(_, mode_name)| mode_name.as_str() == name)
                .map(|(id, _)| id.clone())
                .ok_or(SdkError::UnknownListeningMode(name))?,
        };
        self.run_queued(
            CommandItem::new("set_listening_mode")
                .arg(Zone::Main)
                .arg(mode_id.as_str()),
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tuner
    // ------------------------------------------------------------------------

    fn tuner_selected(&self) -> bool {
        Zone::DEVICE_ZONES
            .iter()
            .any(|zone| self.properties.source_id(*zone).as_deref() == Some(SOURCE_TUNER))
    }

    /// Select the tuner band. Selecting AM schedules an AM-step measurement
    /// when the step is still unknown.
    pub async fn select_tuner_band(&self, band: TunerBand) -> Result<(), SdkError> {
        self.ensure_available()?;
        if !self.tuner_selected() {
            return Err(SdkError::TunerUnavailable);
        }
        if self.properties.tuner().band == Some(band) {
            return Ok(());
        }
        let command = match band {
            TunerBand::Am => "set_tuner_band_am",
            TunerBand::Fm => "set_tuner_band_fm",
        };
        self.run_queued(CommandItem::new(command).arg(Zone::Main)).await?;
        if band == TunerBand::Am && self.params.am_frequency_step().is_none() {
            let _ = self.session.enqueue(
                CommandItem::new("_calculate_am_frequency_step").skip_if_queued(true),
            );
        }
        Ok(())
    }

    /// Tune to a frequency (MHz for FM, kHz for AM). Uses direct digit entry
    /// when the model supports it and falls back to stepping otherwise.
    pub async fn set_tuner_frequency(
        &self,
        band: TunerBand,
        frequency: f64,
    ) -> Result<(), SdkError> {
        if !band.contains(frequency) {
            return Err(SdkError::FrequencyOutOfRange { band, frequency });
        }
        self.select_tuner_band(band).await?;
        self.session.wait().await; // let a pending AM step measurement finish

        match self
            .session
            .send_command("operation_direct_access", Zone::Main, "", "", true)
            .await
        {
            Ok(_) => self.enter_frequency_digits(band, frequency).await,
            Err(SessionError::Device { .. }) => {
                debug!("direct frequency entry unsupported, stepping instead");
                self.step_tuner_frequency(band, frequency).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn enter_frequency_digits(
        &self,
        band: TunerBand,
        frequency: f64,
    ) -> Result<(), SdkError> {
        let digits = match band {
            TunerBand::Fm => format!("{}", (frequency * 100.0).round() as i64),
            TunerBand::Am => format!("{}", frequency.round() as i64),
        };
        for digit in digits.chars() {
            self.session
                .send_command(
                    "operation_tuner_digit",
                    Zone::Main,
                    &digit.to_string(),
                    "",
                    true,
                )
                .await?;
        }
        Ok(())
    }

    async fn step_tuner_frequency(
        &self,
        band: TunerBand,
        frequency: f64,
    ) -> Result<(), SdkError> {
        let target = match band {
            TunerBand::Am => {
                let step = self.params.am_frequency_step().ok_or_else(|| {
                    SdkError::InvalidArgument(
                        "AM frequency step unknown; set the am_frequency_step parameter"
                            .to_string(),
                    )
                })?;
                (frequency / step).trunc() * step
            }
            TunerBand::Fm => (frequency / FM_STEP).round() * FM_STEP,
        };
        let read_current = || {
            self.properties
                .tuner()
                .frequency
                .ok_or(SdkError::TunerUnavailable)
        };
        let mut current = read_current()?;
        let epsilon = 1e-4;
        let mut budget = MAX_TUNER_STEPS;
        while current + epsilon < target && budget > 0 {
            self.session
                .send_command("increase_tuner_frequency", Zone::Main, "", "", true)
                .await?;
            current = read_current()?;
            budget -= 1;
        }
        while current - epsilon > target && budget > 0 {
            self.session
                .send_command("decrease_tuner_frequency", Zone::Main, "", "", true)
                .await?;
            current = read_current()?;
            budget -= 1;
        }
        if budget == 0 {
            return Err(SdkError::InvalidArgument(
                "maximum tuner step count exceeded".to_string(),
            ));
        }
        Ok(())
    }

    /// Select a tuner preset, e.g. class `'A'`, preset `1`.
    pub async fn select_tuner_preset(&self, class: char, preset: u8) -> Result<(), SdkError> {
        self.ensure_available()?;
        if !class.is_ascii_alphabetic() {
            return Err(SdkError::InvalidArgument(format!(
                "invalid tuner preset class: {class}"
            )));
        }
        let prefix = format!("{}{preset:02}", class.to_ascii_uppercase());
        self.run_queued(
            CommandItem::new("select_tuner_preset")
                .arg(Zone::Main)
                .arg(prefix.as_str()),
        )
        .await?;
        Ok(())
    }

    pub async fn tuner_next_preset(&self) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.run_queued(CommandItem::new("increase_tuner_preset").arg(Zone::Main))
            .await?;
        Ok(())
    }

    pub async fn tuner_previous_preset(&self) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.run_queued(CommandItem::new("decrease_tuner_preset").arg(Zone::Main))
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Tone, amp and video settings
    // ------------------------------------------------------------------------

    /// Set the tone mode and, when tone controls are on, treble/bass in dB
    /// (−6..=6).
    pub async fn set_tone_settings(
        &self,
        mode: Option<&str>,
        treble: Option<i64>,
        bass: Option<i64>,
        zone: Zone,
    ) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        let tone = self.properties.tone(zone).ok_or_else(|| {
            SdkError::InvalidArgument(format!("tone controls are not available for {zone}"))
        })?;
        for value in [treble, bass].into_iter().flatten() {
            if !(-6..=6).contains(&value) {
                return Err(SdkError::InvalidArgument(format!(
                    "tone value {value} out of range (-6..=6)"
                )));
            }
        }

        if let Some(mode) = mode {
            let code = name_to_code(TONE_MODES, mode).ok_or_else(|| {
                SdkError::InvalidArgument(format!("invalid tone mode: {mode}"))
            })?;
            self.run_queued(CommandItem::new("set_tone_mode").arg(zone).arg(code))
                .await?;
        }

        let tone_on = mode == Some("On") || tone.get("status").map(String::as_str) == Some("On");
        if tone_on {
            if let Some(treble) = treble {
                let code = format!("{:02}", 6 - treble);
                self.run_queued(
                    CommandItem::new("set_tone_treble")
                        .arg(zone)
                        .arg(code.as_str()),
                )
                .await?;
            }
            if let Some(bass) = bass {
                let code = format!("{:02}", 6 - bass);
                self.run_queued(
                    CommandItem::new("set_tone_bass").arg(zone).arg(code.as_str()),
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Set the front display dimmer (`Brightest`, `Bright`, `Dark`, `Off`).
    pub async fn set_dimmer(&self, dimmer: &str) -> Result<(), SdkError> {
        self.ensure_available()?;
        let code = name_to_code(DIMMER_MODES, dimmer)
            .ok_or_else(|| SdkError::InvalidArgument(format!("invalid dimmer mode: {dimmer}")))?;
        self.run_queued(CommandItem::new("set_amp_dimmer").arg(Zone::Main).arg(code))
            .await?;
        Ok(())
    }

    pub async fn set_panel_lock(&self, panel_lock: &str) -> Result<(), SdkError> {
        self.ensure_available()?;
        let code = name_to_code(PANEL_LOCK_MODES, panel_lock).ok_or_else(|| {
            SdkError::InvalidArgument(format!("invalid panel lock mode: {panel_lock}"))
        })?;
        self.run_queued(
            CommandItem::new("set_amp_panel_lock")
                .arg(Zone::Main)
                .arg(code),
        )
        .await?;
        Ok(())
    }

    pub async fn set_remote_lock(&self, locked: bool) -> Result<(), SdkError> {
        self.ensure_available()?;
        let code = if locked { "1" } else { "0" };
        self.run_queued(
            CommandItem::new("set_amp_remote_lock")
                .arg(Zone::Main)
                .arg(code),
        )
        .await?;
        Ok(())
    }

    /// Set the output resolution by display name (validated against the
    /// `video_resolution_modes` parameter).
    pub async fn set_video_resolution(&self, resolution: &str) -> Result<(), SdkError> {
        self.ensure_available()?;
        let code = name_to_code(VIDEO_RESOLUTION_MODES, resolution).ok_or_else(|| {
            SdkError::InvalidArgument(format!("invalid video resolution: {resolution}"))
        })?;
        let supported = self
            .params
            .get(&ParamKey::VideoResolutionModes)
            .and_then(|value| value.as_str_list().map(<[String]>::to_vec))
            .unwrap_or_default();
        if !supported.iter().any(|mode| mode == code) {
            return Err(SdkError::InvalidArgument(format!(
                "resolution {resolution} not supported by current configuration"
            )));
        }
        self.run_queued(
            CommandItem::new("set_video_resolution")
                .arg(Zone::Main)
                .arg(code),
        )
        .await?;
        Ok(())
    }

    /// Set an amplifier channel level in dB (−6.0..=6.0, half-dB steps).
    pub async fn set_channel_level(
        &self,
        channel: &str,
        level: f64,
        zone: Zone,
    ) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.check_zone(zone)?;
        let channel = channel.to_ascii_uppercase();
        if !CHANNELS.contains(&channel.as_str()) {
            return Err(SdkError::InvalidArgument(format!(
                "invalid channel: {channel}"
            )));
        }
        if !(-6.0..=6.0).contains(&level) {
            return Err(SdkError::InvalidArgument(format!(
                "channel level {level} out of range (-6.0..=6.0)"
            )));
        }
        let wire = (level * 2.0).round() as i64 + 50;
        let prefix = format!("{channel:_<3}{wire}");
        self.run_queued(
            CommandItem::new("set_channel_levels")
                .arg(zone)
                .arg(prefix.as_str()),
        )
        .await?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Device information and escape hatches
    // ------------------------------------------------------------------------

    /// Queue the device information queries (model, software version, MAC)
    /// and the model profile resolution.
    pub async fn query_device_info(&self) -> Result<(), SdkError> {
        self.ensure_available()?;
        self.run_queued(CommandItem::new("_query_device_info").skip_if_queued(true))
            .await?;
        Ok(())
    }

    /// Send a command from the code table.
    ///
    /// `ignore_error` demotes device errors and timeouts to `Ok(None)`:
    /// `Some(true)` logs them at debug, `Some(false)` at error level.
    pub async fn send_command(
        &self,
        command: &str,
        zone: Zone,
        prefix: &str,
        suffix: &str,
        ignore_error: Option<bool>,
        rate_limit: bool,
    ) -> Result<Option<CommandOutcome>, SdkError> {
        match self
            .session
            .send_command(command, zone, prefix, suffix, rate_limit)
            .await
        {
            Ok(outcome) => Ok(Some(outcome)),
            Err(err) => match ignore_error {
                None => Err(err.into()),
                Some(quiet) => {
                    if quiet {
                        debug!("AVR command {command} failed: {err}");
                    } else {
                        error!("AVR command {command} failed: {err}");
                    }
                    Ok(None)
                }
            },
        }
    }

    /// Send a raw frame without awaiting a response.
    pub async fn send_raw_command(&self, command: &str, rate_limit: bool) -> Result<(), SdkError> {
        self.session
            .send_raw_command(command, rate_limit)
            .await
            .map_err(Into::into)
    }

    /// Send a raw frame and await the response with the given prefix.
    /// Always raises on failure.
    pub async fn send_raw_request(
        &self,
        command: &str,
        response_prefix: &str,
        rate_limit: bool,
    ) -> Result<String, SdkError> {
        self.session
            .send_raw_request(command, response_prefix, rate_limit)
            .await
            .map_err(Into::into)
    }
}
