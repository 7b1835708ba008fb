use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::notify::{Notification, Notifications};
use crate::api::{Device, DeviceApi, DeviceSettings, DeviceSummary};
use crate::audio::OutputFactory;
use crate::error::{PipelineError, PipelineResult};
use crate::nats::{stream_subject, SourceFactory};
use crate::playback::{
    PlaybackConfig, PlaybackSession, SchedulerState, SessionStats, MAX_SAMPLE_RATE,
    MIN_SAMPLE_RATE,
};

/// Snapshot of what the user sees
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub is_playing: bool,
    pub device: Option<String>,
    pub settings: DeviceSettings,
    pub state: SchedulerState,
    /// Live stats while playing, otherwise those of the last session
    pub session: Option<SessionStats>,
}

/// Owns the playing flag, the device selection and the single active
/// playback session.
///
/// Every transition that replaces the session waits until the previous
/// one has released its subscription and output unit.
pub struct PlaybackController {
    api: Arc<dyn DeviceApi>,
    sources: Arc<dyn SourceFactory>,
    outputs: Arc<dyn OutputFactory>,
    playback: PlaybackConfig,
    namespace: String,
    session: Option<PlaybackSession>,
    selected: Option<String>,
    device: Option<Device>,
    settings: DeviceSettings,
    last_stats: Option<SessionStats>,
    notifications: Notifications,
}

impl PlaybackController {
    pub fn new(
        api: Arc<dyn DeviceApi>,
        sources: Arc<dyn SourceFactory>,
        outputs: Arc<dyn OutputFactory>,
        playback: PlaybackConfig,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            api,
            sources,
            outputs,
            playback,
            namespace: namespace.into(),
            session: None,
            selected: None,
            device: None,
            settings: DeviceSettings::default(),
            last_stats: None,
            notifications: Notifications::default(),
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Start playing `device`'s stream.
    ///
    /// A session already playing the same device is kept; one playing a
    /// different device is fully stopped first.
    pub async fn start(&mut self, device: &str) -> PipelineResult<()> {
        if let Some(session) = &self.session {
            if session.device() == device && !session.is_finished() {
                info!("Already playing {}", device);
                return Ok(());
            }
        }
        self.stop().await;

        let subject = match stream_subject(&self.namespace, device) {
            Ok(subject) => subject,
            Err(e) => {
                self.notifications.error(format!("Cannot play {}: {}", device, e));
                return Err(e);
            }
        };

        let config = self.session_config(device);
        match PlaybackSession::start(
            device,
            &subject,
            config,
            self.sources.as_ref(),
            Arc::clone(&self.outputs),
        )
        .await
        {
            Ok(session) => {
                self.session = Some(session);
                self.notifications.info(format!("Playing {}", device));
                Ok(())
            }
            Err(e) => {
                self.notifications
                    .error(format!("Failed to start playback of {}: {}", device, e));
                Err(e)
            }
        }
    }

    /// Stop playback and release the session's resources.
    ///
    /// Returns the final stats, or `None` if nothing was playing.
    pub async fn stop(&mut self) -> Option<SessionStats> {
        let mut session = self.session.take()?;

        let stats = session.stop().await;
        match session.take_error() {
            Some(e) if e.is_audio_path() => self
                .notifications
                .error(format!("Playback of {} aborted: {}", session.device(), e)),
            Some(e) => self
                .notifications
                .error(format!("Playback of {} stopped: {}", session.device(), e)),
            None => {}
        }

        self.last_stats = Some(stats.clone());
        Some(stats)
    }

    /// The play/stop button: returns whether playback is now active
    pub async fn toggle(&mut self) -> PipelineResult<bool> {
        if self.is_playing() {
            self.stop().await;
            return Ok(false);
        }

        let Some(device) = self.selected.clone() else {
            self.notifications.error("Select a device before playing");
            return Err(PipelineError::NoDeviceSelected);
        };
        self.start(&device).await?;
        Ok(true)
    }

    /// Tear down a session that ended on its own (fatal error or drained).
    ///
    /// Returns true if a session was reaped.
    pub async fn reap(&mut self) -> bool {
        let finished = self.session.as_ref().is_some_and(|s| s.is_finished());
        if !finished {
            return false;
        }

        if let Some(device) = self.playing_device() {
            warn!("Playback of {} ended on its own; cleaning up", device);
        }
        self.stop().await;
        true
    }

    fn session_config(&self, device: &str) -> PlaybackConfig {
        if !self.playback.follow_device_rate {
            return self.playback.clone();
        }

        match &self.device {
            Some(known)
                if known.name == device
                    && (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&known.resample_rate) =>
            {
                self.playback.with_output_rate(known.resample_rate)
            }
            _ => self.playback.clone(),
        }
    }

    // ========================================================================
    // Device selection and configuration
    // ========================================================================

    pub async fn list_devices(&mut self) -> PipelineResult<Vec<DeviceSummary>> {
        match self.api.list_devices().await {
            Ok(devices) => Ok(devices),
            Err(e) => {
                self.notifications
                    .error(format!("Error fetching FM devices: {}", e));
                Err(e)
            }
        }
    }

    /// Select the first registered device if nothing is selected yet
    pub async fn select_default(&mut self) -> PipelineResult<Option<String>> {
        if self.selected.is_some() {
            return Ok(self.selected.clone());
        }

        let devices = self.list_devices().await?;
        let Some(first) = devices.first() else {
            self.notifications.info("No FM devices registered");
            return Ok(None);
        };

        let name = first.name.clone();
        self.switch_device(&name).await?;
        Ok(Some(name))
    }

    /// Stop playback, select `name` and show its reported settings.
    ///
    /// Playback stays stopped afterwards. An unknown device is an empty
    /// state with neutral settings, not an error.
    pub async fn switch_device(&mut self, name: &str) -> PipelineResult<()> {
        self.stop().await;

        info!("Switching to device {}", name);
        self.selected = Some(name.to_string());
        self.load_device(name).await
    }

    /// Re-read the selected device and reset the displayed fields
    pub async fn reset(&mut self) -> PipelineResult<()> {
        let Some(name) = self.selected.clone() else {
            self.notifications.error("No device selected");
            return Err(PipelineError::NoDeviceSelected);
        };
        self.load_device(&name).await
    }

    async fn load_device(&mut self, name: &str) -> PipelineResult<()> {
        self.device = None;
        self.settings = DeviceSettings::default();

        let record = match self.api.get_device(name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                self.notifications.info(format!("Device {} not found", name));
                return Ok(());
            }
            Err(e) => {
                self.notifications
                    .error(format!("Error fetching device {}: {}", name, e));
                return Err(e);
            }
        };

        match Device::try_from(&record) {
            Ok(device) => {
                self.settings = DeviceSettings::from_device(&device);
                self.device = Some(device);
                Ok(())
            }
            Err(e) => {
                self.notifications.error(e.to_string());
                Err(e)
            }
        }
    }

    /// Push new settings for the selected device.
    ///
    /// On success the local settings are replaced and playback of that
    /// device stops (its in-flight stream no longer matches). On failure
    /// local state is left as it was.
    pub async fn modify(&mut self, settings: DeviceSettings) -> PipelineResult<()> {
        let Some(name) = self.selected.clone() else {
            self.notifications.error("No device selected");
            return Err(PipelineError::NoDeviceSelected);
        };

        if let Err(e) = settings.validate() {
            self.notifications
                .error(format!("Error updating {}: {}", name, e));
            return Err(e);
        }

        if let Err(e) = self.api.update_device(&name, &settings.to_update()).await {
            self.notifications
                .error(format!("Error updating {}: {}", name, e));
            return Err(e);
        }

        self.settings = settings;
        self.device = Some(Device {
            name: name.clone(),
            frequency: settings.freq_mhz * 1_000_000.0,
            sample_rate: (settings.sample_rate_khz * 1000.0).round() as u32,
            resample_rate: (settings.resample_rate_khz * 1000.0).round() as u32,
        });

        if self.playing_device() == Some(name.as_str()) {
            self.stop().await;
        }

        self.notifications
            .success(format!("Device {} updated", name));
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    /// Device whose stream is currently playing
    pub fn playing_device(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.device())
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn device(&self) -> Option<&Device> {
        self.device.as_ref()
    }

    pub fn settings(&self) -> DeviceSettings {
        self.settings
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn status(&self) -> ControllerStatus {
        let live = self.session.as_ref().map(|s| s.stats());
        let state = live
            .as_ref()
            .map_or(SchedulerState::Idle, |stats| stats.state);

        ControllerStatus {
            is_playing: self.is_playing(),
            device: self.selected.clone(),
            settings: self.settings,
            state,
            session: live.or_else(|| self.last_stats.clone()),
        }
    }

    /// Remove and return pending notifications
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain()
    }

    pub fn latest_notification(&self) -> Option<&Notification> {
        self.notifications.latest()
    }
}
