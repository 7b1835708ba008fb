// Test doubles for the crate's seams: scripted pull sources, counting
// output units and an in-memory device API.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use specpipe_player::api::{DeviceApi, DeviceRecord, DeviceSummary, DeviceUpdate};
use specpipe_player::audio::{
    AudioOutput, ClockedOutputFactory, DecodedFrame, FrameEnd, OutputFactory,
};
use specpipe_player::nats::{PendingMessage, PullSource, SourceFactory};
use specpipe_player::playback::PlaybackConfig;
use specpipe_player::{PipelineError, PipelineResult};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const SAMPLE_RATE: u32 = 8000;

/// 800 samples per message, 2 messages per frame: 200 ms frames at 8 kHz
pub fn test_config() -> PlaybackConfig {
    PlaybackConfig {
        batch_size: 2,
        samples_per_message: 800,
        messages_per_frame: 2,
        poll_interval_ms: 200,
        output_sample_rate: SAMPLE_RATE,
        follow_device_rate: false,
        ..PlaybackConfig::default()
    }
}

/// One message worth of a constant sample
pub fn message(config: &PlaybackConfig, sample: i16) -> Vec<u8> {
    sample
        .to_le_bytes()
        .iter()
        .copied()
        .cycle()
        .take(config.message_bytes())
        .collect()
}

// ============================================================================
// Pull sources
// ============================================================================

/// Counts live and total subscriptions across every source a factory opens
#[derive(Debug, Default)]
pub struct SourceProbe {
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub opened: AtomicUsize,
    pub acked: AtomicUsize,
    pub subjects: Mutex<Vec<String>>,
}

impl SourceProbe {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn acked(&self) -> usize {
        self.acked.load(Ordering::SeqCst)
    }

    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

/// What a scripted source yields
#[derive(Debug, Clone)]
pub enum Script {
    /// These batches, then nothing; `ends` marks the source exhausted
    Batches { batches: Vec<Vec<Vec<u8>>>, ends: bool },
    /// A full batch of this payload on every pull
    Endless(Vec<u8>),
    /// These batches, then a fetch error
    FailAfter(Vec<Vec<Vec<u8>>>),
}

struct TestMessage {
    payload: Vec<u8>,
    probe: Arc<SourceProbe>,
}

#[async_trait::async_trait]
impl PendingMessage for TestMessage {
    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn ack(&mut self) -> Result<()> {
        self.probe.acked.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct ScriptedSource {
    subject: String,
    batches: VecDeque<Vec<Vec<u8>>>,
    endless: Option<Vec<u8>>,
    ends: bool,
    fail_when_empty: bool,
    closed: bool,
    probe: Arc<SourceProbe>,
}

impl ScriptedSource {
    fn new(subject: &str, script: Script, probe: Arc<SourceProbe>) -> Self {
        let (batches, endless, ends, fail_when_empty) = match script {
            Script::Batches { batches, ends } => (batches, None, ends, false),
            Script::Endless(payload) => (Vec::new(), Some(payload), false, false),
            Script::FailAfter(batches) => (batches, None, false, true),
        };

        let live = probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_live.fetch_max(live, Ordering::SeqCst);
        probe.opened.fetch_add(1, Ordering::SeqCst);
        probe.subjects.lock().unwrap().push(subject.to_string());

        Self {
            subject: subject.to_string(),
            batches: batches.into(),
            endless,
            ends,
            fail_when_empty,
            closed: false,
            probe,
        }
    }

    fn wrap(&self, payloads: Vec<Vec<u8>>) -> Vec<Box<dyn PendingMessage>> {
        payloads
            .into_iter()
            .map(|payload| {
                Box::new(TestMessage {
                    payload,
                    probe: Arc::clone(&self.probe),
                }) as Box<dyn PendingMessage>
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl PullSource for ScriptedSource {
    async fn fetch(&mut self, max_messages: usize) -> Result<Vec<Box<dyn PendingMessage>>> {
        if self.closed {
            return Err(anyhow!("source closed"));
        }
        if let Some(payload) = &self.endless {
            return Ok(self.wrap(vec![payload.clone(); max_messages]));
        }
        match self.batches.pop_front() {
            Some(batch) => Ok(self.wrap(batch)),
            None if self.fail_when_empty => Err(anyhow!("consumer deleted")),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_exhausted(&self) -> bool {
        self.ends && self.batches.is_empty()
    }

    fn subject(&self) -> &str {
        &self.subject
    }
}

/// Opens scripted sources; subjects without a script get `default`
pub struct ScriptedSourceFactory {
    pub probe: Arc<SourceProbe>,
    scripts: Mutex<HashMap<String, Script>>,
    default: Script,
    fail_open: AtomicBool,
}

impl ScriptedSourceFactory {
    pub fn new(default: Script) -> Self {
        Self {
            probe: Arc::new(SourceProbe::default()),
            scripts: Mutex::new(HashMap::new()),
            default,
            fail_open: AtomicBool::new(false),
        }
    }

    pub fn with_script(self, subject: &str, script: Script) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(subject.to_string(), script);
        self
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SourceFactory for ScriptedSourceFactory {
    async fn open(&self, subject: &str) -> PipelineResult<Box<dyn PullSource>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(PipelineError::Connection {
                url: "nats://test".to_string(),
                reason: "connection refused".to_string(),
            });
        }

        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(subject)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Ok(Box::new(ScriptedSource::new(
            subject,
            script,
            Arc::clone(&self.probe),
        )))
    }
}

// ============================================================================
// Output units
// ============================================================================

#[derive(Debug, Default)]
pub struct OutputProbe {
    pub live: AtomicUsize,
    pub max_live: AtomicUsize,
    pub opened: AtomicUsize,
    pub frames: AtomicUsize,
    pub rates: Mutex<Vec<u32>>,
}

impl OutputProbe {
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> usize {
        self.frames.load(Ordering::SeqCst)
    }

    pub fn rates(&self) -> Vec<u32> {
        self.rates.lock().unwrap().clone()
    }
}

/// Clocked output that reports to a probe
struct CountingOutput {
    inner: Box<dyn AudioOutput>,
    probe: Arc<OutputProbe>,
    released: bool,
}

impl CountingOutput {
    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl AudioOutput for CountingOutput {
    fn play(&mut self, frame: DecodedFrame) -> PipelineResult<FrameEnd> {
        self.probe.frames.fetch_add(1, Ordering::SeqCst);
        self.inner.play(frame)
    }

    fn close(&mut self) {
        self.inner.close();
        self.release();
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn name(&self) -> &str {
        "counting"
    }
}

impl Drop for CountingOutput {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Default)]
pub struct CountingOutputFactory {
    pub probe: Arc<OutputProbe>,
}

impl OutputFactory for CountingOutputFactory {
    fn open(&self, sample_rate: u32) -> PipelineResult<Box<dyn AudioOutput>> {
        let inner = ClockedOutputFactory.open(sample_rate)?;

        let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(live, Ordering::SeqCst);
        self.probe.opened.fetch_add(1, Ordering::SeqCst);
        self.probe.rates.lock().unwrap().push(sample_rate);

        Ok(Box::new(CountingOutput {
            inner,
            probe: Arc::clone(&self.probe),
            released: false,
        }))
    }
}

// ============================================================================
// Device API
// ============================================================================

pub fn record(name: &str, freq: &str, sample_rate: &str, resample_rate: &str) -> DeviceRecord {
    DeviceRecord {
        name: name.to_string(),
        freq: freq.to_string(),
        sample_rate: sample_rate.to_string(),
        resample_rate: resample_rate.to_string(),
        register_ts: None,
        specpipe_version: None,
        longitude: None,
        latitude: None,
    }
}

#[derive(Default)]
pub struct MockDeviceApi {
    devices: Mutex<Vec<DeviceRecord>>,
    pub updates: Mutex<Vec<(String, DeviceUpdate)>>,
    fail_updates: AtomicBool,
}

impl MockDeviceApi {
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        Self {
            devices: Mutex::new(devices),
            ..Self::default()
        }
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn updates(&self) -> Vec<(String, DeviceUpdate)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DeviceApi for MockDeviceApi {
    async fn list_devices(&self) -> PipelineResult<Vec<DeviceSummary>> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn get_device(&self, name: &str) -> PipelineResult<Option<DeviceRecord>> {
        Ok(self
            .devices
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }

    async fn update_device(&self, name: &str, update: &DeviceUpdate) -> PipelineResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(PipelineError::ConfigApi("Updating device returned HTTP 500".to_string()));
        }

        let mut devices = self.devices.lock().unwrap();
        let Some(device) = devices.iter_mut().find(|d| d.name == name) else {
            return Err(PipelineError::DeviceNotFound(name.to_string()));
        };
        if let Some(freq) = &update.freq {
            device.freq = freq.clone();
        }
        if let Some(rate) = &update.sample_rate {
            device.sample_rate = rate.clone();
        }
        if let Some(rate) = &update.resample_rate {
            device.resample_rate = rate.clone();
        }

        self.updates
            .lock()
            .unwrap()
            .push((name.to_string(), update.clone()));
        Ok(())
    }
}
