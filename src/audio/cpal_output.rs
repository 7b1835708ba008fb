// Output unit on the host's default sound device
//
// `cpal::Stream` is `!Send` on some platforms, so the stream lives on a
// dedicated thread for its whole lifetime. Frames reach the real-time
// callback over a channel; see `render` for the callback side.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::decoder::DecodedFrame;
use super::output::{AudioOutput, FrameEnd, OutputFactory};
use super::render::{QueuedFrame, Renderer};
use crate::error::{PipelineError, PipelineResult};

pub struct CpalOutput {
    frames_tx: Option<mpsc::Sender<QueuedFrame>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
    device_name: String,
}

impl CpalOutput {
    /// Open the default output device and start a silent stream
    pub fn open(sample_rate: u32) -> PipelineResult<Self> {
        let (frames_tx, frames_rx) = mpsc::channel::<QueuedFrame>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (init_tx, init_rx) = mpsc::channel::<PipelineResult<String>>();

        let thread = thread::Builder::new()
            .name("specpipe-audio".into())
            .spawn(move || {
                let stream = match build_stream(sample_rate, frames_rx) {
                    Ok((stream, name)) => {
                        let _ = init_tx.send(Ok(name));
                        stream
                    }
                    Err(e) => {
                        let _ = init_tx.send(Err(e));
                        return;
                    }
                };

                // Park until close; dropping the stream releases the device.
                let _ = shutdown_rx.recv();
                drop(stream);
            })
            .map_err(|e| PipelineError::Output(format!("failed to spawn audio thread: {}", e)))?;

        let device_name = init_rx
            .recv()
            .map_err(|_| PipelineError::Output("audio thread died during init".to_string()))??;

        info!("cpal output opened on '{}' for {} Hz audio", device_name, sample_rate);

        Ok(Self {
            frames_tx: Some(frames_tx),
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
            device_name,
        })
    }
}

/// Pick an f32 output config: the stream's own rate when the device offers
/// it, otherwise the device's default rate with resampling in the callback.
fn choose_config(device: &cpal::Device, sample_rate: u32) -> PipelineResult<cpal::StreamConfig> {
    let ranges: Vec<cpal::SupportedStreamConfigRange> = device
        .supported_output_configs()
        .map_err(|e| PipelineError::Output(format!("Failed to query output configs: {}", e)))?
        .filter(|range| range.sample_format() == cpal::SampleFormat::F32)
        .collect();

    let covers = |range: &cpal::SupportedStreamConfigRange, rate: cpal::SampleRate| {
        range.min_sample_rate() <= rate && rate <= range.max_sample_rate()
    };

    let wanted = cpal::SampleRate(sample_rate);
    if let Some(range) = ranges.iter().find(|range| covers(range, wanted)) {
        return Ok(range.clone().with_sample_rate(wanted).config());
    }

    let fallback = device
        .default_output_config()
        .ok()
        .map(|config| config.sample_rate())
        .and_then(|rate| {
            ranges
                .iter()
                .find(|range| covers(range, rate))
                .map(|range| range.clone().with_sample_rate(rate))
        })
        .or_else(|| ranges.first().map(|range| range.clone().with_max_sample_rate()))
        .ok_or_else(|| PipelineError::Output("Output device has no f32 stream config".to_string()))?;

    warn!(
        "Output device does not run at {} Hz; resampling to {} Hz",
        sample_rate,
        fallback.sample_rate().0
    );
    Ok(fallback.config())
}

fn build_stream(
    sample_rate: u32,
    frames_rx: mpsc::Receiver<QueuedFrame>,
) -> PipelineResult<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| PipelineError::Output("No default output device found".to_string()))?;
    let name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let config = choose_config(&device, sample_rate)?;
    let mut renderer = Renderer::new(frames_rx, config.channels, sample_rate, config.sample_rate.0);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render(data);
            },
            |err| {
                error!("Audio output stream error: {}", err);
            },
            None,
        )
        .map_err(|e| PipelineError::Output(format!("Failed to build output stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| PipelineError::Output(format!("Failed to start output stream: {}", e)))?;

    Ok((stream, name))
}

impl AudioOutput for CpalOutput {
    fn play(&mut self, frame: DecodedFrame) -> PipelineResult<FrameEnd> {
        let frames_tx = self
            .frames_tx
            .as_ref()
            .ok_or_else(|| PipelineError::Output("output unit already closed".to_string()))?;

        let (done_tx, done_rx) = oneshot::channel();
        frames_tx
            .send(QueuedFrame::new(frame.samples, done_tx))
            .map_err(|_| PipelineError::Output("audio callback is gone".to_string()))?;
        Ok(done_rx)
    }

    fn close(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };

        self.frames_tx.take();
        let _ = shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Audio thread panicked during shutdown");
            }
        }
        info!("cpal output on '{}' closed", self.device_name);
    }

    fn is_closed(&self) -> bool {
        self.shutdown_tx.is_none()
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct CpalOutputFactory;

impl OutputFactory for CpalOutputFactory {
    fn open(&self, sample_rate: u32) -> PipelineResult<Box<dyn AudioOutput>> {
        Ok(Box::new(CpalOutput::open(sample_rate)?))
    }
}
