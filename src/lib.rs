pub mod api;
pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod nats;
pub mod playback;

pub use api::{Device, DeviceApi, DeviceRecord, DeviceSettings, HttpDeviceApi};
pub use audio::{
    decode_pcm16le, AudioOutput, ClockedOutputFactory, DecodedFrame, FrameAssembler, FrameStatus,
    OutputBackend, OutputBackendFactory, OutputFactory, OverflowPolicy,
};
pub use config::Config;
pub use controller::{ControllerStatus, Notification, NotificationLevel, PlaybackController};
pub use error::{PipelineError, PipelineResult};
pub use http::{create_router, AppState};
pub use nats::{stream_subject, NatsClient, NatsSourceFactory, PullSource, SourceFactory};
pub use playback::{PlaybackConfig, PlaybackSession, SchedulerState, SessionStats};
