//! Error types for the playback pipeline and its collaborators.

/// Errors surfaced by the audio pipeline, the playback controller and the
/// configuration API client.
///
/// None of these are fatal to the process: the controller converts every
/// variant into a notification. Audio-path errors end the session that hit
/// them and are reported as aborted playback.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Message broker unreachable. Aborts session start; no retry.
    #[error("Failed to connect to message broker at {url}: {reason}")]
    Connection { url: String, reason: String },

    /// Pull subscription could not be created or broke while pulling.
    #[error("Subscription on {subject} failed: {reason}")]
    Subscription { subject: String, reason: String },

    /// An inbound payload would overflow the frame buffer.
    #[error("Framing error: {incoming} byte payload does not fit ({filled}/{capacity} bytes filled)")]
    Framing {
        filled: usize,
        capacity: usize,
        incoming: usize,
    },

    /// A frame is not a whole number of 16-bit samples.
    #[error("Decode error: frame of {len} bytes is not a whole number of 16-bit samples")]
    Decode { len: usize },

    /// Audio output unit could not be opened or failed while rendering.
    #[error("Audio output error: {0}")]
    Output(String),

    /// Network or HTTP failure talking to the configuration API.
    #[error("Configuration API error: {0}")]
    ConfigApi(String),

    /// Device record absent. Recoverable: the controller shows an empty state.
    #[error("Device {0} not found")]
    DeviceNotFound(String),

    /// Frame layout constants are not mutually consistent.
    #[error("Invalid playback configuration: {0}")]
    InvalidConfig(String),

    /// Device settings outside their accepted ranges.
    #[error("Invalid device settings: {0}")]
    InvalidSettings(String),

    /// Device name cannot be used as a subject token.
    #[error("Invalid stream subject for device '{0}'")]
    InvalidSubject(String),

    /// An operation needs a selected device and there is none.
    #[error("No device selected")]
    NoDeviceSelected,
}

impl PipelineError {
    /// Whether this error belongs to the audio path (and must end the session).
    pub fn is_audio_path(&self) -> bool {
        matches!(
            self,
            Self::Subscription { .. } | Self::Framing { .. } | Self::Decode { .. } | Self::Output(_)
        )
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
